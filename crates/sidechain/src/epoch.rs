//! Height <-> epoch arithmetic for a single sidechain.
//!
//! Epoch `e` covers heights `[H + e*L + 1, H + (e+1)*L]` where `H` is the
//! creation height and `L` the withdrawal epoch length. The certificate for
//! epoch `e` may be mined in the submission window that opens right after the
//! epoch ends. The window length is the chain parameter capped at `2*L`, so the
//! window for `e` never extends past the end of epoch `e + 2`.

use thiserror::Error;

use crate::config::ChainParams;
use crate::types::{Epoch, Height, EPOCH_NULL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EpochError {
    #[error("height {height} is not after creation height {creation}")]
    BeforeCreation { height: Height, creation: Height },
    #[error("epoch {0} is negative")]
    NegativeEpoch(Epoch),
    #[error("withdrawal epoch length {0} must be positive")]
    BadEpochLength(i32),
    #[error("submission window length {0} must be positive")]
    BadWindowLength(i32),
    #[error("creation height {0} is unconfirmed or negative")]
    UnconfirmedCreation(Height),
    #[error("height arithmetic overflow")]
    Overflow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochCalc {
    creation_height: Height,
    epoch_len: i32,
    window_len: i32,
}

impl EpochCalc {
    pub fn new(
        creation_height: Height,
        epoch_len: i32,
        submission_window_len: i32,
    ) -> Result<Self, EpochError> {
        if creation_height < 0 {
            return Err(EpochError::UnconfirmedCreation(creation_height));
        }
        if epoch_len <= 0 {
            return Err(EpochError::BadEpochLength(epoch_len));
        }
        if submission_window_len <= 0 {
            return Err(EpochError::BadWindowLength(submission_window_len));
        }
        let window_len = submission_window_len.min(epoch_len.saturating_mul(2));
        Ok(Self {
            creation_height,
            epoch_len,
            window_len,
        })
    }

    pub fn with_params(
        creation_height: Height,
        epoch_len: i32,
        chain: &ChainParams,
    ) -> Result<Self, EpochError> {
        Self::new(creation_height, epoch_len, chain.cert_submission_window_length)
    }

    pub fn creation_height(&self) -> Height {
        self.creation_height
    }

    pub fn epoch_len(&self) -> i32 {
        self.epoch_len
    }

    /// Effective submission window length after capping.
    pub fn window_len(&self) -> i32 {
        self.window_len
    }

    pub fn epoch_for(&self, height: Height) -> Result<Epoch, EpochError> {
        if height <= self.creation_height {
            return Err(EpochError::BeforeCreation {
                height,
                creation: self.creation_height,
            });
        }
        Ok((height - self.creation_height - 1) / self.epoch_len)
    }

    pub fn start_height(&self, epoch: Epoch) -> Result<Height, EpochError> {
        if epoch < 0 {
            return Err(EpochError::NegativeEpoch(epoch));
        }
        epoch
            .checked_mul(self.epoch_len)
            .and_then(|x| x.checked_add(self.creation_height))
            .and_then(|x| x.checked_add(1))
            .ok_or(EpochError::Overflow)
    }

    pub fn end_height(&self, epoch: Epoch) -> Result<Height, EpochError> {
        if epoch < 0 {
            return Err(EpochError::NegativeEpoch(epoch));
        }
        epoch
            .checked_add(1)
            .and_then(|e| e.checked_mul(self.epoch_len))
            .and_then(|x| x.checked_add(self.creation_height))
            .ok_or(EpochError::Overflow)
    }

    pub fn submission_window_start(&self, epoch: Epoch) -> Result<Height, EpochError> {
        self.end_height(epoch)?
            .checked_add(1)
            .ok_or(EpochError::Overflow)
    }

    pub fn submission_window_end(&self, epoch: Epoch) -> Result<Height, EpochError> {
        self.end_height(epoch)?
            .checked_add(self.window_len)
            .ok_or(EpochError::Overflow)
    }

    pub fn is_in_submission_window(&self, epoch: Epoch, height: Height) -> Result<bool, EpochError> {
        Ok(self.submission_window_start(epoch)? <= height
            && height <= self.submission_window_end(epoch)?)
    }

    /// Height from which a certificate for `epoch` can no longer be
    /// superseded: the end of the following epoch's submission window.
    pub fn cert_maturity_height(&self, epoch: Epoch) -> Result<Height, EpochError> {
        let next = epoch.checked_add(1).ok_or(EpochError::Overflow)?;
        self.submission_window_end(next)
    }

    /// One past the end of the submission window the sidechain must satisfy
    /// next. `last_cert_epoch` is the epoch of the last accepted certificate or
    /// `EPOCH_NULL` when none was accepted yet.
    pub fn scheduled_ceasing_height(&self, last_cert_epoch: Epoch) -> Result<Height, EpochError> {
        if last_cert_epoch < EPOCH_NULL {
            return Err(EpochError::NegativeEpoch(last_cert_epoch));
        }
        self.submission_window_end(last_cert_epoch + 1)?
            .checked_add(1)
            .ok_or(EpochError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calc() -> EpochCalc {
        EpochCalc::new(100, 10, 20).unwrap()
    }

    #[test]
    fn epoch_boundaries() {
        let c = calc();
        assert_eq!(c.epoch_for(101), Ok(0));
        assert_eq!(c.epoch_for(110), Ok(0));
        assert_eq!(c.epoch_for(111), Ok(1));
        assert_eq!(c.start_height(0), Ok(101));
        assert_eq!(c.end_height(0), Ok(110));
        assert_eq!(c.start_height(3), Ok(131));
        assert_eq!(c.end_height(3), Ok(140));
    }

    #[test]
    fn height_at_or_before_creation_is_an_error() {
        let c = calc();
        assert_eq!(
            c.epoch_for(100),
            Err(EpochError::BeforeCreation {
                height: 100,
                creation: 100
            })
        );
        assert!(c.epoch_for(3).is_err());
        assert_eq!(c.start_height(-1), Err(EpochError::NegativeEpoch(-1)));
    }

    #[test]
    fn submission_window_and_ceasing() {
        let c = calc();
        assert_eq!(c.submission_window_start(0), Ok(111));
        assert_eq!(c.submission_window_end(0), Ok(130));
        assert_eq!(c.scheduled_ceasing_height(EPOCH_NULL), Ok(131));
        assert_eq!(c.scheduled_ceasing_height(0), Ok(141));
        assert_eq!(c.cert_maturity_height(0), Ok(140));
        assert_eq!(c.is_in_submission_window(0, 115), Ok(true));
        assert_eq!(c.is_in_submission_window(0, 110), Ok(false));
        assert_eq!(c.is_in_submission_window(0, 131), Ok(false));
    }

    #[test]
    fn window_is_capped_at_two_epochs() {
        let c = EpochCalc::new(0, 5, 100).unwrap();
        assert_eq!(c.window_len(), 10);
        assert_eq!(c.submission_window_end(0), Ok(c.end_height(2).unwrap()));
    }

    #[test]
    fn rejects_bad_construction() {
        assert_eq!(
            EpochCalc::new(-1, 10, 20),
            Err(EpochError::UnconfirmedCreation(-1))
        );
        assert_eq!(EpochCalc::new(0, 0, 20), Err(EpochError::BadEpochLength(0)));
        assert_eq!(EpochCalc::new(0, 5, 0), Err(EpochError::BadWindowLength(0)));
    }

    #[test]
    fn overflow_is_reported() {
        let c = EpochCalc::new(i32::MAX - 5, 10, 20).unwrap();
        assert_eq!(c.end_height(1), Err(EpochError::Overflow));
    }

    proptest! {
        #[test]
        fn epoch_contains_height(h in 0i32..1_000_000, l in 1i32..5_000, d in 1i32..1_000_000) {
            let c = EpochCalc::new(h, l, 20).unwrap();
            let height = h + d;
            let e = c.epoch_for(height).unwrap();
            prop_assert!(c.start_height(e).unwrap() <= height);
            prop_assert!(height <= c.end_height(e).unwrap());
        }

        #[test]
        fn epoch_is_monotonic(h in 0i32..1_000_000, l in 1i32..5_000, d in 1i32..1_000_000) {
            let c = EpochCalc::new(h, l, 20).unwrap();
            let a = c.epoch_for(h + d).unwrap();
            let b = c.epoch_for(h + d + 1).unwrap();
            prop_assert!(a <= b);
        }
    }
}
