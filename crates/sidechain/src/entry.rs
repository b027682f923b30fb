//! Per-sidechain registry entry and its certificate state machine.

use std::collections::BTreeMap;

use eezo_serde::{decode_exact, Decode, Encode, Reader, SerdeError};
use serde::{Deserialize, Serialize};

use crate::config::ChainParams;
use crate::epoch::{EpochCalc, EpochError};
use crate::error::{FeeKind, ScError};
use crate::fees::{FeeUndo, FeeWindow, ScFeeEntry};
use crate::params::ScFixedParams;
use crate::tx::{McBwtRequestOut, ScCertificate};
use crate::types::{
    Amount, CertHash, CertView, Epoch, Height, Quality, ScId, TxHash, EPOCH_NULL,
    HEIGHT_UNCONFIRMED, MAX_MONEY, QUALITY_NULL,
};

pub const ENTRY_CODEC_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScState {
    /// No such sidechain.
    #[default]
    NotApplicable,
    Unconfirmed,
    Alive,
    /// Terminal.
    Ceased,
}

impl Encode for ScState {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(match self {
            ScState::NotApplicable => 0,
            ScState::Unconfirmed => 1,
            ScState::Alive => 2,
            ScState::Ceased => 3,
        });
    }
}

impl Decode for ScState {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        match r.read::<u8>()? {
            0 => Ok(ScState::NotApplicable),
            1 => Ok(ScState::Unconfirmed),
            2 => Ok(ScState::Alive),
            3 => Ok(ScState::Ceased),
            _ => Err(SerdeError::Malformed("sidechain state tag")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidechainEntry {
    pub creation_block_height: Height,
    pub creation_tx_hash: TxHash,
    pub current_state: ScState,
    pub last_top_quality_cert_hash: CertHash,
    pub last_top_quality_cert_referenced_epoch: Epoch,
    pub last_top_quality_cert_quality: Quality,
    pub last_top_quality_cert_bwt_amount: Amount,
    pub last_top_quality_cert_view: CertView,
    /// Winner of the epoch before the last one, still the active view while
    /// the last epoch's winner can be superseded.
    pub past_epoch_top_quality_cert_view: CertView,
    pub balance: Amount,
    pub fixed_params: ScFixedParams,
    /// maturity height -> amount
    pub immature_amounts: BTreeMap<Height, Amount>,
    pub fee_window: FeeWindow,
}

impl Default for SidechainEntry {
    fn default() -> Self {
        Self {
            creation_block_height: HEIGHT_UNCONFIRMED,
            creation_tx_hash: TxHash::zero(),
            current_state: ScState::NotApplicable,
            last_top_quality_cert_hash: CertHash::zero(),
            last_top_quality_cert_referenced_epoch: EPOCH_NULL,
            last_top_quality_cert_quality: QUALITY_NULL,
            last_top_quality_cert_bwt_amount: 0,
            last_top_quality_cert_view: CertView::default(),
            past_epoch_top_quality_cert_view: CertView::default(),
            balance: 0,
            fixed_params: ScFixedParams::default(),
            immature_amounts: BTreeMap::new(),
            fee_window: FeeWindow::new(),
        }
    }
}

/// Previous certificate bookkeeping, restored when the certificate's block
/// is disconnected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertUndo {
    pub hash: CertHash,
    pub epoch: Epoch,
    pub quality: Quality,
    pub bwt_amount: Amount,
    pub view: CertView,
    pub past_view: CertView,
    pub balance: Amount,
    pub fee: FeeUndo,
}

impl SidechainEntry {
    pub fn new_confirmed(
        creation_height: Height,
        creation_tx_hash: TxHash,
        fixed_params: ScFixedParams,
    ) -> Self {
        Self {
            creation_block_height: creation_height,
            creation_tx_hash,
            current_state: ScState::Alive,
            fixed_params,
            ..Self::default()
        }
    }

    /// Entry for a creation seen only in a staging view.
    pub fn new_unconfirmed(creation_tx_hash: TxHash, fixed_params: ScFixedParams) -> Self {
        Self {
            creation_tx_hash,
            current_state: ScState::Unconfirmed,
            fixed_params,
            ..Self::default()
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::default()
            && self.fixed_params.is_empty()
            && self.immature_amounts.is_empty()
            && self.fee_window.is_empty()
    }

    pub fn state(&self) -> ScState {
        if self.is_null() {
            ScState::NotApplicable
        } else {
            self.current_state
        }
    }

    pub fn epoch_calc(&self, chain: &ChainParams) -> Result<EpochCalc, EpochError> {
        EpochCalc::with_params(
            self.creation_block_height,
            self.fixed_params.withdrawal_epoch_length,
            chain,
        )
    }

    pub fn scheduled_ceasing_height(&self, chain: &ChainParams) -> Result<Height, EpochError> {
        self.epoch_calc(chain)?
            .scheduled_ceasing_height(self.last_top_quality_cert_referenced_epoch)
    }

    /// View in effect at `height`: the last winner once its epoch's window has
    /// closed, the previous epoch's winner before that.
    pub fn active_cert_view(&self, height: Height, chain: &ChainParams) -> Result<CertView, EpochError> {
        if self.current_state == ScState::Ceased
            || self.last_top_quality_cert_referenced_epoch == EPOCH_NULL
        {
            return Ok(self.last_top_quality_cert_view);
        }
        let calc = self.epoch_calc(chain)?;
        if height <= calc.submission_window_end(self.last_top_quality_cert_referenced_epoch)? {
            Ok(self.past_epoch_top_quality_cert_view)
        } else {
            Ok(self.last_top_quality_cert_view)
        }
    }

    pub fn min_ft_fee(&self) -> Amount {
        self.fee_window.min_ft_fee(self.fixed_params.ft_default_fee)
    }

    pub fn min_mbtr_fee(&self) -> Amount {
        self.fee_window.min_mbtr_fee(self.fixed_params.mbtr_default_fee)
    }

    fn require_alive(&self, id: &ScId) -> Result<(), ScError> {
        match self.state() {
            ScState::Alive => Ok(()),
            state => Err(ScError::NotAlive { id: *id, state }),
        }
    }

    pub fn check_forward_transfer(&self, id: &ScId, amount: Amount) -> Result<(), ScError> {
        self.require_alive(id)?;
        let min = self.min_ft_fee();
        if amount < min {
            return Err(ScError::FeeTooLow {
                id: *id,
                kind: FeeKind::ForwardTransfer,
                offered: amount,
                min,
            });
        }
        Ok(())
    }

    pub fn check_mbtr(&self, id: &ScId, req: &McBwtRequestOut) -> Result<(), ScError> {
        self.require_alive(id)?;
        let expected = usize::from(self.fixed_params.mbtr_request_data_length);
        if req.request_data.len() != expected {
            return Err(ScError::MbtrDataMismatch {
                id: *id,
                expected,
                got: req.request_data.len(),
            });
        }
        let min = self.min_mbtr_fee();
        if req.sc_fee < min {
            return Err(ScError::FeeTooLow {
                id: *id,
                kind: FeeKind::Mbtr,
                offered: req.sc_fee,
                min,
            });
        }
        Ok(())
    }

    fn check_custom_fields(&self, id: &ScId, cert: &ScCertificate) -> Result<(), ScError> {
        let mismatch = |reason| ScError::CustomFieldMismatch { id: *id, reason };
        let fe_bits: Vec<u8> = self.fixed_params.fe_configs().collect();
        if cert.fe_fields.len() != fe_bits.len() {
            return Err(mismatch("field element count"));
        }
        if cert
            .fe_fields
            .iter()
            .zip(&fe_bits)
            .any(|(fe, bits)| !fe.fits_in_bits(u32::from(*bits)))
        {
            return Err(mismatch("field element wider than configured"));
        }
        let bv: Vec<(u32, u32)> = self.fixed_params.bv_configs().collect();
        if cert.bv_fields.len() != bv.len() {
            return Err(mismatch("bit vector count"));
        }
        if cert
            .bv_fields
            .iter()
            .zip(&bv)
            .any(|(field, (_, max_bytes))| field.is_empty() || field.len() > *max_bytes as usize)
        {
            return Err(mismatch("bit vector size"));
        }
        Ok(())
    }

    /// Contextual certificate checks against this entry at `height`.
    pub fn check_certificate(
        &self,
        cert: &ScCertificate,
        height: Height,
        chain: &ChainParams,
    ) -> Result<(), ScError> {
        let id = &cert.sc_id;
        self.require_alive(id)?;

        let last_epoch = self.last_top_quality_cert_referenced_epoch;
        let epoch = cert.epoch_number;
        if epoch != last_epoch && epoch != last_epoch + 1 {
            return Err(ScError::EpochOutOfOrder {
                id: *id,
                epoch,
                last_epoch,
            });
        }

        let calc = self.epoch_calc(chain)?;
        let (start, end) = (
            calc.submission_window_start(epoch)?,
            calc.submission_window_end(epoch)?,
        );
        if height < start || height > end {
            return Err(ScError::OutsideSubmissionWindow {
                id: *id,
                epoch,
                height,
                start,
                end,
            });
        }

        // first seen wins on ties
        let replacing = epoch == last_epoch;
        if replacing && cert.quality <= self.last_top_quality_cert_quality {
            return Err(ScError::QualityTooLow {
                id: *id,
                epoch,
                quality: cert.quality,
                incumbent: self.last_top_quality_cert_quality,
            });
        }

        self.check_custom_fields(id, cert)?;

        let needed = cert
            .bwt_total()
            .ok_or(ScError::Semantic("backward transfer total out of range"))?;
        let available = if replacing {
            self.balance + self.last_top_quality_cert_bwt_amount
        } else {
            self.balance
        };
        if needed > available {
            return Err(ScError::InsufficientBalance {
                id: *id,
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Make `cert` the top-quality certificate. A certificate for a later
    /// epoch demotes the current winner's view; one for the same epoch
    /// overwrites it and gives its backward transfers back to the balance.
    pub fn accept_certificate(
        &mut self,
        cert: &ScCertificate,
        height: Height,
        chain: &ChainParams,
    ) -> Result<CertUndo, ScError> {
        self.check_certificate(cert, height, chain)?;
        let bwt = cert
            .bwt_total()
            .ok_or(ScError::Semantic("backward transfer total out of range"))?;

        let mut undo = CertUndo {
            hash: self.last_top_quality_cert_hash,
            epoch: self.last_top_quality_cert_referenced_epoch,
            quality: self.last_top_quality_cert_quality,
            bwt_amount: self.last_top_quality_cert_bwt_amount,
            view: self.last_top_quality_cert_view,
            past_view: self.past_epoch_top_quality_cert_view,
            balance: self.balance,
            fee: FeeUndo::default(),
        };

        if cert.epoch_number == self.last_top_quality_cert_referenced_epoch {
            self.balance += self.last_top_quality_cert_bwt_amount;
            log::debug!(
                "sidechain {}: epoch {} winner replaced (quality {} -> {})",
                cert.sc_id,
                cert.epoch_number,
                self.last_top_quality_cert_quality,
                cert.quality
            );
        } else {
            self.past_epoch_top_quality_cert_view = self.last_top_quality_cert_view;
        }
        self.balance -= bwt;

        let view = cert.view();
        self.last_top_quality_cert_hash = cert.hash();
        self.last_top_quality_cert_referenced_epoch = cert.epoch_number;
        self.last_top_quality_cert_quality = cert.quality;
        self.last_top_quality_cert_bwt_amount = bwt;
        self.last_top_quality_cert_view = view;

        let capacity = chain.fee_window_capacity(self.fixed_params.withdrawal_epoch_length);
        undo.fee = self
            .fee_window
            .update(ScFeeEntry::from_view(cert.epoch_number, &view), capacity);

        log::debug!(
            "sidechain {}: accepted certificate {} for epoch {} at height {}",
            cert.sc_id,
            self.last_top_quality_cert_hash,
            cert.epoch_number,
            height
        );
        Ok(undo)
    }

    pub fn revert_certificate(&mut self, undo: CertUndo) {
        self.fee_window.revert(undo.fee);
        self.last_top_quality_cert_hash = undo.hash;
        self.last_top_quality_cert_referenced_epoch = undo.epoch;
        self.last_top_quality_cert_quality = undo.quality;
        self.last_top_quality_cert_bwt_amount = undo.bwt_amount;
        self.last_top_quality_cert_view = undo.view;
        self.past_epoch_top_quality_cert_view = undo.past_view;
        self.balance = undo.balance;
    }

    /// Schedule `amount` to join the balance at `maturity_height`; returns the
    /// amount previously scheduled there.
    pub fn add_immature(
        &mut self,
        maturity_height: Height,
        amount: Amount,
    ) -> Result<Option<Amount>, ScError> {
        let prev = self.immature_amounts.get(&maturity_height).copied();
        let total = prev
            .unwrap_or(0)
            .checked_add(amount)
            .filter(|t| *t <= MAX_MONEY)
            .ok_or(ScError::AmountOutOfRange { amount })?;
        self.immature_amounts.insert(maturity_height, total);
        Ok(prev)
    }

    pub fn restore_immature(&mut self, maturity_height: Height, prev: Option<Amount>) {
        match prev {
            Some(v) => self.immature_amounts.insert(maturity_height, v),
            None => self.immature_amounts.remove(&maturity_height),
        };
    }

    /// Fold the amount maturing at `height` into the balance.
    pub fn mature(&mut self, height: Height) -> Option<Amount> {
        let amount = self.immature_amounts.remove(&height)?;
        self.balance += amount;
        Some(amount)
    }

    pub fn unmature(&mut self, height: Height, amount: Amount) {
        self.balance -= amount;
        self.immature_amounts.insert(height, amount);
    }

    /// Recompute the memory-only fee window capacity after a reload.
    pub fn restore_fee_capacity(&mut self, chain: &ChainParams) {
        if !self.fee_window.is_empty() {
            self.fee_window
                .freeze_capacity(chain.fee_window_capacity(self.fixed_params.withdrawal_epoch_length));
        }
    }

    pub fn from_persisted(bytes: &[u8], chain: &ChainParams) -> Result<Self, SerdeError> {
        let mut entry: SidechainEntry = decode_exact(bytes)?;
        entry.restore_fee_capacity(chain);
        Ok(entry)
    }
}

impl Encode for SidechainEntry {
    fn encode_to(&self, out: &mut Vec<u8>) {
        ENTRY_CODEC_VERSION.encode_to(out);
        self.creation_block_height.encode_to(out);
        self.creation_tx_hash.encode_to(out);
        self.current_state.encode_to(out);
        self.past_epoch_top_quality_cert_view.encode_to(out);
        self.last_top_quality_cert_view.encode_to(out);
        self.last_top_quality_cert_hash.encode_to(out);
        self.last_top_quality_cert_referenced_epoch.encode_to(out);
        self.last_top_quality_cert_quality.encode_to(out);
        self.last_top_quality_cert_bwt_amount.encode_to(out);
        self.balance.encode_to(out);
        self.fixed_params.encode_to(out);
        self.immature_amounts.encode_to(out);
        self.fee_window.encode_to(out);
    }
}

impl Decode for SidechainEntry {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        let version: u32 = r.read()?;
        if version != ENTRY_CODEC_VERSION {
            return Err(SerdeError::UnknownVersion {
                found: version,
                expected: ENTRY_CODEC_VERSION,
            });
        }
        Ok(Self {
            creation_block_height: r.read()?,
            creation_tx_hash: r.read()?,
            current_state: r.read()?,
            past_epoch_top_quality_cert_view: r.read()?,
            last_top_quality_cert_view: r.read()?,
            last_top_quality_cert_hash: r.read()?,
            last_top_quality_cert_referenced_epoch: r.read()?,
            last_top_quality_cert_quality: r.read()?,
            last_top_quality_cert_bwt_amount: r.read()?,
            balance: r.read()?,
            fixed_params: r.read()?,
            immature_amounts: r.read()?,
            fee_window: r.read()?,
        })
    }
}
