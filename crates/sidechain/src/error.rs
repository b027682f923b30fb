use thiserror::Error;

use crate::entry::ScState;
use crate::epoch::EpochError;
use crate::params::CreationError;
use crate::types::{Amount, Epoch, Height, Quality, ScId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    ForwardTransfer,
    Mbtr,
}

/// Consensus rule violations. Every honest node reaches the same verdict,
/// so none of these is ever retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScError {
    #[error("sidechain {id} does not exist")]
    UnknownSidechain { id: ScId },
    #[error("sidechain {id} already exists")]
    SidechainExists { id: ScId },
    #[error("sidechain {id} is {state:?}, expected alive")]
    NotAlive { id: ScId, state: ScState },
    #[error("sidechain {id} is {state:?}, expected ceased")]
    NotCeased { id: ScId, state: ScState },
    #[error("invalid sidechain creation: {0}")]
    InvalidCreation(#[from] CreationError),
    #[error("epoch arithmetic: {0}")]
    Epoch(#[from] EpochError),
    #[error("sidechain {id}: certificate epoch {epoch} does not follow last epoch {last_epoch}")]
    EpochOutOfOrder {
        id: ScId,
        epoch: Epoch,
        last_epoch: Epoch,
    },
    #[error("sidechain {id}: certificate for epoch {epoch} at height {height} outside window [{start}, {end}]")]
    OutsideSubmissionWindow {
        id: ScId,
        epoch: Epoch,
        height: Height,
        start: Height,
        end: Height,
    },
    #[error("sidechain {id}: quality {quality} for epoch {epoch} does not beat {incumbent}")]
    QualityTooLow {
        id: ScId,
        epoch: Epoch,
        quality: Quality,
        incumbent: Quality,
    },
    #[error("sidechain {id}: needs {needed}, balance is {available}")]
    InsufficientBalance {
        id: ScId,
        needed: Amount,
        available: Amount,
    },
    #[error("sidechain {id}: {kind:?} fee {offered} below minimum {min}")]
    FeeTooLow {
        id: ScId,
        kind: FeeKind,
        offered: Amount,
        min: Amount,
    },
    #[error("amount {amount} out of range")]
    AmountOutOfRange { amount: Amount },
    #[error("sidechain {id}: custom fields do not match configuration ({reason})")]
    CustomFieldMismatch { id: ScId, reason: &'static str },
    #[error("sidechain {id}: MBTR carries {got} field elements, expected {expected}")]
    MbtrDataMismatch { id: ScId, expected: usize, got: usize },
    #[error("sidechain {id}: nullifier already spent")]
    NullifierSpent { id: ScId },
    #[error("sidechain {id}: withdrawal committed to a stale certificate")]
    ActiveCertDataMismatch { id: ScId },
    #[error("sidechain {id} has no ceased withdrawal key")]
    CswDisabled { id: ScId },
    #[error("semantic check failed: {0}")]
    Semantic(&'static str),
    #[error("undo data is for height {got}, tip is {expected}")]
    UndoMismatch { expected: Height, got: Height },
}

impl ScError {
    /// Stable reason code for block and transaction rejection reports.
    pub fn code(&self) -> &'static str {
        match self {
            ScError::UnknownSidechain { .. } => "sc-not-found",
            ScError::SidechainExists { .. } => "sc-redeclared",
            ScError::NotAlive { .. } => "sc-not-alive",
            ScError::NotCeased { .. } => "sc-not-ceased",
            ScError::InvalidCreation(_) => "sc-creation-invalid",
            ScError::Epoch(_) => "sc-bad-height",
            ScError::EpochOutOfOrder { .. } => "sc-cert-bad-epoch",
            ScError::OutsideSubmissionWindow { .. } => "sc-cert-outside-window",
            ScError::QualityTooLow { .. } => "sc-cert-quality-too-low",
            ScError::InsufficientBalance { .. } => "sc-insufficient-balance",
            ScError::FeeTooLow { kind: FeeKind::ForwardTransfer, .. } => "sc-ft-fee-too-low",
            ScError::FeeTooLow { kind: FeeKind::Mbtr, .. } => "sc-mbtr-fee-too-low",
            ScError::AmountOutOfRange { .. } => "sc-amount-out-of-range",
            ScError::CustomFieldMismatch { .. } => "sc-cert-custom-fields",
            ScError::MbtrDataMismatch { .. } => "sc-mbtr-data-length",
            ScError::NullifierSpent { .. } => "sc-csw-nullifier-spent",
            ScError::ActiveCertDataMismatch { .. } => "sc-csw-cert-data",
            ScError::CswDisabled { .. } => "sc-csw-disabled",
            ScError::Semantic(_) => "sc-semantic",
            ScError::UndoMismatch { .. } => "sc-undo-mismatch",
        }
    }

    /// The sidechain the rejection is about, when there is one.
    pub fn sc_id(&self) -> Option<ScId> {
        match self {
            ScError::UnknownSidechain { id }
            | ScError::SidechainExists { id }
            | ScError::NotAlive { id, .. }
            | ScError::NotCeased { id, .. }
            | ScError::EpochOutOfOrder { id, .. }
            | ScError::OutsideSubmissionWindow { id, .. }
            | ScError::QualityTooLow { id, .. }
            | ScError::InsufficientBalance { id, .. }
            | ScError::FeeTooLow { id, .. }
            | ScError::CustomFieldMismatch { id, .. }
            | ScError::MbtrDataMismatch { id, .. }
            | ScError::NullifierSpent { id }
            | ScError::ActiveCertDataMismatch { id }
            | ScError::CswDisabled { id } => Some(*id),
            _ => None,
        }
    }
}
