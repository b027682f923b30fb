pub mod types;

pub mod config;

pub mod params;

pub mod epoch;

pub mod fees;

pub mod events;

pub mod entry;

pub mod tx;

pub mod error;

pub mod view;

pub mod connect;

pub mod engine;

pub mod verifier;

#[cfg(feature = "persistence")]
pub mod persistence;

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(not(feature = "metrics"))]
pub mod metrics_shim;

#[cfg(not(feature = "metrics"))]
pub use self::metrics_shim as metrics;

pub use types::{
    money_range, Amount, BackwardTransfer, CertHash, CertView, Epoch, FieldElement, Height,
    ProvingSystem, Quality, ScId, ScProof, TxHash, VerificationKey, COIN, EPOCH_NULL,
    HEIGHT_UNCONFIRMED, MAX_MONEY, QUALITY_NULL,
};

pub use config::{ChainParams, ConfigError, VerificationMode, VerifierCfg};

pub use params::{CertFieldConfig, CreationError, ScFixedParams};

pub use epoch::{EpochCalc, EpochError};

pub use fees::{FeeWindow, ScFeeEntry};

pub use events::{EventKind, EventsLedger, SidechainEvents};

pub use entry::{ScState, SidechainEntry};

pub use tx::{
    CswInput, ForwardTransferOut, McBwtRequestOut, ScCertificate, ScCreationOutput, ScTransaction,
};

pub use error::{FeeKind, ScError};

pub use view::{ChainView, ScChangeSet, ScStateDb, ScViewCache, SharedScState};

pub use connect::{
    check_certificate, check_transaction, connect_block_shared, disconnect_block_shared,
    BlockScEffects, BlockScUndo,
};

pub use engine::{
    BatchIndex, BatchOutcome, CertProofInput, CswProofInput, EngineBatch, EngineError,
    EntryError, VerificationEngine,
};

pub use verifier::{BatchVerifyError, ProofFailure, ProofRef, ProofVerifier, VerifierContext};

#[cfg(feature = "persistence")]
pub use persistence::{PersistError, ScStore};
