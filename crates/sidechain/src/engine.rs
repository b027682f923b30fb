//! Narrow interface to the proof verification backend.
//!
//! The core never looks inside a proof. It hands the backend one input per
//! proof, indexed from zero in submission order, and gets back a per-index
//! verdict for the whole batch.

use bitvec::prelude::BitVec;
use thiserror::Error;

use crate::params::ScFixedParams;
use crate::tx::{CswInput, ScCertificate};
use crate::types::{
    Amount, BackwardTransfer, Epoch, FieldElement, ProvingSystem, Quality, ScId, ScProof,
    VerificationKey,
};

pub type BatchIndex = u32;

/// Public inputs of one certificate proof, with the key in effect when it was
/// queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertProofInput {
    pub constant: Option<FieldElement>,
    pub epoch_number: Epoch,
    pub quality: Quality,
    pub backward_transfers: Vec<BackwardTransfer>,
    pub custom_fields: Vec<FieldElement>,
    pub end_cum_comm_tree_root: FieldElement,
    pub mbtr_fee: Amount,
    pub ft_fee: Amount,
    pub proof: ScProof,
    pub vk: VerificationKey,
    pub proving_system: ProvingSystem,
}

/// Public inputs of one ceased sidechain withdrawal proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CswProofInput {
    pub sc_id: ScId,
    pub amount: Amount,
    pub nullifier: FieldElement,
    pub pub_key_hash: [u8; 20],
    pub cert_data_hash: FieldElement,
    pub constant: Option<FieldElement>,
    pub proof: ScProof,
    pub vk: VerificationKey,
    pub proving_system: ProvingSystem,
}

impl CertProofInput {
    pub fn from_certificate(cert: &ScCertificate, params: &ScFixedParams) -> Self {
        Self {
            constant: params.constant,
            epoch_number: cert.epoch_number,
            quality: cert.quality,
            backward_transfers: cert.backward_transfers.clone(),
            custom_fields: cert.custom_fields(),
            end_cum_comm_tree_root: cert.end_epoch_cum_comm_tree_root,
            mbtr_fee: cert.mbtr_fee,
            ft_fee: cert.ft_fee,
            proof: cert.proof.clone(),
            vk: params.cert_vk.clone(),
            proving_system: params.cert_proving_system,
        }
    }
}

impl CswProofInput {
    /// Input for `csw` checked against `cert_data_hash`, the data hash of the
    /// certificate view the proof must commit to. `None` if the sidechain was
    /// created without a CSW key.
    pub fn from_input(
        csw: &CswInput,
        params: &ScFixedParams,
        cert_data_hash: FieldElement,
    ) -> Option<Self> {
        let vk = params.csw_vk.clone()?;
        Some(Self {
            sc_id: csw.sc_id,
            amount: csw.amount,
            nullifier: csw.nullifier,
            pub_key_hash: csw.pub_key_hash,
            cert_data_hash,
            constant: params.constant,
            proof: csw.proof.clone(),
            vk,
            proving_system: params.csw_proving_system,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryError {
    pub index: BatchIndex,
    pub reason: String,
}

/// Result of one engine pass. `flags[i]` is set iff proof `i` verified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub flags: BitVec,
    pub errors: Vec<EntryError>,
}

impl BatchOutcome {
    pub fn all_valid(&self) -> bool {
        self.flags.all() && self.errors.is_empty()
    }

    pub fn failing(&self) -> impl Iterator<Item = BatchIndex> + '_ {
        self.flags.iter_zeros().map(|i| i as BatchIndex)
    }

    pub fn reason_for(&self, index: BatchIndex) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.reason.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("input {index} rejected: {reason}")]
    Rejected { index: BatchIndex, reason: String },
    #[error("engine unavailable")]
    Unavailable,
    #[error("engine internal error: {0}")]
    Internal(String),
}

/// One batch being assembled. Inputs must be added with consecutive indices
/// starting at zero.
pub trait EngineBatch: Send {
    fn add_certificate_proof(
        &mut self,
        index: BatchIndex,
        input: &CertProofInput,
    ) -> Result<(), EngineError>;

    fn add_csw_proof(&mut self, index: BatchIndex, input: &CswProofInput) -> Result<(), EngineError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify everything added so far.
    fn verify(self: Box<Self>) -> Result<BatchOutcome, EngineError>;
}

pub trait VerificationEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn begin_batch(&self) -> Box<dyn EngineBatch>;
}
