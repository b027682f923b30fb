use bitvec::prelude::*;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use eezo_sidechain::{
    BatchIndex, BatchOutcome, CertProofInput, CswProofInput, EngineBatch, EngineError, EntryError,
    ProvingSystem, VerificationEngine, VerificationKey, VerifierCfg,
};

use crate::public::{pack_certificate, pack_csw, PublicPack};
use crate::transcript::{public_digest, DIGEST_LEN};

/// Batch engine backed by the digest transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiniBatchEngine {
    pub parallel: bool,
    pub max_batch: usize,
}

impl Default for MiniBatchEngine {
    fn default() -> Self {
        Self::from_cfg(&VerifierCfg::default())
    }
}

impl MiniBatchEngine {
    pub fn from_cfg(cfg: &VerifierCfg) -> Self {
        Self {
            parallel: cfg.parallel,
            max_batch: cfg.max_batch.max(1),
        }
    }
}

impl VerificationEngine for MiniBatchEngine {
    fn name(&self) -> &'static str {
        "mini-digest"
    }

    fn begin_batch(&self) -> Box<dyn EngineBatch> {
        Box::new(MiniBatch {
            engine: *self,
            entries: Vec::new(),
        })
    }
}

struct Pending {
    vk: VerificationKey,
    pack: PublicPack,
    proof: Vec<u8>,
}

impl Pending {
    fn check(&self) -> bool {
        self.proof.len() == DIGEST_LEN
            && public_digest(self.vk.as_bytes(), &self.pack.words)[..] == self.proof[..]
    }
}

struct MiniBatch {
    engine: MiniBatchEngine,
    entries: Vec<Pending>,
}

impl MiniBatch {
    fn admit(
        &mut self,
        index: BatchIndex,
        vk: &VerificationKey,
        ps: ProvingSystem,
    ) -> Result<(), EngineError> {
        let reject = |reason: &str| EngineError::Rejected {
            index,
            reason: reason.to_string(),
        };
        if index as usize != self.entries.len() {
            return Err(reject("batch index out of order"));
        }
        if vk.as_bytes().is_empty() {
            return Err(reject("empty verification key"));
        }
        if ps == ProvingSystem::Undefined {
            return Err(reject("undefined proving system"));
        }
        Ok(())
    }

    fn check_chunk(&self, chunk: &[Pending]) -> Vec<bool> {
        #[cfg(feature = "parallel")]
        {
            if self.engine.parallel {
                return chunk.par_iter().map(Pending::check).collect();
            }
        }
        chunk.iter().map(Pending::check).collect()
    }
}

impl EngineBatch for MiniBatch {
    fn add_certificate_proof(
        &mut self,
        index: BatchIndex,
        input: &CertProofInput,
    ) -> Result<(), EngineError> {
        self.admit(index, &input.vk, input.proving_system)?;
        self.entries.push(Pending {
            vk: input.vk.clone(),
            pack: pack_certificate(input),
            proof: input.proof.as_bytes().to_vec(),
        });
        Ok(())
    }

    fn add_csw_proof(&mut self, index: BatchIndex, input: &CswProofInput) -> Result<(), EngineError> {
        self.admit(index, &input.vk, input.proving_system)?;
        self.entries.push(Pending {
            vk: input.vk.clone(),
            pack: pack_csw(input),
            proof: input.proof.as_bytes().to_vec(),
        });
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn verify(self: Box<Self>) -> Result<BatchOutcome, EngineError> {
        let mut flags = BitVec::with_capacity(self.entries.len());
        for (n, chunk) in self.entries.chunks(self.engine.max_batch).enumerate() {
            log::debug!("mini-digest: chunk {n} with {} proof(s)", chunk.len());
            flags.extend(self.check_chunk(chunk));
        }
        let errors = flags
            .iter_zeros()
            .map(|i| EntryError {
                index: i as BatchIndex,
                reason: "proof does not match public inputs".to_string(),
            })
            .collect();
        Ok(BatchOutcome { flags, errors })
    }
}
