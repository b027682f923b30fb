#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bitvec::prelude::BitVec;
use parking_lot::Mutex;
use eezo_sidechain::{
    BackwardTransfer, BatchIndex, BatchOutcome, BlockScEffects, BlockScUndo, CertProofInput,
    ChainParams, ChainView, CswInput, CswProofInput, EngineBatch, EngineError, EntryError,
    FieldElement, ForwardTransferOut, Height, ProvingSystem, ScCertificate, ScCreationOutput,
    ScError, ScFixedParams, ScId, ScProof, ScStateDb, ScTransaction, SidechainEntry,
    EventsLedger, VerificationEngine, VerificationKey,
};

pub const BAD_PROOF: &[u8] = b"bad proof";

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Window 20, maturity 10: with an epoch length of 10 and creation at 100,
/// epoch 0 spans [101, 110] and its certificate window is [111, 130].
pub fn scenario_chain() -> ChainParams {
    ChainParams {
        cert_submission_window_length: 20,
        sc_coin_maturity: 10,
        sc_num_blocks_for_fee_check: 30,
        min_withdrawal_epoch_length: 2,
        max_withdrawal_epoch_length: 4032,
    }
}

pub fn fixed_params(epoch_len: i32) -> ScFixedParams {
    ScFixedParams {
        withdrawal_epoch_length: epoch_len,
        cert_proving_system: ProvingSystem::Darlin,
        cert_vk: VerificationKey::new(vec![7; 32]),
        csw_proving_system: ProvingSystem::CoboundaryMarlin,
        csw_vk: Some(VerificationKey::new(vec![9; 32])),
        ft_default_fee: 1,
        mbtr_default_fee: 1,
        mbtr_request_data_length: 1,
        ..Default::default()
    }
}

pub fn creation_tx(amount: i64, epoch_len: i32, nonce: u64) -> ScTransaction {
    ScTransaction {
        creations: vec![ScCreationOutput {
            amount,
            address: [4; 32],
            params: fixed_params(epoch_len),
        }],
        nonce,
        ..Default::default()
    }
}

pub fn forward_tx(id: ScId, amount: i64, nonce: u64) -> ScTransaction {
    ScTransaction {
        forward_transfers: vec![ForwardTransferOut {
            sc_id: id,
            amount,
            address: [5; 32],
        }],
        nonce,
        ..Default::default()
    }
}

pub fn cert(id: ScId, epoch: i32, quality: i64, bwt: i64) -> ScCertificate {
    let backward_transfers = if bwt > 0 {
        vec![BackwardTransfer {
            pub_key_hash: [3; 20],
            amount: bwt,
        }]
    } else {
        Vec::new()
    };
    ScCertificate {
        sc_id: id,
        epoch_number: epoch,
        quality,
        backward_transfers,
        ft_fee: 2,
        mbtr_fee: 3,
        proof: ScProof::new(vec![1, 2, 3]),
        ..Default::default()
    }
}

pub fn with_bad_proof(mut c: ScCertificate) -> ScCertificate {
    c.proof = ScProof::new(BAD_PROOF.to_vec());
    c
}

pub fn csw(id: ScId, amount: i64, nullifier: u8, act_cert_data_hash: FieldElement) -> CswInput {
    CswInput {
        sc_id: id,
        amount,
        nullifier: FieldElement([nullifier; 32]),
        pub_key_hash: [6; 20],
        act_cert_data_hash,
        proof: ScProof::new(vec![8; 4]),
    }
}

pub fn csw_tx(inputs: Vec<CswInput>, nonce: u64) -> ScTransaction {
    ScTransaction {
        csw_inputs: inputs,
        nonce,
        ..Default::default()
    }
}

pub fn block(transactions: Vec<ScTransaction>, certificates: Vec<ScCertificate>) -> BlockScEffects {
    BlockScEffects {
        transactions,
        certificates,
    }
}

/// Committed state plus the undo log of every block connected through it.
pub struct Harness {
    pub db: ScStateDb,
    pub undos: Vec<BlockScUndo>,
}

impl Harness {
    pub fn new(chain: ChainParams, tip: Height) -> Self {
        Self {
            db: ScStateDb::new(chain, tip),
            undos: Vec::new(),
        }
    }

    /// Harness whose tip is `creation_height`, where the block creating one
    /// sidechain of `amount` and epoch length `epoch_len` was connected.
    pub fn with_sidechain(creation_height: Height, amount: i64, epoch_len: i32) -> (Self, ScId) {
        let mut h = Self::new(scenario_chain(), creation_height - 1);
        let tx = creation_tx(amount, epoch_len, 0);
        let id = tx.sc_id_for_creation(0);
        h.connect(block(vec![tx], vec![])).unwrap();
        (h, id)
    }

    pub fn tip(&self) -> Height {
        self.db.tip()
    }

    pub fn connect(&mut self, b: BlockScEffects) -> Result<(), ScError> {
        let (undo, changes) = {
            let mut view = self.db.view();
            let undo = view.connect_block(&b)?;
            (undo, view.flush())
        };
        self.db.apply(changes);
        self.undos.push(undo);
        Ok(())
    }

    pub fn connect_empty_to(&mut self, height: Height) {
        while self.tip() < height {
            self.connect(BlockScEffects::default()).unwrap();
        }
    }

    pub fn disconnect(&mut self) -> Result<(), ScError> {
        let undo = self.undos.pop().expect("no block to disconnect");
        let changes = {
            let mut view = self.db.view();
            view.disconnect_block(undo)?;
            view.flush()
        };
        self.db.apply(changes);
        Ok(())
    }

    pub fn entry(&self, id: &ScId) -> &SidechainEntry {
        self.db.get_sidechain(id).expect("sidechain exists")
    }
}

/// Everything observable about committed state.
#[derive(Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub tip: Height,
    pub entries: Vec<(ScId, SidechainEntry)>,
    pub events: EventsLedger,
    pub nullifiers: Vec<(ScId, FieldElement)>,
}

pub fn fingerprint(db: &ScStateDb) -> Fingerprint {
    Fingerprint {
        tip: db.tip(),
        entries: db
            .sidechain_ids()
            .map(|id| (*id, db.get_sidechain(id).cloned().unwrap()))
            .collect(),
        events: db.events().clone(),
        nullifiers: db.nullifiers().copied().collect(),
    }
}

/// Engine stand-in: a proof is valid unless its bytes are `BAD_PROOF`.
#[derive(Default)]
pub struct MockEngine {
    batches: Arc<AtomicUsize>,
    proofs: Arc<AtomicUsize>,
    csw_seen: Arc<Mutex<Vec<(i64, FieldElement)>>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `verify` calls.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Number of proofs added across all batches.
    pub fn proofs(&self) -> usize {
        self.proofs.load(Ordering::SeqCst)
    }

    /// `(amount, cert_data_hash)` of every CSW input submitted, sorted.
    pub fn csw_seen(&self) -> Vec<(i64, FieldElement)> {
        let mut seen = self.csw_seen.lock().clone();
        seen.sort();
        seen
    }
}

struct MockBatch {
    verdicts: Vec<bool>,
    batches: Arc<AtomicUsize>,
    proofs: Arc<AtomicUsize>,
    csw_seen: Arc<Mutex<Vec<(i64, FieldElement)>>>,
}

impl MockBatch {
    fn add(&mut self, index: BatchIndex, proof: &ScProof) -> Result<(), EngineError> {
        if index as usize != self.verdicts.len() {
            return Err(EngineError::Rejected {
                index,
                reason: "out of order".into(),
            });
        }
        self.proofs.fetch_add(1, Ordering::SeqCst);
        self.verdicts.push(proof.as_bytes() != BAD_PROOF);
        Ok(())
    }
}

impl EngineBatch for MockBatch {
    fn add_certificate_proof(
        &mut self,
        index: BatchIndex,
        input: &CertProofInput,
    ) -> Result<(), EngineError> {
        self.add(index, &input.proof)
    }

    fn add_csw_proof(&mut self, index: BatchIndex, input: &CswProofInput) -> Result<(), EngineError> {
        self.add(index, &input.proof)?;
        self.csw_seen.lock().push((input.amount, input.cert_data_hash));
        Ok(())
    }

    fn len(&self) -> usize {
        self.verdicts.len()
    }

    fn verify(self: Box<Self>) -> Result<BatchOutcome, EngineError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let errors = self
            .verdicts
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(i, _)| EntryError {
                index: i as BatchIndex,
                reason: "mock: bad proof".into(),
            })
            .collect();
        Ok(BatchOutcome {
            flags: self.verdicts.iter().copied().collect::<BitVec>(),
            errors,
        })
    }
}

impl VerificationEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn begin_batch(&self) -> Box<dyn EngineBatch> {
        Box::new(MockBatch {
            verdicts: Vec::new(),
            batches: Arc::clone(&self.batches),
            proofs: Arc::clone(&self.proofs),
            csw_seen: Arc::clone(&self.csw_seen),
        })
    }
}
