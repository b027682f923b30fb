//! Queueing of certificate and CSW proofs and the all-or-nothing batch pass.
//!
//! A `ProofVerifier` lives for one validation pass (one block, or one
//! transaction admission). Inputs are queued as certificates and transactions
//! are examined; `batch_verify` then submits everything to the engine in a
//! single batch. Both queues are emptied by every `batch_verify` call, whatever
//! its outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::config::{VerificationMode, VerifierCfg};
use crate::engine::{
    BatchIndex, BatchOutcome, CertProofInput, CswProofInput, EngineError, VerificationEngine,
};
use crate::entry::SidechainEntry;
use crate::metrics;
use crate::tx::{ScCertificate, ScTransaction};
use crate::types::{CertHash, ScId, TxHash};
use crate::view::ChainView;

/// Identity of a queued proof, for failure attribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProofRef {
    Certificate(CertHash),
    Csw { tx: TxHash, input: u32 },
}

impl fmt::Display for ProofRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofRef::Certificate(h) => write!(f, "certificate {h}"),
            ProofRef::Csw { tx, input } => write!(f, "csw input {input} of tx {tx}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofFailure {
    pub proof: ProofRef,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchVerifyError {
    #[error("{} proof(s) rejected, first: {}", .0.len(), first_failure(.0))]
    ProofsRejected(Vec<ProofFailure>),
    #[error("verification engine: {0}")]
    Engine(#[from] EngineError),
    #[error("verification engine unavailable")]
    EngineUnavailable,
}

fn first_failure(failures: &[ProofFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{} ({})", f.proof, f.reason))
        .unwrap_or_default()
}

impl BatchVerifyError {
    /// Failing proofs, empty unless the engine actually rejected some.
    pub fn failures(&self) -> &[ProofFailure] {
        match self {
            BatchVerifyError::ProofsRejected(v) => v,
            _ => &[],
        }
    }
}

/// Process-scoped owner of the verification engine.
///
/// Created once at startup and torn down with [`VerifierContext::shutdown`].
/// After shutdown every verifier tied to this context fails its batch pass
/// with [`BatchVerifyError::EngineUnavailable`].
pub struct VerifierContext {
    engine: RwLock<Option<Arc<dyn VerificationEngine>>>,
    cfg: VerifierCfg,
}

impl fmt::Debug for VerifierContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.engine.read().as_ref().map(|e| e.name());
        f.debug_struct("VerifierContext")
            .field("engine", &engine)
            .field("cfg", &self.cfg)
            .finish()
    }
}

impl VerifierContext {
    pub fn new(engine: Arc<dyn VerificationEngine>, cfg: VerifierCfg) -> Arc<Self> {
        log::info!("proof verifier context up: engine={} mode={:?}", engine.name(), cfg.mode);
        Arc::new(Self {
            engine: RwLock::new(Some(engine)),
            cfg,
        })
    }

    pub fn cfg(&self) -> &VerifierCfg {
        &self.cfg
    }

    pub fn is_active(&self) -> bool {
        self.engine.read().is_some()
    }

    /// Release the engine. Idempotent.
    pub fn shutdown(&self) {
        if let Some(engine) = self.engine.write().take() {
            log::info!("proof verifier context shut down (engine={})", engine.name());
        }
    }

    fn engine(&self) -> Option<Arc<dyn VerificationEngine>> {
        self.engine.read().clone()
    }

    /// A fresh verifier in the context's configured mode.
    pub fn verifier(self: &Arc<Self>) -> ProofVerifier {
        ProofVerifier::new(Arc::clone(self), self.cfg.mode)
    }
}

/// Pending proof inputs of one validation pass.
#[derive(Debug)]
pub struct ProofVerifier {
    ctx: Arc<VerifierContext>,
    mode: VerificationMode,
    cert_queue: BTreeMap<CertHash, CertProofInput>,
    csw_queue: BTreeMap<TxHash, BTreeMap<u32, CswProofInput>>,
}

/// Batch position for the `n`th proof, `None` past the index range.
fn batch_index(n: usize) -> Option<BatchIndex> {
    BatchIndex::try_from(n).ok()
}

fn sidechain_for<'v, V: ChainView + ?Sized>(view: &'v V, id: &ScId, what: &str) -> &'v SidechainEntry {
    match view.get_sidechain(id) {
        Some(entry) => entry,
        None => panic!("{what} references unknown sidechain {id}; it must have passed contextual checks"),
    }
}

impl ProofVerifier {
    pub fn new(ctx: Arc<VerifierContext>, mode: VerificationMode) -> Self {
        Self {
            ctx,
            mode,
            cert_queue: BTreeMap::new(),
            csw_queue: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    pub fn pending_certificates(&self) -> usize {
        self.cert_queue.len()
    }

    pub fn pending_csw_inputs(&self) -> usize {
        self.csw_queue.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cert_queue.is_empty() && self.csw_queue.is_empty()
    }

    /// Queue the proof of `cert`, replacing any input already queued for the
    /// same certificate hash. No-op in loose mode.
    ///
    /// # Panics
    ///
    /// If the certificate's sidechain is not in `view`.
    pub fn load_data_for_cert_verification<V: ChainView + ?Sized>(
        &mut self,
        view: &V,
        cert: &ScCertificate,
    ) {
        if self.mode == VerificationMode::Loose {
            return;
        }
        let entry = sidechain_for(view, &cert.sc_id, "certificate");
        let input = CertProofInput::from_certificate(cert, &entry.fixed_params);
        let hash = cert.hash();
        if self.cert_queue.insert(hash, input).is_some() {
            log::debug!("certificate {hash} re-queued, previous input replaced");
        } else {
            log::debug!("certificate {hash} queued for sidechain {}", cert.sc_id);
        }
    }

    /// Queue every CSW input of `tx`, keyed by input position. Inputs already
    /// queued for other positions of the same transaction are kept. No-op in
    /// loose mode.
    ///
    /// The proof is checked against the data hash of the certificate view
    /// active in `view`, not the hash the input claims.
    ///
    /// # Panics
    ///
    /// If an input references a sidechain not in `view`, one without a CSW
    /// verification key or one whose active certificate view cannot be
    /// computed, or if `tx` has too many CSW inputs for a batch index.
    pub fn load_data_for_csw_verification<V: ChainView + ?Sized>(
        &mut self,
        view: &V,
        tx: &ScTransaction,
    ) {
        if self.mode == VerificationMode::Loose || tx.csw_inputs.is_empty() {
            return;
        }
        let tx_hash = tx.hash();
        let queued = self.csw_queue.entry(tx_hash).or_default();
        for (pos, csw) in tx.csw_inputs.iter().enumerate() {
            let entry = sidechain_for(view, &csw.sc_id, "csw input");
            let Some(active) = view.active_cert_view(&csw.sc_id) else {
                panic!("no active certificate view for sidechain {}", csw.sc_id);
            };
            let input = CswProofInput::from_input(csw, &entry.fixed_params, active.cert_data_hash);
            let Some(input) = input else {
                panic!("csw input references sidechain {} without a csw key", csw.sc_id);
            };
            let Some(pos) = batch_index(pos) else {
                panic!("tx {tx_hash} has more csw inputs than a batch can index");
            };
            queued.insert(pos, input);
        }
        log::debug!("{} csw input(s) of tx {tx_hash} queued", tx.csw_inputs.len());
    }

    /// Verify every queued proof in one engine batch. Succeeds only if all of
    /// them verify; in loose mode it always succeeds without touching the
    /// engine. The queues are empty afterwards in every case.
    pub fn batch_verify(&mut self) -> Result<(), BatchVerifyError> {
        let certs = std::mem::take(&mut self.cert_queue);
        let csws = std::mem::take(&mut self.csw_queue);
        if self.mode == VerificationMode::Loose {
            return Ok(());
        }
        let Some(engine) = self.ctx.engine() else {
            log::warn!("batch verify requested after verifier shutdown");
            return Err(BatchVerifyError::EngineUnavailable);
        };

        let total = certs.len() + csws.values().map(BTreeMap::len).sum::<usize>();
        if total > 0 && batch_index(total - 1).is_none() {
            let msg = format!("{total} proofs exceed the batch index range");
            return Err(EngineError::Internal(msg).into());
        }
        let mut refs: Vec<ProofRef> = Vec::with_capacity(total);
        let mut batch = engine.begin_batch();
        let rejected = |refs: &[ProofRef], e: EngineError| match e {
            EngineError::Rejected { index, reason } => match refs.get(index as usize) {
                Some(proof) => BatchVerifyError::ProofsRejected(vec![ProofFailure {
                    proof: *proof,
                    reason,
                }]),
                None => BatchVerifyError::Engine(EngineError::Rejected { index, reason }),
            },
            other => BatchVerifyError::Engine(other),
        };

        // every index below `total` fits a BatchIndex, so these casts are exact
        for (hash, input) in &certs {
            let index = refs.len() as BatchIndex;
            refs.push(ProofRef::Certificate(*hash));
            batch
                .add_certificate_proof(index, input)
                .map_err(|e| rejected(&refs, e))?;
        }
        for (tx, inputs) in &csws {
            for (pos, input) in inputs {
                let index = refs.len() as BatchIndex;
                refs.push(ProofRef::Csw {
                    tx: *tx,
                    input: *pos,
                });
                batch.add_csw_proof(index, input).map_err(|e| rejected(&refs, e))?;
            }
        }
        if refs.is_empty() {
            return Ok(());
        }

        metrics::proofs_submitted(refs.len());
        let outcome = metrics::measure_batch(|| batch.verify())?;
        if outcome.flags.len() != refs.len() {
            metrics::observe_batch(false);
            return Err(EngineError::Internal(format!(
                "engine returned {} verdicts for {} proofs",
                outcome.flags.len(),
                refs.len()
            ))
            .into());
        }
        metrics::observe_batch(outcome.all_valid());
        if outcome.all_valid() {
            log::info!(
                "batch verify ok: {} certificate(s), {} csw input(s) [{}]",
                certs.len(),
                refs.len() - certs.len(),
                engine.name()
            );
            return Ok(());
        }
        Err(BatchVerifyError::ProofsRejected(attribute(&refs, &outcome)))
    }
}

fn attribute(refs: &[ProofRef], outcome: &BatchOutcome) -> Vec<ProofFailure> {
    let mut failures: Vec<ProofFailure> = outcome
        .failing()
        .filter_map(|i| {
            let proof = *refs.get(i as usize)?;
            let reason = outcome
                .reason_for(i)
                .unwrap_or("proof did not verify")
                .to_string();
            Some(ProofFailure { proof, reason })
        })
        .collect();
    // Errors reported against entries the flags call valid still fail the pass.
    for e in &outcome.errors {
        let flagged = outcome.flags.get(e.index as usize).is_some_and(|b| !*b);
        if let (false, Some(proof)) = (flagged, refs.get(e.index as usize)) {
            failures.push(ProofFailure {
                proof: *proof,
                reason: e.reason.clone(),
            });
        }
    }
    for f in &failures {
        log::warn!("batch verify: {} failed: {}", f.proof, f.reason);
    }
    failures
}
