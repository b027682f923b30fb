mod support;

use std::sync::Arc;

use eezo_sidechain::{
    BatchVerifyError, FieldElement, ProofRef, ScCertificate, ScId, VerificationMode, VerifierCfg,
    VerifierContext,
};
use support::*;

fn ctx(engine: &Arc<MockEngine>, mode: VerificationMode) -> Arc<VerifierContext> {
    let cfg = VerifierCfg {
        mode,
        ..VerifierCfg::default()
    };
    VerifierContext::new(engine.clone(), cfg)
}

#[test]
fn requeueing_a_certificate_keeps_one_entry() {
    init_logs();
    let (h, id) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();

    let c = cert(id, 0, 1, 0);
    v.load_data_for_cert_verification(&h.db, &c);
    v.load_data_for_cert_verification(&h.db, &c);
    assert_eq!(v.pending_certificates(), 1);

    v.batch_verify().unwrap();
    assert_eq!(engine.proofs(), 1);
    assert_eq!(engine.batches(), 1);
    assert!(v.is_empty());
}

#[test]
fn one_bad_proof_fails_the_whole_batch() {
    let (h, id) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();
    let before = fingerprint(&h.db);

    let certs = [
        cert(id, 0, 1, 0),
        with_bad_proof(cert(id, 0, 2, 0)),
        cert(id, 0, 3, 0),
    ];
    for c in &certs {
        v.load_data_for_cert_verification(&h.db, c);
    }
    let err = v.batch_verify().unwrap_err();

    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].proof, ProofRef::Certificate(certs[1].hash()));
    assert!(failures[0].reason.contains("bad proof"));
    assert_eq!(engine.batches(), 1);
    assert_eq!(engine.proofs(), 3);

    assert!(v.is_empty());
    assert_eq!(fingerprint(&h.db), before);
}

#[test]
fn loose_mode_never_reaches_the_engine() {
    let (h, id) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Loose).verifier();

    v.load_data_for_cert_verification(&h.db, &with_bad_proof(cert(id, 0, 1, 0)));
    // unknown sidechains are not even looked up
    v.load_data_for_cert_verification(&h.db, &cert(ScId([0xaa; 32]), 0, 1, 0));
    let tx = csw_tx(vec![csw(ScId([0xbb; 32]), 1, 1, Default::default())], 1);
    v.load_data_for_csw_verification(&h.db, &tx);

    assert!(v.batch_verify().is_ok());
    assert_eq!(engine.batches(), 0);
    assert_eq!(engine.proofs(), 0);
}

#[test]
fn queues_are_cleared_whatever_the_outcome() {
    let (h, id) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();

    v.load_data_for_cert_verification(&h.db, &with_bad_proof(cert(id, 0, 1, 0)));
    assert!(v.batch_verify().is_err());
    assert!(v.is_empty());

    // nothing left over from the failed pass
    v.load_data_for_cert_verification(&h.db, &cert(id, 0, 2, 0));
    assert!(v.batch_verify().is_ok());
    assert_eq!(engine.proofs(), 2);

    // an empty pass needs no engine call
    assert!(v.batch_verify().is_ok());
    assert_eq!(engine.batches(), 2);
}

#[test]
fn csw_inputs_are_keyed_by_transaction_and_position() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(131);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();

    let hash = Default::default();
    let tx = csw_tx(vec![csw(id, 10, 1, hash), csw(id, 20, 2, hash)], 1);
    v.load_data_for_csw_verification(&h.db, &tx);
    v.load_data_for_csw_verification(&h.db, &tx);
    assert_eq!(v.pending_csw_inputs(), 2);

    let mut bad = csw_tx(vec![csw(id, 30, 3, hash)], 2);
    bad.csw_inputs[0].proof = eezo_sidechain::ScProof::new(BAD_PROOF.to_vec());
    v.load_data_for_csw_verification(&h.db, &bad);
    v.load_data_for_cert_verification(&h.db, &cert(id, 0, 1, 0));
    assert_eq!(v.pending_csw_inputs(), 3);

    let err = v.batch_verify().unwrap_err();
    assert_eq!(
        err.failures()[0].proof,
        ProofRef::Csw {
            tx: bad.hash(),
            input: 0
        }
    );
    assert_eq!(engine.proofs(), 4);
}

/// Sidechain created at 100 with an epoch 0 certificate at 115, ceased at 141.
fn ceased_with_certificate() -> (Harness, ScId, ScCertificate) {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(114);
    let c0 = cert(id, 0, 5, 10);
    h.connect(block(vec![], vec![c0.clone()])).unwrap();
    h.connect_empty_to(141);
    (h, id, c0)
}

#[test]
fn csw_proof_is_checked_against_active_certificate_data() {
    let (h, id, c0) = ceased_with_certificate();
    let active = c0.cert_data_hash();
    let claimed = FieldElement([0x11; 32]);
    assert_ne!(claimed, active);

    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();
    v.load_data_for_csw_verification(&h.db, &csw_tx(vec![csw(id, 10, 1, claimed)], 1));
    v.batch_verify().unwrap();
    assert_eq!(engine.csw_seen(), vec![(10, active)]);
}

#[test]
fn re_enqueueing_a_transaction_refreshes_only_its_inputs() {
    let (h, id, c0) = ceased_with_certificate();
    let active = c0.cert_data_hash();
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();

    let tx = csw_tx(vec![csw(id, 10, 1, active), csw(id, 20, 2, active)], 1);
    let other = csw_tx(vec![csw(id, 30, 3, active)], 2);
    v.load_data_for_csw_verification(&h.db, &tx);
    v.load_data_for_csw_verification(&h.db, &other);

    // same transaction again, on top of a view whose active data moved
    let newer = FieldElement([0x33; 32]);
    let mut view = h.db.view();
    view.entry_mut(&id).unwrap().last_top_quality_cert_view.cert_data_hash = newer;
    v.load_data_for_csw_verification(&view, &tx);
    assert_eq!(v.pending_csw_inputs(), 3);

    v.batch_verify().unwrap();
    assert_eq!(engine.csw_seen(), vec![(10, newer), (20, newer), (30, active)]);
    assert_eq!(engine.proofs(), 3);
}

#[test]
fn shut_down_context_refuses_to_verify() {
    let (h, id) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let context = ctx(&engine, VerificationMode::Strict);
    let mut v = context.verifier();
    v.load_data_for_cert_verification(&h.db, &cert(id, 0, 1, 0));

    assert!(context.is_active());
    context.shutdown();
    context.shutdown();
    assert!(!context.is_active());

    assert_eq!(v.batch_verify().unwrap_err(), BatchVerifyError::EngineUnavailable);
    assert!(v.is_empty());
    assert_eq!(engine.batches(), 0);
}

#[test]
#[should_panic(expected = "unknown sidechain")]
fn enqueueing_for_unknown_sidechain_panics() {
    let (h, _) = Harness::with_sidechain(100, 1_000, 10);
    let engine = MockEngine::new();
    let mut v = ctx(&engine, VerificationMode::Strict).verifier();
    v.load_data_for_cert_verification(&h.db, &cert(ScId([0xaa; 32]), 0, 1, 0));
}
