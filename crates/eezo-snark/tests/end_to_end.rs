mod support;

use eezo_sidechain::{
    check_transaction, BatchVerifyError, BlockScEffects, ChainView, ProofRef, ScProof, ScState,
    ScTransaction,
};
use support::*;

#[test]
fn block_with_one_bad_certificate_is_refused() {
    init_logs();
    let (mut db, id) = db_with_sidechain(100);
    connect_empty_to(&mut db, 114);
    let before = db.get_sidechain(&id).cloned();

    let c1 = proven_cert(id, 0, 1, 10);
    let mut c2 = proven_cert(id, 0, 2, 10);
    c2.proof = ScProof::new(vec![0; 32]);
    let c3 = proven_cert(id, 0, 3, 10);

    let mut v = ctx(4096, true).verifier();
    for c in [&c1, &c2, &c3] {
        v.load_data_for_cert_verification(&db, c);
    }
    let err = v.batch_verify().unwrap_err();
    match &err {
        BatchVerifyError::ProofsRejected(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].proof, ProofRef::Certificate(c2.hash()));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(db.tip(), 114);
    assert_eq!(db.get_sidechain(&id).cloned(), before);
}

#[test]
fn valid_certificates_verify_and_connect() {
    let (mut db, id) = db_with_sidechain(100);
    connect_empty_to(&mut db, 114);
    let certs = vec![proven_cert(id, 0, 1, 10), proven_cert(id, 0, 2, 20)];

    let mut v = ctx(1, false).verifier();
    for c in &certs {
        v.load_data_for_cert_verification(&db, c);
    }
    v.batch_verify().unwrap();

    connect(&mut db, &BlockScEffects {
        transactions: vec![],
        certificates: certs,
    });
    let entry = db.get_sidechain(&id).unwrap();
    assert_eq!(entry.last_top_quality_cert_quality, 2);
    assert_eq!(entry.balance, 1_000 - 20);
}

#[test]
fn ceased_withdrawal_is_proven_and_verified() {
    let (mut db, id) = db_with_sidechain(100);
    connect_empty_to(&mut db, 114);
    let c0 = proven_cert(id, 0, 5, 10);
    connect(&mut db, &BlockScEffects {
        transactions: vec![],
        certificates: vec![c0.clone()],
    });
    connect_empty_to(&mut db, 141);
    assert_eq!(db.get_sidechain(&id).unwrap().state(), ScState::Ceased);

    let tx = ScTransaction {
        csw_inputs: vec![
            proven_csw(id, 100, 1, c0.cert_data_hash()),
            proven_csw(id, 50, 2, c0.cert_data_hash()),
        ],
        nonce: 1,
        ..Default::default()
    };
    check_transaction(&db, &tx).unwrap();

    let ctx = ctx(4096, true);
    let mut v = ctx.verifier();
    v.load_data_for_csw_verification(&db, &tx);
    assert_eq!(v.pending_csw_inputs(), 2);
    v.batch_verify().unwrap();

    let mut forged = tx.clone();
    forged.csw_inputs[1].amount = 500;
    v.load_data_for_csw_verification(&db, &forged);
    let err = v.batch_verify().unwrap_err();
    assert_eq!(
        err.failures()[0].proof,
        ProofRef::Csw {
            tx: forged.hash(),
            input: 1
        }
    );

    connect(&mut db, &BlockScEffects {
        transactions: vec![tx],
        certificates: vec![],
    });
    assert_eq!(db.get_sidechain(&id).unwrap().balance, 1_000 - 10 - 150);
}
