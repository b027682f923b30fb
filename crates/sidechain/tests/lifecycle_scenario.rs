mod support;

use eezo_sidechain::{
    check_certificate, check_transaction, ChainView, EventKind, ScError, ScState,
};
use support::*;

#[test]
fn sidechain_without_certificate_ceases_at_131() {
    init_logs();
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    let chain = scenario_chain();
    assert_eq!(h.entry(&id).state(), ScState::Alive);
    assert_eq!(h.entry(&id).scheduled_ceasing_height(&chain).unwrap(), 131);
    assert!(h.db.events_at(131).unwrap().contains(EventKind::Ceasing, &id));
    assert!(h.db.events_at(110).unwrap().contains(EventKind::Maturing, &id));

    h.connect_empty_to(109);
    assert_eq!(h.entry(&id).balance, 0);
    h.connect_empty_to(110);
    assert_eq!(h.entry(&id).balance, 1_000);
    assert!(h.entry(&id).immature_amounts.is_empty());

    h.connect_empty_to(130);
    assert_eq!(h.entry(&id).state(), ScState::Alive);
    h.connect_empty_to(131);
    assert_eq!(h.entry(&id).state(), ScState::Ceased);
    assert_eq!(h.undos.last().unwrap().ceased().collect::<Vec<_>>(), vec![&id]);
    assert!(h.db.events().is_empty());
}

#[test]
fn certificate_in_window_postpones_ceasing() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    let chain = scenario_chain();
    h.connect_empty_to(114);
    h.connect(block(vec![], vec![cert(id, 0, 5, 10)])).unwrap();

    let e = h.entry(&id);
    assert_eq!(e.balance, 990);
    assert_eq!(e.last_top_quality_cert_referenced_epoch, 0);
    assert_eq!(e.scheduled_ceasing_height(&chain).unwrap(), 141);
    assert!(h.db.events_at(131).is_none());
    assert!(h.db.events_at(141).unwrap().contains(EventKind::Ceasing, &id));

    h.connect_empty_to(140);
    assert_eq!(h.entry(&id).state(), ScState::Alive);
    h.connect_empty_to(141);
    assert_eq!(h.entry(&id).state(), ScState::Ceased);
}

#[test]
fn higher_quality_replaces_and_restores_balance() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(114);
    let first = cert(id, 0, 5, 10);
    h.connect(block(vec![], vec![first])).unwrap();
    let mut better = cert(id, 0, 7, 30);
    better.ft_fee = 8;
    h.connect(block(vec![], vec![better.clone()])).unwrap();

    let e = h.entry(&id);
    assert_eq!(e.balance, 970);
    assert_eq!(e.last_top_quality_cert_quality, 7);
    assert_eq!(e.last_top_quality_cert_hash, better.hash());
    assert_eq!(e.last_top_quality_cert_bwt_amount, 30);
    assert!(e.past_epoch_top_quality_cert_view.is_null());

    // the replaced winner's fee entry is kept alongside the new one
    assert_eq!(e.fee_window.len(), 2);
    assert_eq!(e.min_ft_fee(), 2);
    assert!(check_transaction(&h.db, &forward_tx(id, 3, 1)).is_ok());

    h.disconnect().unwrap();
    assert_eq!(h.entry(&id).fee_window.len(), 1);
}

#[test]
fn equal_or_lower_quality_is_rejected() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(114);
    h.connect(block(vec![], vec![cert(id, 0, 7, 30)])).unwrap();
    let before = fingerprint(&h.db);

    for quality in [7, 6] {
        let err = check_certificate(&h.db, &cert(id, 0, quality, 1)).unwrap_err();
        assert!(matches!(err, ScError::QualityTooLow { incumbent: 7, .. }));
        assert_eq!(err.code(), "sc-cert-quality-too-low");
        assert!(h.connect(block(vec![], vec![cert(id, 0, quality, 1)])).is_err());
    }
    assert_eq!(fingerprint(&h.db), before);
}

#[test]
fn next_epoch_certificate_demotes_previous_winner() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    let chain = scenario_chain();
    h.connect_empty_to(114);
    let c0 = cert(id, 0, 7, 30);
    h.connect(block(vec![], vec![c0.clone()])).unwrap();
    h.connect_empty_to(120);

    // epoch 1 window is [121, 140]; a lower quality is fine in a new epoch
    let c1 = cert(id, 1, 1, 0);
    h.connect(block(vec![], vec![c1.clone()])).unwrap();
    let e = h.entry(&id);
    assert_eq!(e.past_epoch_top_quality_cert_view, c0.view());
    assert_eq!(e.last_top_quality_cert_view, c1.view());
    assert_eq!(e.balance, 970);
    assert_eq!(e.fee_window.len(), 2);
    assert_eq!(e.scheduled_ceasing_height(&chain).unwrap(), 151);

    // until epoch 1's window closes the previous winner stays active
    assert_eq!(e.active_cert_view(140, &chain).unwrap(), c0.view());
    assert_eq!(e.active_cert_view(141, &chain).unwrap(), c1.view());
}

#[test]
fn certificate_height_and_epoch_rules() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(105);
    let err = check_certificate(&h.db, &cert(id, 0, 1, 0)).unwrap_err();
    assert!(matches!(
        err,
        ScError::OutsideSubmissionWindow {
            height: 106,
            start: 111,
            end: 130,
            ..
        }
    ));

    h.connect_empty_to(114);
    let err = check_certificate(&h.db, &cert(id, 1, 1, 0)).unwrap_err();
    assert!(matches!(err, ScError::EpochOutOfOrder { epoch: 1, last_epoch: -1, .. }));

    let err = check_certificate(&h.db, &cert(id, 0, 1, 1_001)).unwrap_err();
    assert!(matches!(
        err,
        ScError::InsufficientBalance {
            needed: 1_001,
            available: 1_000,
            ..
        }
    ));

    h.connect_empty_to(130);
    let err = check_certificate(&h.db, &cert(id, 0, 1, 0)).unwrap_err();
    assert!(matches!(err, ScError::OutsideSubmissionWindow { height: 131, .. }));
}

#[test]
fn forward_transfers_mature_and_respect_fee_window() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(114);
    assert!(check_transaction(&h.db, &forward_tx(id, 1, 1)).is_ok());
    h.connect(block(vec![forward_tx(id, 50, 1)], vec![cert(id, 0, 5, 0)]))
        .unwrap();
    assert_eq!(h.entry(&id).immature_amounts.get(&125), Some(&50));

    // certificate fee of 2 now bounds forward transfers
    let err = check_transaction(&h.db, &forward_tx(id, 1, 2)).unwrap_err();
    assert_eq!(err.code(), "sc-ft-fee-too-low");

    h.connect_empty_to(124);
    assert_eq!(h.entry(&id).balance, 1_000);
    h.connect_empty_to(125);
    assert_eq!(h.entry(&id).balance, 1_050);
}

#[test]
fn transfers_to_ceased_or_unknown_sidechains_fail() {
    let (mut h, id) = Harness::with_sidechain(100, 1_000, 10);
    h.connect_empty_to(131);
    let err = check_transaction(&h.db, &forward_tx(id, 10, 1)).unwrap_err();
    assert!(matches!(err, ScError::NotAlive { state: ScState::Ceased, .. }));
    let err = check_certificate(&h.db, &cert(id, 0, 1, 0)).unwrap_err();
    assert_eq!(err.code(), "sc-not-alive");

    let other = eezo_sidechain::ScId([0xee; 32]);
    let err = check_transaction(&h.db, &forward_tx(other, 10, 1)).unwrap_err();
    assert_eq!(err.sc_id(), Some(other));
    assert_eq!(err.code(), "sc-not-found");
}

#[test]
fn duplicate_creation_is_rejected() {
    let (h, _) = Harness::with_sidechain(100, 1_000, 10);
    let err = check_transaction(&h.db, &creation_tx(1_000, 10, 0)).unwrap_err();
    assert!(matches!(err, ScError::SidechainExists { .. }));

    let bad = creation_tx(1_000, 1, 9);
    let err = check_transaction(&h.db, &bad).unwrap_err();
    assert_eq!(err.code(), "sc-creation-invalid");
}
