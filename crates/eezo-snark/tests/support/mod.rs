#![allow(dead_code)]

use std::sync::Arc;

use eezo_sidechain::{
    BackwardTransfer, BlockScEffects, ChainParams, CswInput, FieldElement, Height,
    ProvingSystem, ScCertificate, ScCreationOutput, ScFixedParams, ScId, ScStateDb,
    ScTransaction, VerificationKey, VerificationMode, VerifierCfg, VerifierContext,
};
use eezo_snark::{attach_certificate_proof, attach_csw_proof, MiniBatchEngine};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn chain() -> ChainParams {
    ChainParams {
        cert_submission_window_length: 20,
        sc_coin_maturity: 10,
        sc_num_blocks_for_fee_check: 30,
        min_withdrawal_epoch_length: 2,
        max_withdrawal_epoch_length: 4032,
    }
}

pub fn fixed_params() -> ScFixedParams {
    ScFixedParams {
        withdrawal_epoch_length: 10,
        cert_proving_system: ProvingSystem::Darlin,
        cert_vk: VerificationKey::new(vec![0x11; 48]),
        csw_proving_system: ProvingSystem::CoboundaryMarlin,
        csw_vk: Some(VerificationKey::new(vec![0x22; 48])),
        ..Default::default()
    }
}

pub fn ctx(max_batch: usize, parallel: bool) -> Arc<VerifierContext> {
    let cfg = VerifierCfg {
        mode: VerificationMode::Strict,
        parallel,
        max_batch,
    };
    VerifierContext::new(Arc::new(MiniBatchEngine::from_cfg(&cfg)), cfg)
}

/// Certificate for `id` carrying a valid proof.
pub fn proven_cert(id: ScId, epoch: i32, quality: i64, bwt: i64) -> ScCertificate {
    let mut c = ScCertificate {
        sc_id: id,
        epoch_number: epoch,
        quality,
        backward_transfers: vec![BackwardTransfer {
            pub_key_hash: [3; 20],
            amount: bwt,
        }],
        ..Default::default()
    };
    attach_certificate_proof(&mut c, &fixed_params());
    c
}

pub fn proven_csw(id: ScId, amount: i64, nullifier: u8, cert_data: FieldElement) -> CswInput {
    let mut csw = CswInput {
        sc_id: id,
        amount,
        nullifier: FieldElement([nullifier; 32]),
        pub_key_hash: [6; 20],
        act_cert_data_hash: cert_data,
        ..Default::default()
    };
    assert!(attach_csw_proof(&mut csw, &fixed_params()));
    csw
}

/// Committed state with one sidechain created at `height`.
pub fn db_with_sidechain(height: Height) -> (ScStateDb, ScId) {
    let mut db = ScStateDb::new(chain(), height - 1);
    let tx = ScTransaction {
        creations: vec![ScCreationOutput {
            amount: 1_000,
            address: [4; 32],
            params: fixed_params(),
        }],
        ..Default::default()
    };
    let id = tx.sc_id_for_creation(0);
    connect(&mut db, &BlockScEffects {
        transactions: vec![tx],
        certificates: vec![],
    });
    (db, id)
}

pub fn connect(db: &mut ScStateDb, b: &BlockScEffects) {
    let changes = {
        let mut view = db.view();
        view.connect_block(b).unwrap();
        view.flush()
    };
    db.apply(changes);
}

pub fn connect_empty_to(db: &mut ScStateDb, height: Height) {
    while db.tip() < height {
        connect(db, &BlockScEffects::default());
    }
}
