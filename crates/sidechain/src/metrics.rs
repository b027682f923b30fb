// crates/sidechain/src/metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};

//
// Batch proof verification
//

pub static VERIFY_BATCH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_verify_batch_total",
        "Total batch proof verify invocations"
    )
    .unwrap()
});

pub static VERIFY_BATCH_OK: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_verify_batch_ok",
        "Batches with all proofs valid"
    )
    .unwrap()
});

pub static VERIFY_BATCH_FAIL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_verify_batch_fail",
        "Batches with one or more invalid proofs"
    )
    .unwrap()
});

pub static VERIFY_BATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "eezo_sidechain_verify_batch_duration_seconds",
        "Time to verify a batch of certificate and CSW proofs"
    )
    .unwrap()
});

pub static PROOFS_SUBMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_proofs_submitted_total",
        "Proofs handed to the verification engine"
    )
    .unwrap()
});

//
// Lifecycle
//

pub static CERTS_ACCEPTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_certs_accepted_total",
        "Certificates accepted into the registry"
    )
    .unwrap()
});

pub static SCS_CEASED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "eezo_sidechain_ceased_total",
        "Sidechains that reached their ceasing height"
    )
    .unwrap()
});

/// Time `f` as one batch verify invocation.
pub fn measure_batch<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    VERIFY_BATCH_TOTAL.inc();
    let _t = VERIFY_BATCH_DURATION.start_timer();
    f()
}

#[inline]
pub fn observe_batch(all_valid: bool) {
    if all_valid {
        VERIFY_BATCH_OK.inc();
    } else {
        VERIFY_BATCH_FAIL.inc();
    }
}

#[inline]
pub fn proofs_submitted(n: usize) {
    PROOFS_SUBMITTED_TOTAL.inc_by(n as u64);
}

#[inline]
pub fn cert_accepted() {
    CERTS_ACCEPTED_TOTAL.inc();
}

#[inline]
pub fn sc_ceased() {
    SCS_CEASED_TOTAL.inc();
}

/// Force registration so the series show up before the first event.
pub fn register_sidechain_metrics() {
    Lazy::force(&VERIFY_BATCH_TOTAL);
    Lazy::force(&VERIFY_BATCH_OK);
    Lazy::force(&VERIFY_BATCH_FAIL);
    Lazy::force(&VERIFY_BATCH_DURATION);
    Lazy::force(&PROOFS_SUBMITTED_TOTAL);
    Lazy::force(&CERTS_ACCEPTED_TOTAL);
    Lazy::force(&SCS_CEASED_TOTAL);
}
