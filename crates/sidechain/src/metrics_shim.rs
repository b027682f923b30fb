// No-op stand-ins used when the `metrics` feature is off.

pub fn measure_batch<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}

#[inline]
pub fn observe_batch(_all_valid: bool) {}

#[inline]
pub fn proofs_submitted(_n: usize) {}

#[inline]
pub fn cert_accepted() {}

#[inline]
pub fn sc_ceased() {}

pub fn register_sidechain_metrics() {}
