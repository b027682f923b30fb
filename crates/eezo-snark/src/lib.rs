//! Reference proof backend for sidechain certificates and ceased withdrawals.
//!
//! Public inputs are packed into canonical u64 words and bound to the
//! verification key by a blake3 transcript. A proof is the transcript digest,
//! so proving is cheap and any change to the inputs or key invalidates it.
//! [`MiniBatchEngine`] plugs the backend into the sidechain verifier.

pub mod public;
pub mod transcript;
pub mod prove;
pub mod verify;

pub use public::{pack_certificate, pack_csw, PublicPack, PACK_VERSION};
pub use transcript::{public_digest, DIGEST_LEN};
pub use prove::{attach_certificate_proof, attach_csw_proof, prove_certificate, prove_csw};
pub use verify::MiniBatchEngine;
