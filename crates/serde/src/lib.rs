//! Canonical binary codec used for persisted sidechain state.
//!
//! Little-endian scalars, `u32` length prefixes, one-byte option tags and
//! ordered maps. Decoding is bounded so a malformed or hostile input can never
//! make us allocate more than the configured limits.

pub mod decode;
pub mod encode;
pub mod hash;

pub use decode::{decode_exact, Decode, Reader, MAX_BYTES, MAX_LIST};
pub use encode::Encode;
pub use hash::{digest_of, tagged_digest, Digest32};

/// Errors raised by the bounded decoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerdeError {
    /// Reached the end of input while reading.
    #[error("unexpected EOF")]
    Eof,
    /// Declared length exceeds our configured maximum.
    #[error("declared length {have} exceeds maximum {max}")]
    TooLong { have: usize, max: usize },
    /// Offset/length math overflow.
    #[error("overflow or invalid offset")]
    Overflow,
    #[error("malformed input: {0}")]
    Malformed(&'static str),
    /// Map keys or set members out of strictly ascending order.
    #[error("non-canonical ordering")]
    NonCanonical,
    #[error("{left} trailing bytes after value")]
    TrailingBytes { left: usize },
    #[error("unknown version {found} (expected {expected})")]
    UnknownVersion { found: u32, expected: u32 },
}

pub type Result<T> = core::result::Result<T, SerdeError>;
