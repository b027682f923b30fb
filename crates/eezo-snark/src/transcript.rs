// Digest over a verification key and packed public words.
//
// The reference backend's "proof" is this digest: a proof verifies iff it
// equals the digest recomputed from the key in effect and the public inputs.

use blake3::Hasher;

const TRANSCRIPT_CTX: &str = "eezo-snark 2024 mini transcript v1";

pub const DIGEST_LEN: usize = 32;

#[inline]
fn absorb_words_le(hasher: &mut Hasher, words: &[u64]) {
    for w in words {
        hasher.update(&w.to_le_bytes());
    }
}

/// Commitment binding `vk` to the packed public `words`.
pub fn public_digest(vk: &[u8], words: &[u64]) -> [u8; DIGEST_LEN] {
    let mut h = Hasher::new_derive_key(TRANSCRIPT_CTX);
    h.update(&(vk.len() as u64).to_le_bytes());
    h.update(vk);
    h.update(&(words.len() as u64).to_le_bytes());
    absorb_words_le(&mut h, words);
    *h.finalize().as_bytes()
}
