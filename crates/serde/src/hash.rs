use crate::Encode;

pub type Digest32 = [u8; 32];

/// blake3 over the canonical encoding.
#[inline]
pub fn digest_of<T: Encode + ?Sized>(v: &T) -> Digest32 {
    let mut bytes = Vec::new();
    v.encode_to(&mut bytes);
    *blake3::hash(&bytes).as_bytes()
}

/// Domain-separated digest: the same value hashed under two different
/// contexts never collides.
pub fn tagged_digest<T: Encode + ?Sized>(context: &str, v: &T) -> Digest32 {
    let mut bytes = Vec::new();
    v.encode_to(&mut bytes);
    let mut h = blake3::Hasher::new_derive_key(context);
    h.update(&bytes);
    *h.finalize().as_bytes()
}
