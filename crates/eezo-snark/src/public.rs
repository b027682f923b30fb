// Pack proof public inputs into flat u64 words.
//
// Invariants:
// - Little-endian packing of integers.
// - [u8;32] values are packed into four u64 limbs (LE).
// - Byte strings are length-prefixed and zero-padded to whole limbs.
// - Order is canonical and stable (must not change without a version bump).

use eezo_sidechain::{CertProofInput, CswProofInput, FieldElement, ProvingSystem};

pub const PACK_VERSION: u64 = 1;

const KIND_CERTIFICATE: u64 = 1;
const KIND_CSW: u64 = 2;

/// Packed public input buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublicPack {
    pub words: Vec<u64>,
}

#[inline]
fn pack_u64_le(words: &mut Vec<u64>, x: u64) {
    words.push(x);
}

#[inline]
fn pack_i64_le(words: &mut Vec<u64>, x: i64) {
    words.push(x as u64);
}

#[inline]
fn pack_bytes32_le(words: &mut Vec<u64>, b32: &[u8; 32]) {
    for limb in b32.chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(limb);
        words.push(u64::from_le_bytes(buf));
    }
}

fn pack_bytes_le(words: &mut Vec<u64>, bytes: &[u8]) {
    pack_u64_le(words, bytes.len() as u64);
    for limb in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..limb.len()].copy_from_slice(limb);
        words.push(u64::from_le_bytes(buf));
    }
}

fn pack_constant(words: &mut Vec<u64>, constant: &Option<FieldElement>) {
    match constant {
        Some(c) => {
            pack_u64_le(words, 1);
            pack_bytes32_le(words, &c.0);
        }
        None => pack_u64_le(words, 0),
    }
}

fn proving_system_word(ps: ProvingSystem) -> u64 {
    match ps {
        ProvingSystem::Undefined => 0,
        ProvingSystem::Darlin => 1,
        ProvingSystem::CoboundaryMarlin => 2,
    }
}

/// Canonical packing of certificate public inputs.
pub fn pack_certificate(input: &CertProofInput) -> PublicPack {
    let mut out = PublicPack {
        words: Vec::with_capacity(32 + 4 * input.custom_fields.len()),
    };
    let w = &mut out.words;
    pack_u64_le(w, PACK_VERSION);
    pack_u64_le(w, KIND_CERTIFICATE);
    pack_u64_le(w, proving_system_word(input.proving_system));
    pack_constant(w, &input.constant);
    pack_i64_le(w, i64::from(input.epoch_number));
    pack_i64_le(w, input.quality);

    pack_u64_le(w, input.backward_transfers.len() as u64);
    for bt in &input.backward_transfers {
        pack_bytes_le(w, &bt.pub_key_hash);
        pack_i64_le(w, bt.amount);
    }

    pack_u64_le(w, input.custom_fields.len() as u64);
    for fe in &input.custom_fields {
        pack_bytes32_le(w, &fe.0);
    }

    pack_bytes32_le(w, &input.end_cum_comm_tree_root.0);
    pack_i64_le(w, input.mbtr_fee);
    pack_i64_le(w, input.ft_fee);
    out
}

/// Canonical packing of ceased withdrawal public inputs.
pub fn pack_csw(input: &CswProofInput) -> PublicPack {
    let mut out = PublicPack {
        words: Vec::with_capacity(32),
    };
    let w = &mut out.words;
    pack_u64_le(w, PACK_VERSION);
    pack_u64_le(w, KIND_CSW);
    pack_u64_le(w, proving_system_word(input.proving_system));
    pack_constant(w, &input.constant);
    pack_bytes32_le(w, input.sc_id.as_bytes());
    pack_i64_le(w, input.amount);
    pack_bytes32_le(w, &input.nullifier.0);
    pack_bytes_le(w, &input.pub_key_hash);
    pack_bytes32_le(w, &input.cert_data_hash.0);
    out
}
