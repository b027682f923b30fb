use eezo_sidechain::{
    CertProofInput, CswInput, CswProofInput, ScCertificate, ScFixedParams, ScProof,
};

use crate::public::{pack_certificate, pack_csw};
use crate::transcript::public_digest;

/// Proof for a certificate's public inputs under `input.vk`. The proof
/// already in `input` is ignored.
pub fn prove_certificate(input: &CertProofInput) -> ScProof {
    let pack = pack_certificate(input);
    ScProof::new(public_digest(input.vk.as_bytes(), &pack.words).to_vec())
}

/// Proof for a ceased withdrawal's public inputs under `input.vk`.
pub fn prove_csw(input: &CswProofInput) -> ScProof {
    let pack = pack_csw(input);
    ScProof::new(public_digest(input.vk.as_bytes(), &pack.words).to_vec())
}

/// Set `cert.proof` to a valid proof for the sidechain created with `params`.
pub fn attach_certificate_proof(cert: &mut ScCertificate, params: &ScFixedParams) {
    cert.proof = prove_certificate(&CertProofInput::from_certificate(cert, params));
}

/// Set `csw.proof` to a valid proof committing to `csw.act_cert_data_hash`.
/// Returns false if the sidechain has no CSW key.
pub fn attach_csw_proof(csw: &mut CswInput, params: &ScFixedParams) -> bool {
    match CswProofInput::from_input(csw, params, csw.act_cert_data_hash) {
        Some(input) => {
            csw.proof = prove_csw(&input);
            true
        }
        None => false,
    }
}
