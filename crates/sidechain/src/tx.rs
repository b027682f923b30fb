//! Sidechain-related parts of transactions and certificates.
//!
//! Only the fields the sidechain core reads are modelled; the main-chain
//! transaction format carries them opaquely.

use eezo_serde::{tagged_digest, Decode, Encode, Reader, SerdeError};
use serde::{Deserialize, Serialize};

use crate::error::ScError;
use crate::params::ScFixedParams;
use crate::types::{
    money_range, Amount, BackwardTransfer, CertHash, CertView, Epoch, FieldElement, Quality,
    ScId, ScProof, TxHash, MAX_MONEY,
};

const TX_HASH_CTX: &str = "eezo-sidechain 2024 transaction hash";
const CERT_HASH_CTX: &str = "eezo-sidechain 2024 certificate hash";
const CERT_DATA_CTX: &str = "eezo-sidechain 2024 certificate data hash";
const SC_ID_CTX: &str = "eezo-sidechain 2024 sidechain id";
const BIT_VECTOR_CTX: &str = "eezo-sidechain 2024 bit vector field";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScCreationOutput {
    pub amount: Amount,
    /// Receiver on the sidechain side.
    pub address: [u8; 32],
    pub params: ScFixedParams,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardTransferOut {
    pub sc_id: ScId,
    pub amount: Amount,
    pub address: [u8; 32],
}

/// Mainchain backward transfer request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McBwtRequestOut {
    pub sc_id: ScId,
    pub request_data: Vec<FieldElement>,
    pub mc_destination: [u8; 20],
    pub sc_fee: Amount,
}

/// Ceased sidechain withdrawal input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CswInput {
    pub sc_id: ScId,
    pub amount: Amount,
    pub nullifier: FieldElement,
    pub pub_key_hash: [u8; 20],
    /// Certificate data hash the prover committed to.
    pub act_cert_data_hash: FieldElement,
    pub proof: ScProof,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScTransaction {
    pub creations: Vec<ScCreationOutput>,
    pub forward_transfers: Vec<ForwardTransferOut>,
    pub bwt_requests: Vec<McBwtRequestOut>,
    pub csw_inputs: Vec<CswInput>,
    /// Distinguishes otherwise identical transactions.
    pub nonce: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScCertificate {
    pub sc_id: ScId,
    pub epoch_number: Epoch,
    pub quality: Quality,
    pub end_epoch_cum_comm_tree_root: FieldElement,
    pub backward_transfers: Vec<BackwardTransfer>,
    pub fe_fields: Vec<FieldElement>,
    pub bv_fields: Vec<Vec<u8>>,
    pub ft_fee: Amount,
    pub mbtr_fee: Amount,
    pub proof: ScProof,
}

impl Encode for ScCreationOutput {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.amount.encode_to(out);
        self.address.encode_to(out);
        self.params.encode_to(out);
    }
}

impl Decode for ScCreationOutput {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            amount: r.read()?,
            address: r.read()?,
            params: r.read()?,
        })
    }
}

impl Encode for ForwardTransferOut {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.sc_id.encode_to(out);
        self.amount.encode_to(out);
        self.address.encode_to(out);
    }
}

impl Decode for ForwardTransferOut {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            sc_id: r.read()?,
            amount: r.read()?,
            address: r.read()?,
        })
    }
}

impl Encode for McBwtRequestOut {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.sc_id.encode_to(out);
        self.request_data.encode_to(out);
        self.mc_destination.encode_to(out);
        self.sc_fee.encode_to(out);
    }
}

impl Decode for McBwtRequestOut {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            sc_id: r.read()?,
            request_data: r.read()?,
            mc_destination: r.read()?,
            sc_fee: r.read()?,
        })
    }
}

impl Encode for CswInput {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.sc_id.encode_to(out);
        self.amount.encode_to(out);
        self.nullifier.encode_to(out);
        self.pub_key_hash.encode_to(out);
        self.act_cert_data_hash.encode_to(out);
        self.proof.encode_to(out);
    }
}

impl Decode for CswInput {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            sc_id: r.read()?,
            amount: r.read()?,
            nullifier: r.read()?,
            pub_key_hash: r.read()?,
            act_cert_data_hash: r.read()?,
            proof: r.read()?,
        })
    }
}

impl Encode for ScTransaction {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.creations.encode_to(out);
        self.forward_transfers.encode_to(out);
        self.bwt_requests.encode_to(out);
        self.csw_inputs.encode_to(out);
        self.nonce.encode_to(out);
    }
}

impl Decode for ScTransaction {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            creations: r.read()?,
            forward_transfers: r.read()?,
            bwt_requests: r.read()?,
            csw_inputs: r.read()?,
            nonce: r.read()?,
        })
    }
}

impl Encode for ScCertificate {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.sc_id.encode_to(out);
        self.epoch_number.encode_to(out);
        self.quality.encode_to(out);
        self.end_epoch_cum_comm_tree_root.encode_to(out);
        self.backward_transfers.encode_to(out);
        self.fe_fields.encode_to(out);
        self.bv_fields.encode_to(out);
        self.ft_fee.encode_to(out);
        self.mbtr_fee.encode_to(out);
        self.proof.encode_to(out);
    }
}

impl Decode for ScCertificate {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            sc_id: r.read()?,
            epoch_number: r.read()?,
            quality: r.read()?,
            end_epoch_cum_comm_tree_root: r.read()?,
            backward_transfers: r.read()?,
            fe_fields: r.read()?,
            bv_fields: r.read()?,
            ft_fee: r.read()?,
            mbtr_fee: r.read()?,
            proof: r.read()?,
        })
    }
}

/// Collapse a compressed bit-vector custom field into the field element the
/// proof commits to.
pub fn bit_vector_to_field_element(bytes: &[u8]) -> FieldElement {
    FieldElement::from_digest(tagged_digest(BIT_VECTOR_CTX, &bytes.to_vec()))
}

impl ScTransaction {
    pub fn hash(&self) -> TxHash {
        TxHash(tagged_digest(TX_HASH_CTX, self))
    }

    /// Id of the sidechain created by output `index` of this transaction.
    pub fn sc_id_for_creation(&self, index: usize) -> ScId {
        ScId(tagged_digest(SC_ID_CTX, &(self.hash(), index as u32)))
    }

    pub fn is_sidechain_related(&self) -> bool {
        !(self.creations.is_empty()
            && self.forward_transfers.is_empty()
            && self.bwt_requests.is_empty()
            && self.csw_inputs.is_empty())
    }

    /// Context-free checks on amounts and proof shapes.
    pub fn check_semantics(&self) -> Result<(), ScError> {
        let amounts = self
            .creations
            .iter()
            .map(|c| c.amount)
            .chain(self.forward_transfers.iter().map(|f| f.amount))
            .chain(self.bwt_requests.iter().map(|m| m.sc_fee))
            .chain(self.csw_inputs.iter().map(|c| c.amount));
        let mut total: Amount = 0;
        for a in amounts {
            if !money_range(a) {
                return Err(ScError::AmountOutOfRange { amount: a });
            }
            total = total
                .checked_add(a)
                .filter(|t| *t <= MAX_MONEY)
                .ok_or(ScError::AmountOutOfRange { amount: a })?;
        }
        if self.creations.iter().any(|c| c.amount == 0) {
            return Err(ScError::Semantic("zero-amount sidechain creation"));
        }
        if self.forward_transfers.iter().any(|f| f.amount == 0) {
            return Err(ScError::Semantic("zero-amount forward transfer"));
        }
        for csw in &self.csw_inputs {
            if csw.amount == 0 {
                return Err(ScError::Semantic("zero-amount ceased withdrawal"));
            }
            if !csw.nullifier.is_valid() || !csw.act_cert_data_hash.is_valid() {
                return Err(ScError::Semantic("ceased withdrawal field element out of range"));
            }
            if !csw.proof.is_valid() {
                return Err(ScError::Semantic("invalid ceased withdrawal proof"));
            }
        }
        for m in &self.bwt_requests {
            if m.request_data.iter().any(|fe| !fe.is_valid()) {
                return Err(ScError::Semantic("MBTR request data out of range"));
            }
        }
        Ok(())
    }
}

impl ScCertificate {
    pub fn hash(&self) -> CertHash {
        CertHash(tagged_digest(CERT_HASH_CTX, self))
    }

    pub fn bwt_total(&self) -> Option<Amount> {
        self.backward_transfers
            .iter()
            .try_fold(0 as Amount, |acc, bt| acc.checked_add(bt.amount))
            .filter(|t| money_range(*t))
    }

    /// Commitment to the backward transfers and custom fields.
    pub fn cert_data_hash(&self) -> FieldElement {
        let mut buf = Vec::new();
        self.backward_transfers.encode_to(&mut buf);
        self.fe_fields.encode_to(&mut buf);
        self.bv_fields.encode_to(&mut buf);
        FieldElement::from_digest(tagged_digest(CERT_DATA_CTX, &buf))
    }

    pub fn view(&self) -> CertView {
        CertView {
            cert_data_hash: self.cert_data_hash(),
            end_cum_comm_tree_root: self.end_epoch_cum_comm_tree_root,
            ft_fee: self.ft_fee,
            mbtr_fee: self.mbtr_fee,
        }
    }

    /// Field-element fields followed by the collapsed bit-vector fields, the
    /// order the proof commits to them.
    pub fn custom_fields(&self) -> Vec<FieldElement> {
        self.fe_fields
            .iter()
            .copied()
            .chain(self.bv_fields.iter().map(|b| bit_vector_to_field_element(b)))
            .collect()
    }

    pub fn check_semantics(&self) -> Result<(), ScError> {
        if self.epoch_number < 0 {
            return Err(ScError::Semantic("negative certificate epoch"));
        }
        if self.quality < 0 {
            return Err(ScError::Semantic("negative certificate quality"));
        }
        for fee in [self.ft_fee, self.mbtr_fee] {
            if !money_range(fee) {
                return Err(ScError::AmountOutOfRange { amount: fee });
            }
        }
        if let Some(bt) = self.backward_transfers.iter().find(|bt| bt.amount <= 0) {
            return Err(ScError::AmountOutOfRange { amount: bt.amount });
        }
        if self.bwt_total().is_none() {
            return Err(ScError::Semantic("backward transfer total out of range"));
        }
        if !self.end_epoch_cum_comm_tree_root.is_valid()
            || self.fe_fields.iter().any(|fe| !fe.is_valid())
        {
            return Err(ScError::Semantic("certificate field element out of range"));
        }
        if !self.proof.is_valid() {
            return Err(ScError::Semantic("invalid certificate proof"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> ScCertificate {
        ScCertificate {
            sc_id: ScId([1; 32]),
            epoch_number: 0,
            quality: 5,
            backward_transfers: vec![BackwardTransfer {
                pub_key_hash: [2; 20],
                amount: 10,
            }],
            proof: ScProof::new(vec![1; 32]),
            ..Default::default()
        }
    }

    #[test]
    fn hashes_are_content_bound() {
        let a = cert();
        let mut b = cert();
        assert_eq!(a.hash(), b.hash());
        b.quality = 6;
        assert_ne!(a.hash(), b.hash());
        // quality is not part of the certificate data commitment
        assert_eq!(a.cert_data_hash(), b.cert_data_hash());
        b.backward_transfers[0].amount = 11;
        assert_ne!(a.cert_data_hash(), b.cert_data_hash());
    }

    #[test]
    fn cert_semantics() {
        assert_eq!(cert().check_semantics(), Ok(()));
        let mut c = cert();
        c.backward_transfers[0].amount = 0;
        assert!(matches!(
            c.check_semantics(),
            Err(ScError::AmountOutOfRange { amount: 0 })
        ));
        let mut c = cert();
        c.quality = -1;
        assert!(c.check_semantics().is_err());
    }

    #[test]
    fn creation_ids_differ_per_output() {
        let tx = ScTransaction {
            creations: vec![ScCreationOutput::default(), ScCreationOutput::default()],
            ..Default::default()
        };
        assert_ne!(tx.sc_id_for_creation(0), tx.sc_id_for_creation(1));
    }

    #[test]
    fn custom_fields_put_bit_vectors_last() {
        let mut c = cert();
        c.fe_fields = vec![FieldElement([3; 32])];
        c.bv_fields = vec![vec![1, 2, 3]];
        let fields = c.custom_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], FieldElement([3; 32]));
        assert_eq!(fields[1], bit_vector_to_field_element(&[1, 2, 3]));
    }
}
