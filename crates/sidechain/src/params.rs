//! Creation-time sidechain parameters and their validation.

use eezo_serde::{Decode, Encode, Reader, SerdeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChainParams;
use crate::types::{
    money_range, Amount, FieldElement, ProvingSystem, VerificationKey, MAX_CUSTOM_FIELDS,
    MAX_SC_CUSTOM_DATA_LEN, MAX_SC_MBTR_DATA_LEN,
};

pub const MAX_BIT_VECTOR_SIZE_BITS: u32 = 254 * 4096;
/// Slack allowed on top of the raw bit-vector size for compression headers.
pub const MAX_COMPRESSION_OVERHEAD_BYTES: u32 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreationError {
    #[error("withdrawal epoch length {got} outside [{min}, {max}]")]
    EpochLength { got: i32, min: i32, max: i32 },
    #[error("certificate proving system must be defined")]
    CertProvingSystemUndefined,
    #[error("invalid certificate verification key")]
    InvalidCertVk,
    #[error("custom data too long ({len} > {max})")]
    CustomDataTooLong { len: usize, max: usize },
    #[error("constant is not a valid field element")]
    InvalidConstant,
    #[error("CSW proving system must be defined if a ceased verification key is provided")]
    CswProvingSystemUndefined,
    #[error("CSW proving system defined without a ceased verification key")]
    CswVkMissing,
    #[error("invalid ceased verification key")]
    InvalidCswVk,
    #[error("too many custom fields ({count} > {max})")]
    TooManyCustomFields { count: usize, max: usize },
    #[error("invalid custom field config #{index}")]
    InvalidFieldConfig { index: usize },
    #[error("{which} fee {fee} out of range")]
    FeeOutOfRange { which: &'static str, fee: Amount },
    #[error("MBTR request data length {len} exceeds {max}")]
    MbtrDataTooLong { len: usize, max: usize },
}

/// Shape of one certificate custom field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CertFieldConfig {
    FieldElement { bits: u8 },
    BitVector { size_bits: u32, max_compressed_bytes: u32 },
}

impl CertFieldConfig {
    pub fn is_valid(&self) -> bool {
        match *self {
            CertFieldConfig::FieldElement { bits } => {
                bits > 0 && u32::from(bits) <= FieldElement::USABLE_BITS
            }
            CertFieldConfig::BitVector {
                size_bits,
                max_compressed_bytes,
            } => {
                size_bits > 0
                    && size_bits % FieldElement::USABLE_BITS == 0
                    && size_bits <= MAX_BIT_VECTOR_SIZE_BITS
                    && max_compressed_bytes > 0
                    && max_compressed_bytes <= size_bits / 8 + MAX_COMPRESSION_OVERHEAD_BYTES
            }
        }
    }
}

impl Encode for CertFieldConfig {
    fn encode_to(&self, out: &mut Vec<u8>) {
        match *self {
            CertFieldConfig::FieldElement { bits } => {
                out.push(0);
                bits.encode_to(out);
            }
            CertFieldConfig::BitVector {
                size_bits,
                max_compressed_bytes,
            } => {
                out.push(1);
                size_bits.encode_to(out);
                max_compressed_bytes.encode_to(out);
            }
        }
    }
}

impl Decode for CertFieldConfig {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        match r.read::<u8>()? {
            0 => Ok(CertFieldConfig::FieldElement { bits: r.read()? }),
            1 => Ok(CertFieldConfig::BitVector {
                size_bits: r.read()?,
                max_compressed_bytes: r.read()?,
            }),
            _ => Err(SerdeError::Malformed("cert field config tag")),
        }
    }
}

/// Parameters fixed when the sidechain is created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScFixedParams {
    pub withdrawal_epoch_length: i32,
    pub cert_proving_system: ProvingSystem,
    pub cert_vk: VerificationKey,
    pub csw_proving_system: ProvingSystem,
    pub csw_vk: Option<VerificationKey>,
    pub constant: Option<FieldElement>,
    pub custom_data: Vec<u8>,
    pub field_configs: Vec<CertFieldConfig>,
    pub ft_default_fee: Amount,
    pub mbtr_default_fee: Amount,
    /// Number of field elements an MBTR must carry.
    pub mbtr_request_data_length: u8,
}

impl ScFixedParams {
    pub fn is_empty(&self) -> bool {
        *self == ScFixedParams::default()
    }

    pub fn fe_configs(&self) -> impl Iterator<Item = u8> + '_ {
        self.field_configs.iter().filter_map(|c| match c {
            CertFieldConfig::FieldElement { bits } => Some(*bits),
            _ => None,
        })
    }

    pub fn bv_configs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.field_configs.iter().filter_map(|c| match c {
            CertFieldConfig::BitVector {
                size_bits,
                max_compressed_bytes,
            } => Some((*size_bits, *max_compressed_bytes)),
            _ => None,
        })
    }

    pub fn validate(&self, chain: &ChainParams) -> Result<(), CreationError> {
        let (min, max) = (
            chain.min_withdrawal_epoch_length,
            chain.max_withdrawal_epoch_length,
        );
        if self.withdrawal_epoch_length < min || self.withdrawal_epoch_length > max {
            return Err(CreationError::EpochLength {
                got: self.withdrawal_epoch_length,
                min,
                max,
            });
        }
        if !self.cert_proving_system.is_defined() {
            return Err(CreationError::CertProvingSystemUndefined);
        }
        if !self.cert_vk.is_valid() {
            return Err(CreationError::InvalidCertVk);
        }
        if self.custom_data.len() > MAX_SC_CUSTOM_DATA_LEN {
            return Err(CreationError::CustomDataTooLong {
                len: self.custom_data.len(),
                max: MAX_SC_CUSTOM_DATA_LEN,
            });
        }
        if self.constant.is_some_and(|c| !c.is_valid()) {
            return Err(CreationError::InvalidConstant);
        }
        match (&self.csw_vk, self.csw_proving_system.is_defined()) {
            (Some(_), false) => return Err(CreationError::CswProvingSystemUndefined),
            (None, true) => return Err(CreationError::CswVkMissing),
            (Some(vk), true) if !vk.is_valid() => return Err(CreationError::InvalidCswVk),
            _ => {}
        }
        if self.field_configs.len() > MAX_CUSTOM_FIELDS {
            return Err(CreationError::TooManyCustomFields {
                count: self.field_configs.len(),
                max: MAX_CUSTOM_FIELDS,
            });
        }
        if let Some(index) = self.field_configs.iter().position(|c| !c.is_valid()) {
            return Err(CreationError::InvalidFieldConfig { index });
        }
        if !money_range(self.ft_default_fee) {
            return Err(CreationError::FeeOutOfRange {
                which: "forward transfer",
                fee: self.ft_default_fee,
            });
        }
        if !money_range(self.mbtr_default_fee) {
            return Err(CreationError::FeeOutOfRange {
                which: "MBTR",
                fee: self.mbtr_default_fee,
            });
        }
        if usize::from(self.mbtr_request_data_length) > MAX_SC_MBTR_DATA_LEN {
            return Err(CreationError::MbtrDataTooLong {
                len: usize::from(self.mbtr_request_data_length),
                max: MAX_SC_MBTR_DATA_LEN,
            });
        }
        Ok(())
    }
}

impl Encode for ScFixedParams {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.withdrawal_epoch_length.encode_to(out);
        self.cert_proving_system.encode_to(out);
        self.cert_vk.encode_to(out);
        self.csw_proving_system.encode_to(out);
        self.csw_vk.encode_to(out);
        self.constant.encode_to(out);
        self.custom_data.encode_to(out);
        self.field_configs.encode_to(out);
        self.ft_default_fee.encode_to(out);
        self.mbtr_default_fee.encode_to(out);
        self.mbtr_request_data_length.encode_to(out);
    }
}

impl Decode for ScFixedParams {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            withdrawal_epoch_length: r.read()?,
            cert_proving_system: r.read()?,
            cert_vk: r.read()?,
            csw_proving_system: r.read()?,
            csw_vk: r.read()?,
            constant: r.read()?,
            custom_data: r.read()?,
            field_configs: r.read()?,
            ft_default_fee: r.read()?,
            mbtr_default_fee: r.read()?,
            mbtr_request_data_length: r.read()?,
        })
    }
}
