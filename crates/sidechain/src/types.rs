//! Value types shared by every sidechain component.

use std::fmt;

use eezo_serde::{Decode, Encode, Reader, SerdeError};
use serde::{Deserialize, Serialize};

pub type Height = i32;
pub type Epoch = i32;
pub type Quality = i64;
pub type Amount = i64;

/// Epoch value of an entry that never had a certificate accepted.
pub const EPOCH_NULL: Epoch = -1;
pub const QUALITY_NULL: Quality = -1;
/// Height of an entry that only exists in a staging view.
pub const HEIGHT_UNCONFIRMED: Height = -1;

pub const COIN: Amount = 100_000_000;
pub const MAX_MONEY: Amount = 21_000_000 * COIN;

pub const MAX_SC_CUSTOM_DATA_LEN: usize = 1024;
pub const MAX_SC_MBTR_DATA_LEN: usize = 16;
pub const MAX_VK_SIZE: usize = 9 * 1024;
pub const MAX_PROOF_SIZE: usize = 7 * 1024;
pub const MAX_CUSTOM_FIELDS: usize = 32;

#[inline]
pub fn money_range(v: Amount) -> bool {
    (0..=MAX_MONEY).contains(&v)
}

macro_rules! hash256 {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &hex::encode(self.0)[..16])
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(b: [u8; 32]) -> Self {
                Self(b)
            }
        }

        impl Encode for $name {
            fn encode_to(&self, out: &mut Vec<u8>) {
                self.0.encode_to(out);
            }
        }

        impl Decode for $name {
            fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
                Ok(Self(r.read()?))
            }
        }
    };
}

hash256!(
    /// Sidechain identifier, derived from the creating transaction.
    ScId
);
hash256!(CertHash);
hash256!(TxHash);

/// 32-byte little-endian field element.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldElement(pub [u8; 32]);

impl FieldElement {
    pub const BYTE_SIZE: usize = 32;
    /// Bits usable without leaving the canonical range.
    pub const USABLE_BITS: u32 = 254;

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Canonical iff the two most significant bits are clear.
    pub fn is_valid(&self) -> bool {
        self.0[31] & 0xc0 == 0
    }

    /// Map an arbitrary digest into the canonical range.
    pub fn from_digest(mut d: [u8; 32]) -> Self {
        d[31] &= 0x3f;
        Self(d)
    }

    /// True when every bit at position `bits` or above is clear.
    pub fn fits_in_bits(&self, bits: u32) -> bool {
        if bits >= 256 {
            return true;
        }
        let full = (bits / 8) as usize;
        let rem = bits % 8;
        let mut start = full;
        if rem != 0 {
            if self.0[full] >> rem != 0 {
                return false;
            }
            start += 1;
        }
        self.0[start..].iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fe({})", hex::encode(self.0))
    }
}

impl Encode for FieldElement {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.0.encode_to(out);
    }
}

impl Decode for FieldElement {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self(r.read()?))
    }
}

macro_rules! byte_blob {
    ($(#[$m:meta])* $name:ident, $max:expr) => {
        $(#[$m])*
        #[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            pub fn is_valid(&self) -> bool {
                !self.0.is_empty() && self.0.len() <= $max
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(len={})", stringify!($name), self.0.len())
            }
        }

        impl Encode for $name {
            fn encode_to(&self, out: &mut Vec<u8>) {
                self.0.encode_to(out);
            }
        }

        impl Decode for $name {
            fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
                Ok(Self(r.read()?))
            }
        }
    };
}

byte_blob!(VerificationKey, MAX_VK_SIZE);
byte_blob!(ScProof, MAX_PROOF_SIZE);

/// Closed set of proving systems a sidechain may select at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvingSystem {
    #[default]
    Undefined,
    Darlin,
    CoboundaryMarlin,
}

impl ProvingSystem {
    pub fn is_defined(self) -> bool {
        self != ProvingSystem::Undefined
    }

    fn tag(self) -> u8 {
        match self {
            ProvingSystem::Undefined => 0,
            ProvingSystem::Darlin => 1,
            ProvingSystem::CoboundaryMarlin => 2,
        }
    }
}

impl Encode for ProvingSystem {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
    }
}

impl Decode for ProvingSystem {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        match r.read::<u8>()? {
            0 => Ok(ProvingSystem::Undefined),
            1 => Ok(ProvingSystem::Darlin),
            2 => Ok(ProvingSystem::CoboundaryMarlin),
            _ => Err(SerdeError::Malformed("proving system tag")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackwardTransfer {
    pub pub_key_hash: [u8; 20],
    pub amount: Amount,
}

impl Encode for BackwardTransfer {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.pub_key_hash.encode_to(out);
        self.amount.encode_to(out);
    }
}

impl Decode for BackwardTransfer {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            pub_key_hash: r.read()?,
            amount: r.read()?,
        })
    }
}

/// Summary of an accepted certificate that later epochs and withdrawals
/// depend on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertView {
    pub cert_data_hash: FieldElement,
    pub end_cum_comm_tree_root: FieldElement,
    pub ft_fee: Amount,
    pub mbtr_fee: Amount,
}

impl CertView {
    pub fn is_null(&self) -> bool {
        *self == CertView::default()
    }
}

impl Encode for CertView {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.cert_data_hash.encode_to(out);
        self.end_cum_comm_tree_root.encode_to(out);
        self.ft_fee.encode_to(out);
        self.mbtr_fee.encode_to(out);
    }
}

impl Decode for CertView {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            cert_data_hash: r.read()?,
            end_cum_comm_tree_root: r.read()?,
            ft_fee: r.read()?,
            mbtr_fee: r.read()?,
        })
    }
}
