use std::collections::{BTreeMap, BTreeSet};

use crate::{Result, SerdeError};

/// Hard limits to prevent OOM on pathological inputs.
pub const MAX_BYTES: usize = 1 << 20; // 1 MiB for byte blobs
pub const MAX_LIST: usize = 1 << 16; // up to 65,536 list elements

/// Bounded cursor over an input buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    input: &'a [u8],
    off: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, off: 0 }
    }

    pub fn position(&self) -> usize {
        self.off
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.off
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.off.checked_add(n).ok_or(SerdeError::Overflow)?;
        if end > self.input.len() {
            return Err(SerdeError::Eof);
        }
        let out = &self.input[self.off..end];
        self.off = end;
        Ok(out)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    /// Read a little-endian u32 length and enforce a maximum.
    pub fn read_len(&mut self, max: usize) -> Result<usize> {
        let len = u32::from_le_bytes(self.take_array::<4>()?) as usize;
        if len > max {
            return Err(SerdeError::TooLong { have: len, max });
        }
        Ok(len)
    }

    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode_from(self)
    }

    /// Fails unless the whole input was consumed.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            left => Err(SerdeError::TrailingBytes { left }),
        }
    }
}

pub trait Decode: Sized {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self>;
}

/// Decode a single value that must span the whole input.
pub fn decode_exact<T: Decode>(input: &[u8]) -> Result<T> {
    let mut r = Reader::new(input);
    let v = T::decode_from(&mut r)?;
    r.finish()?;
    Ok(v)
}

impl Decode for bool {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        match r.take_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerdeError::Malformed("bool tag")),
        }
    }
}

macro_rules! decode_le {
    ($($t:ty),*) => {$(
        impl Decode for $t {
            fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
                Ok(<$t>::from_le_bytes(r.take_array()?))
            }
        }
    )*};
}

decode_le!(u8, u16, u32, u64, u128, i32, i64);

impl<const N: usize> Decode for [u8; N] {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        r.take_array()
    }
}

// Byte-like element types are capped by total bytes, everything else by
// element count.
fn list_cap<T>() -> usize {
    if core::mem::size_of::<T>() == 1 {
        MAX_BYTES
    } else {
        MAX_LIST
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.read_len(list_cap::<T>())?;
        // never trust the prefix for preallocation beyond what is left
        let mut out = Vec::with_capacity(n.min(r.remaining()));
        for _ in 0..n {
            out.push(T::decode_from(r)?);
        }
        Ok(out)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        match r.take_array::<1>()?[0] {
            0 => Ok(None),
            1 => Ok(Some(T::decode_from(r)?)),
            _ => Err(SerdeError::Malformed("option tag")),
        }
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        Ok((A::decode_from(r)?, B::decode_from(r)?))
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.read_len(MAX_LIST)?;
        let mut out = BTreeMap::new();
        for _ in 0..n {
            let k = K::decode_from(r)?;
            let v = V::decode_from(r)?;
            if out.last_key_value().is_some_and(|(last, _)| *last >= k) {
                return Err(SerdeError::NonCanonical);
            }
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.read_len(MAX_LIST)?;
        let mut out = BTreeSet::new();
        for _ in 0..n {
            let v = T::decode_from(r)?;
            if out.last().is_some_and(|last| *last >= v) {
                return Err(SerdeError::NonCanonical);
            }
            out.insert(v);
        }
        Ok(out)
    }
}
