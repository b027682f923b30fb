//! Bounded history of the fees set by accepted certificates.

use std::collections::VecDeque;

use eezo_serde::{Decode, Encode, Reader, SerdeError};
use serde::{Deserialize, Serialize};

use crate::types::{Amount, CertView, Epoch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScFeeEntry {
    pub epoch: Epoch,
    pub ft_fee: Amount,
    pub mbtr_fee: Amount,
}

impl ScFeeEntry {
    pub fn from_view(epoch: Epoch, view: &CertView) -> Self {
        Self {
            epoch,
            ft_fee: view.ft_fee,
            mbtr_fee: view.mbtr_fee,
        }
    }
}

impl Encode for ScFeeEntry {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.epoch.encode_to(out);
        self.ft_fee.encode_to(out);
        self.mbtr_fee.encode_to(out);
    }
}

impl Decode for ScFeeEntry {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            epoch: r.read()?,
            ft_fee: r.read()?,
            mbtr_fee: r.read()?,
        })
    }
}

/// What `FeeWindow::update` changed, enough to put it back: one entry was
/// appended, possibly evicting the oldest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeUndo {
    pub evicted: Option<ScFeeEntry>,
}

/// FIFO of fee entries. `capacity` is derived from chain parameters and the
/// sidechain epoch length; it is memory-only and zero until frozen.
#[derive(Clone, Debug, Default)]
pub struct FeeWindow {
    entries: VecDeque<ScFeeEntry>,
    capacity: usize,
}

impl PartialEq for FeeWindow {
    // capacity is derived state
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for FeeWindow {}

impl FeeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` until the first write (or reload) fixes it.
    pub fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScFeeEntry> {
        self.entries.iter()
    }

    /// Fix the capacity if not already fixed. Oldest entries beyond it are
    /// dropped; this only happens when reloading under different parameters.
    pub fn freeze_capacity(&mut self, capacity: usize) {
        if self.capacity != 0 {
            return;
        }
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                log::warn!(
                    "fee window over capacity {} on reload, dropping epoch {}",
                    self.capacity,
                    dropped.epoch
                );
            }
        }
    }

    /// Record the fees of a newly accepted top-quality certificate. Always
    /// appends, even when the epoch repeats: a replaced winner's fees stay in
    /// the window until evicted.
    pub fn update(&mut self, entry: ScFeeEntry, capacity: usize) -> FeeUndo {
        self.freeze_capacity(capacity);
        self.entries.push_back(entry);
        let evicted = if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        FeeUndo { evicted }
    }

    pub fn revert(&mut self, undo: FeeUndo) {
        self.entries.pop_back();
        if let Some(e) = undo.evicted {
            self.entries.push_front(e);
        }
    }

    /// Minimum forward-transfer fee over the retained entries, or `default`
    /// when no certificate was ever recorded.
    pub fn min_ft_fee(&self, default: Amount) -> Amount {
        self.entries.iter().map(|e| e.ft_fee).min().unwrap_or(default)
    }

    pub fn min_mbtr_fee(&self, default: Amount) -> Amount {
        self.entries
            .iter()
            .map(|e| e.mbtr_fee)
            .min()
            .unwrap_or(default)
    }
}

impl Encode for FeeWindow {
    fn encode_to(&self, out: &mut Vec<u8>) {
        (self.entries.len() as u32).encode_to(out);
        for e in &self.entries {
            e.encode_to(out);
        }
    }
}

impl Decode for FeeWindow {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        let entries: Vec<ScFeeEntry> = r.read()?;
        Ok(Self {
            entries: entries.into(),
            capacity: 0,
        })
    }
}
