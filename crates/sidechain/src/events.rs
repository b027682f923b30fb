//! Per-height sidechain events: ceasing deadlines and maturing amounts.

use std::collections::{BTreeMap, BTreeSet};

use eezo_serde::{Decode, Encode, Reader, SerdeError};

use crate::types::{Height, ScId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Ceasing,
    Maturing,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SidechainEvents {
    pub ceasing_scs: BTreeSet<ScId>,
    pub maturing_scs: BTreeSet<ScId>,
}

impl SidechainEvents {
    pub fn is_null(&self) -> bool {
        self.ceasing_scs.is_empty() && self.maturing_scs.is_empty()
    }

    fn set_mut(&mut self, kind: EventKind) -> &mut BTreeSet<ScId> {
        match kind {
            EventKind::Ceasing => &mut self.ceasing_scs,
            EventKind::Maturing => &mut self.maturing_scs,
        }
    }

    pub fn insert(&mut self, kind: EventKind, id: ScId) -> bool {
        self.set_mut(kind).insert(id)
    }

    pub fn remove(&mut self, kind: EventKind, id: &ScId) -> bool {
        self.set_mut(kind).remove(id)
    }

    pub fn contains(&self, kind: EventKind, id: &ScId) -> bool {
        match kind {
            EventKind::Ceasing => self.ceasing_scs.contains(id),
            EventKind::Maturing => self.maturing_scs.contains(id),
        }
    }
}

impl Encode for SidechainEvents {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.ceasing_scs.encode_to(out);
        self.maturing_scs.encode_to(out);
    }
}

impl Decode for SidechainEvents {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, SerdeError> {
        Ok(Self {
            ceasing_scs: r.read()?,
            maturing_scs: r.read()?,
        })
    }
}

/// Height-keyed event sets. A height is dropped as soon as both its sets are
/// empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventsLedger {
    by_height: BTreeMap<Height, SidechainEvents>,
}

impl EventsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, height: Height) -> Option<&SidechainEvents> {
        self.by_height.get(&height)
    }

    pub fn len(&self) -> usize {
        self.by_height.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_height.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Height, &SidechainEvents)> {
        self.by_height.iter()
    }

    /// Returns false if `id` was already scheduled there.
    pub fn schedule(&mut self, kind: EventKind, height: Height, id: ScId) -> bool {
        self.by_height.entry(height).or_default().insert(kind, id)
    }

    /// Returns false if `id` was not scheduled there.
    pub fn unschedule(&mut self, kind: EventKind, height: Height, id: &ScId) -> bool {
        let Some(ev) = self.by_height.get_mut(&height) else {
            return false;
        };
        let removed = ev.remove(kind, id);
        if ev.is_null() {
            self.by_height.remove(&height);
        }
        removed
    }

    /// Remove and return the whole event set at `height`.
    pub fn take(&mut self, height: Height) -> Option<SidechainEvents> {
        self.by_height.remove(&height)
    }

    /// Put back a set previously taken. Empty sets are not stored.
    pub fn restore(&mut self, height: Height, events: SidechainEvents) {
        if events.is_null() {
            self.by_height.remove(&height);
        } else {
            self.by_height.insert(height, events);
        }
    }

    pub fn set(&mut self, height: Height, events: Option<SidechainEvents>) {
        match events {
            Some(ev) => self.restore(height, ev),
            None => {
                self.by_height.remove(&height);
            }
        }
    }
}
