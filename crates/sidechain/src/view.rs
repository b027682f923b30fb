//! Committed sidechain state and copy-on-write overlays over it.
//!
//! Validation of a block (or of competing tips) runs against its own
//! `ScViewCache`; nothing touches the committed `ScStateDb` until the overlay
//! is flushed into an `ScChangeSet` and applied.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ChainParams;
use crate::entry::{ScState, SidechainEntry};
use crate::events::{EventKind, EventsLedger, SidechainEvents};
use crate::types::{CertView, FieldElement, Height, ScId};

/// Read access to sidechain state as of some chain tip.
pub trait ChainView {
    fn params(&self) -> &ChainParams;

    /// Height of the block being validated on top of this view.
    fn next_height(&self) -> Height;

    fn get_sidechain(&self, id: &ScId) -> Option<&SidechainEntry>;

    fn events_at(&self, height: Height) -> Option<&SidechainEvents>;

    fn is_nullifier_spent(&self, id: &ScId, nullifier: &FieldElement) -> bool;

    fn sidechain_state(&self, id: &ScId) -> ScState {
        self.get_sidechain(id)
            .map(SidechainEntry::state)
            .unwrap_or(ScState::NotApplicable)
    }

    /// Certificate view in effect for `id` at `next_height()`.
    fn active_cert_view(&self, id: &ScId) -> Option<CertView> {
        let entry = self.get_sidechain(id)?;
        entry
            .active_cert_view(self.next_height(), self.params())
            .ok()
    }
}

/// Committed registry, events ledger and spent CSW nullifiers.
#[derive(Clone, Debug, Default)]
pub struct ScStateDb {
    params: ChainParams,
    tip: Height,
    entries: BTreeMap<ScId, SidechainEntry>,
    events: EventsLedger,
    nullifiers: BTreeSet<(ScId, FieldElement)>,
}

pub type SharedScState = Arc<RwLock<ScStateDb>>;

impl ScStateDb {
    pub fn new(params: ChainParams, tip: Height) -> Self {
        Self {
            params,
            tip,
            ..Default::default()
        }
    }

    pub fn into_shared(self) -> SharedScState {
        Arc::new(RwLock::new(self))
    }

    pub fn tip(&self) -> Height {
        self.tip
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sidechain_ids(&self) -> impl Iterator<Item = &ScId> {
        self.entries.keys()
    }

    pub fn events(&self) -> &EventsLedger {
        &self.events
    }

    pub fn nullifiers(&self) -> impl Iterator<Item = &(ScId, FieldElement)> {
        self.nullifiers.iter()
    }

    pub fn view(&self) -> ScViewCache<'_> {
        ScViewCache::new(self)
    }

    /// Commit an overlay's changes.
    pub fn apply(&mut self, changes: ScChangeSet) {
        for (id, entry) in changes.entries {
            match entry {
                Some(e) => {
                    self.entries.insert(id, e);
                }
                None => {
                    self.entries.remove(&id);
                }
            }
        }
        for (height, ev) in changes.events {
            self.events.set(height, ev);
        }
        for (key, spent) in changes.nullifiers {
            if spent {
                self.nullifiers.insert(key);
            } else {
                self.nullifiers.remove(&key);
            }
        }
        self.tip = changes.tip;
    }

    /// Replace the committed state wholesale, used when loading from disk.
    #[cfg_attr(not(feature = "persistence"), allow(dead_code))]
    pub(crate) fn restore(
        params: ChainParams,
        tip: Height,
        entries: BTreeMap<ScId, SidechainEntry>,
        events: EventsLedger,
        nullifiers: BTreeSet<(ScId, FieldElement)>,
    ) -> Self {
        Self {
            params,
            tip,
            entries,
            events,
            nullifiers,
        }
    }
}

impl ChainView for ScStateDb {
    fn params(&self) -> &ChainParams {
        &self.params
    }

    fn next_height(&self) -> Height {
        self.tip + 1
    }

    fn get_sidechain(&self, id: &ScId) -> Option<&SidechainEntry> {
        self.entries.get(id)
    }

    fn events_at(&self, height: Height) -> Option<&SidechainEvents> {
        self.events.get(height)
    }

    fn is_nullifier_spent(&self, id: &ScId, nullifier: &FieldElement) -> bool {
        self.nullifiers.contains(&(*id, *nullifier))
    }
}

/// Everything an overlay changed. `None` means deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScChangeSet {
    pub tip: Height,
    pub entries: BTreeMap<ScId, Option<SidechainEntry>>,
    pub events: BTreeMap<Height, Option<SidechainEvents>>,
    pub nullifiers: BTreeMap<(ScId, FieldElement), bool>,
}

impl ScChangeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.events.is_empty() && self.nullifiers.is_empty()
    }
}

/// Copy-on-write overlay over a committed snapshot.
#[derive(Debug)]
pub struct ScViewCache<'a> {
    base: &'a ScStateDb,
    pub(crate) tip: Height,
    entries: BTreeMap<ScId, Option<SidechainEntry>>,
    events: BTreeMap<Height, Option<SidechainEvents>>,
    nullifiers: BTreeMap<(ScId, FieldElement), bool>,
}

impl<'a> ScViewCache<'a> {
    pub fn new(base: &'a ScStateDb) -> Self {
        Self {
            base,
            tip: base.tip,
            entries: BTreeMap::new(),
            events: BTreeMap::new(),
            nullifiers: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> &'a ScStateDb {
        self.base
    }

    pub fn tip(&self) -> Height {
        self.tip
    }

    /// Mutable access, copying the committed entry into the overlay first.
    pub fn entry_mut(&mut self, id: &ScId) -> Option<&mut SidechainEntry> {
        let base = self.base;
        self.entries
            .entry(*id)
            .or_insert_with(|| base.entries.get(id).cloned())
            .as_mut()
    }

    pub fn insert_entry(&mut self, id: ScId, entry: SidechainEntry) {
        self.entries.insert(id, Some(entry));
    }

    pub fn erase_entry(&mut self, id: &ScId) {
        self.entries.insert(*id, None);
    }

    fn events_slot(&mut self, height: Height) -> &mut Option<SidechainEvents> {
        let base = self.base;
        self.events
            .entry(height)
            .or_insert_with(|| base.events.get(height).cloned())
    }

    /// Returns false if already scheduled.
    pub fn schedule_event(&mut self, kind: EventKind, height: Height, id: ScId) -> bool {
        let slot = self.events_slot(height);
        slot.get_or_insert_with(SidechainEvents::default)
            .insert(kind, id)
    }

    /// Returns false if it was not scheduled.
    pub fn unschedule_event(&mut self, kind: EventKind, height: Height, id: &ScId) -> bool {
        let slot = self.events_slot(height);
        let Some(ev) = slot.as_mut() else {
            return false;
        };
        let removed = ev.remove(kind, id);
        if ev.is_null() {
            *slot = None;
        }
        removed
    }

    pub fn take_events(&mut self, height: Height) -> Option<SidechainEvents> {
        self.events_slot(height).take()
    }

    pub fn restore_events(&mut self, height: Height, events: SidechainEvents) {
        *self.events_slot(height) = (!events.is_null()).then_some(events);
    }

    pub fn spend_nullifier(&mut self, id: ScId, nullifier: FieldElement) {
        self.nullifiers.insert((id, nullifier), true);
    }

    pub fn unspend_nullifier(&mut self, id: ScId, nullifier: FieldElement) {
        self.nullifiers.insert((id, nullifier), false);
    }

    /// Record creations seen outside a block (mempool admission). Such
    /// entries stay `Unconfirmed` and are never part of a flushed change set.
    pub fn stage_creation(&mut self, id: ScId, entry: SidechainEntry) {
        debug_assert_eq!(entry.current_state, ScState::Unconfirmed);
        self.entries.insert(id, Some(entry));
    }

    pub fn flush(self) -> ScChangeSet {
        let entries = self
            .entries
            .into_iter()
            .filter(|(id, e)| {
                let staged = e
                    .as_ref()
                    .is_some_and(|e| e.current_state == ScState::Unconfirmed);
                if staged {
                    log::warn!("dropping unconfirmed sidechain {id} from change set");
                }
                !staged
            })
            .collect();
        ScChangeSet {
            tip: self.tip,
            entries,
            events: self.events,
            nullifiers: self.nullifiers,
        }
    }
}

impl ChainView for ScViewCache<'_> {
    fn params(&self) -> &ChainParams {
        &self.base.params
    }

    fn next_height(&self) -> Height {
        self.tip + 1
    }

    fn get_sidechain(&self, id: &ScId) -> Option<&SidechainEntry> {
        match self.entries.get(id) {
            Some(cached) => cached.as_ref(),
            None => self.base.entries.get(id),
        }
    }

    fn events_at(&self, height: Height) -> Option<&SidechainEvents> {
        match self.events.get(&height) {
            Some(cached) => cached.as_ref(),
            None => self.base.events.get(height),
        }
    }

    fn is_nullifier_spent(&self, id: &ScId, nullifier: &FieldElement) -> bool {
        match self.nullifiers.get(&(*id, *nullifier)) {
            Some(spent) => *spent,
            None => self.base.is_nullifier_spent(id, nullifier),
        }
    }
}
