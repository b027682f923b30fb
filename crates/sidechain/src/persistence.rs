//! RocksDB store for committed sidechain state.
//!
//! One column family per concern. A flushed `ScChangeSet` goes to disk as a
//! single `WriteBatch`, so a crash never leaves the registry, the events
//! ledger and the nullifier set at different heights.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use eezo_serde::{decode_exact, Encode, SerdeError};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use thiserror::Error;

use crate::config::ChainParams;
use crate::entry::SidechainEntry;
use crate::events::{EventsLedger, SidechainEvents};
use crate::types::{FieldElement, Height, ScId};
use crate::view::{ScChangeSet, ScStateDb};

const CF_ENTRIES: &str = "sc_entries";
const CF_EVENTS: &str = "sc_events";
const CF_NULLIFIERS: &str = "csw_nullifiers";
const CF_METADATA: &str = "metadata";

const META_TIP: &[u8] = b"tip";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error("codec error: {0}")]
    Codec(#[from] SerdeError),
    #[error("not found")]
    NotFound,
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;

pub struct ScStore {
    db: DB,
}

fn k_height(h: Height) -> [u8; 4] {
    h.to_be_bytes()
}

fn height_from(key: &[u8]) -> Result<Height> {
    let buf: [u8; 4] = key
        .try_into()
        .map_err(|_| PersistError::Internal(format!("bad height key length {}", key.len())))?;
    Ok(Height::from_be_bytes(buf))
}

fn k_nullifier(id: &ScId, nullifier: &FieldElement) -> [u8; 64] {
    let mut k = [0u8; 64];
    k[..32].copy_from_slice(id.as_bytes());
    k[32..].copy_from_slice(&nullifier.0);
    k
}

fn id_from(key: &[u8]) -> Result<ScId> {
    let buf: [u8; 32] = key
        .try_into()
        .map_err(|_| PersistError::Internal(format!("bad sidechain key length {}", key.len())))?;
    Ok(ScId(buf))
}

impl ScStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_NULLIFIERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_METADATA, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;
        Ok(ScStore { db })
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PersistError::Internal(format!("cf:{name} missing")))
    }

    pub fn get_tip(&self) -> Result<Height> {
        let cf_meta = self.cf(CF_METADATA)?;
        match self.db.get_cf(cf_meta, META_TIP)? {
            Some(v) => height_from(&v),
            None => Err(PersistError::NotFound),
        }
    }

    pub fn get_entry(&self, id: &ScId, chain: &ChainParams) -> Result<Option<SidechainEntry>> {
        let cf = self.cf(CF_ENTRIES)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(v) => Ok(Some(SidechainEntry::from_persisted(&v, chain)?)),
            None => Ok(None),
        }
    }

    /// Write one change set atomically, tip included.
    pub fn write_changes(&self, changes: &ScChangeSet) -> Result<()> {
        let cf_entries = self.cf(CF_ENTRIES)?;
        let cf_events = self.cf(CF_EVENTS)?;
        let cf_null = self.cf(CF_NULLIFIERS)?;
        let cf_meta = self.cf(CF_METADATA)?;

        let mut wb = WriteBatch::default();
        for (id, entry) in &changes.entries {
            match entry {
                Some(e) => wb.put_cf(cf_entries, id.as_bytes(), e.encode()),
                None => wb.delete_cf(cf_entries, id.as_bytes()),
            }
        }
        for (height, ev) in &changes.events {
            match ev {
                Some(ev) if !ev.is_null() => wb.put_cf(cf_events, k_height(*height), ev.encode()),
                _ => wb.delete_cf(cf_events, k_height(*height)),
            }
        }
        for ((id, nullifier), spent) in &changes.nullifiers {
            let k = k_nullifier(id, nullifier);
            if *spent {
                wb.put_cf(cf_null, k, b"");
            } else {
                wb.delete_cf(cf_null, k);
            }
        }
        wb.put_cf(cf_meta, META_TIP, k_height(changes.tip));
        self.db.write(wb)?;
        log::debug!(
            "persisted sidechain changes at tip {}: {} entries, {} event heights, {} nullifiers",
            changes.tip,
            changes.entries.len(),
            changes.events.len(),
            changes.nullifiers.len()
        );
        Ok(())
    }

    /// Rebuild the committed state. `Ok(None)` on a store that was never
    /// written to.
    pub fn load(&self, params: ChainParams) -> Result<Option<ScStateDb>> {
        let tip = match self.get_tip() {
            Ok(t) => t,
            Err(PersistError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut entries = BTreeMap::new();
        for kv in self.db.iterator_cf(self.cf(CF_ENTRIES)?, IteratorMode::Start) {
            let (k, v) = kv?;
            entries.insert(id_from(&k)?, SidechainEntry::from_persisted(&v, &params)?);
        }

        let mut events = EventsLedger::new();
        for kv in self.db.iterator_cf(self.cf(CF_EVENTS)?, IteratorMode::Start) {
            let (k, v) = kv?;
            let ev: SidechainEvents = decode_exact(&v)?;
            events.restore(height_from(&k)?, ev);
        }

        let mut nullifiers = BTreeSet::new();
        for kv in self.db.iterator_cf(self.cf(CF_NULLIFIERS)?, IteratorMode::Start) {
            let (k, _) = kv?;
            if k.len() != 64 {
                return Err(PersistError::Internal(format!("bad nullifier key length {}", k.len())));
            }
            let id = id_from(&k[..32])?;
            let mut fe = [0u8; 32];
            fe.copy_from_slice(&k[32..]);
            nullifiers.insert((id, FieldElement(fe)));
        }

        log::info!(
            "loaded sidechain state at tip {tip}: {} sidechains, {} event heights",
            entries.len(),
            events.len()
        );
        Ok(Some(ScStateDb::restore(params, tip, entries, events, nullifiers)))
    }
}
