//! Applying and reverting a block's sidechain effects on an overlay.
//!
//! Within a block, transactions are applied first, then certificates, both in
//! block order, then the events scheduled at the block height. Every mutation
//! is logged in the returned `BlockScUndo` so `disconnect_block` can replay it
//! backwards.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLockUpgradableReadGuard;

use crate::config::ChainParams;
use crate::entry::{CertUndo, ScState, SidechainEntry};
use crate::epoch::EpochError;
use crate::error::ScError;
use crate::events::{EventKind, SidechainEvents};
use crate::metrics;
use crate::tx::{CswInput, ScCertificate, ScTransaction};
use crate::types::{Amount, FieldElement, Height, ScId};
use crate::view::{ChainView, ScViewCache, SharedScState};

/// Sidechain-relevant content of one block.
#[derive(Clone, Debug, Default)]
pub struct BlockScEffects {
    pub transactions: Vec<ScTransaction>,
    pub certificates: Vec<ScCertificate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum UndoOp {
    Created { id: ScId },
    Immature { id: ScId, height: Height, prev: Option<Amount> },
    Scheduled { kind: EventKind, height: Height, id: ScId },
    Unscheduled { kind: EventKind, height: Height, id: ScId },
    Certificate { id: ScId, undo: CertUndo },
    CswSpent { id: ScId, nullifier: FieldElement, amount: Amount },
    EventsTaken { height: Height, events: SidechainEvents },
    Matured { id: ScId, height: Height, amount: Amount },
    Ceased { id: ScId },
}

/// Undo log of one connected block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockScUndo {
    height: Height,
    ops: Vec<UndoOp>,
}

impl BlockScUndo {
    fn new(height: Height) -> Self {
        Self {
            height,
            ops: Vec::new(),
        }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Sidechains that ceased when this block was connected.
    pub fn ceased(&self) -> impl Iterator<Item = &ScId> {
        self.ops.iter().filter_map(|op| match op {
            UndoOp::Ceased { id } => Some(id),
            _ => None,
        })
    }
}

fn existing<'v, V: ChainView + ?Sized>(view: &'v V, id: &ScId) -> Result<&'v SidechainEntry, ScError> {
    view.get_sidechain(id)
        .ok_or(ScError::UnknownSidechain { id: *id })
}

fn check_csw<V: ChainView + ?Sized>(view: &V, csw: &CswInput, height: Height) -> Result<(), ScError> {
    let id = &csw.sc_id;
    let entry = existing(view, id)?;
    match entry.state() {
        ScState::Ceased => {}
        state => return Err(ScError::NotCeased { id: *id, state }),
    }
    if entry.fixed_params.csw_vk.is_none() {
        return Err(ScError::CswDisabled { id: *id });
    }
    if view.is_nullifier_spent(id, &csw.nullifier) {
        return Err(ScError::NullifierSpent { id: *id });
    }
    let active = entry.active_cert_view(height, view.params())?;
    if active.cert_data_hash != csw.act_cert_data_hash {
        return Err(ScError::ActiveCertDataMismatch { id: *id });
    }
    if csw.amount > entry.balance {
        return Err(ScError::InsufficientBalance {
            id: *id,
            needed: csw.amount,
            available: entry.balance,
        });
    }
    Ok(())
}

/// Contextual transaction checks for admission on top of `view`.
pub fn check_transaction<V: ChainView + ?Sized>(view: &V, tx: &ScTransaction) -> Result<(), ScError> {
    tx.check_semantics()?;
    let height = view.next_height();
    for (i, out) in tx.creations.iter().enumerate() {
        out.params.validate(view.params())?;
        let id = tx.sc_id_for_creation(i);
        if view.get_sidechain(&id).is_some() {
            return Err(ScError::SidechainExists { id });
        }
    }
    for ft in &tx.forward_transfers {
        existing(view, &ft.sc_id)?.check_forward_transfer(&ft.sc_id, ft.amount)?;
    }
    for req in &tx.bwt_requests {
        existing(view, &req.sc_id)?.check_mbtr(&req.sc_id, req)?;
    }
    let mut seen = BTreeSet::new();
    let mut spent: BTreeMap<ScId, Amount> = BTreeMap::new();
    for csw in &tx.csw_inputs {
        check_csw(view, csw, height)?;
        if !seen.insert((csw.sc_id, csw.nullifier)) {
            return Err(ScError::NullifierSpent { id: csw.sc_id });
        }
        let total = spent.entry(csw.sc_id).or_default();
        *total += csw.amount;
        let balance = existing(view, &csw.sc_id)?.balance;
        if *total > balance {
            return Err(ScError::InsufficientBalance {
                id: csw.sc_id,
                needed: *total,
                available: balance,
            });
        }
    }
    Ok(())
}

/// Contextual certificate checks for admission on top of `view`.
pub fn check_certificate<V: ChainView + ?Sized>(view: &V, cert: &ScCertificate) -> Result<(), ScError> {
    cert.check_semantics()?;
    existing(view, &cert.sc_id)?.check_certificate(cert, view.next_height(), view.params())
}

impl<'a> ScViewCache<'a> {
    fn chain(&self) -> &'a ChainParams {
        let base = self.base();
        base.params()
    }

    fn entry_or_err(&mut self, id: &ScId) -> Result<&mut SidechainEntry, ScError> {
        self.entry_mut(id)
            .ok_or(ScError::UnknownSidechain { id: *id })
    }

    fn schedule_logged(&mut self, undo: &mut BlockScUndo, kind: EventKind, height: Height, id: ScId) {
        if self.schedule_event(kind, height, id) {
            undo.ops.push(UndoOp::Scheduled { kind, height, id });
        }
    }

    fn unschedule_logged(&mut self, undo: &mut BlockScUndo, kind: EventKind, height: Height, id: ScId) {
        if self.unschedule_event(kind, height, &id) {
            undo.ops.push(UndoOp::Unscheduled { kind, height, id });
        }
    }

    fn add_immature_logged(
        &mut self,
        undo: &mut BlockScUndo,
        id: ScId,
        height: Height,
        amount: Amount,
    ) -> Result<(), ScError> {
        let prev = self.entry_or_err(&id)?.add_immature(height, amount)?;
        undo.ops.push(UndoOp::Immature { id, height, prev });
        self.schedule_logged(undo, EventKind::Maturing, height, id);
        Ok(())
    }

    fn apply_transaction(
        &mut self,
        tx: &ScTransaction,
        height: Height,
        undo: &mut BlockScUndo,
    ) -> Result<(), ScError> {
        tx.check_semantics()?;
        let chain = self.chain();
        let maturity = height
            .checked_add(chain.sc_coin_maturity)
            .ok_or(EpochError::Overflow)?;
        let tx_hash = tx.hash();

        for (i, out) in tx.creations.iter().enumerate() {
            out.params.validate(chain)?;
            let id = tx.sc_id_for_creation(i);
            if self.get_sidechain(&id).is_some() {
                return Err(ScError::SidechainExists { id });
            }
            let entry = SidechainEntry::new_confirmed(height, tx_hash, out.params.clone());
            let ceasing = entry.scheduled_ceasing_height(chain)?;
            self.insert_entry(id, entry);
            undo.ops.push(UndoOp::Created { id });
            self.add_immature_logged(undo, id, maturity, out.amount)?;
            self.schedule_logged(undo, EventKind::Ceasing, ceasing, id);
            log::info!("sidechain {id} created at height {height}, ceasing scheduled at {ceasing}");
        }

        for ft in &tx.forward_transfers {
            existing(&*self, &ft.sc_id)?.check_forward_transfer(&ft.sc_id, ft.amount)?;
            self.add_immature_logged(undo, ft.sc_id, maturity, ft.amount)?;
        }

        for req in &tx.bwt_requests {
            existing(&*self, &req.sc_id)?.check_mbtr(&req.sc_id, req)?;
            self.add_immature_logged(undo, req.sc_id, maturity, req.sc_fee)?;
        }

        for csw in &tx.csw_inputs {
            check_csw(&*self, csw, height)?;
            self.entry_or_err(&csw.sc_id)?.balance -= csw.amount;
            self.spend_nullifier(csw.sc_id, csw.nullifier);
            undo.ops.push(UndoOp::CswSpent {
                id: csw.sc_id,
                nullifier: csw.nullifier,
                amount: csw.amount,
            });
        }
        Ok(())
    }

    fn apply_certificate(
        &mut self,
        cert: &ScCertificate,
        height: Height,
        undo: &mut BlockScUndo,
    ) -> Result<(), ScError> {
        cert.check_semantics()?;
        let chain = self.chain();
        let id = cert.sc_id;
        let entry = self.entry_or_err(&id)?;
        let old_ceasing = entry.scheduled_ceasing_height(chain)?;
        let cert_undo = entry.accept_certificate(cert, height, chain)?;
        let new_ceasing = entry.scheduled_ceasing_height(chain)?;
        undo.ops.push(UndoOp::Certificate { id, undo: cert_undo });
        if old_ceasing != new_ceasing {
            self.unschedule_logged(undo, EventKind::Ceasing, old_ceasing, id);
            self.schedule_logged(undo, EventKind::Ceasing, new_ceasing, id);
        }
        metrics::cert_accepted();
        Ok(())
    }

    fn process_events(&mut self, height: Height, undo: &mut BlockScUndo) -> Result<(), ScError> {
        let Some(events) = self.take_events(height) else {
            return Ok(());
        };
        let chain = self.chain();
        undo.ops.push(UndoOp::EventsTaken {
            height,
            events: events.clone(),
        });

        for id in &events.maturing_scs {
            let entry = self.entry_or_err(id)?;
            if let Some(amount) = entry.mature(height) {
                log::debug!("sidechain {id}: {amount} matured at height {height}");
                undo.ops.push(UndoOp::Matured {
                    id: *id,
                    height,
                    amount,
                });
            }
        }

        for id in &events.ceasing_scs {
            let entry = self.entry_or_err(id)?;
            if entry.current_state != ScState::Alive {
                continue;
            }
            if entry.scheduled_ceasing_height(chain)? != height {
                log::warn!("sidechain {id}: stale ceasing event at height {height}");
                continue;
            }
            entry.current_state = ScState::Ceased;
            undo.ops.push(UndoOp::Ceased { id: *id });
            metrics::sc_ceased();
            log::info!("sidechain {id} ceased at height {height}");
        }
        Ok(())
    }

    /// Apply a block on top of this overlay's tip. On error the overlay is
    /// left partially modified and must be dropped.
    pub fn connect_block(&mut self, block: &BlockScEffects) -> Result<BlockScUndo, ScError> {
        let height = self.tip + 1;
        let mut undo = BlockScUndo::new(height);
        for tx in &block.transactions {
            self.apply_transaction(tx, height, &mut undo)?;
        }
        for cert in &block.certificates {
            self.apply_certificate(cert, height, &mut undo)?;
        }
        self.process_events(height, &mut undo)?;
        self.tip = height;
        Ok(undo)
    }

    /// Revert the tip block using the undo log `connect_block` returned.
    pub fn disconnect_block(&mut self, undo: BlockScUndo) -> Result<(), ScError> {
        let block_height = undo.height;
        if block_height != self.tip {
            return Err(ScError::UndoMismatch {
                expected: self.tip,
                got: block_height,
            });
        }
        for op in undo.ops.into_iter().rev() {
            match op {
                UndoOp::Created { id } => self.erase_entry(&id),
                UndoOp::Immature { id, height, prev } => {
                    self.entry_or_err(&id)?.restore_immature(height, prev)
                }
                UndoOp::Scheduled { kind, height, id } => {
                    self.unschedule_event(kind, height, &id);
                }
                UndoOp::Unscheduled { kind, height, id } => {
                    self.schedule_event(kind, height, id);
                }
                UndoOp::Certificate { id, undo } => self.entry_or_err(&id)?.revert_certificate(undo),
                UndoOp::CswSpent {
                    id,
                    nullifier,
                    amount,
                } => {
                    self.entry_or_err(&id)?.balance += amount;
                    self.unspend_nullifier(id, nullifier);
                }
                UndoOp::EventsTaken { height, events } => self.restore_events(height, events),
                UndoOp::Matured { id, height, amount } => {
                    self.entry_or_err(&id)?.unmature(height, amount)
                }
                UndoOp::Ceased { id } => {
                    log::info!("sidechain {id} revived by disconnect of height {block_height}");
                    self.entry_or_err(&id)?.current_state = ScState::Alive;
                }
            }
        }
        self.tip = block_height - 1;
        Ok(())
    }
}

/// Connect a block against shared state. Readers keep going while the block is
/// validated; the write lock is only held to apply the result. Nothing is
/// committed on error.
pub fn connect_block_shared(
    state: &SharedScState,
    block: &BlockScEffects,
) -> Result<BlockScUndo, ScError> {
    let guard = state.upgradable_read();
    let (undo, changes) = {
        let mut view = ScViewCache::new(&guard);
        let undo = view.connect_block(block)?;
        (undo, view.flush())
    };
    let mut w = RwLockUpgradableReadGuard::upgrade(guard);
    w.apply(changes);
    Ok(undo)
}

pub fn disconnect_block_shared(state: &SharedScState, undo: BlockScUndo) -> Result<(), ScError> {
    let guard = state.upgradable_read();
    let changes = {
        let mut view = ScViewCache::new(&guard);
        view.disconnect_block(undo)?;
        view.flush()
    };
    let mut w = RwLockUpgradableReadGuard::upgrade(guard);
    w.apply(changes);
    Ok(())
}
