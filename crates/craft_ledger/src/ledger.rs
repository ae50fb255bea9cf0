//! Job ledger
//!
//! Single source of truth for outstanding crafting credit. Every [`JobKey`]
//! owns an independently locked cell, so mutations for one player at one
//! station never serialize behind another key. The map itself is only
//! touched to find, insert or prune a cell. A per-player key index keeps
//! consumption and disconnect cleanup from scanning other players' credit.
//!
//! Invariants held by every operation:
//! - counts never go negative; decrementing an empty count is a no-op
//! - credit only moves pending -> validated -> consumed, or is removed
//! - an all-zero entry is pruned while its cell lock is held, and a pruned
//!   cell is marked retired so late holders re-resolve the key
//! - a key is indexed under its player before its cell lock is released,
//!   and unindexed before its cell leaves the map

use crate::types::{JobKey, JobLedgerEntry, PlayerId};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Default)]
struct CellState {
    entry: JobLedgerEntry,
    retired: bool,
}

#[derive(Debug, Default)]
struct LedgerCell {
    state: Mutex<CellState>,
}

/// Which count a retraction removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retracted {
    Validated,
    Pending,
}

/// Per-key crafting credit
#[derive(Debug, Default)]
pub struct JobLedger {
    entries: DashMap<JobKey, Arc<LedgerCell>>,
    by_player: DashMap<PlayerId, BTreeSet<JobKey>>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pending job, creating the entry if needed
    pub fn add_pending(&self, key: JobKey) -> JobLedgerEntry {
        self.mutate_or_insert(key, |entry| {
            entry.pending = entry.pending.saturating_add(1);
        })
    }

    /// Remove one pending job. `None` when there was nothing to cancel.
    pub fn cancel_pending(&self, key: JobKey) -> Option<JobLedgerEntry> {
        self.mutate_existing(key, |entry| {
            if entry.pending == 0 {
                return false;
            }
            entry.pending -= 1;
            true
        })
    }

    /// Move one unit from pending to validated. `None` when nothing was pending.
    pub fn promote(&self, key: JobKey) -> Option<JobLedgerEntry> {
        self.mutate_existing(key, |entry| {
            if entry.pending == 0 {
                return false;
            }
            entry.pending -= 1;
            entry.validated = entry.validated.saturating_add(1);
            true
        })
    }

    /// Remove one unit of validated credit, or pending credit when no
    /// validated credit remains.
    pub fn retract(&self, key: JobKey) -> Option<(Retracted, JobLedgerEntry)> {
        let mut retracted = None;
        let entry = self.mutate_existing(key, |entry| {
            if entry.validated > 0 {
                entry.validated -= 1;
                retracted = Some(Retracted::Validated);
            } else if entry.pending > 0 {
                entry.pending -= 1;
                retracted = Some(Retracted::Pending);
            }
            retracted.is_some()
        })?;
        retracted.map(|which| (which, entry))
    }

    /// Consume one unit of validated credit. `None` when none was available.
    pub fn consume(&self, key: JobKey) -> Option<JobLedgerEntry> {
        self.mutate_existing(key, |entry| {
            if entry.validated == 0 {
                return false;
            }
            entry.validated -= 1;
            true
        })
    }

    /// Current counts for a key
    pub fn entry(&self, key: JobKey) -> Option<JobLedgerEntry> {
        loop {
            let cell = self.entries.get(&key).map(|r| Arc::clone(r.value()))?;
            let state = cell.state.lock();
            if state.retired {
                continue;
            }
            return Some(state.entry);
        }
    }

    /// Keys the player currently holds credit under, in key order
    pub fn keys_for_player(&self, player: PlayerId) -> Vec<JobKey> {
        self.by_player
            .get(&player)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of players holding any credit
    pub fn player_count(&self) -> usize {
        self.by_player.len()
    }

    /// Drop every entry belonging to the player; returns how many were removed
    pub fn clear_player(&self, player: PlayerId) -> usize {
        let mut removed = 0;
        for key in self.keys_for_player(player) {
            let Some(cell) = self.entries.get(&key).map(|r| Arc::clone(r.value())) else {
                continue;
            };
            let mut state = cell.state.lock();
            if state.retired {
                continue;
            }
            state.retired = true;
            self.unindex(&key);
            self.entries.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
            removed += 1;
        }
        removed
    }

    /// All entries in key order
    pub fn snapshot(&self) -> Vec<(JobKey, JobLedgerEntry)> {
        let mut keys: Vec<JobKey> = self.entries.iter().map(|item| *item.key()).collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.entry(key).map(|entry| (key, entry)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    fn mutate_or_insert(&self, key: JobKey, mut apply: impl FnMut(&mut JobLedgerEntry)) -> JobLedgerEntry {
        loop {
            // The map guard must be released before the cell is locked.
            let cell = Arc::clone(self.entries.entry(key).or_default().value());
            let mut state = cell.state.lock();
            if state.retired {
                continue;
            }
            let fresh = state.entry.is_empty();
            apply(&mut state.entry);
            let entry = state.entry;
            if fresh && !entry.is_empty() {
                self.by_player.entry(key.player).or_default().insert(key);
            }
            self.prune_if_empty(&key, &cell, &mut state);
            return entry;
        }
    }

    /// Apply `apply` to an existing entry. It returns whether it changed
    /// anything; the post-change counts are returned only in that case.
    fn mutate_existing(
        &self,
        key: JobKey,
        mut apply: impl FnMut(&mut JobLedgerEntry) -> bool,
    ) -> Option<JobLedgerEntry> {
        loop {
            let cell = self.entries.get(&key).map(|r| Arc::clone(r.value()))?;
            let mut state = cell.state.lock();
            if state.retired {
                continue;
            }
            let changed = apply(&mut state.entry);
            let entry = state.entry;
            self.prune_if_empty(&key, &cell, &mut state);
            return changed.then_some(entry);
        }
    }

    fn prune_if_empty(&self, key: &JobKey, cell: &Arc<LedgerCell>, state: &mut MutexGuard<'_, CellState>) {
        if state.entry.is_empty() {
            state.retired = true;
            self.unindex(key);
            self.entries.remove_if(key, |_, current| Arc::ptr_eq(current, cell));
        }
    }

    fn unindex(&self, key: &JobKey) {
        if let Some(mut keys) = self.by_player.get_mut(&key.player) {
            keys.remove(key);
        }
        self.by_player.remove_if(&key.player, |_, keys| keys.is_empty());
    }
}
