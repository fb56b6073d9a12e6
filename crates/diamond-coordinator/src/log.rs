//! Append-only upgrade log
//!
//! Every state an upgrade record reaches from `Submitted` onward is appended
//! as a snapshot keyed by `(target, sequence)`. Entries are chained with
//! SHA-256 over the previous entry's hash so any edit to persisted history
//! is detectable with [`UpgradeLog::verify_integrity`].

use crate::record::{UpgradeRecord, UpgradeState};
use alloy_primitives::Address;
use diamond_ledger::CutOperation;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One chained log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log
    pub index: u64,
    /// Target diamond
    pub target: Address,
    /// Per-target sequence
    pub sequence: u64,
    /// Record state at this entry
    pub state: UpgradeState,
    /// Full record snapshot
    pub record: UpgradeRecord,
    /// Hash of the previous entry, zero for the first
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

/// Log failures
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Record could not be encoded for hashing
    #[error("cannot encode record: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Chain is broken at an entry
    #[error("integrity violation at entry {index}")]
    IntegrityViolation {
        /// First bad entry
        index: u64,
    },
}

/// Thread-safe append-only upgrade log
#[derive(Debug, Default)]
pub struct UpgradeLog {
    inner: Mutex<Vec<LogEntry>>,
}

impl UpgradeLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted log
    ///
    /// Entries are taken as-is; call [`verify_integrity`](Self::verify_integrity)
    /// before trusting them.
    #[must_use]
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            inner: Mutex::new(entries),
        }
    }

    /// Append a snapshot of `record`
    ///
    /// # Errors
    /// Returns error if the record cannot be encoded
    pub fn append(&self, record: &UpgradeRecord) -> Result<u64, LogError> {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut entry = LogEntry {
            index: guard.len() as u64,
            target: record.target(),
            sequence: record.sequence(),
            state: record.state(),
            record: record.clone(),
            prev_hash,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry)?;
        let index = entry.index;
        guard.push(entry);
        Ok(index)
    }

    /// Check the hash chain
    ///
    /// # Errors
    /// Returns the first entry whose link or hash does not match
    pub fn verify_integrity(&self) -> Result<(), LogError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (position, e) in guard.iter().enumerate() {
            let consistent = e.index == position as u64
                && e.prev_hash == prev
                && e.target == e.record.target()
                && e.sequence == e.record.sequence()
                && e.state == e.record.state();
            if !consistent || e.hash != compute_hash(e)? {
                return Err(LogError::IntegrityViolation { index: e.index });
            }
            prev = e.hash;
        }
        Ok(())
    }

    /// All entries in append order
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if nothing was logged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sequence the next upgrade of `target` receives
    #[must_use]
    pub fn next_sequence(&self, target: Address) -> u64 {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.sequence)
            .max()
            .map_or(1, |s| s + 1)
    }

    /// Latest snapshot of one upgrade
    #[must_use]
    pub fn latest(&self, target: Address, sequence: u64) -> Option<UpgradeRecord> {
        self.inner
            .lock()
            .iter()
            .rev()
            .find(|e| e.target == target && e.sequence == sequence)
            .map(|e| e.record.clone())
    }

    /// Latest snapshot of every upgrade of `target`, by sequence
    #[must_use]
    pub fn history(&self, target: Address) -> Vec<UpgradeRecord> {
        let guard = self.inner.lock();
        let mut latest: BTreeMap<u64, &LogEntry> = BTreeMap::new();
        for e in guard.iter().filter(|e| e.target == target) {
            latest.insert(e.sequence, e);
        }
        latest.into_values().map(|e| e.record.clone()).collect()
    }

    /// Upgrade of `target` still waiting for finality, if any
    #[must_use]
    pub fn pending(&self, target: Address) -> Option<UpgradeRecord> {
        self.history(target)
            .into_iter()
            .find(|r| r.state() == UpgradeState::Submitted)
    }

    /// Operations the ledger applied to `target`, in sequence order
    #[must_use]
    pub fn applied_operations(&self, target: Address) -> Vec<CutOperation> {
        self.history(target)
            .into_iter()
            .filter(|r| r.state().is_applied())
            .flat_map(|r| r.plan().operations().to_vec())
            .collect()
    }
}

fn compute_hash(entry: &LogEntry) -> Result<[u8; 32], LogError> {
    let record = serde_json::to_vec(&entry.record)?;
    let mut hasher = Sha256::new();
    hasher.update(entry.index.to_le_bytes());
    hasher.update(entry.target.as_slice());
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update([entry.state.code()]);
    hasher.update((record.len() as u64).to_le_bytes());
    hasher.update(&record);
    hasher.update(entry.prev_hash);
    Ok(hasher.finalize().into())
}
