//! Per-target exclusive locks
//!
//! One async mutex per target address. The guard is held from acquisition
//! through verification, so at most one upgrade per target is in flight
//! while different targets proceed independently. An entry lives only while
//! someone holds or waits for it.

use crate::config::LockPolicy;
use crate::error::UpgradeError;
use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

type LockMap = DashMap<Address, Arc<Mutex<()>>>;

/// Guard proving exclusive access to one target
///
/// Dropping it releases the target and forgets the lock if nobody waits.
#[derive(Debug)]
pub struct TargetGuard {
    target: Address,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl TargetGuard {
    /// Target this guard holds
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.guard.take();
        release_idle(&self.locks, self.target);
    }
}

/// Lock map keyed by target address
#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: Arc<LockMap>,
}

impl TargetLocks {
    /// Create empty lock map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, target: Address) -> Arc<Mutex<()>> {
        self.locks.entry(target).or_default().clone()
    }

    /// Acquire the lock for `target`
    ///
    /// `Wait` queues in FIFO order (tokio mutexes are fair) until the lock is
    /// free or `cancel` fires.
    ///
    /// # Errors
    /// - `UpgradeInFlight` under `FailFast` when the target is busy
    /// - `Cancelled` when `cancel` fires while queued
    pub async fn acquire(
        &self,
        target: Address,
        policy: LockPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<TargetGuard, UpgradeError> {
        let lock = self.handle(target);
        let acquired = match policy {
            LockPolicy::FailFast => lock
                .try_lock_owned()
                .map_err(|_| UpgradeError::UpgradeInFlight { target }),
            LockPolicy::Wait => match cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => Err(UpgradeError::Cancelled { target }),
                    guard = lock.lock_owned() => Ok(guard),
                },
                None => Ok(lock.lock_owned().await),
            },
        };

        match acquired {
            Ok(guard) => Ok(TargetGuard {
                target,
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
            }),
            Err(e) => {
                release_idle(&self.locks, target);
                Err(e)
            }
        }
    }

    /// Check if `target` is currently held
    #[must_use]
    pub fn is_locked(&self, target: Address) -> bool {
        self.locks
            .get(&target)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of targets held or waited for
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no target is held or waited for
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Drop the entry for `target` once only the map references it
fn release_idle(locks: &LockMap, target: Address) {
    locks.remove_if(&target, |_, lock| Arc::strong_count(lock) == 1);
}
