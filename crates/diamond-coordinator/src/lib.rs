//! Diamond Upgrade Coordinator
//!
//! Applies cut plans to live diamonds atomically and proves the result.
//!
//! # Core Concepts
//!
//! - [`UpgradeCoordinator`]: plan, submit, await finality, verify, resume, abandon
//! - [`UpgradeRecord`]: one upgrade attempt and its state machine
//! - [`UpgradeLog`]: append-only, hash-chained history of every record state
//! - [`TargetLocks`]: at most one upgrade in flight per target
//!
//! # Guarantees
//!
//! - The cut and its initializer go out as one ledger call
//! - No two upgrades of the same target overlap; different targets run freely
//! - A successful upgrade is reported only after live routing matches the plan
//! - Cancellation never abandons a submitted transaction; it can be resumed
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_coordinator::{CoordinatorConfig, SubmitOptions, UpgradeCoordinator};
//! use diamond_planner::CutPlanner;
//!
//! let coordinator = UpgradeCoordinator::new(ledger, CoordinatorConfig::default());
//! let plan = coordinator.plan_upgrade(target, &descriptors, &CutPlanner::new()).await?;
//! let record = coordinator.submit(plan, None, SubmitOptions::new()).await?;
//! assert!(record.state().is_terminal());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod budget;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod log;
pub mod record;

// Re-exports
pub use budget::{BudgetDecision, BudgetSource};
pub use config::{CoordinatorConfig, LockPolicy};
pub use coordinator::{SubmitOptions, UpgradeCoordinator};
pub use error::{ErrorClass, UpgradeError, VerificationFailure};
pub use lock::{TargetGuard, TargetLocks};
pub use log::{LogEntry, LogError, UpgradeLog};
pub use record::{UpgradeId, UpgradeRecord, UpgradeState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running upgrades
    pub use crate::{
        CoordinatorConfig, SubmitOptions, UpgradeCoordinator, UpgradeError, UpgradeRecord,
        UpgradeState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
