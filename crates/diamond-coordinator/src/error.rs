//! Error types for the upgrade coordinator
//!
//! Provides classification for:
//! - Local planning failures (nothing was submitted)
//! - Concurrency refusals (target busy, caller cancelled)
//! - Terminal submission and verification outcomes
//! - Pending finality that can be resumed

use crate::log::LogError;
use crate::record::UpgradeState;
use alloy_primitives::Address;
use diamond_ledger::{LedgerError, TransactionId};
use diamond_planner::PlanningError;
use diamond_registry::{RegistryWarning, ReplayError, RoutingDiff};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Main coordinator error type
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Plan contains no operations
    #[error("nothing to upgrade on {target}")]
    NothingToUpgrade {
        /// Target diamond
        target: Address,
    },

    /// Another upgrade holds the target
    #[error("upgrade already in flight for {target}")]
    UpgradeInFlight {
        /// Target diamond
        target: Address,
    },

    /// Live routing moved since the plan was computed
    #[error("plan for {target} is stale: {diff}")]
    StalePlan {
        /// Target diamond
        target: Address,
        /// Plan base (expected) versus live (actual)
        diff: RoutingDiff,
    },

    /// Ledger refused or failed to accept the submission
    #[error("submission to {target} failed: {source}")]
    SubmissionFailed {
        /// Target diamond
        target: Address,
        /// Ledger error
        #[source]
        source: LedgerError,
    },

    /// Stopped waiting before finality; the transaction stays submitted
    #[error("finality pending for {target} #{sequence} ({transaction_id})")]
    FinalityPending {
        /// Target diamond
        target: Address,
        /// Record sequence to resume
        sequence: u64,
        /// Submitted transaction
        transaction_id: TransactionId,
    },

    /// Ledger cannot report the outcome; waiting longer will not help
    #[error("finality of {target} #{sequence} unknown ({transaction_id}): {source}")]
    FinalityUnknown {
        /// Target diamond
        target: Address,
        /// Record sequence to abandon
        sequence: u64,
        /// Submitted transaction
        transaction_id: TransactionId,
        /// Permanent ledger error
        source: LedgerError,
    },

    /// Ledger finalized the transaction as rejected
    #[error("upgrade of {target} rejected in {transaction_id}: {reason}")]
    UpgradeRejected {
        /// Target diamond
        target: Address,
        /// Rejected transaction
        transaction_id: TransactionId,
        /// Ledger-provided reason
        reason: String,
    },

    /// Cut finalized but live routing does not match the plan
    #[error("verification of {target} after {transaction_id} failed: {cause}")]
    PostUpgradeVerificationFailed {
        /// Target diamond
        target: Address,
        /// Applied transaction
        transaction_id: TransactionId,
        /// Mismatch or unreadable post-state
        cause: VerificationFailure,
    },

    /// Desired state or plan is invalid
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    /// Recorded history does not replay
    #[error("history replay failed: {0}")]
    Replay(#[from] ReplayError),

    /// Caller cancelled while waiting for the target lock
    #[error("cancelled while waiting for {target}")]
    Cancelled {
        /// Target diamond
        target: Address,
    },

    /// No record with this sequence
    #[error("no upgrade #{sequence} recorded for {target}")]
    UnknownUpgrade {
        /// Target diamond
        target: Address,
        /// Requested sequence
        sequence: u64,
    },

    /// Record has nothing left to resume
    #[error("upgrade #{sequence} of {target} already {state}")]
    AlreadyFinalized {
        /// Target diamond
        target: Address,
        /// Requested sequence
        sequence: u64,
        /// Current state
        state: UpgradeState,
    },

    /// State machine refused a transition
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: UpgradeState,
        /// Requested state
        to: UpgradeState,
    },

    /// Audit log failure
    #[error("upgrade log error: {0}")]
    Log(#[from] LogError),
}

/// Why post-upgrade verification failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// Live routing differs from the plan's expected table
    Mismatch {
        /// Expected versus live
        diff: RoutingDiff,
    },
    /// Live routing could not be read reliably
    Degraded {
        /// Degraded read
        warning: RegistryWarning,
    },
}

impl Display for VerificationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { diff } => write!(f, "routing mismatch ({diff})"),
            Self::Degraded { warning } => write!(f, "post-state unreadable ({warning})"),
        }
    }
}

/// Coarse error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Rejected locally before submission
    Planning,
    /// Target busy or caller gave up waiting for it
    Concurrency,
    /// Submission failed or was rejected
    Submission,
    /// Outcome not yet known
    Finality,
    /// Applied state differs from the plan
    Verification,
    /// Log or state machine inconsistency
    Internal,
}

impl UpgradeError {
    /// Classify the error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NothingToUpgrade { .. }
            | Self::StalePlan { .. }
            | Self::Planning(_)
            | Self::Replay(_) => ErrorClass::Planning,
            Self::UpgradeInFlight { .. } | Self::Cancelled { .. } => ErrorClass::Concurrency,
            Self::SubmissionFailed { .. } | Self::UpgradeRejected { .. } => ErrorClass::Submission,
            Self::FinalityPending { .. } | Self::FinalityUnknown { .. } => ErrorClass::Finality,
            Self::PostUpgradeVerificationFailed { .. } => ErrorClass::Verification,
            Self::UnknownUpgrade { .. }
            | Self::AlreadyFinalized { .. }
            | Self::IllegalTransition { .. }
            | Self::Log(_) => ErrorClass::Internal,
        }
    }

    /// Check if an operator must look at the target
    #[inline]
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::PostUpgradeVerificationFailed { .. }
                | Self::FinalityUnknown { .. }
                | Self::Replay(_)
                | Self::IllegalTransition { .. }
                | Self::Log(_)
        )
    }

    /// Check if trying again (replanning or resuming) can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpgradeInFlight { .. }
            | Self::StalePlan { .. }
            | Self::FinalityPending { .. }
            | Self::Cancelled { .. } => true,
            Self::SubmissionFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Target the error concerns, if any
    #[must_use]
    pub fn target(&self) -> Option<Address> {
        match self {
            Self::NothingToUpgrade { target }
            | Self::UpgradeInFlight { target }
            | Self::StalePlan { target, .. }
            | Self::SubmissionFailed { target, .. }
            | Self::FinalityPending { target, .. }
            | Self::FinalityUnknown { target, .. }
            | Self::UpgradeRejected { target, .. }
            | Self::PostUpgradeVerificationFailed { target, .. }
            | Self::Cancelled { target }
            | Self::UnknownUpgrade { target, .. }
            | Self::AlreadyFinalized { target, .. } => Some(*target),
            Self::Replay(err) => Some(err.target),
            Self::Planning(_) | Self::IllegalTransition { .. } | Self::Log(_) => None,
        }
    }

    /// Transaction the error concerns, if one was submitted
    #[must_use]
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            Self::FinalityPending { transaction_id, .. }
            | Self::FinalityUnknown { transaction_id, .. }
            | Self::UpgradeRejected { transaction_id, .. }
            | Self::PostUpgradeVerificationFailed { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }
}
