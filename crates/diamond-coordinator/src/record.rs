//! Upgrade records and their state machine
//!
//! ```text
//! Planned -> Submitted -> FinalizedSuccess -> Verified
//!                     \                   \-> VerificationFailed
//!                      \-> FinalizedRejected
//!                       \-> Abandoned
//! ```
//!
//! `Abandoned` is set only by an operator, for transactions the ledger no
//! longer knows about.
//!
//! Records are created when a plan is about to be submitted and are only
//! advanced by the coordinator as it observes finality and verification.

use crate::budget::BudgetSource;
use crate::error::UpgradeError;
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use diamond_ledger::{CostBudget, Initializer, TransactionId};
use diamond_planner::{CutPlan, PlanDigest};
use diamond_registry::{RegistryWarning, RoutingTable};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Unique upgrade identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(Ulid);

impl UpgradeId {
    /// Generate a new identifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for UpgradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UpgradeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    /// Built, not yet sent
    Planned,
    /// Sent to the ledger, outcome unknown
    Submitted,
    /// Ledger committed the cut
    FinalizedSuccess,
    /// Ledger rejected the cut; nothing changed
    FinalizedRejected,
    /// Live routing matches the plan
    Verified,
    /// Live routing differs from the plan or could not be read
    VerificationFailed,
    /// Outcome never observed; released by an operator
    Abandoned,
}

impl UpgradeState {
    /// Check if `next` directly follows this state
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::Submitted)
                | (
                    Self::Submitted,
                    Self::FinalizedSuccess | Self::FinalizedRejected | Self::Abandoned
                )
                | (Self::FinalizedSuccess, Self::Verified | Self::VerificationFailed)
        )
    }

    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::FinalizedRejected | Self::Verified | Self::VerificationFailed | Self::Abandoned
        )
    }

    /// Check if the ledger applied the cut
    #[inline]
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(
            self,
            Self::FinalizedSuccess | Self::Verified | Self::VerificationFailed
        )
    }

    /// Stable numeric code, used in the log hash
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Planned => 0,
            Self::Submitted => 1,
            Self::FinalizedSuccess => 2,
            Self::FinalizedRejected => 3,
            Self::Verified => 4,
            Self::VerificationFailed => 5,
            Self::Abandoned => 6,
        }
    }
}

impl Display for UpgradeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planned => "planned",
            Self::Submitted => "submitted",
            Self::FinalizedSuccess => "finalized (success)",
            Self::FinalizedRejected => "finalized (rejected)",
            Self::Verified => "verified",
            Self::VerificationFailed => "verification failed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// One upgrade attempt against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    id: UpgradeId,
    target: Address,
    sequence: u64,
    plan: CutPlan,
    plan_digest: PlanDigest,
    initializer: Option<Initializer>,
    budget: Option<CostBudget>,
    budget_source: Option<BudgetSource>,
    transaction_id: Option<TransactionId>,
    state: UpgradeState,
    finalized: bool,
    rejection_reason: Option<String>,
    post_routing: Option<RoutingTable>,
    #[serde(default)]
    abandon_reason: Option<String>,
    warnings: Vec<RegistryWarning>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UpgradeRecord {
    pub(crate) fn new(sequence: u64, plan: CutPlan, initializer: Option<Initializer>) -> Self {
        let now = Utc::now();
        Self {
            id: UpgradeId::new(),
            target: plan.target(),
            sequence,
            plan_digest: plan.digest(),
            warnings: plan.warnings().to_vec(),
            plan,
            initializer,
            budget: None,
            budget_source: None,
            transaction_id: None,
            state: UpgradeState::Planned,
            finalized: false,
            rejection_reason: None,
            post_routing: None,
            abandon_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn advance(&mut self, next: UpgradeState) -> Result<(), UpgradeError> {
        if !self.state.can_transition_to(next) {
            return Err(UpgradeError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if matches!(next, UpgradeState::FinalizedSuccess | UpgradeState::FinalizedRejected) {
            self.finalized = true;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn push_warning(&mut self, warning: RegistryWarning) {
        self.warnings.push(warning);
    }

    pub(crate) fn mark_submitted(
        &mut self,
        tx: TransactionId,
        budget: CostBudget,
        source: BudgetSource,
    ) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::Submitted)?;
        self.transaction_id = Some(tx);
        self.budget = Some(budget);
        self.budget_source = Some(source);
        Ok(())
    }

    pub(crate) fn mark_success(&mut self) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::FinalizedSuccess)
    }

    pub(crate) fn mark_rejected(&mut self, reason: String) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::FinalizedRejected)?;
        self.rejection_reason = Some(reason);
        Ok(())
    }

    pub(crate) fn mark_verified(&mut self, post: RoutingTable) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::Verified)?;
        self.post_routing = Some(post);
        Ok(())
    }

    pub(crate) fn mark_verification_failed(&mut self, post: Option<RoutingTable>) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::VerificationFailed)?;
        self.post_routing = post;
        Ok(())
    }

    pub(crate) fn mark_abandoned(&mut self, reason: String) -> Result<(), UpgradeError> {
        self.advance(UpgradeState::Abandoned)?;
        self.abandon_reason = Some(reason);
        Ok(())
    }

    /// Unique id
    #[inline]
    #[must_use]
    pub fn id(&self) -> UpgradeId {
        self.id
    }

    /// Target diamond
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }

    /// Per-target sequence number
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Submitted plan
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &CutPlan {
        &self.plan
    }

    /// Digest of the submitted plan
    #[inline]
    #[must_use]
    pub fn plan_digest(&self) -> PlanDigest {
        self.plan_digest
    }

    /// Initializer sent with the cut
    #[inline]
    #[must_use]
    pub fn initializer(&self) -> Option<&Initializer> {
        self.initializer.as_ref()
    }

    /// Budget attached to the submission
    #[inline]
    #[must_use]
    pub fn budget(&self) -> Option<CostBudget> {
        self.budget
    }

    /// Whether the budget was estimated or fell back
    #[inline]
    #[must_use]
    pub fn budget_source(&self) -> Option<BudgetSource> {
        self.budget_source
    }

    /// Ledger transaction
    #[inline]
    #[must_use]
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> UpgradeState {
        self.state
    }

    /// Whether the ledger reached finality
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Reason given by the ledger for a rejection
    #[inline]
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Live routing observed during verification
    #[inline]
    #[must_use]
    pub fn post_routing(&self) -> Option<&RoutingTable> {
        self.post_routing.as_ref()
    }

    /// Operator note for an abandoned upgrade
    #[inline]
    #[must_use]
    pub fn abandon_reason(&self) -> Option<&str> {
        self.abandon_reason.as_deref()
    }

    /// Registry warnings from planning, preflight and verification
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last transition time
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
