//! Upgrade coordinator
//!
//! Drives one cut plan from submission to a verified (or explicitly failed)
//! outcome:
//!
//! 1. Refuse empty plans without touching the ledger
//! 2. Take the per-target lock
//! 3. Optionally re-read live routing and refuse stale plans
//! 4. Estimate cost, falling back to the configured budget, plus margin
//! 5. Invoke the cut and initializer as one atomic call
//! 6. Await finality under the caller's deadline and cancellation token
//! 7. Re-read live routing and compare with the plan's expected table
//!
//! Every state from `Submitted` onward is appended to the [`UpgradeLog`].

use crate::budget;
use crate::config::CoordinatorConfig;
use crate::error::{UpgradeError, VerificationFailure};
use crate::lock::{TargetGuard, TargetLocks};
use crate::log::UpgradeLog;
use crate::record::{UpgradeRecord, UpgradeState};
use alloy_primitives::Address;
use diamond_ledger::{FinalityResult, Initializer, LedgerClient, LedgerError};
use diamond_planner::{CutPlan, CutPlanner, DesiredState};
use diamond_registry::{FacetRegistry, LiveQuery, RoutingDiff};
use diamond_selector::ModuleDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Per-call controls for waiting
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl SubmitOptions {
    /// Default options: configured finality timeout, no cancellation
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop waiting for finality at `deadline`
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop waiting for finality after `timeout` from now
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stop waiting when `token` is cancelled
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Coordinates atomic, verified diamond upgrades
pub struct UpgradeCoordinator {
    ledger: Arc<dyn LedgerClient>,
    config: CoordinatorConfig,
    locks: TargetLocks,
    log: Arc<UpgradeLog>,
}

impl std::fmt::Debug for UpgradeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeCoordinator")
            .field("config", &self.config)
            .field("log_entries", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl UpgradeCoordinator {
    /// Create coordinator with a fresh log
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, config: CoordinatorConfig) -> Self {
        Self::with_log(ledger, config, Arc::new(UpgradeLog::new()))
    }

    /// Create coordinator over an existing (for example restored) log
    #[must_use]
    pub fn with_log(ledger: Arc<dyn LedgerClient>, config: CoordinatorConfig, log: Arc<UpgradeLog>) -> Self {
        Self {
            ledger,
            config,
            locks: TargetLocks::new(),
            log,
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Audit log
    #[inline]
    #[must_use]
    pub fn log(&self) -> &UpgradeLog {
        &self.log
    }

    /// Shared handle to the audit log
    #[inline]
    #[must_use]
    pub fn shared_log(&self) -> Arc<UpgradeLog> {
        Arc::clone(&self.log)
    }

    /// Read the live registry of `target`
    pub async fn current_registry(&self, target: Address) -> LiveQuery {
        FacetRegistry::query_live(self.ledger.as_ref(), target, self.config.page_size).await
    }

    /// Plan an upgrade of `target` to exactly `descriptors`
    ///
    /// Descriptors are validated before the ledger is read. Degraded reads
    /// and (when enabled) drift against replayed history are attached to the
    /// plan as warnings.
    ///
    /// # Errors
    /// - `Planning` for invalid descriptors or planner refusals
    /// - `Replay` if logged history does not replay
    pub async fn plan_upgrade(
        &self,
        target: Address,
        descriptors: &[ModuleDescriptor],
        planner: &CutPlanner,
    ) -> Result<CutPlan, UpgradeError> {
        let desired = DesiredState::from_descriptors(descriptors)?;

        let (registry, degraded) = self.current_registry(target).await.into_parts();
        let mut warnings = Vec::new();

        match degraded {
            Some(warning) => warnings.push(warning),
            None if self.config.replay_cross_check => {
                let history = self.log.applied_operations(target);
                let replayed = FacetRegistry::replay(target, &history)?;
                warnings.extend(registry.cross_check(&replayed));
            }
            None => {}
        }

        let plan = planner.plan(&registry, &desired)?.with_warnings(warnings);
        info!(
            %target,
            operations = plan.operations().len(),
            warnings = plan.warnings().len(),
            digest = %plan.digest().short(),
            "upgrade planned"
        );
        Ok(plan)
    }

    /// Submit `plan` with an optional initializer and see it through
    ///
    /// Returns the `Verified` record on success.
    ///
    /// # Errors
    /// - `NothingToUpgrade` for an empty plan
    /// - `UpgradeInFlight` when the target is busy or has a pending upgrade
    /// - `Cancelled` when cancelled while waiting for the target
    /// - `StalePlan` when the live routing moved since planning
    /// - `SubmissionFailed` when the ledger does not accept the call
    /// - `FinalityPending` when waiting stopped; resume with [`resume`](Self::resume)
    /// - `FinalityUnknown` when the ledger cannot report the outcome; see
    ///   [`abandon`](Self::abandon)
    /// - `UpgradeRejected` when the ledger rejected the cut
    /// - `PostUpgradeVerificationFailed` when live routing differs afterwards
    pub async fn submit(
        &self,
        plan: CutPlan,
        initializer: Option<Initializer>,
        options: SubmitOptions,
    ) -> Result<UpgradeRecord, UpgradeError> {
        let target = plan.target();
        if plan.is_empty() {
            return Err(UpgradeError::NothingToUpgrade { target });
        }

        let _guard = self.lock(target, &options).await?;

        if let Some(pending) = self.log.pending(target) {
            warn!(%target, sequence = pending.sequence(), "earlier upgrade still awaiting finality");
            return Err(UpgradeError::UpgradeInFlight { target });
        }

        let mut record = UpgradeRecord::new(self.log.next_sequence(target), plan, initializer);

        if self.config.preflight_check {
            match self.current_registry(target).await {
                LiveQuery::Complete(live) => {
                    let diff = RoutingDiff::between(record.plan().base(), live.table());
                    if !diff.is_empty() {
                        warn!(%target, %diff, "plan is stale");
                        return Err(UpgradeError::StalePlan { target, diff });
                    }
                }
                LiveQuery::Degraded { warning, .. } => {
                    warn!(%target, %warning, "preflight read degraded, submitting anyway");
                    record.push_warning(warning);
                }
            }
        }

        let call = record.plan().to_call(record.initializer().cloned());
        let decision = budget::decide(self.ledger.as_ref(), target, &call, &self.config).await;

        let tx = self
            .ledger
            .invoke(target, &call, decision.budget)
            .await
            .map_err(|source| {
                error!(%target, error = %source, "submission failed");
                UpgradeError::SubmissionFailed { target, source }
            })?;

        record.mark_submitted(tx, decision.budget, decision.source)?;
        self.log.append(&record)?;
        info!(
            %target,
            sequence = record.sequence(),
            tx = ?record.transaction_id(),
            budget = %decision.budget,
            source = ?decision.source,
            "upgrade submitted"
        );

        self.drive(record, &options).await
    }

    /// Continue a submitted upgrade after `FinalityPending`
    ///
    /// # Errors
    /// - `UnknownUpgrade` if no such record was logged
    /// - `AlreadyFinalized` if the record reached a terminal state
    /// - otherwise as for [`submit`](Self::submit) from step 6 on
    pub async fn resume(
        &self,
        target: Address,
        sequence: u64,
        options: SubmitOptions,
    ) -> Result<UpgradeRecord, UpgradeError> {
        let _guard = self.lock(target, &options).await?;

        let record = self
            .log
            .latest(target, sequence)
            .ok_or(UpgradeError::UnknownUpgrade { target, sequence })?;

        match record.state() {
            UpgradeState::Submitted | UpgradeState::FinalizedSuccess => {
                info!(%target, sequence, state = %record.state(), "resuming upgrade");
                self.drive(record, &options).await
            }
            state => Err(UpgradeError::AlreadyFinalized {
                target,
                sequence,
                state,
            }),
        }
    }

    /// Release a submitted upgrade whose outcome will never be observed
    ///
    /// Operator action after `FinalityUnknown`. The record moves to the
    /// terminal `Abandoned` state and the target accepts new upgrades. The
    /// cut may still have landed; the next plan reads live routing either way.
    ///
    /// # Errors
    /// - `UnknownUpgrade` if no such record was logged
    /// - `AlreadyFinalized` if the record is no longer `Submitted`
    pub async fn abandon(
        &self,
        target: Address,
        sequence: u64,
        reason: impl Into<String>,
    ) -> Result<UpgradeRecord, UpgradeError> {
        let _guard = self.lock(target, &SubmitOptions::new()).await?;

        let mut record = self
            .log
            .latest(target, sequence)
            .ok_or(UpgradeError::UnknownUpgrade { target, sequence })?;
        if record.state() != UpgradeState::Submitted {
            return Err(UpgradeError::AlreadyFinalized {
                target,
                sequence,
                state: record.state(),
            });
        }

        let reason = reason.into();
        record.mark_abandoned(reason.clone())?;
        self.log.append(&record)?;
        warn!(%target, sequence, tx = ?record.transaction_id(), %reason, "upgrade abandoned");
        Ok(record)
    }

    async fn lock(&self, target: Address, options: &SubmitOptions) -> Result<TargetGuard, UpgradeError> {
        self.locks
            .acquire(target, self.config.lock_policy, options.cancel.as_ref())
            .await
    }

    async fn drive(&self, mut record: UpgradeRecord, options: &SubmitOptions) -> Result<UpgradeRecord, UpgradeError> {
        if record.state() == UpgradeState::Submitted {
            self.await_finality(&mut record, options).await?;
        }
        self.verify(record).await
    }

    async fn await_finality(&self, record: &mut UpgradeRecord, options: &SubmitOptions) -> Result<(), UpgradeError> {
        let target = record.target();
        let sequence = record.sequence();
        let Some(tx) = record.transaction_id().cloned() else {
            return Err(UpgradeError::IllegalTransition {
                from: record.state(),
                to: UpgradeState::FinalizedSuccess,
            });
        };

        let deadline = options
            .deadline
            .unwrap_or_else(|| Instant::now() + self.config.finality_timeout());
        let pending = || UpgradeError::FinalityPending {
            target,
            sequence,
            transaction_id: tx.clone(),
        };

        let waited = tokio::select! {
            biased;
            () = cancelled(options.cancel.as_ref()) => {
                info!(%target, sequence, "finality wait cancelled");
                return Err(pending());
            }
            waited = tokio::time::timeout_at(deadline, self.ledger.await_finality(&tx, Some(deadline))) => waited,
        };

        let outcome = match waited {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(LedgerError::Timeout)) | Err(_) => {
                info!(%target, sequence, "finality deadline reached");
                return Err(pending());
            }
            Ok(Err(e)) if e.is_transient() => {
                warn!(%target, sequence, error = %e, "finality wait failed");
                return Err(pending());
            }
            Ok(Err(source)) => {
                error!(%target, sequence, %tx, error = %source, "finality cannot be observed");
                return Err(UpgradeError::FinalityUnknown {
                    target,
                    sequence,
                    transaction_id: tx,
                    source,
                });
            }
        };

        match outcome {
            FinalityResult::Success => {
                record.mark_success()?;
                self.log.append(record)?;
                info!(%target, sequence, %tx, "upgrade finalized");
                Ok(())
            }
            FinalityResult::Rejected { reason } => {
                record.mark_rejected(reason.clone())?;
                self.log.append(record)?;
                error!(%target, sequence, %tx, %reason, "upgrade rejected");
                Err(UpgradeError::UpgradeRejected {
                    target,
                    transaction_id: tx,
                    reason,
                })
            }
        }
    }

    async fn verify(&self, mut record: UpgradeRecord) -> Result<UpgradeRecord, UpgradeError> {
        let target = record.target();
        let sequence = record.sequence();
        let tx = record.transaction_id().cloned().ok_or(UpgradeError::IllegalTransition {
            from: record.state(),
            to: UpgradeState::Verified,
        })?;

        let cause = match self.current_registry(target).await {
            LiveQuery::Complete(live) => {
                let diff = RoutingDiff::between(record.plan().expected(), live.table());
                if diff.is_empty() {
                    record.mark_verified(live.snapshot())?;
                    self.log.append(&record)?;
                    info!(%target, sequence, %tx, "upgrade verified");
                    return Ok(record);
                }
                record.mark_verification_failed(Some(live.snapshot()))?;
                VerificationFailure::Mismatch { diff }
            }
            LiveQuery::Degraded { warning, .. } => {
                record.push_warning(warning.clone());
                record.mark_verification_failed(None)?;
                VerificationFailure::Degraded { warning }
            }
        };

        self.log.append(&record)?;
        error!(%target, sequence, %tx, %cause, "post-upgrade verification failed");
        Err(UpgradeError::PostUpgradeVerificationFailed {
            target,
            transaction_id: tx,
            cause,
        })
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
