//! Concurrency and cancellation tests for the upgrade coordinator.
//!
//! Core guarantees exercised here:
//! - At most one upgrade per target is in flight; other targets proceed.
//! - Waiting callers queue behind the holder and can give up.
//! - Cancellation or a deadline stops waiting but never abandons a
//!   submitted transaction; the upgrade is resumed to a verified outcome.
//! - A transaction the ledger forgot needs an operator to release the target.

use diamond_coordinator::{
    CoordinatorConfig, ErrorClass, LockPolicy, SubmitOptions, UpgradeCoordinator, UpgradeError,
    UpgradeState,
};
use diamond_ledger::{LedgerClient, LedgerError};
use diamond_planner::{CutPlan, CutPlanner};
use diamond_test_utils::{address, init_tracing, module, InMemoryLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn coordinator(ledger: &Arc<InMemoryLedger>, config: CoordinatorConfig) -> Arc<UpgradeCoordinator> {
    let client: Arc<dyn LedgerClient> = ledger.clone();
    Arc::new(UpgradeCoordinator::new(client, config))
}

async fn plan(coordinator: &UpgradeCoordinator, target: u8, n: u8, signature: &str) -> CutPlan {
    coordinator
        .plan_upgrade(address(target), &[module(n, &[signature])], &CutPlanner::new())
        .await
        .unwrap()
}

/// Yield until the ledger has seen `count` submissions.
async fn until_invoked(ledger: &InMemoryLedger, count: usize) {
    while ledger.invocation_count() < count {
        tokio::task::yield_now().await;
    }
}

/// Tenet: a busy target refuses a second upgrade under fail-fast.
#[tokio::test]
async fn busy_target_fails_fast() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;
    let second = plan(&coordinator, 0xd1, 0xb2, "b()").await;

    ledger.hold_finality();
    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(first, None, SubmitOptions::new()).await })
    };
    until_invoked(&ledger, 1).await;

    let err = coordinator.submit(second, None, SubmitOptions::new()).await.unwrap_err();
    assert!(matches!(err, UpgradeError::UpgradeInFlight { .. }));
    assert_eq!(err.class(), ErrorClass::Concurrency);
    assert_eq!(ledger.invocation_count(), 1);

    ledger.release_finality();
    let record = running.await.unwrap().unwrap();
    assert_eq!(record.state(), UpgradeState::Verified);
}

/// Tenet: different targets never block each other.
#[tokio::test]
async fn different_targets_run_concurrently() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let one = plan(&coordinator, 0xd1, 0xa1, "a()").await;
    let two = plan(&coordinator, 0xd2, 0xa1, "a()").await;

    ledger.hold_finality();
    let tasks: Vec<_> = [one, two]
        .into_iter()
        .map(|p| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.submit(p, None, SubmitOptions::new()).await })
        })
        .collect();

    // Both reach the ledger while finality is held
    until_invoked(&ledger, 2).await;
    ledger.release_finality();

    for task in tasks {
        let record = task.await.unwrap().unwrap();
        assert_eq!(record.state(), UpgradeState::Verified);
        assert_eq!(record.sequence(), 1);
    }
    coordinator.log().verify_integrity().unwrap();
}

/// Tenet: under `Wait` the second caller runs after the first, against the
/// routing the first one produced.
#[tokio::test]
async fn waiting_caller_runs_after_holder() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default().with_lock_policy(LockPolicy::Wait));
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;
    let second = plan(&coordinator, 0xd1, 0xb2, "b()").await;

    ledger.hold_finality();
    let holder = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(first, None, SubmitOptions::new()).await })
    };
    until_invoked(&ledger, 1).await;

    let waiter = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(second, None, SubmitOptions::new()).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(ledger.invocation_count(), 1);

    ledger.release_finality();
    assert_eq!(holder.await.unwrap().unwrap().state(), UpgradeState::Verified);

    // Planned against the empty table, so it went stale while queued
    assert!(matches!(
        waiter.await.unwrap(),
        Err(UpgradeError::StalePlan { .. })
    ));
    assert_eq!(ledger.invocation_count(), 1);
}

/// Tenet: a queued caller can give up without affecting the holder.
#[tokio::test]
async fn queued_caller_can_cancel() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default().with_lock_policy(LockPolicy::Wait));
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;
    let second = plan(&coordinator, 0xd1, 0xb2, "b()").await;

    ledger.hold_finality();
    let holder = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(first, None, SubmitOptions::new()).await })
    };
    until_invoked(&ledger, 1).await;

    let token = CancellationToken::new();
    token.cancel();
    let err = coordinator
        .submit(second, None, SubmitOptions::new().with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::Cancelled { .. }));

    ledger.release_finality();
    assert_eq!(holder.await.unwrap().unwrap().state(), UpgradeState::Verified);
}

/// Tenet: cancelling during finality leaves a resumable submitted record.
#[tokio::test]
async fn cancelled_wait_is_resumable() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let target = address(0xd1);
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;

    ledger.hold_finality();
    let token = CancellationToken::new();
    let running = {
        let coordinator = Arc::clone(&coordinator);
        let options = SubmitOptions::new().with_cancellation(token.clone());
        tokio::spawn(async move { coordinator.submit(first, None, options).await })
    };
    until_invoked(&ledger, 1).await;
    token.cancel();

    let err = running.await.unwrap().unwrap_err();
    let UpgradeError::FinalityPending { sequence, transaction_id, .. } = &err else {
        panic!("expected pending finality, got {err}");
    };
    assert_eq!(*sequence, 1);
    assert_eq!(Some(transaction_id), err.transaction_id());
    assert!(err.is_retryable());

    // The submitted record blocks new upgrades of the target
    let pending = coordinator.log().pending(target).unwrap();
    assert_eq!(pending.state(), UpgradeState::Submitted);
    let next = plan(&coordinator, 0xd1, 0xc3, "c()").await;
    assert!(matches!(
        coordinator.submit(next, None, SubmitOptions::new()).await,
        Err(UpgradeError::UpgradeInFlight { .. })
    ));

    ledger.release_finality();
    let record = coordinator.resume(target, 1, SubmitOptions::new()).await.unwrap();
    assert_eq!(record.state(), UpgradeState::Verified);
    assert_eq!(record.id(), pending.id());
    assert_eq!(ledger.invocation_count(), 1);

    assert!(matches!(
        coordinator.resume(target, 1, SubmitOptions::new()).await,
        Err(UpgradeError::AlreadyFinalized {
            state: UpgradeState::Verified,
            ..
        })
    ));
    assert!(matches!(
        coordinator.resume(target, 9, SubmitOptions::new()).await,
        Err(UpgradeError::UnknownUpgrade { sequence: 9, .. })
    ));
}

/// Tenet: a caller deadline yields pending finality, not a failure.
#[tokio::test]
async fn deadline_yields_pending_finality() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;

    ledger.hold_finality();
    let err = coordinator
        .submit(first, None, SubmitOptions::new().with_timeout(Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::FinalityPending { sequence: 1, .. }));
    assert_eq!(err.class(), ErrorClass::Finality);

    // A short configured timeout behaves the same when resuming
    let impatient = UpgradeCoordinator::with_log(
        ledger.clone(),
        CoordinatorConfig::default().with_finality_timeout(Duration::from_millis(20)),
        coordinator.shared_log(),
    );
    assert!(matches!(
        impatient.resume(address(0xd1), 1, SubmitOptions::new()).await,
        Err(UpgradeError::FinalityPending { .. })
    ));

    ledger.release_finality();
    let record = impatient.resume(address(0xd1), 1, SubmitOptions::new()).await.unwrap();
    assert_eq!(record.state(), UpgradeState::Verified);
    assert_eq!(coordinator.log().history(address(0xd1)).len(), 1);
}

/// Tenet: a transaction the ledger no longer knows is not retried forever;
/// an operator abandons it and the target accepts upgrades again.
#[tokio::test]
async fn lost_transaction_is_abandoned_by_operator() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let target = address(0xd1);
    let first = plan(&coordinator, 0xd1, 0xa1, "a()").await;

    ledger.forget_transactions(true);
    let err = coordinator.submit(first, None, SubmitOptions::new()).await.unwrap_err();
    let UpgradeError::FinalityUnknown { sequence, source, .. } = &err else {
        panic!("expected unknown finality, got {err}");
    };
    assert_eq!(*sequence, 1);
    assert!(matches!(source, LedgerError::UnknownTransaction(_)));
    assert_eq!(err.class(), ErrorClass::Finality);
    assert!(err.requires_operator());
    assert!(!err.is_retryable());
    assert!(err.transaction_id().is_some());

    // Resuming hits the same wall instead of reporting pending finality
    assert!(matches!(
        coordinator.resume(target, 1, SubmitOptions::new()).await,
        Err(UpgradeError::FinalityUnknown { sequence: 1, .. })
    ));
    let blocked = plan(&coordinator, 0xd1, 0xb2, "b()").await;
    assert!(matches!(
        coordinator.submit(blocked, None, SubmitOptions::new()).await,
        Err(UpgradeError::UpgradeInFlight { .. })
    ));

    let record = coordinator.abandon(target, 1, "dropped by node").await.unwrap();
    assert_eq!(record.state(), UpgradeState::Abandoned);
    assert_eq!(record.abandon_reason(), Some("dropped by node"));
    assert!(coordinator.log().pending(target).is_none());
    assert!(matches!(
        coordinator.abandon(target, 1, "again").await,
        Err(UpgradeError::AlreadyFinalized {
            state: UpgradeState::Abandoned,
            ..
        })
    ));
    assert!(matches!(
        coordinator.resume(target, 1, SubmitOptions::new()).await,
        Err(UpgradeError::AlreadyFinalized {
            state: UpgradeState::Abandoned,
            ..
        })
    ));
    assert!(matches!(
        coordinator.abandon(target, 9, "missing").await,
        Err(UpgradeError::UnknownUpgrade { sequence: 9, .. })
    ));

    // The next plan starts from whatever routing actually landed
    ledger.forget_transactions(false);
    let next = plan(&coordinator, 0xd1, 0xb2, "b()").await;
    let record = coordinator.submit(next, None, SubmitOptions::new()).await.unwrap();
    assert_eq!(record.state(), UpgradeState::Verified);
    assert_eq!(record.sequence(), 2);
    assert_eq!(ledger.invocation_count(), 2);
    coordinator.log().verify_integrity().unwrap();
}
