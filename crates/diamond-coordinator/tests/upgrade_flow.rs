//! End-to-end upgrade tests against the in-memory ledger.
//!
//! Core guarantees exercised here:
//! - A plan moves the live routing table to exactly the desired state and is
//!   only reported successful after a verifying re-read.
//! - A rejected cut leaves routing untouched and is logged as rejected.
//! - Budgets carry the safety margin, including the fallback path.
//! - Stale plans and empty plans are refused before anything is sent.

use diamond_coordinator::{
    BudgetSource, CoordinatorConfig, ErrorClass, SubmitOptions, UpgradeCoordinator, UpgradeError,
    UpgradeState, VerificationFailure,
};
use diamond_ledger::{CostBudget, CutAction, CutOperation, Initializer, LedgerClient};
use diamond_planner::{CutPlanner, PlanningError};
use diamond_registry::RegistryWarning;
use diamond_test_utils::{
    address, init_tracing, module, selector, table, target, InMemoryLedger, DEFAULT_ESTIMATE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn coordinator(ledger: &Arc<InMemoryLedger>, config: CoordinatorConfig) -> UpgradeCoordinator {
    let client: Arc<dyn LedgerClient> = ledger.clone();
    UpgradeCoordinator::new(client, config)
}

/// Fresh diamond: one Add group, then both selectors route to the module.
#[tokio::test]
async fn fresh_diamond_gets_single_add() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let module_a = module(0xa1, &["add(uint256,uint256)", "sub(uint256,uint256)"]);

    let plan = coordinator
        .plan_upgrade(target(), &[module_a], &CutPlanner::new())
        .await
        .unwrap();
    assert_eq!(plan.operations().len(), 1);
    let op = &plan.operations()[0];
    assert_eq!(op.module, address(0xa1));
    assert_eq!(op.action, CutAction::Add);
    assert_eq!(
        op.selectors,
        vec![selector("add(uint256,uint256)"), selector("sub(uint256,uint256)")]
    );

    let record = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();
    assert_eq!(record.state(), UpgradeState::Verified);
    assert!(record.is_finalized());
    assert_eq!(record.sequence(), 1);

    let live = coordinator.current_registry(target()).await;
    assert!(!live.is_degraded());
    assert_eq!(live.registry().lookup(selector("add(uint256,uint256)")), Some(address(0xa1)));
    assert_eq!(live.registry().lookup(selector("sub(uint256,uint256)")), Some(address(0xa1)));
    assert_eq!(record.post_routing(), Some(&ledger.routing(target())));
}

/// A selector moving from X to Y is one Replace on Y and nothing for X.
#[tokio::test]
async fn moved_selector_is_replaced() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new().with_diamond(target(), table(&[("name()", 0x0a)])));
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let plan = coordinator
        .plan_upgrade(target(), &[module(0x0b, &["name()"])], &CutPlanner::new())
        .await
        .unwrap();
    assert_eq!(plan.operations().len(), 1);
    assert_eq!(plan.operations()[0].module, address(0x0b));
    assert_eq!(plan.operations()[0].action, CutAction::Replace);
    assert_eq!(plan.operations()[0].selectors, vec![selector("name()")]);

    coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();
    assert_eq!(ledger.routing(target()).lookup(selector("name()")), Some(address(0x0b)));
}

/// Selectors absent from the desired state are removed with the null module.
#[tokio::test]
async fn dropped_selector_is_removed() {
    init_tracing();
    let ledger = Arc::new(
        InMemoryLedger::new().with_diamond(target(), table(&[("name()", 0x0c), ("retrieve()", 0x0c)])),
    );
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let plan = coordinator
        .plan_upgrade(target(), &[module(0x0c, &["name()"])], &CutPlanner::new())
        .await
        .unwrap();
    assert_eq!(plan.operations().len(), 1);
    let op = &plan.operations()[0];
    assert_eq!(op.action, CutAction::Remove);
    assert!(op.module.is_zero());
    assert_eq!(op.selectors, vec![selector("retrieve()")]);

    coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();
    let live = coordinator.current_registry(target()).await;
    assert_eq!(live.registry().lookup(selector("retrieve()")), None);
    assert_eq!(live.registry().lookup(selector("name()")), Some(address(0x0c)));
}

/// Cut and initializer reach the ledger as one call.
#[tokio::test]
async fn initializer_travels_with_the_cut() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["init()", "value()"])], &CutPlanner::new())
        .await
        .unwrap();

    let init = Initializer::new(address(0xa1), vec![0xe1u8, 0x00]);
    let record = coordinator
        .submit(plan, Some(init.clone()), SubmitOptions::new())
        .await
        .unwrap();

    let invocations = ledger.invocations();
    assert_eq!(invocations.len(), 1);
    let diamond_ledger::LedgerCall::DiamondCut { initializer, .. } = &invocations[0].call;
    assert_eq!(initializer.as_ref(), Some(&init));
    assert_eq!(record.initializer(), Some(&init));
}

/// Ledger rejection: routing untouched, error surfaced, record terminal.
#[tokio::test]
async fn rejected_cut_leaves_routing_unchanged() {
    init_tracing();
    let before = table(&[("name()", 0x0a)]);
    let ledger = Arc::new(InMemoryLedger::new().with_diamond(target(), before.clone()));
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let live_before = coordinator.current_registry(target()).await.registry().snapshot();
    assert_eq!(live_before, before);

    let plan = coordinator
        .plan_upgrade(target(), &[module(0x0a, &["name()", "symbol()"])], &CutPlanner::new())
        .await
        .unwrap();
    ledger.reject_next("initializer reverted");

    let err = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap_err();
    match &err {
        UpgradeError::UpgradeRejected { reason, .. } => assert_eq!(reason, "initializer reverted"),
        other => panic!("expected rejection, got {other}"),
    }
    assert_eq!(err.class(), ErrorClass::Submission);
    let live_after = coordinator.current_registry(target()).await.registry().snapshot();
    assert_eq!(live_after, live_before);

    let history = coordinator.log().history(target());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state(), UpgradeState::FinalizedRejected);
    assert_eq!(history[0].rejection_reason(), Some("initializer reverted"));
}

/// Failed estimation: fallback 8,000,000 plus 20% is submitted.
#[tokio::test]
async fn fallback_budget_carries_margin() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.fail_estimates(true);
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    let record = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();

    assert_eq!(record.budget(), Some(CostBudget::new(9_600_000)));
    assert_eq!(record.budget_source(), Some(BudgetSource::Fallback));
    assert_eq!(ledger.invocations()[0].budget, CostBudget::new(9_600_000));
}

#[tokio::test]
async fn estimate_carries_margin() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default().with_safety_margin(50));

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    let record = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();

    assert_eq!(record.budget(), Some(CostBudget::new(DEFAULT_ESTIMATE * 3 / 2)));
    assert_eq!(record.budget_source(), Some(BudgetSource::Estimated));
    assert_eq!(ledger.estimate_count(), 1);
}

/// Routing that moves between planning and submission makes the plan stale.
#[tokio::test]
async fn stale_plan_is_refused_without_invoking() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let stale = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();

    // Someone else upgrades the target first
    let other = coordinator
        .plan_upgrade(target(), &[module(0xb2, &["b()"])], &CutPlanner::new())
        .await
        .unwrap();
    coordinator.submit(other, None, SubmitOptions::new()).await.unwrap();
    assert_eq!(ledger.invocation_count(), 1);

    let err = coordinator.submit(stale, None, SubmitOptions::new()).await.unwrap_err();
    match &err {
        UpgradeError::StalePlan { diff, .. } => {
            assert_eq!(diff.unexpected.len(), 1);
            assert!(diff.missing.is_empty());
        }
        other => panic!("expected stale plan, got {other}"),
    }
    assert!(err.is_retryable());
    assert_eq!(ledger.invocation_count(), 1);
}

/// Without preflight the same stale plan reaches the ledger and is rejected.
#[tokio::test]
async fn stale_plan_without_preflight_is_rejected_by_ledger() {
    let ledger = Arc::new(InMemoryLedger::new().with_diamond(target(), table(&[("a()", 0xa1)])));
    let coordinator = coordinator(&ledger, CoordinatorConfig::default().with_preflight_check(false));

    let plan = diamond_planner::CutPlan::from_operations(
        target(),
        diamond_registry::RoutingTable::new(),
        vec![diamond_ledger::CutOperation::add(address(0xa1), vec![selector("a()")])],
    )
    .unwrap();

    let err = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap_err();
    assert!(matches!(err, UpgradeError::UpgradeRejected { .. }));
    assert_eq!(ledger.invocation_count(), 1);
}

/// An empty plan never touches the ledger, initializer or not.
#[tokio::test]
async fn empty_plan_is_nothing_to_upgrade() {
    let ledger = Arc::new(InMemoryLedger::new().with_diamond(target(), table(&[("a()", 0xa1)])));
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    assert!(plan.is_empty());
    let queries = ledger.query_count();

    let init = Initializer::new(address(0xa1), vec![0x01u8]);
    let err = coordinator.submit(plan, Some(init), SubmitOptions::new()).await.unwrap_err();
    assert!(matches!(err, UpgradeError::NothingToUpgrade { .. }));
    assert_eq!(ledger.query_count(), queries);
    assert_eq!(ledger.estimate_count(), 0);
    assert_eq!(ledger.invocation_count(), 0);
    assert!(coordinator.log().is_empty());
}

/// Invalid descriptors fail before the ledger is read.
#[tokio::test]
async fn conflicting_descriptors_fail_locally() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let err = coordinator
        .plan_upgrade(
            target(),
            &[
                module(0xa1, &["transfer(address,uint256)"]),
                module(0xb2, &["transfer(address to, uint256 amount)"]),
            ],
            &CutPlanner::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UpgradeError::Planning(PlanningError::SelectorOwnershipConflict { .. })
    ));
    assert_eq!(ledger.query_count(), 0);
}

/// A submission the ledger refuses leaves no log entry.
#[tokio::test]
async fn submission_failure_is_not_logged() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();

    ledger.fail_invoke(true);
    let err = coordinator.submit(plan.clone(), None, SubmitOptions::new()).await.unwrap_err();
    assert!(matches!(err, UpgradeError::SubmissionFailed { .. }));
    assert!(err.is_retryable());
    assert!(coordinator.log().is_empty());

    ledger.fail_invoke(false);
    let record = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();
    assert_eq!(record.sequence(), 1);
}

/// Routing that differs after a successful cut is a verification failure.
#[tokio::test]
async fn tampered_post_state_fails_verification() {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()", "b()"])], &CutPlanner::new())
        .await
        .unwrap();

    ledger.tamper_after_apply(vec![selector("b()")]);
    let err = coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap_err();

    match &err {
        UpgradeError::PostUpgradeVerificationFailed {
            cause: VerificationFailure::Mismatch { diff },
            ..
        } => assert_eq!(diff.missing, vec![(selector("b()"), address(0xa1))]),
        other => panic!("expected verification mismatch, got {other}"),
    }
    assert!(err.requires_operator());

    let record = coordinator.log().latest(target(), 1).unwrap();
    assert_eq!(record.state(), UpgradeState::VerificationFailed);
    assert!(record.is_finalized());
    assert_eq!(record.post_routing(), Some(&ledger.routing(target())));
}

/// An unreadable post-state is never reported as verified.
#[tokio::test]
async fn degraded_post_read_fails_verification() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());
    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();

    ledger.hold_finality();
    let submit = coordinator.submit(plan, None, SubmitOptions::new());
    let break_loupe = async {
        tokio::task::yield_now().await;
        ledger.fail_queries(true);
        ledger.release_finality();
    };
    let (result, ()) = tokio::join!(submit, break_loupe);

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        UpgradeError::PostUpgradeVerificationFailed {
            cause: VerificationFailure::Degraded { .. },
            ..
        }
    ));
    let record = coordinator.log().latest(target(), 1).unwrap();
    assert_eq!(record.state(), UpgradeState::VerificationFailed);
    assert!(record.post_routing().is_none());
    assert!(matches!(
        record.warnings().last(),
        Some(RegistryWarning::RegistryQueryDegraded { .. })
    ));
}

/// A degraded planning read is flagged on the plan.
#[tokio::test]
async fn degraded_planning_read_is_flagged() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.fail_queries(true);
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    let live = coordinator.current_registry(target()).await;
    assert!(live.is_degraded());

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    assert_eq!(plan.warnings().len(), 1);
    assert!(matches!(
        plan.warnings()[0],
        RegistryWarning::RegistryQueryDegraded { .. }
    ));
}

/// Live routing that drifted from logged history is flagged while planning.
#[tokio::test]
async fn replay_cross_check_flags_drift() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default().with_replay_cross_check(true));

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    assert!(plan.warnings().is_empty());
    coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();

    // Out-of-band change the log never saw
    ledger.tamper_after_apply(vec![selector("a()")]);
    ledger
        .invoke(
            target(),
            &diamond_ledger::LedgerCall::diamond_cut(
                vec![diamond_ledger::CutOperation::add(address(0xee), vec![selector("z()")])],
                None,
            ),
            CostBudget::new(1),
        )
        .await
        .unwrap();

    let plan = coordinator
        .plan_upgrade(target(), &[module(0xa1, &["a()"])], &CutPlanner::new())
        .await
        .unwrap();
    match plan.warnings() {
        [RegistryWarning::RegistryDrift { diff, .. }] => {
            assert_eq!(diff.missing, vec![(selector("a()"), address(0xa1))]);
            assert_eq!(diff.unexpected, vec![(selector("z()"), address(0xee))]);
        }
        other => panic!("expected one drift warning, got {other:?}"),
    }
}

/// Every state from Submitted on is logged, in order, with an intact chain.
#[tokio::test]
async fn log_records_each_transition() {
    let ledger = Arc::new(InMemoryLedger::new());
    let coordinator = coordinator(&ledger, CoordinatorConfig::default());

    for (n, sig) in [(0xa1, "a()"), (0xb2, "b()")] {
        let plan = coordinator
            .plan_upgrade(target(), &[module(n, &[sig])], &CutPlanner::new())
            .await
            .unwrap();
        coordinator.submit(plan, None, SubmitOptions::new()).await.unwrap();
    }

    let states: Vec<_> = coordinator
        .log()
        .entries()
        .iter()
        .map(|e| (e.sequence, e.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (1, UpgradeState::Submitted),
            (1, UpgradeState::FinalizedSuccess),
            (1, UpgradeState::Verified),
            (2, UpgradeState::Submitted),
            (2, UpgradeState::FinalizedSuccess),
            (2, UpgradeState::Verified),
        ]
    );
    coordinator.log().verify_integrity().unwrap();
    assert_eq!(
        coordinator.log().applied_operations(target()),
        vec![
            CutOperation::add(address(0xa1), vec![selector("a()")]),
            CutOperation::add(address(0xb2), vec![selector("b()")]),
            CutOperation::remove(vec![selector("a()")]),
        ]
    );

    let history = coordinator.log().history(target());
    assert_ne!(history[0].id(), history[1].id());
    assert_eq!(history[0].plan_digest(), history[0].plan().digest());
}
