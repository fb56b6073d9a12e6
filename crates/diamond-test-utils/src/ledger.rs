//! In-memory simulated diamond ledger
//!
//! Keeps one routing table per target and applies cuts with the same
//! preconditions a real diamond enforces. Faults can be injected per
//! ledger method.

use alloy_primitives::Address;
use diamond_ledger::{
    CostBudget, FacetEntry, FacetPage, FinalityResult, LedgerCall, LedgerClient, LedgerError,
    LoupeQuery, QueryResponse, TransactionId,
};
use diamond_registry::RoutingTable;
use diamond_selector::Selector;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Cost returned by estimation unless overridden
pub const DEFAULT_ESTIMATE: u64 = 150_000;

/// A recorded `invoke`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: Address,
    pub call: LedgerCall,
    pub budget: CostBudget,
    pub tx: TransactionId,
}

#[derive(Debug, Default)]
struct Faults {
    fail_queries: bool,
    fail_estimates: bool,
    fail_invoke: bool,
    reject_next: Option<String>,
    hold_finality: bool,
    forget: bool,
    tamper: Vec<Selector>,
}

#[derive(Debug, Default)]
struct State {
    diamonds: HashMap<Address, RoutingTable>,
    outcomes: HashMap<TransactionId, FinalityResult>,
    invocations: Vec<Invocation>,
    faults: Faults,
    estimate: Option<u64>,
    queries: usize,
    estimates: usize,
    next_tx: u64,
}

/// Simulated diamond ledger
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    release: Notify,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a target with an existing routing table
    pub fn with_diamond(self, target: Address, table: RoutingTable) -> Self {
        self.state.lock().diamonds.insert(target, table);
        self
    }

    /// Current routing table of a target
    pub fn routing(&self, target: Address) -> RoutingTable {
        self.state
            .lock()
            .diamonds
            .get(&target)
            .cloned()
            .unwrap_or_default()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().invocations.clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.state.lock().invocations.len()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn estimate_count(&self) -> usize {
        self.state.lock().estimates
    }

    pub fn set_estimate(&self, units: u64) {
        self.state.lock().estimate = Some(units);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().faults.fail_queries = fail;
    }

    pub fn fail_estimates(&self, fail: bool) {
        self.state.lock().faults.fail_estimates = fail;
    }

    pub fn fail_invoke(&self, fail: bool) {
        self.state.lock().faults.fail_invoke = fail;
    }

    /// Reject the next submission with `reason`, leaving routing untouched
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.state.lock().faults.reject_next = Some(reason.into());
    }

    /// Unbind `selectors` right after the next successful cut
    pub fn tamper_after_apply(&self, selectors: Vec<Selector>) {
        self.state.lock().faults.tamper = selectors;
    }

    /// Make `await_finality` block until [`release_finality`](Self::release_finality)
    pub fn hold_finality(&self) {
        self.state.lock().faults.hold_finality = true;
    }

    pub fn release_finality(&self) {
        self.state.lock().faults.hold_finality = false;
        self.release.notify_waiters();
    }

    /// Answer `await_finality` with `UnknownTransaction`, as after a reorg
    /// or a node that pruned the transaction
    pub fn forget_transactions(&self, forget: bool) {
        self.state.lock().faults.forget = forget;
    }

    fn page(table: &RoutingTable, offset: usize, limit: usize) -> FacetPage {
        let facets: Vec<FacetEntry> = table
            .modules()
            .into_iter()
            .map(|module| FacetEntry {
                module,
                selectors: table.selectors_for(module),
            })
            .collect();

        let end = offset.saturating_add(limit).min(facets.len());
        let start = offset.min(end);
        FacetPage {
            facets: facets[start..end].to_vec(),
            next_offset: (end < facets.len()).then_some(end),
        }
    }
}

#[async_trait::async_trait]
impl LedgerClient for InMemoryLedger {
    async fn query(&self, target: Address, query: LoupeQuery) -> Result<QueryResponse, LedgerError> {
        let mut state = self.state.lock();
        state.queries += 1;
        if state.faults.fail_queries {
            return Err(LedgerError::Transport("loupe unavailable".into()));
        }

        let LoupeQuery::Facets { offset, limit } = query;
        let table = state.diamonds.get(&target).cloned().unwrap_or_default();
        Ok(QueryResponse::Facets(Self::page(&table, offset, limit)))
    }

    async fn estimate_cost(&self, _target: Address, _call: &LedgerCall) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.estimates += 1;
        if state.faults.fail_estimates {
            return Err(LedgerError::Reverted {
                reason: "estimation failed".into(),
            });
        }
        Ok(state.estimate.unwrap_or(DEFAULT_ESTIMATE))
    }

    async fn invoke(
        &self,
        target: Address,
        call: &LedgerCall,
        budget: CostBudget,
    ) -> Result<TransactionId, LedgerError> {
        let mut state = self.state.lock();
        if state.faults.fail_invoke {
            return Err(LedgerError::Transport("connection refused".into()));
        }

        state.next_tx += 1;
        let tx = TransactionId::new(format!("0x{:064x}", state.next_tx));

        let LedgerCall::DiamondCut { operations, .. } = call;
        let outcome = if let Some(reason) = state.faults.reject_next.take() {
            FinalityResult::Rejected { reason }
        } else {
            let current = state.diamonds.get(&target).cloned().unwrap_or_default();
            match current.applied(operations) {
                Ok(mut next) => {
                    let tamper = std::mem::take(&mut state.faults.tamper);
                    if !tamper.is_empty() {
                        next = next.iter().filter(|(s, _)| !tamper.contains(s)).collect();
                    }
                    state.diamonds.insert(target, next);
                    FinalityResult::Success
                }
                Err(rejection) => FinalityResult::Rejected {
                    reason: rejection.to_string(),
                },
            }
        };

        state.outcomes.insert(tx.clone(), outcome);
        state.invocations.push(Invocation {
            target,
            call: call.clone(),
            budget,
            tx: tx.clone(),
        });
        Ok(tx)
    }

    async fn await_finality(
        &self,
        tx: &TransactionId,
        deadline: Option<Instant>,
    ) -> Result<FinalityResult, LedgerError> {
        loop {
            // Register before checking so a release in between is not missed
            let released = self.release.notified();
            {
                let state = self.state.lock();
                if !state.faults.hold_finality {
                    return state
                        .outcomes
                        .get(tx)
                        .filter(|_| !state.faults.forget)
                        .cloned()
                        .ok_or_else(|| LedgerError::UnknownTransaction(tx.clone()));
                }
            }

            match deadline {
                Some(at) => {
                    if tokio::time::timeout_at(at, released).await.is_err() {
                        return Err(LedgerError::Timeout);
                    }
                }
                None => released.await,
            }
        }
    }
}
