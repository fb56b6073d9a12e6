//! Cost budgets
//!
//! The submitted budget is the ledger's estimate, or the configured fallback
//! when estimation fails, plus the safety margin. The margin applies to the
//! fallback too.

use crate::config::CoordinatorConfig;
use alloy_primitives::Address;
use diamond_ledger::{CostBudget, LedgerCall, LedgerClient};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Where the pre-margin cost came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSource {
    /// Ledger estimate
    Estimated,
    /// Configured fallback after a failed estimate
    Fallback,
}

/// Budget chosen for one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetDecision {
    /// Cost before the margin
    pub base: u64,
    /// Submitted budget
    pub budget: CostBudget,
    /// Origin of `base`
    pub source: BudgetSource,
}

/// `base * (100 + percent) / 100`, saturating
#[must_use]
pub fn with_margin(base: u64, percent: u32) -> u64 {
    let scaled = u128::from(base) * (100 + u128::from(percent)) / 100;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Estimate `call` and derive the submitted budget
pub async fn decide(
    ledger: &dyn LedgerClient,
    target: Address,
    call: &LedgerCall,
    config: &CoordinatorConfig,
) -> BudgetDecision {
    let (base, source) = match ledger.estimate_cost(target, call).await {
        Ok(estimate) => (estimate, BudgetSource::Estimated),
        Err(e) => {
            warn!(
                %target,
                error = %e,
                fallback = config.fallback_budget,
                "cost estimation failed, using fallback budget"
            );
            (config.fallback_budget, BudgetSource::Fallback)
        }
    };

    let budget = CostBudget::new(with_margin(base, config.safety_margin_percent));
    debug!(%target, base, %budget, ?source, "budget decided");

    BudgetDecision {
        base,
        budget,
        source,
    }
}
