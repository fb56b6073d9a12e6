//! Ledger client collaborator
//!
//! The coordinator never talks to a network directly. Everything it needs
//! from the ledger (loupe reads, cost estimation, submission and finality)
//! goes through [`LedgerClient`], supplied by the embedding application.

use crate::cut::CutOperation;
use crate::error::LedgerError;
use alloy_primitives::{Address, Bytes};
use diamond_selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use tokio::time::Instant;

/// Canonical signature of the diamond cut entry point
pub const DIAMOND_CUT_SIGNATURE: &str = "diamondCut((address,uint8,bytes4[])[],address,bytes)";

/// Opaque identifier of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap a ledger-issued identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution cost budget attached to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostBudget(u64);

impl CostBudget {
    /// Create budget in ledger cost units
    #[inline]
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Budget in ledger cost units
    #[inline]
    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }
}

impl Display for CostBudget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Initialization call executed in the same transaction as a cut
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Initializer {
    address: Address,
    calldata: Bytes,
}

impl Initializer {
    /// Create initializer targeting `address` with encoded `calldata`
    #[inline]
    #[must_use]
    pub fn new(address: Address, calldata: impl Into<Bytes>) -> Self {
        Self {
            address,
            calldata: calldata.into(),
        }
    }

    /// Contract delegate-called after the cut
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Encoded call data
    #[inline]
    #[must_use]
    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }
}

/// State-changing call submitted to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerCall {
    /// Atomic diamond cut with optional initializer
    DiamondCut {
        /// Ordered cut operations
        operations: Vec<CutOperation>,
        /// Initializer run after the routing change
        initializer: Option<Initializer>,
    },
}

impl LedgerCall {
    /// Build a diamond cut call
    #[inline]
    #[must_use]
    pub fn diamond_cut(operations: Vec<CutOperation>, initializer: Option<Initializer>) -> Self {
        Self::DiamondCut {
            operations,
            initializer,
        }
    }

    /// Selector of the invoked entry point
    #[must_use]
    pub fn selector(&self) -> Selector {
        match self {
            Self::DiamondCut { .. } => Selector::from_canonical(DIAMOND_CUT_SIGNATURE),
        }
    }
}

/// Read-only loupe query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoupeQuery {
    /// Page of "all facets and their selectors"
    Facets {
        /// Index of the first facet to return
        offset: usize,
        /// Maximum facets to return
        limit: usize,
    },
}

/// One facet as reported by the loupe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetEntry {
    /// Facet address
    pub module: Address,

    /// Selectors routed to it
    pub selectors: Vec<Selector>,
}

/// Page of loupe facets
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FacetPage {
    /// Facets on this page
    pub facets: Vec<FacetEntry>,

    /// Offset of the next page, `None` on the last one
    pub next_offset: Option<usize>,
}

/// Response to a [`LoupeQuery`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResponse {
    /// Answer to [`LoupeQuery::Facets`]
    Facets(FacetPage),
}

/// Outcome of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalityResult {
    /// Executed and committed
    Success,
    /// Reverted or otherwise refused; no state change
    Rejected {
        /// Ledger-provided reason
        reason: String,
    },
}

impl FinalityResult {
    /// Check for success
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Ledger capability used by the coordinator
///
/// Implementations own connectivity, signing and fee strategy. Every method
/// is a suspension point; none of them is retried by the caller.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Execute a read-only loupe query against `target`
    async fn query(&self, target: Address, query: LoupeQuery) -> Result<QueryResponse, LedgerError>;

    /// Estimate the cost of `call` against `target`
    async fn estimate_cost(&self, target: Address, call: &LedgerCall) -> Result<u64, LedgerError>;

    /// Submit `call` against `target` with the given budget
    async fn invoke(
        &self,
        target: Address,
        call: &LedgerCall,
        budget: CostBudget,
    ) -> Result<TransactionId, LedgerError>;

    /// Wait for `tx` to reach finality
    ///
    /// Implementations should give up with `LedgerError::Timeout` once
    /// `deadline` passes.
    async fn await_finality(
        &self,
        tx: &TransactionId,
        deadline: Option<Instant>,
    ) -> Result<FinalityResult, LedgerError>;
}
