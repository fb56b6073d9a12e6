//! Facet registry
//!
//! A [`FacetRegistry`] is the routing table of one target diamond, obtained
//! either from the live loupe or by replaying recorded cut history. A live
//! read that cannot be trusted is reported as [`LiveQuery::Degraded`] so it
//! can never be mistaken for a genuinely empty diamond.

use crate::diff::RoutingDiff;
use crate::table::{IndexedRejection, RoutingTable};
use alloy_primitives::Address;
use diamond_ledger::{CutOperation, LedgerClient, LoupeQuery, QueryResponse};
use diamond_selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use tracing::{debug, warn};

/// Routing table of one target diamond
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRegistry {
    target: Address,
    table: RoutingTable,
}

impl FacetRegistry {
    /// Empty registry for `target`
    #[inline]
    #[must_use]
    pub fn new(target: Address) -> Self {
        Self::from_table(target, RoutingTable::new())
    }

    /// Registry over an existing table
    #[inline]
    #[must_use]
    pub fn from_table(target: Address, table: RoutingTable) -> Self {
        Self { target, table }
    }

    /// Read the live routing table through the loupe
    ///
    /// Pages through "all facets" `page_size` at a time. A failed page, a
    /// page that does not advance, or one selector reported under two
    /// facets yields [`LiveQuery::Degraded`] with an empty registry.
    pub async fn query_live(ledger: &dyn LedgerClient, target: Address, page_size: usize) -> LiveQuery {
        let limit = page_size.max(1);
        let mut table = RoutingTable::new();
        let mut offset = 0usize;
        let mut pages = 0usize;

        loop {
            let page = match ledger.query(target, LoupeQuery::Facets { offset, limit }).await {
                Ok(QueryResponse::Facets(page)) => page,
                Err(e) => {
                    return LiveQuery::degraded(
                        target,
                        DegradedReason::QueryFailed {
                            offset,
                            error: e.to_string(),
                        },
                    );
                }
            };
            pages += 1;

            for facet in &page.facets {
                for selector in &facet.selectors {
                    match table.lookup(*selector) {
                        Some(first) if first != facet.module => {
                            return LiveQuery::degraded(
                                target,
                                DegradedReason::AmbiguousRouting {
                                    selector: *selector,
                                    first,
                                    second: facet.module,
                                },
                            );
                        }
                        Some(_) => {}
                        None => table.bind(*selector, facet.module),
                    }
                }
            }

            match page.next_offset {
                None => break,
                Some(next) if next <= offset => {
                    return LiveQuery::degraded(target, DegradedReason::NoProgress { offset });
                }
                Some(next) => offset = next,
            }
        }

        debug!(%target, pages, selectors = table.len(), "live registry read");
        LiveQuery::Complete(Self::from_table(target, table))
    }

    /// Rebuild a registry by folding recorded cut operations from empty
    ///
    /// # Errors
    /// Returns `ReplayError` if the history does not apply cleanly
    pub fn replay<'a, I>(target: Address, operations: I) -> Result<Self, ReplayError>
    where
        I: IntoIterator<Item = &'a CutOperation>,
    {
        let mut table = RoutingTable::new();
        for (index, op) in operations.into_iter().enumerate() {
            table.apply_cut(op).map_err(|rejection| ReplayError {
                target,
                source: IndexedRejection { index, rejection },
            })?;
        }
        Ok(Self::from_table(target, table))
    }

    /// Compare this (live) registry against another view of the same target
    ///
    /// Returns `RegistryDrift` when they disagree; `other` is treated as
    /// the expected side.
    #[must_use]
    pub fn cross_check(&self, other: &FacetRegistry) -> Option<RegistryWarning> {
        let diff = RoutingDiff::between(&other.table, &self.table);
        if diff.is_empty() {
            return None;
        }
        warn!(target = %self.target, %diff, "registry drift detected");
        Some(RegistryWarning::RegistryDrift {
            target: self.target,
            diff,
        })
    }

    /// Target diamond address
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }

    /// Module a selector routes to
    #[inline]
    #[must_use]
    pub fn lookup(&self, selector: Selector) -> Option<Address> {
        self.table.lookup(selector)
    }

    /// Selectors routed to `module`
    #[inline]
    #[must_use]
    pub fn all_selectors_for(&self, module: Address) -> Vec<Selector> {
        self.table.selectors_for(module)
    }

    /// Borrow the routing table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Owned copy of the routing table
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> RoutingTable {
        self.table.clone()
    }

    /// Check if no selector is routed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Outcome of a live registry read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveQuery {
    /// Every page was read; the registry may be genuinely empty
    Complete(FacetRegistry),

    /// The read could not be trusted; `registry` is empty
    Degraded {
        /// Empty registry for the target
        registry: FacetRegistry,
        /// What went wrong
        warning: RegistryWarning,
    },
}

impl LiveQuery {
    fn degraded(target: Address, reason: DegradedReason) -> Self {
        warn!(%target, %reason, "live registry query degraded");
        Self::Degraded {
            registry: FacetRegistry::new(target),
            warning: RegistryWarning::RegistryQueryDegraded { target, reason },
        }
    }

    /// Check if the read was degraded
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Registry carried by either outcome
    #[must_use]
    pub fn registry(&self) -> &FacetRegistry {
        match self {
            Self::Complete(registry) | Self::Degraded { registry, .. } => registry,
        }
    }

    /// Warning for a degraded read
    #[must_use]
    pub fn warning(&self) -> Option<&RegistryWarning> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { warning, .. } => Some(warning),
        }
    }

    /// Split into registry and optional warning
    #[must_use]
    pub fn into_parts(self) -> (FacetRegistry, Option<RegistryWarning>) {
        match self {
            Self::Complete(registry) => (registry, None),
            Self::Degraded { registry, warning } => (registry, Some(warning)),
        }
    }
}

/// Why a live read was degraded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedReason {
    /// A page read failed
    QueryFailed {
        /// Offset of the failed page
        offset: usize,
        /// Ledger error text
        error: String,
    },

    /// The ledger returned a next offset that does not advance
    NoProgress {
        /// Offset that was repeated
        offset: usize,
    },

    /// One selector reported under two facets
    AmbiguousRouting {
        /// Selector reported twice
        selector: Selector,
        /// First facet seen
        first: Address,
        /// Second facet seen
        second: Address,
    },
}

impl Display for DegradedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryFailed { offset, error } => {
                write!(f, "page at offset {offset} failed: {error}")
            }
            Self::NoProgress { offset } => write!(f, "pagination stalled at offset {offset}"),
            Self::AmbiguousRouting {
                selector,
                first,
                second,
            } => write!(f, "{selector} reported under both {first} and {second}"),
        }
    }
}

/// Non-fatal registry conditions carried on plans and records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryWarning {
    /// Live read could not be trusted
    #[error("registry query degraded for {target}: {reason}")]
    RegistryQueryDegraded {
        /// Target diamond
        target: Address,
        /// Cause
        reason: DegradedReason,
    },

    /// Live table disagrees with replayed history
    #[error("registry drift for {target}: {diff}")]
    RegistryDrift {
        /// Target diamond
        target: Address,
        /// Replayed (expected) versus live (actual)
        diff: RoutingDiff,
    },
}

/// Recorded cut history that does not apply cleanly
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot replay history of {target}: {source}")]
pub struct ReplayError {
    /// Target diamond
    pub target: Address,

    /// Failing operation
    #[source]
    pub source: IndexedRejection,
}
