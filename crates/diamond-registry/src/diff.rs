//! Routing table differences

use crate::table::RoutingTable;
use alloy_primitives::Address;
use diamond_selector::Selector;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A selector bound to a different module than expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebinding {
    /// Affected selector
    pub selector: Selector,
    /// Module it should route to
    pub expected: Address,
    /// Module it routes to
    pub actual: Address,
}

/// Difference between an expected and an actual routing table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDiff {
    /// Expected bindings absent from the actual table
    pub missing: Vec<(Selector, Address)>,

    /// Actual bindings the expected table does not have
    pub unexpected: Vec<(Selector, Address)>,

    /// Selectors present in both but routed differently
    pub rebound: Vec<Rebinding>,
}

impl RoutingDiff {
    /// Compare `actual` against `expected`
    ///
    /// Entries follow the order of the table they were found in.
    #[must_use]
    pub fn between(expected: &RoutingTable, actual: &RoutingTable) -> Self {
        let mut diff = Self::default();

        for (selector, want) in expected.iter() {
            match actual.lookup(selector) {
                None => diff.missing.push((selector, want)),
                Some(got) if got != want => diff.rebound.push(Rebinding {
                    selector,
                    expected: want,
                    actual: got,
                }),
                Some(_) => {}
            }
        }

        diff.unexpected = actual
            .iter()
            .filter(|(selector, _)| !expected.contains(*selector))
            .collect();

        diff
    }

    /// Check if the tables matched
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.rebound.is_empty()
    }

    /// Total number of differing selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.missing.len() + self.unexpected.len() + self.rebound.len()
    }
}

impl Display for RoutingDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} missing, {} unexpected, {} rebound",
            self.missing.len(),
            self.unexpected.len(),
            self.rebound.len()
        )
    }
}
