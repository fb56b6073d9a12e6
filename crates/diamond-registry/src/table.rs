//! Selector routing table
//!
//! [`RoutingTable`] is the pure-data model of a diamond's dispatch table:
//! each selector routes to at most one module address. Cut operations are
//! applied with the same preconditions the on-ledger cut enforces.

use alloy_primitives::Address;
use diamond_ledger::{CutAction, CutError, CutOperation};
use diamond_selector::Selector;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered `selector -> module` map
///
/// Equality compares the mappings and ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    routes: IndexMap<Selector, Address>,
}

impl RoutingTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Module a selector routes to
    #[inline]
    #[must_use]
    pub fn lookup(&self, selector: Selector) -> Option<Address> {
        self.routes.get(&selector).copied()
    }

    /// Check if a selector is bound
    #[inline]
    #[must_use]
    pub fn contains(&self, selector: Selector) -> bool {
        self.routes.contains_key(&selector)
    }

    /// Selectors routed to `module`, in table order
    #[must_use]
    pub fn selectors_for(&self, module: Address) -> Vec<Selector> {
        self.routes
            .iter()
            .filter(|(_, m)| **m == module)
            .map(|(s, _)| *s)
            .collect()
    }

    /// Distinct modules in order of first appearance
    #[must_use]
    pub fn modules(&self) -> Vec<Address> {
        let mut modules: Vec<Address> = Vec::new();
        for module in self.routes.values() {
            if !modules.contains(module) {
                modules.push(*module);
            }
        }
        modules
    }

    /// Iterate `(selector, module)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (Selector, Address)> + '_ {
        self.routes.iter().map(|(s, m)| (*s, *m))
    }

    /// Number of bound selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if nothing is bound
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Bind without cut preconditions, for tables read back from a ledger
    pub(crate) fn bind(&mut self, selector: Selector, module: Address) {
        self.routes.insert(selector, module);
    }

    /// Check an operation against this table without applying it
    ///
    /// # Errors
    /// - `CutRejection::Malformed` if the operation shape is invalid
    /// - `CutRejection::SelectorAlreadyBound` when Add meets a bound selector
    /// - `CutRejection::SelectorNotBound` when Replace/Remove meets an unbound one
    pub fn check_cut(&self, op: &CutOperation) -> Result<(), CutRejection> {
        op.validate()?;

        for selector in &op.selectors {
            match (op.action, self.lookup(*selector)) {
                (CutAction::Add, Some(module)) => {
                    return Err(CutRejection::SelectorAlreadyBound {
                        selector: *selector,
                        module,
                    });
                }
                (CutAction::Replace | CutAction::Remove, None) => {
                    return Err(CutRejection::SelectorNotBound {
                        selector: *selector,
                        action: op.action,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Apply one operation
    ///
    /// The table is unchanged when the operation is rejected. Replacing a
    /// selector with the module it already routes to is accepted.
    ///
    /// # Errors
    /// See [`RoutingTable::check_cut`]
    pub fn apply_cut(&mut self, op: &CutOperation) -> Result<(), CutRejection> {
        self.check_cut(op)?;

        for selector in &op.selectors {
            match op.action {
                CutAction::Add | CutAction::Replace => {
                    self.routes.insert(*selector, op.module);
                }
                CutAction::Remove => {
                    self.routes.shift_remove(selector);
                }
            }
        }

        Ok(())
    }

    /// Apply operations in order, all or nothing
    ///
    /// # Errors
    /// Returns the first rejection with its operation index; the table is
    /// left untouched.
    pub fn apply_all(&mut self, ops: &[CutOperation]) -> Result<(), IndexedRejection> {
        let next = self.applied(ops)?;
        *self = next;
        Ok(())
    }

    /// Copy of this table with `ops` applied
    ///
    /// # Errors
    /// Returns the first rejection with its operation index
    pub fn applied(&self, ops: &[CutOperation]) -> Result<Self, IndexedRejection> {
        let mut next = self.clone();
        for (index, op) in ops.iter().enumerate() {
            next.apply_cut(op)
                .map_err(|rejection| IndexedRejection { index, rejection })?;
        }
        Ok(next)
    }
}

impl FromIterator<(Selector, Address)> for RoutingTable {
    fn from_iter<T: IntoIterator<Item = (Selector, Address)>>(iter: T) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

/// Reasons a routing table refuses a cut operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CutRejection {
    /// Operation shape is invalid
    #[error(transparent)]
    Malformed(#[from] CutError),

    /// Add on a selector that already routes somewhere
    #[error("cannot add {selector}: already routed to {module}")]
    SelectorAlreadyBound {
        /// Offending selector
        selector: Selector,
        /// Current owner
        module: Address,
    },

    /// Replace or Remove on an unbound selector
    #[error("cannot {action} {selector}: not routed")]
    SelectorNotBound {
        /// Offending selector
        selector: Selector,
        /// Requested action
        action: CutAction,
    },
}

/// A rejection located within an operation sequence
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation {index} rejected: {rejection}")]
pub struct IndexedRejection {
    /// Position of the rejected operation
    pub index: usize,

    /// Why it was rejected
    #[source]
    pub rejection: CutRejection,
}
