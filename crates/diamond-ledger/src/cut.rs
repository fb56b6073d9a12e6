//! Diamond cut operations
//!
//! A [`CutOperation`] is one `(module, action, selectors)` triple of a
//! diamond cut. Operations are validated in isolation here; whether they
//! apply cleanly to a routing table is decided by the registry.

use alloy_primitives::Address;
use diamond_selector::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Routing change requested for a set of selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutAction {
    /// Bind unbound selectors to a module
    Add,
    /// Rebind bound selectors to a module
    Replace,
    /// Unbind bound selectors
    Remove,
}

impl CutAction {
    /// On-ledger action code (`FacetCutAction` ordinal)
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Replace => 1,
            Self::Remove => 2,
        }
    }

    /// Action for an on-ledger code
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Add),
            1 => Some(Self::Replace),
            2 => Some(Self::Remove),
            _ => None,
        }
    }
}

impl Display for CutAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// One entry of a diamond cut
///
/// Remove operations carry the null address; Add and Replace name the
/// module the selectors route to afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CutOperation {
    /// Target module, `Address::ZERO` for removals
    pub module: Address,

    /// Requested change
    pub action: CutAction,

    /// Affected selectors in order
    pub selectors: Vec<Selector>,
}

impl CutOperation {
    /// Create operation
    #[inline]
    #[must_use]
    pub fn new(module: Address, action: CutAction, selectors: Vec<Selector>) -> Self {
        Self {
            module,
            action,
            selectors,
        }
    }

    /// Add operation
    #[inline]
    #[must_use]
    pub fn add(module: Address, selectors: Vec<Selector>) -> Self {
        Self::new(module, CutAction::Add, selectors)
    }

    /// Replace operation
    #[inline]
    #[must_use]
    pub fn replace(module: Address, selectors: Vec<Selector>) -> Self {
        Self::new(module, CutAction::Replace, selectors)
    }

    /// Remove operation under the null address
    #[inline]
    #[must_use]
    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self::new(Address::ZERO, CutAction::Remove, selectors)
    }

    /// Number of selectors touched
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Check if the operation touches nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Check shape rules that do not depend on routing state
    ///
    /// # Errors
    /// - `CutError::EmptyCutOperation` when no selector is named
    /// - `CutError::NullModuleAddress` for Add/Replace under the null address
    /// - `CutError::RemoveWithModuleAddress` for Remove under a real address
    /// - `CutError::RepeatedSelector` when a selector appears twice
    pub fn validate(&self) -> Result<(), CutError> {
        if self.selectors.is_empty() {
            return Err(CutError::EmptyCutOperation {
                module: self.module,
                action: self.action,
            });
        }

        match self.action {
            CutAction::Add | CutAction::Replace if self.module == Address::ZERO => {
                return Err(CutError::NullModuleAddress {
                    action: self.action,
                });
            }
            CutAction::Remove if self.module != Address::ZERO => {
                return Err(CutError::RemoveWithModuleAddress {
                    module: self.module,
                });
            }
            _ => {}
        }

        let mut seen = HashSet::with_capacity(self.selectors.len());
        for selector in &self.selectors {
            if !seen.insert(*selector) {
                return Err(CutError::RepeatedSelector {
                    selector: *selector,
                });
            }
        }

        Ok(())
    }

    /// Append the canonical byte encoding used for plan digests
    ///
    /// Layout: 20-byte module, 1-byte action code, 4-byte big-endian count,
    /// then the selectors.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.module.as_slice());
        buf.push(self.action.code());
        // Cut sizes are bounded by the ledger far below u32::MAX
        #[allow(clippy::cast_possible_truncation)]
        buf.extend_from_slice(&(self.selectors.len() as u32).to_be_bytes());
        for selector in &self.selectors {
            buf.extend_from_slice(selector.as_bytes());
        }
    }
}

impl Display for CutOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [", self.action, self.module)?;
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        f.write_str("]")
    }
}

/// Shape errors of a single cut operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CutError {
    /// Operation names no selector
    #[error("empty {action} operation for module {module}")]
    EmptyCutOperation {
        /// Named module
        module: Address,
        /// Requested action
        action: CutAction,
    },

    /// Add or Replace routed to the null address
    #[error("{action} operation cannot target the null address")]
    NullModuleAddress {
        /// Requested action
        action: CutAction,
    },

    /// Remove carrying a module address
    #[error("remove operation must use the null address, got {module}")]
    RemoveWithModuleAddress {
        /// Offending address
        module: Address,
    },

    /// Selector listed twice in one operation
    #[error("selector {selector} repeated within one operation")]
    RepeatedSelector {
        /// Repeated selector
        selector: Selector,
    },
}
