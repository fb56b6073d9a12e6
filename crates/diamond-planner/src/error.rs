//! Planning errors
//!
//! Every planning error is raised locally, before anything is submitted to
//! a ledger.

use alloy_primitives::Address;
use diamond_ledger::CutAction;
use diamond_registry::IndexedRejection;
use diamond_selector::{CatalogError, FunctionSignature, Selector};

/// Errors raised while building a cut plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    /// Two distinct signatures of one module share a selector
    #[error("module {module} declares '{first}' and '{second}' which share selector {selector}")]
    DuplicateSelectorInModule {
        /// Offending module
        module: Address,
        /// Shared selector
        selector: Selector,
        /// First signature
        first: FunctionSignature,
        /// Colliding signature
        second: FunctionSignature,
    },

    /// A selector is desired by two modules
    #[error("selector {selector} desired by both {first} and {second}")]
    SelectorOwnershipConflict {
        /// Contested selector
        selector: Selector,
        /// First claimant
        first: Address,
        /// Second claimant
        second: Address,
    },

    /// A desired selector is also declared by another reference module
    #[error("selector {selector} desired under {owner} is also declared by {other}")]
    CrossModuleDuplicate {
        /// Selector in question
        selector: Selector,
        /// Desired owner
        owner: Address,
        /// Reference module declaring it too
        other: Address,
    },

    /// Operation names no selector
    #[error("empty {action} operation for module {module}")]
    EmptyCutOperation {
        /// Named module
        module: Address,
        /// Requested action
        action: CutAction,
    },

    /// Desired module deployed at the null address
    #[error("module '{module}' has the null address")]
    NullModuleAddress {
        /// Module label or address
        module: String,
    },

    /// Same module address desired twice
    #[error("module {module} listed more than once")]
    DuplicateModule {
        /// Repeated address
        module: Address,
    },

    /// Hand-built operation that cannot apply to the base table
    #[error("invalid operation: {0}")]
    InvalidOperation(#[source] IndexedRejection),
}

impl From<CatalogError> for PlanningError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DuplicateSelectorInModule {
                module,
                selector,
                first,
                second,
            } => Self::DuplicateSelectorInModule {
                module,
                selector,
                first,
                second,
            },
        }
    }
}

impl PlanningError {
    /// Selector the error is about, if any
    #[must_use]
    pub fn selector(&self) -> Option<Selector> {
        match self {
            Self::DuplicateSelectorInModule { selector, .. }
            | Self::SelectorOwnershipConflict { selector, .. }
            | Self::CrossModuleDuplicate { selector, .. } => Some(*selector),
            _ => None,
        }
    }
}
