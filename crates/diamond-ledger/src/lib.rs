//! Diamond Ledger Interface
//!
//! Cut operations and the ledger capability the coordinator is built on.
//!
//! # Core Concepts
//!
//! - [`CutOperation`]: one `(module, action, selectors)` entry of a cut
//! - [`LedgerCall`]: state-changing call, currently the atomic diamond cut
//! - [`LedgerClient`]: async query / estimate / invoke / finality capability
//!
//! Connectivity, key management and fee strategy live behind the trait;
//! nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod client;
pub mod cut;
pub mod error;

// Re-exports
pub use client::{
    CostBudget, FacetEntry, FacetPage, FinalityResult, Initializer, LedgerCall, LedgerClient,
    LoupeQuery, QueryResponse, TransactionId, DIAMOND_CUT_SIGNATURE,
};
pub use cut::{CutAction, CutError, CutOperation};
pub use error::LedgerError;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for ledger interaction
    pub use crate::{
        CostBudget, CutAction, CutOperation, FinalityResult, Initializer, LedgerCall,
        LedgerClient, LedgerError, TransactionId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
