//! Diamond Facet Registry
//!
//! Models the selector routing table of a target diamond and keeps it
//! honest against the ledger.
//!
//! # Core Concepts
//!
//! - [`RoutingTable`]: `selector -> module` map with cut preconditions
//! - [`FacetRegistry`]: routing table of one target, read live or replayed
//! - [`LiveQuery`]: complete versus degraded live reads, never conflated
//! - [`RoutingDiff`]: missing / unexpected / rebound selectors
//!
//! # Example
//!
//! ```rust
//! use diamond_ledger::CutOperation;
//! use diamond_registry::FacetRegistry;
//! use diamond_selector::Selector;
//! use alloy_primitives::Address;
//!
//! let facet = Address::repeat_byte(0x42);
//! let name = Selector::from_canonical("name()");
//! let history = vec![CutOperation::add(facet, vec![name])];
//!
//! let registry = FacetRegistry::replay(Address::repeat_byte(0xd1), &history).unwrap();
//! assert_eq!(registry.lookup(name), Some(facet));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod diff;
pub mod registry;
pub mod table;

// Re-exports
pub use diff::{Rebinding, RoutingDiff};
pub use registry::{DegradedReason, FacetRegistry, LiveQuery, RegistryWarning, ReplayError};
pub use table::{CutRejection, IndexedRejection, RoutingTable};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for registry operations
    pub use crate::{FacetRegistry, LiveQuery, RegistryWarning, RoutingDiff, RoutingTable};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
