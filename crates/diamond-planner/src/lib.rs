//! Diamond Cut Planner
//!
//! Turns "these modules should be live" into the smallest diamond cut that
//! gets a target there.
//!
//! # Core Concepts
//!
//! - [`DesiredState`]: validated desired routing, one owner per selector
//! - [`CutPlanner`]: minimal Add / Replace / Remove planning
//! - [`CutPlan`]: ordered operations with base and expected tables
//!
//! # Example
//!
//! ```rust
//! use diamond_planner::{CutPlanner, DesiredState};
//! use diamond_registry::FacetRegistry;
//! use diamond_selector::ModuleDescriptor;
//! use alloy_primitives::Address;
//!
//! let calc = ModuleDescriptor::from_signatures(
//!     Address::repeat_byte(0xca),
//!     ["add(uint256,uint256)", "sub(uint256,uint256)"],
//! )
//! .unwrap();
//!
//! let desired = DesiredState::from_descriptors(&[calc]).unwrap();
//! let current = FacetRegistry::new(Address::repeat_byte(0xd1));
//! let plan = CutPlanner::new().plan(&current, &desired).unwrap();
//! assert_eq!(plan.operations().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod desired;
pub mod error;
pub mod plan;
pub mod planner;

// Re-exports
pub use desired::DesiredState;
pub use error::PlanningError;
pub use plan::{CutPlan, PlanDigest};
pub use planner::CutPlanner;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for planning
    pub use crate::{CutPlan, CutPlanner, DesiredState, PlanningError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
