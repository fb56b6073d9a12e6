//! Diamond Selector Catalog
//!
//! Function selectors and module interfaces for multi-facet proxies.
//!
//! # Core Concepts
//!
//! - [`Selector`]: 4-byte Keccak-256 routing key
//! - [`FunctionSignature`]: canonical `name(type1,type2)` form
//! - [`ModuleDescriptor`]: deployed facet address plus its interface
//! - [`SelectorCatalog`]: deterministic descriptor → selector expansion
//! - [`ModuleSource`]: supplier of descriptors from a deployment pipeline
//!
//! # Example
//!
//! ```rust
//! use diamond_selector::{ModuleDescriptor, SelectorCatalog};
//! use alloy_primitives::Address;
//!
//! let calc = ModuleDescriptor::from_signatures(
//!     Address::repeat_byte(0xaa),
//!     ["add(uint256,uint256)", "sub(uint256,uint256)"],
//! )
//! .unwrap();
//!
//! let cataloged = SelectorCatalog::new().catalog(&calc).unwrap();
//! assert_eq!(cataloged.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod abi;
pub mod catalog;
pub mod descriptor;
pub mod selector;
pub mod signature;

// Re-exports
pub use abi::{parse_abi, AbiError};
pub use catalog::{CatalogEntry, CatalogError, CatalogedModule, SelectorCatalog};
pub use descriptor::{ModuleDescriptor, ModuleSource, SourceError, StaticModuleSource};
pub use selector::{Selector, SelectorError};
pub use signature::{FunctionSignature, SignatureError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for selector operations
    pub use crate::{
        CatalogedModule, FunctionSignature, ModuleDescriptor, ModuleSource, Selector,
        SelectorCatalog,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
