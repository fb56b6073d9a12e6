//! Selector catalog
//!
//! Expands a [`ModuleDescriptor`] into its ordered `(signature, selector)`
//! pairs. The expansion is pure and byte-stable: the same descriptor always
//! produces the same entries in the same order, which keeps cut plans
//! reproducible across runs and process restarts.

use crate::descriptor::ModuleDescriptor;
use crate::selector::Selector;
use crate::signature::FunctionSignature;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One routed function of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Canonical signature
    pub signature: FunctionSignature,

    /// Derived selector
    pub selector: Selector,
}

/// A module descriptor expanded into selectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogedModule {
    address: Address,
    label: Option<String>,
    entries: Vec<CatalogEntry>,
}

impl CatalogedModule {
    /// Module address
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Optional label carried over from the descriptor
    #[inline]
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Entries in interface declaration order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Selectors in catalog order
    pub fn selectors(&self) -> impl Iterator<Item = Selector> + '_ {
        self.entries.iter().map(|e| e.selector)
    }

    /// Check if the module exposes a selector
    #[must_use]
    pub fn contains(&self, selector: Selector) -> bool {
        self.entries.iter().any(|e| e.selector == selector)
    }

    /// Signature behind a selector
    #[must_use]
    pub fn signature_for(&self, selector: Selector) -> Option<&FunctionSignature> {
        self.entries
            .iter()
            .find(|e| e.selector == selector)
            .map(|e| &e.signature)
    }

    /// Number of selectors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the module exposes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derives canonical selector sets from module descriptors
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorCatalog;

impl SelectorCatalog {
    /// Create new catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Expand one descriptor
    ///
    /// Repeating the same canonical signature collapses to its first
    /// occurrence. Two different signatures hashing to one selector can
    /// never both be routed and are rejected.
    ///
    /// # Errors
    /// - `CatalogError::DuplicateSelectorInModule` on a selector collision
    pub fn catalog(&self, descriptor: &ModuleDescriptor) -> Result<CatalogedModule, CatalogError> {
        let mut entries: Vec<CatalogEntry> = Vec::with_capacity(descriptor.interface().len());
        let mut seen: HashMap<Selector, usize> = HashMap::new();

        for signature in descriptor.interface() {
            let selector = signature.selector();

            if let Some(&idx) = seen.get(&selector) {
                let first = &entries[idx].signature;
                if first == signature {
                    continue;
                }
                return Err(CatalogError::DuplicateSelectorInModule {
                    module: descriptor.address(),
                    selector,
                    first: first.clone(),
                    second: signature.clone(),
                });
            }

            seen.insert(selector, entries.len());
            entries.push(CatalogEntry {
                signature: signature.clone(),
                selector,
            });
        }

        Ok(CatalogedModule {
            address: descriptor.address(),
            label: descriptor.label().map(str::to_string),
            entries,
        })
    }

    /// Expand several descriptors, preserving their order
    ///
    /// # Errors
    /// Returns the first module-level collision
    pub fn catalog_all(
        &self,
        descriptors: &[ModuleDescriptor],
    ) -> Result<Vec<CatalogedModule>, CatalogError> {
        descriptors.iter().map(|d| self.catalog(d)).collect()
    }
}

/// Catalog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Two distinct signatures in one module share a selector
    #[error("module {module} declares '{first}' and '{second}' which share selector {selector}")]
    DuplicateSelectorInModule {
        /// Offending module
        module: Address,
        /// Shared selector
        selector: Selector,
        /// Signature kept first
        first: FunctionSignature,
        /// Colliding signature
        second: FunctionSignature,
    },
}
