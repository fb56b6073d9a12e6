//! Desired routing state

use crate::error::PlanningError;
use alloy_primitives::Address;
use diamond_registry::RoutingTable;
use diamond_selector::{CatalogedModule, ModuleDescriptor, Selector, SelectorCatalog};
use indexmap::IndexMap;

/// The set of modules a target should route to after an upgrade
///
/// Every selector has exactly one desired owner. Module order is the order
/// the descriptors were given in and drives the order of planned
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesiredState {
    modules: Vec<CatalogedModule>,
    owners: IndexMap<Selector, Address>,
}

impl DesiredState {
    /// Catalog and validate a list of module descriptors
    ///
    /// An empty list is valid and desires an empty routing table.
    ///
    /// # Errors
    /// - `NullModuleAddress` for a descriptor at the null address
    /// - `DuplicateModule` when an address appears twice
    /// - `DuplicateSelectorInModule` for a collision inside one module
    /// - `SelectorOwnershipConflict` when two modules want one selector
    pub fn from_descriptors(descriptors: &[ModuleDescriptor]) -> Result<Self, PlanningError> {
        let catalog = SelectorCatalog::new();
        let mut state = Self::default();

        for descriptor in descriptors {
            if descriptor.address() == Address::ZERO {
                return Err(PlanningError::NullModuleAddress {
                    module: descriptor.display_name(),
                });
            }
            if state.modules.iter().any(|m| m.address() == descriptor.address()) {
                return Err(PlanningError::DuplicateModule {
                    module: descriptor.address(),
                });
            }

            let cataloged = catalog.catalog(descriptor)?;
            for selector in cataloged.selectors() {
                if let Some(first) = state.owners.get(&selector) {
                    return Err(PlanningError::SelectorOwnershipConflict {
                        selector,
                        first: *first,
                        second: cataloged.address(),
                    });
                }
                state.owners.insert(selector, cataloged.address());
            }
            state.modules.push(cataloged);
        }

        Ok(state)
    }

    /// Cataloged modules in the order given
    #[inline]
    #[must_use]
    pub fn modules(&self) -> &[CatalogedModule] {
        &self.modules
    }

    /// Desired owner of a selector
    #[inline]
    #[must_use]
    pub fn owner_of(&self, selector: Selector) -> Option<Address> {
        self.owners.get(&selector).copied()
    }

    /// Check if a selector is desired at all
    #[inline]
    #[must_use]
    pub fn contains(&self, selector: Selector) -> bool {
        self.owners.contains_key(&selector)
    }

    /// Desired routing as a table
    #[must_use]
    pub fn to_table(&self) -> RoutingTable {
        self.owners.iter().map(|(s, m)| (*s, *m)).collect()
    }

    /// Number of desired selectors
    #[inline]
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.owners.len()
    }

    /// Check if nothing is desired
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
