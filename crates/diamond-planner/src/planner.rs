//! Cut planning
//!
//! [`CutPlanner`] computes the minimal cut that moves a target from its
//! current routing table to a [`DesiredState`].
//!
//! # Planning Rules
//!
//! - unbound and desired → Add under the desired module
//! - bound elsewhere and desired → Replace under the desired module
//! - bound to the desired module → omitted
//! - bound and not desired → Remove
//!
//! Operations are grouped per module and action. Groups follow desired
//! module order (Add before Replace), selectors follow catalog order, and
//! the single Remove group comes last in current-table order.

use crate::desired::DesiredState;
use crate::error::PlanningError;
use crate::plan::CutPlan;
use diamond_ledger::CutOperation;
use diamond_registry::FacetRegistry;
use diamond_selector::{CatalogedModule, ModuleDescriptor, SelectorCatalog};
use tracing::debug;

/// Computes minimal cut plans
#[derive(Debug, Clone, Default)]
pub struct CutPlanner {
    references: Vec<CatalogedModule>,
}

impl CutPlanner {
    /// Planner without cross-module checks
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable strict mode against a set of reference modules
    ///
    /// A desired selector that any reference module other than its desired
    /// owner also declares is rejected with `CrossModuleDuplicate`, even when
    /// that module is not itself desired.
    ///
    /// # Errors
    /// Returns error if a reference module has an in-module collision
    pub fn with_reference_modules(mut self, references: &[ModuleDescriptor]) -> Result<Self, PlanningError> {
        self.references = SelectorCatalog::new().catalog_all(references)?;
        Ok(self)
    }

    /// Check if strict cross-module validation is on
    #[inline]
    #[must_use]
    pub fn is_strict(&self) -> bool {
        !self.references.is_empty()
    }

    /// Plan the cut from `current` to `desired`
    ///
    /// # Errors
    /// - `CrossModuleDuplicate` in strict mode
    /// - `InvalidOperation` if the computed operations do not apply, which
    ///   indicates an inconsistent registry
    pub fn plan(&self, current: &FacetRegistry, desired: &DesiredState) -> Result<CutPlan, PlanningError> {
        self.check_references(desired)?;

        let mut operations = Vec::new();

        for module in desired.modules() {
            let mut adds = Vec::new();
            let mut replaces = Vec::new();

            for selector in module.selectors() {
                match current.lookup(selector) {
                    None => adds.push(selector),
                    Some(bound) if bound != module.address() => replaces.push(selector),
                    Some(_) => {}
                }
            }

            if !adds.is_empty() {
                operations.push(CutOperation::add(module.address(), adds));
            }
            if !replaces.is_empty() {
                operations.push(CutOperation::replace(module.address(), replaces));
            }
        }

        let removes: Vec<_> = current
            .table()
            .iter()
            .map(|(selector, _)| selector)
            .filter(|selector| !desired.contains(*selector))
            .collect();
        if !removes.is_empty() {
            operations.push(CutOperation::remove(removes));
        }

        let plan = CutPlan::assemble(current.target(), current.snapshot(), operations)
            .map_err(PlanningError::InvalidOperation)?;

        debug!(
            target = %plan.target(),
            operations = plan.operations().len(),
            selectors = plan.selector_count(),
            digest = %plan.digest().short(),
            "cut planned"
        );

        Ok(plan)
    }

    fn check_references(&self, desired: &DesiredState) -> Result<(), PlanningError> {
        for module in desired.modules() {
            for selector in module.selectors() {
                let other = self
                    .references
                    .iter()
                    .find(|r| r.address() != module.address() && r.contains(selector));
                if let Some(other) = other {
                    return Err(PlanningError::CrossModuleDuplicate {
                        selector,
                        owner: module.address(),
                        other: other.address(),
                    });
                }
            }
        }
        Ok(())
    }
}
