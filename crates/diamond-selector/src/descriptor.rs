//! Module descriptors and their sources
//!
//! A [`ModuleDescriptor`] pairs a deployed facet address with the interface
//! it exposes. Descriptors are produced outside this workspace (compilation
//! and deployment pipelines) and handed in through a [`ModuleSource`].

use crate::abi::{parse_abi, AbiError};
use crate::signature::{FunctionSignature, SignatureError};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deployed module (facet) and its interface
///
/// Immutable once built: changing logic means deploying a new module at a
/// new address and cutting to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    address: Address,
    label: Option<String>,
    interface: Vec<FunctionSignature>,
}

impl ModuleDescriptor {
    /// Create descriptor from parsed signatures
    #[inline]
    #[must_use]
    pub fn new(address: Address, interface: Vec<FunctionSignature>) -> Self {
        Self {
            address,
            label: None,
            interface,
        }
    }

    /// Create descriptor from written signatures such as `"add(uint a, uint b)"`
    ///
    /// # Errors
    /// Returns the first signature that fails to parse
    pub fn from_signatures<I, S>(address: Address, signatures: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let interface = signatures
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(address, interface))
    }

    /// Create descriptor from a JSON ABI
    ///
    /// # Errors
    /// Returns error if the ABI cannot be parsed
    pub fn from_abi_json(address: Address, abi: &str) -> Result<Self, AbiError> {
        Ok(Self::new(address, parse_abi(abi)?))
    }

    /// Attach a human-readable label (contract name)
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Module address
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Optional label
    #[inline]
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Declared interface in declaration order
    #[inline]
    #[must_use]
    pub fn interface(&self) -> &[FunctionSignature] {
        &self.interface
    }

    /// Label if present, otherwise the address
    #[must_use]
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// Supplier of descriptors for deployed modules
pub trait ModuleSource: Send + Sync {
    /// Resolve a module by name
    ///
    /// # Errors
    /// Returns error if the module is unknown to this source
    fn descriptor(&self, module: &str) -> Result<ModuleDescriptor, SourceError>;

    /// Resolve several modules, preserving the requested order
    ///
    /// # Errors
    /// Returns the first resolution failure
    fn descriptors(&self, modules: &[&str]) -> Result<Vec<ModuleDescriptor>, SourceError> {
        modules.iter().map(|m| self.descriptor(m)).collect()
    }
}

/// In-memory module source keyed by name
#[derive(Debug, Clone, Default)]
pub struct StaticModuleSource {
    modules: HashMap<String, ModuleDescriptor>,
}

impl StaticModuleSource {
    /// Create empty source
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under a name
    pub fn insert(&mut self, name: impl Into<String>, descriptor: ModuleDescriptor) {
        self.modules.insert(name.into(), descriptor);
    }

    /// Builder-style registration
    #[inline]
    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, descriptor: ModuleDescriptor) -> Self {
        self.insert(name, descriptor);
        self
    }

    /// Number of registered modules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if no module is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleSource for StaticModuleSource {
    fn descriptor(&self, module: &str) -> Result<ModuleDescriptor, SourceError> {
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| SourceError::UnknownModule(module.to_string()))
    }
}

/// Module source failures
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No descriptor for the requested name
    #[error("unknown module: {0}")]
    UnknownModule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_signatures() {
        let addr = Address::repeat_byte(0x11);
        let d = ModuleDescriptor::from_signatures(addr, ["add(uint a, uint b)", "name()"])
            .unwrap()
            .with_label("Calc");

        assert_eq!(d.address(), addr);
        assert_eq!(d.label(), Some("Calc"));
        assert_eq!(d.interface()[0].canonical(), "add(uint256,uint256)");
        assert_eq!(d.display_name(), "Calc");
    }

    #[test]
    fn descriptor_from_signatures_propagates_parse_error() {
        let result = ModuleDescriptor::from_signatures(Address::ZERO, ["ok()", "broken("]);
        assert!(matches!(result, Err(SignatureError::Malformed { .. })));
    }

    #[test]
    fn static_source_resolves_in_order() {
        let a = ModuleDescriptor::from_signatures(Address::repeat_byte(1), ["a()"]).unwrap();
        let b = ModuleDescriptor::from_signatures(Address::repeat_byte(2), ["b()"]).unwrap();
        let source = StaticModuleSource::new()
            .with_module("A", a.clone())
            .with_module("B", b.clone());

        let resolved = source.descriptors(&["B", "A"]).unwrap();
        assert_eq!(resolved, vec![b, a]);
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn static_source_unknown_module() {
        let source = StaticModuleSource::new();
        assert!(matches!(
            source.descriptor("Missing"),
            Err(SourceError::UnknownModule(name)) if name == "Missing"
        ));
    }
}
