//! Testing utilities for the diamond cut workspace
//!
//! Shared fixtures, a simulated ledger, and tracing setup.

#![allow(missing_docs)]

pub mod ledger;

pub use ledger::{InMemoryLedger, Invocation, DEFAULT_ESTIMATE};

use alloy_primitives::Address;
use diamond_registry::RoutingTable;
use diamond_selector::{ModuleDescriptor, Selector};
use std::sync::Once;

/// Address made of one repeated byte
pub fn address(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// Default diamond under test
pub fn target() -> Address {
    address(0xd1)
}

pub fn selector(signature: &str) -> Selector {
    signature.parse::<diamond_selector::FunctionSignature>().unwrap().selector()
}

/// Module at `address(n)` exposing the given signatures
pub fn module(n: u8, signatures: &[&str]) -> ModuleDescriptor {
    ModuleDescriptor::from_signatures(address(n), signatures).unwrap()
}

/// Routing table from `(signature, module byte)` pairs
pub fn table(entries: &[(&str, u8)]) -> RoutingTable {
    entries
        .iter()
        .map(|(sig, n)| (selector(sig), address(*n)))
        .collect()
}

pub fn calculator_facet(n: u8) -> ModuleDescriptor {
    module(
        n,
        &["add(uint a, uint b)", "sub(uint a, uint b)", "mul(uint a, uint b)"],
    )
    .with_label("Calculator")
}

pub fn storage_facet(n: u8) -> ModuleDescriptor {
    module(n, &["name()", "retrieve()", "store(uint256 num)"]).with_label("Storage")
}

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`, once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
