//! JSON ABI parsing
//!
//! Reads the function entries of a JSON contract ABI, either a bare array or
//! a build artifact object carrying an `abi` field, into canonical
//! [`FunctionSignature`]s.

use crate::signature::{FunctionSignature, SignatureError};
use alloy_json_abi::JsonAbi;
use serde::Deserialize;

/// Accepted top-level ABI shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AbiDocument {
    Bare(JsonAbi),
    Artifact { abi: JsonAbi },
}

/// Parse the function signatures declared by a JSON ABI
///
/// Constructors, events, errors, fallback and receive entries are skipped;
/// they have no selector a diamond routes. Functions come out in
/// [`JsonAbi::functions`] order: by name, overloads in declaration order.
///
/// # Errors
/// Returns error if the JSON is not an ABI or a function entry is malformed
pub fn parse_abi(json: &str) -> Result<Vec<FunctionSignature>, AbiError> {
    let abi = match serde_json::from_str(json)? {
        AbiDocument::Bare(abi) | AbiDocument::Artifact { abi } => abi,
    };

    abi.functions()
        .map(|function| {
            FunctionSignature::from_function(function.clone()).map_err(|source| AbiError::InvalidEntry {
                name: function.name.clone(),
                source,
            })
        })
        .collect()
}

/// Errors raised while reading a JSON ABI
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    /// Not valid JSON, or not an ABI shape
    #[error("malformed ABI document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Function entry whose types do not canonicalise
    #[error("invalid ABI entry '{name}': {source}")]
    InvalidEntry {
        /// Function name
        name: String,
        /// Underlying type error
        #[source]
        source: SignatureError,
    },
}
