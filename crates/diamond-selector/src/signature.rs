//! Canonical function signatures
//!
//! Provides [`FunctionSignature`], the canonical `name(type1,type2)` form a
//! selector is derived from. Parsing goes through the Solidity
//! human-readable grammar of `alloy-json-abi`, so parameter names,
//! data-location keywords and modifiers are accepted; shorthand integer
//! aliases are then expanded to the one spelling the hash is defined over.

use crate::selector::Selector;
use alloy_json_abi::{Function, Param};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Canonical function signature
///
/// A thin wrapper over an [`alloy_json_abi::Function`] that caches its
/// canonical form. Equality, ordering and hashing follow the canonical form
/// only; outputs and mutability never affect a selector.
///
/// # Examples
/// - `transfer(address to, uint amount)` → `transfer(address,uint256)`
/// - `swap((uint,address)[] memory legs)` → `swap((uint256,address)[])`
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    function: Function,
    canonical: String,
}

impl FunctionSignature {
    /// Create signature from a name and parameter types
    ///
    /// # Errors
    /// Returns error if the name is not an identifier or a type is malformed
    pub fn new<I, S>(name: &str, params: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params: Vec<_> = params.into_iter().map(|p| p.as_ref().trim().to_string()).collect();
        format!("{name}({})", params.join(", ")).parse()
    }

    /// Parse a written signature such as `"transfer(address to, uint amount)"`
    ///
    /// # Errors
    /// Returns error if the text is not a function signature
    #[inline]
    pub fn parse(s: &str) -> Result<Self, SignatureError> {
        s.parse()
    }

    /// Canonicalise an ABI function
    ///
    /// JSON ABIs skip the human-readable parser, so the canonical form is
    /// parsed back once to reject types it does not accept.
    ///
    /// # Errors
    /// Returns error if the name or a parameter type is malformed
    pub fn from_function(mut function: Function) -> Result<Self, SignatureError> {
        function.inputs.iter_mut().for_each(expand_aliases);
        let canonical = function.signature();
        Function::parse(&canonical).map_err(|e| SignatureError::malformed(&canonical, &e))?;
        Ok(Self {
            function,
            canonical,
        })
    }

    /// Function name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Canonical parameter types in declaration order
    #[must_use]
    pub fn params(&self) -> Vec<String> {
        self.function
            .inputs
            .iter()
            .map(|p| p.selector_type().into_owned())
            .collect()
    }

    /// Canonical string form, the hash preimage
    #[inline]
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Underlying ABI function
    #[inline]
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Selector for this signature
    #[inline]
    #[must_use]
    pub fn selector(&self) -> Selector {
        Selector::from_signature(self)
    }
}

impl PartialEq for FunctionSignature {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for FunctionSignature {}

impl PartialOrd for FunctionSignature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FunctionSignature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Hash for FunctionSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl Display for FunctionSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for FunctionSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let function = Function::parse(s).map_err(|e| SignatureError::malformed(s, &e))?;
        Self::from_function(function)
    }
}

impl serde::Serialize for FunctionSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> serde::Deserialize<'de> for FunctionSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors related to function signatures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Text is not a Solidity function signature
    #[error("malformed signature '{input}': {reason}")]
    Malformed {
        /// Rejected input
        input: String,
        /// Parser message
        reason: String,
    },
}

impl SignatureError {
    fn malformed(input: &str, err: &impl Display) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Expand `uint`/`int`/`fixed`/`ufixed` shorthands, components first
fn expand_aliases(param: &mut Param) {
    param.components.iter_mut().for_each(expand_aliases);

    let split = param.ty.find('[').unwrap_or(param.ty.len());
    let (base, suffix) = param.ty.split_at(split);
    let expanded = match base {
        "uint" => "uint256",
        "int" => "int256",
        "fixed" => "fixed128x18",
        "ufixed" => "ufixed128x18",
        _ => return,
    };
    param.ty = format!("{expanded}{suffix}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_parse_plain() {
        let sig: FunctionSignature = "transfer(address,uint256)".parse().unwrap();
        assert_eq!(sig.name(), "transfer");
        assert_eq!(sig.params(), vec!["address", "uint256"]);
        assert_eq!(sig.canonical(), "transfer(address,uint256)");
    }

    #[test]
    fn signature_parse_strips_names_and_locations() {
        let sig: FunctionSignature = "transfer(address to, uint amount)".parse().unwrap();
        assert_eq!(sig.canonical(), "transfer(address,uint256)");

        let sig: FunctionSignature = "setName(string memory _name)".parse().unwrap();
        assert_eq!(sig.canonical(), "setName(string)");
    }

    #[test]
    fn signature_parse_function_keyword_and_modifiers() {
        let sig: FunctionSignature = "function name() external view returns (string)".parse().unwrap();
        assert_eq!(sig.canonical(), "name()");
        assert_eq!(sig.selector().to_string(), "0x06fdde03");
    }

    #[test]
    fn signature_expands_aliases_in_arrays() {
        let sig: FunctionSignature = "batch(uint[] ids, int[2][] grid)".parse().unwrap();
        assert_eq!(sig.canonical(), "batch(uint256[],int256[2][])");
    }

    #[test]
    fn signature_tuples() {
        let sig: FunctionSignature = "swap((uint,address)[] memory legs, bool)".parse().unwrap();
        assert_eq!(sig.canonical(), "swap((uint256,address)[],bool)");
        assert_eq!(sig.params(), vec!["(uint256,address)[]", "bool"]);

        let sig: FunctionSignature = "nested((uint8,(bytes32,bool)) t)".parse().unwrap();
        assert_eq!(sig.canonical(), "nested((uint8,(bytes32,bool)))");
    }

    #[test]
    fn signature_selector_matches_canonical() {
        let sig: FunctionSignature = "transfer(address to, uint amount)".parse().unwrap();
        assert_eq!(sig.selector().to_string(), "0xa9059cbb");
        assert_eq!(sig.selector(), Selector::new(sig.function().selector().0));
    }

    #[test]
    fn signature_new_canonicalises_params() {
        let sig = FunctionSignature::new("add", ["uint", "uint"]).unwrap();
        assert_eq!(sig.canonical(), "add(uint256,uint256)");
    }

    #[test]
    fn signature_equality_ignores_spelling() {
        let a: FunctionSignature = "add(uint a, uint b)".parse().unwrap();
        let b: FunctionSignature = "function add(uint256,uint256) external pure returns (uint256)"
            .parse()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_errors() {
        for bad in ["transfer", "transfer(address", "9lives()", "f(uint256,,bool)"] {
            assert!(
                matches!(bad.parse::<FunctionSignature>(), Err(SignatureError::Malformed { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn signature_serde_is_canonical_string() {
        let sig: FunctionSignature = "sub(uint a, uint b)".parse().unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"sub(uint256,uint256)\"");
        let back: FunctionSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
