//! Cut plans
//!
//! A [`CutPlan`] is an ordered list of cut operations together with the
//! routing table it was planned against and the table it must produce.
//! Plans are immutable values; the coordinator submits them as one atomic
//! call.

use crate::error::PlanningError;
use alloy_primitives::Address;
use diamond_ledger::{CutError, CutOperation, Initializer, LedgerCall};
use diamond_registry::{IndexedRejection, RegistryWarning, RoutingTable};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Domain tag mixed into every plan digest
const DIGEST_DOMAIN: &[u8] = b"diamond-cut-plan/v1";

/// Blake3 digest identifying a plan's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanDigest([u8; 32]);

impl PlanDigest {
    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for PlanDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for PlanDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PlanDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(raw).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("plan digest must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Ordered, validated set of cut operations for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutPlan {
    target: Address,
    operations: Vec<CutOperation>,
    base: RoutingTable,
    expected: RoutingTable,
    #[serde(default)]
    warnings: Vec<RegistryWarning>,
}

impl CutPlan {
    /// Build a plan from hand-written operations
    ///
    /// # Errors
    /// - `EmptyCutOperation` for an operation without selectors
    /// - `InvalidOperation` if the operations do not apply to `base`
    pub fn from_operations(
        target: Address,
        base: RoutingTable,
        operations: Vec<CutOperation>,
    ) -> Result<Self, PlanningError> {
        for op in &operations {
            if let Err(CutError::EmptyCutOperation { module, action }) = op.validate() {
                return Err(PlanningError::EmptyCutOperation { module, action });
            }
        }

        let expected = base
            .applied(&operations)
            .map_err(PlanningError::InvalidOperation)?;

        Ok(Self {
            target,
            operations,
            base,
            expected,
            warnings: Vec::new(),
        })
    }

    /// Planner-side constructor; operations are known to apply
    pub(crate) fn assemble(
        target: Address,
        base: RoutingTable,
        operations: Vec<CutOperation>,
    ) -> Result<Self, IndexedRejection> {
        let expected = base.applied(&operations)?;
        Ok(Self {
            target,
            operations,
            base,
            expected,
            warnings: Vec::new(),
        })
    }

    /// Attach registry warnings gathered while planning
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<RegistryWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Target diamond
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }

    /// Operations in submission order
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &[CutOperation] {
        &self.operations
    }

    /// Routing table the plan was computed against
    #[inline]
    #[must_use]
    pub fn base(&self) -> &RoutingTable {
        &self.base
    }

    /// Routing table after the plan applies
    #[inline]
    #[must_use]
    pub fn expected(&self) -> &RoutingTable {
        &self.expected
    }

    /// Non-fatal registry warnings
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }

    /// Check if the plan changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Total selectors touched across operations
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.operations.iter().map(CutOperation::len).sum()
    }

    /// Content digest over target and operations
    ///
    /// Two plans with the same digest submit byte-identical cuts.
    #[must_use]
    pub fn digest(&self) -> PlanDigest {
        let mut buf = Vec::with_capacity(64 + self.selector_count() * 4);
        buf.extend_from_slice(DIGEST_DOMAIN);
        buf.extend_from_slice(self.target.as_slice());
        for op in &self.operations {
            op.encode_into(&mut buf);
        }
        PlanDigest(*blake3::hash(&buf).as_bytes())
    }

    /// The atomic ledger call carrying this plan
    #[must_use]
    pub fn to_call(&self, initializer: Option<Initializer>) -> LedgerCall {
        LedgerCall::diamond_cut(self.operations.clone(), initializer)
    }
}

impl Display for CutPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cut plan for {}: {} operations, {} selectors",
            self.target,
            self.operations.len(),
            self.selector_count()
        )
    }
}
