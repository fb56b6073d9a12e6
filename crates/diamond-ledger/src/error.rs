//! Ledger error types

use crate::client::TransactionId;

/// Errors reported by a [`LedgerClient`](crate::LedgerClient)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Connection or transport failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Call reverted during estimation or query
    #[error("call reverted: {reason}")]
    Reverted {
        /// Revert reason, if decodable
        reason: String,
    },

    /// Ledger refused the submission before accepting it
    #[error("submission refused: {0}")]
    Refused(String),

    /// Ledger does not know the transaction
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TransactionId),

    /// Deadline passed before the ledger answered
    #[error("ledger deadline exceeded")]
    Timeout,
}

impl LedgerError {
    /// Check if repeating the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}
