//! Storage errors

use stakeline_core::{Address, PositionId, ReferralCode, RewardKind, TxHash};
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Unique key guarded by the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UniqueKey {
    Address(Address),
    ReferralCode(ReferralCode),
    TxHash(TxHash),
    PositionId(PositionId),
    /// Reward history entry already recorded for this position
    Reward(Address, RewardKind, PositionId),
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(a) => write!(f, "address {}", a),
            Self::ReferralCode(c) => write!(f, "referral code {}", c),
            Self::TxHash(t) => write!(f, "tx_hash {}", t),
            Self::PositionId(id) => write!(f, "position {}", id),
            Self::Reward(account, kind, id) => {
                write!(f, "{} reward of {} for position {}", kind.as_str(), account, id)
            }
        }
    }
}

/// Errors raised by a [`crate::LedgerStore`]
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// A unique key is already taken; nothing in the batch was applied
    #[error("Conflict on {0}")]
    Conflict(UniqueKey),

    /// An update targeted a row that does not exist
    #[error("Missing row: {0}")]
    Missing(String),

    /// Batch would change an immutable field
    #[error("Rejected write: {0}")]
    Rejected(String),

    /// Backend temporarily unable to serve the request
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Backend failure that retrying will not fix
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Row could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Whether the same call may succeed if retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind;
        match err.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut | ErrorKind::Incomplete => {
                Self::Unavailable(err.into_string())
            }
            _ => Self::Backend(err.into_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("busy".into()).is_transient());
        assert!(!StoreError::Backend("corrupt".into()).is_transient());
        let conflict = StoreError::Conflict(UniqueKey::PositionId(PositionId(7)));
        assert!(!conflict.is_transient());
        assert_eq!(conflict.to_string(), "Conflict on position 7");
    }
}
