//! Errors surfaced by ledger operations

use crate::views::UnlockReceipt;
use chrono::{DateTime, Utc};
use stakeline_core::{Address, CoreError, PositionId, TxHash};
use stakeline_storage::StoreError;
use thiserror::Error;

/// Result type alias for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Named failure kinds of the engine
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Validation ===
    /// Stake amount is non-positive or unparseable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed address, tx_hash or wallet kind
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // === Lookup ===
    #[error("Account not found: {0}")]
    AccountNotFound(Address),

    #[error("Staking position not found: {0}")]
    PositionNotFound(PositionId),

    // === Staking state ===
    /// Requester does not own the position
    #[error("{requester} does not own staking position {position}")]
    Forbidden {
        position: PositionId,
        requester: Address,
    },

    /// Unlock attempted before the unlock date
    #[error("Staking position {position} unlocks in {days_remaining} days")]
    NotMatured {
        position: PositionId,
        unlock_date: DateTime<Utc>,
        days_remaining: i64,
    },

    /// Position was unlocked earlier; carries the original confirmation
    #[error("Staking position {} was already unlocked", .0.position_id)]
    AlreadyUnlocked(Box<UnlockReceipt>),

    /// tx_hash already used by a different account
    #[error("Transaction {0} was submitted by another account")]
    DuplicateTransaction(TxHash),

    // === Storage ===
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err.code() {
            "invalid_amount" => Self::InvalidAmount(err.to_string()),
            _ => Self::InvalidInput(err.to_string()),
        }
    }
}

impl LedgerError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidInput(_) => "invalid_input",
            Self::AccountNotFound(_) | Self::PositionNotFound(_) => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::NotMatured { .. } => "not_matured",
            Self::AlreadyUnlocked(_) => "already_unlocked",
            Self::DuplicateTransaction(_) => "duplicate_transaction",
            Self::Storage(_) => "storage_unavailable",
        }
    }

    /// Check if the same call may succeed later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            Self::NotMatured { .. } => true,
            _ => false,
        }
    }
}
