//! Error types for Stakeline core parsing and arithmetic

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing or combining domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Amounts ===
    /// Amount is not a valid non-negative decimal
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Arithmetic left the representable range
    #[error("Amount overflow")]
    Overflow,

    /// Subtraction would go below zero
    #[error("Amount underflow: {have} < {need}")]
    Underflow { have: String, need: String },

    // === Identifiers ===
    /// Wallet address is empty or too long
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Transaction hash is empty or too long
    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    /// Referral code is malformed
    #[error("Invalid referral code: {0}")]
    InvalidReferralCode(String),

    /// Unknown wallet kind
    #[error("Unknown wallet kind: {0}")]
    UnknownWalletKind(String),
}

impl CoreError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) | Self::Overflow | Self::Underflow { .. } => "invalid_amount",
            Self::InvalidAddress(_)
            | Self::InvalidTxHash(_)
            | Self::InvalidReferralCode(_)
            | Self::UnknownWalletKind(_) => "invalid_input",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::InvalidAmount("x".into()).code(), "invalid_amount");
        assert_eq!(CoreError::InvalidTxHash(String::new()).code(), "invalid_input");
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::Underflow {
            have: "1".into(),
            need: "2".into(),
        };
        assert_eq!(err.to_string(), "Amount underflow: 1 < 2");
    }
}
