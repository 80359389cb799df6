//! Ledger configuration

use serde::{Deserialize, Serialize};
use stakeline_core::TokenAmount;

/// Tunables of the reward engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Front-end URL that invite links point at
    #[serde(default = "default_referral_link_base")]
    pub referral_link_base: String,

    /// Credit paid to a referrer per referred signup
    #[serde(default = "default_signup_reward")]
    pub signup_reward: TokenAmount,

    /// Extra attempts after a transient store failure
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,

    /// Backoff step between attempts (linear)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_referral_link_base() -> String {
    "http://localhost:3000".to_string()
}

fn default_signup_reward() -> TokenAmount {
    TokenAmount::signup_reward()
}

fn default_commit_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    10
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            referral_link_base: default_referral_link_base(),
            signup_reward: default_signup_reward(),
            commit_retries: default_commit_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl LedgerConfig {
    /// Invite link for a referral code
    pub fn referral_link(&self, code: &str) -> String {
        format!("{}?ref={}", self.referral_link_base.trim_end_matches('/'), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_link() {
        let config = LedgerConfig::default();
        assert_eq!(config.referral_link("AbC123"), "http://localhost:3000?ref=AbC123");

        let config = LedgerConfig {
            referral_link_base: "https://app.example.org/".to_string(),
            ..LedgerConfig::default()
        };
        assert_eq!(config.referral_link("x"), "https://app.example.org?ref=x");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"commit_retries": 0}"#).unwrap();
        assert_eq!(config.commit_retries, 0);
        assert_eq!(config.signup_reward, TokenAmount::signup_reward());
        assert_eq!(config.retry_backoff_ms, 10);
    }
}
