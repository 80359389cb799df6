//! # Stakeline Core
//!
//! Domain types shared by every Stakeline crate.
//!
//! - [`TokenAmount`] - exact fixed-point reward credits (8 decimal places)
//! - [`Account`] - a wallet with its balances, referral code and referrer
//! - [`StakingPosition`] - a time-locked stake with its bonus split
//! - [`RewardEntry`] - one credit event in the ledger history
//! - [`Clock`] - wall-clock source, swappable for tests
//!
//! ## Stake split
//!
//! ```text
//! principal ──┬── 5%  bonus_received  → owner token_balance
//!             └── 95% staked_amount   → locked for 365 days
//!
//! referrer (if any) ── +5% of principal as an additional credit
//! ```

pub mod amount;
pub mod clock;
pub mod error;
pub mod model;
pub mod types;

pub use amount::TokenAmount;
pub use clock::{days_until, Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use model::*;
pub use types::*;

/// Protocol constants
pub mod constants {
    /// Token symbol shown in messages
    pub const SYMBOL: &str = "TOKEN";

    /// Decimal places of [`crate::TokenAmount`]
    pub const DECIMALS: u32 = 8;

    /// One whole token in smallest units
    pub const ONE_TOKEN: u128 = 100_000_000; // 10^8

    /// Credit paid to a referrer when a referred wallet is created: 3 tokens
    pub const SIGNUP_REWARD_UNITS: u128 = 3 * ONE_TOKEN;

    /// Share of the principal credited back to the staker
    pub const STAKE_BONUS_PERCENT: u128 = 5;

    /// Share of the principal credited to the staker's referrer
    pub const REFERRER_BONUS_PERCENT: u128 = 5;

    /// Lock period of every staking position
    pub const LOCK_PERIOD_DAYS: i64 = 365;

    /// Length of generated referral codes
    pub const REFERRAL_CODE_LEN: usize = 10;

    /// Longest accepted wallet address
    pub const MAX_ADDRESS_LEN: usize = 255;

    /// Longest accepted transaction hash
    pub const MAX_TX_HASH_LEN: usize = 100;
}

pub use constants::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::amount::TokenAmount;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{CoreError, Result};
    pub use crate::model::*;
    pub use crate::types::*;
}
