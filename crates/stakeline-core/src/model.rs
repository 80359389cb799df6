//! Ledger rows: accounts, staking positions and reward history
//!
//! Balance fields are private. They change only through the credit methods
//! below, each of which corresponds to one kind of ledger event.

use crate::amount::TokenAmount;
use crate::clock::days_until;
use crate::constants::*;
use crate::error::{CoreError, Result};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-account reward buckets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCounters {
    /// Signup rewards received as a referrer
    pub from_signups: TokenAmount,
    /// Bonuses on the account's own stakes
    pub from_own_staking: TokenAmount,
    /// Bonuses on stakes made by referred accounts
    pub from_referral_staking: TokenAmount,
}

impl RewardCounters {
    /// Rewards earned through referrals (signups plus referred stakes)
    pub fn total_referral_rewards(&self) -> Result<TokenAmount> {
        self.from_signups.checked_add(self.from_referral_staking)
    }

    /// Sum of every bucket; equals `total_earned` of the owning account
    pub fn total(&self) -> Result<TokenAmount> {
        self.total_referral_rewards()?
            .checked_add(self.from_own_staking)
    }
}

/// Balances of an account at one instant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub token_balance: TokenAmount,
    pub total_earned: TokenAmount,
    pub total_staked: TokenAmount,
}

/// Wallet account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Wallet address (primary key)
    pub address: Address,

    /// How the wallet was connected
    pub wallet_kind: WalletKind,

    /// Invite code, fixed at creation
    pub referral_code: ReferralCode,

    /// Account that invited this one, fixed at creation
    pub referrer: Option<Address>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    token_balance: TokenAmount,
    total_earned: TokenAmount,
    total_staked: TokenAmount,
    rewards: RewardCounters,
}

impl Account {
    /// New account with zero balances.
    ///
    /// A referrer equal to the account itself is rejected.
    pub fn new(
        address: Address,
        wallet_kind: WalletKind,
        referral_code: ReferralCode,
        referrer: Option<Address>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if referrer.as_ref() == Some(&address) {
            return Err(CoreError::InvalidAddress(format!(
                "{} cannot refer itself",
                address
            )));
        }
        Ok(Self {
            address,
            wallet_kind,
            referral_code,
            referrer,
            created_at,
            token_balance: TokenAmount::ZERO,
            total_earned: TokenAmount::ZERO,
            total_staked: TokenAmount::ZERO,
            rewards: RewardCounters::default(),
        })
    }

    pub fn token_balance(&self) -> TokenAmount {
        self.token_balance
    }

    pub fn total_earned(&self) -> TokenAmount {
        self.total_earned
    }

    pub fn total_staked(&self) -> TokenAmount {
        self.total_staked
    }

    pub fn rewards(&self) -> &RewardCounters {
        &self.rewards
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            token_balance: self.token_balance,
            total_earned: self.total_earned,
            total_staked: self.total_staked,
        }
    }

    fn earn(&mut self, amount: TokenAmount) -> Result<()> {
        self.token_balance = self.token_balance.checked_add(amount)?;
        self.total_earned = self.total_earned.checked_add(amount)?;
        Ok(())
    }

    /// Referred wallet signed up
    pub fn credit_signup_reward(&mut self, amount: TokenAmount) -> Result<()> {
        let mut next = self.clone();
        next.earn(amount)?;
        next.rewards.from_signups = next.rewards.from_signups.checked_add(amount)?;
        *self = next;
        Ok(())
    }

    /// Own stake: bonus is paid out, the remainder is locked
    pub fn credit_own_stake(&mut self, split: &StakeSplit) -> Result<()> {
        let mut next = self.clone();
        next.earn(split.bonus_received)?;
        next.rewards.from_own_staking = next
            .rewards
            .from_own_staking
            .checked_add(split.bonus_received)?;
        next.total_staked = next.total_staked.checked_add(split.staked_amount)?;
        *self = next;
        Ok(())
    }

    /// Referred account staked
    pub fn credit_referral_stake(&mut self, amount: TokenAmount) -> Result<()> {
        let mut next = self.clone();
        next.earn(amount)?;
        next.rewards.from_referral_staking =
            next.rewards.from_referral_staking.checked_add(amount)?;
        *self = next;
        Ok(())
    }

    /// Matured stake released back to the spendable balance.
    /// Not an earning: `total_earned` is untouched.
    pub fn release_stake(&mut self, staked_amount: TokenAmount) -> Result<()> {
        let total_staked = self.total_staked.checked_sub(staked_amount)?;
        let token_balance = self.token_balance.checked_add(staked_amount)?;
        self.total_staked = total_staked;
        self.token_balance = token_balance;
        Ok(())
    }
}

/// Division of a principal into its bonus and locked parts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSplit {
    pub principal: TokenAmount,
    /// 5% back to the staker
    pub bonus_received: TokenAmount,
    /// 5% to the referrer, zero without one
    pub referrer_bonus: TokenAmount,
    /// principal minus the staker's bonus
    pub staked_amount: TokenAmount,
}

impl StakeSplit {
    /// `bonus_received + staked_amount == principal` holds exactly; the
    /// truncated remainder of the 5% stays in `staked_amount`.
    pub fn compute(principal: TokenAmount, has_referrer: bool) -> Result<Self> {
        if principal.is_zero() {
            return Err(CoreError::InvalidAmount(
                "stake amount must be positive".to_string(),
            ));
        }
        let bonus_received = principal.percent(STAKE_BONUS_PERCENT)?;
        let referrer_bonus = if has_referrer {
            principal.percent(REFERRER_BONUS_PERCENT)?
        } else {
            TokenAmount::ZERO
        };
        let staked_amount = principal.checked_sub(bonus_received)?;
        Ok(Self {
            principal,
            bonus_received,
            referrer_bonus,
            staked_amount,
        })
    }
}

/// Why an unlock was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockRefusal {
    AlreadyUnlocked,
    NotMatured,
}

/// Time-locked stake owned by one account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPosition {
    pub id: PositionId,
    pub owner: Address,
    pub tx_hash: TxHash,
    pub principal: TokenAmount,
    pub bonus_received: TokenAmount,
    pub referrer_bonus: TokenAmount,
    pub staked_amount: TokenAmount,
    pub created_at: DateTime<Utc>,
    pub unlock_date: DateTime<Utc>,
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    /// Owner balances right after the stake committed
    pub owner_snapshot: BalanceSnapshot,
    /// Owner balances right after the unlock committed
    pub release_snapshot: Option<BalanceSnapshot>,
}

impl StakingPosition {
    pub fn new(
        id: PositionId,
        owner: Address,
        tx_hash: TxHash,
        split: StakeSplit,
        created_at: DateTime<Utc>,
        owner_snapshot: BalanceSnapshot,
    ) -> Self {
        Self {
            id,
            owner,
            tx_hash,
            principal: split.principal,
            bonus_received: split.bonus_received,
            referrer_bonus: split.referrer_bonus,
            staked_amount: split.staked_amount,
            created_at,
            unlock_date: created_at + Duration::days(LOCK_PERIOD_DAYS),
            is_unlocked: false,
            unlocked_at: None,
            owner_snapshot,
            release_snapshot: None,
        }
    }

    pub fn is_matured(&self, now: DateTime<Utc>) -> bool {
        now >= self.unlock_date
    }

    pub fn can_unlock(&self, now: DateTime<Utc>) -> bool {
        !self.is_unlocked && self.is_matured(now)
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.is_unlocked {
            return 0;
        }
        days_until(now, self.unlock_date)
    }

    /// `false -> true` transition; refuses a second call and early calls
    pub fn unlock(&mut self, now: DateTime<Utc>) -> std::result::Result<(), UnlockRefusal> {
        if self.is_unlocked {
            return Err(UnlockRefusal::AlreadyUnlocked);
        }
        if !self.is_matured(now) {
            return Err(UnlockRefusal::NotMatured);
        }
        self.is_unlocked = true;
        self.unlocked_at = Some(now);
        Ok(())
    }
}

/// Kind of credit recorded in the reward history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Referred wallet signed up
    SignupReferral,
    /// Bonus on own stake
    StakingSelf,
    /// Bonus on a referred account's stake
    StakingReferral,
    /// Principal released at maturity
    StakingUnlock,
}

impl RewardKind {
    /// Whether the credit counts towards `total_earned`
    pub fn is_earning(&self) -> bool {
        !matches!(self, Self::StakingUnlock)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignupReferral => "signup_referral",
            Self::StakingSelf => "staking_self",
            Self::StakingReferral => "staking_referral",
            Self::StakingUnlock => "staking_unlock",
        }
    }
}

/// One credit event in the ledger history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEntry {
    /// Store-assigned sequence, zero until committed
    pub seq: u64,
    pub account: Address,
    pub amount: TokenAmount,
    pub kind: RewardKind,
    pub position: Option<PositionId>,
    pub referee: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl RewardEntry {
    pub fn new(
        account: Address,
        amount: TokenAmount,
        kind: RewardKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: 0,
            account,
            amount,
            kind,
            position: None,
            referee: None,
            created_at,
        }
    }

    pub fn with_position(mut self, position: PositionId) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_referee(mut self, referee: Address) -> Self {
        self.referee = Some(referee);
        self
    }

    /// Entries tied to a position are unique per `(account, kind, position)`
    pub fn position_key(&self) -> Option<(Address, RewardKind, PositionId)> {
        self.position
            .map(|position| (self.account.clone(), self.kind, position))
    }
}
