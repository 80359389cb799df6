//! Response shapes returned by the ledger services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stakeline_core::{
    days_until, Account, Address, BalanceSnapshot, PositionId, ReferralCode, RewardCounters,
    StakingPosition, TokenAmount, TxHash, WalletKind, SYMBOL,
};

/// Result of bootstrapping a wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapOutcome {
    pub wallet_address: Address,
    pub wallet_type: WalletKind,
    pub referral_code: ReferralCode,
    pub referral_link: String,
    pub is_new: bool,
    pub token_balance: TokenAmount,
    pub total_earned: TokenAmount,
    pub total_staked: TokenAmount,
    /// Present only when a referral code was supplied on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_bonus_given: Option<bool>,
    /// Amount credited to the referrer, when one was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_received: Option<TokenAmount>,
}

impl BootstrapOutcome {
    pub(crate) fn new(account: &Account, referral_link: String, is_new: bool) -> Self {
        Self {
            wallet_address: account.address.clone(),
            wallet_type: account.wallet_kind,
            referral_code: account.referral_code.clone(),
            referral_link,
            is_new,
            token_balance: account.token_balance(),
            total_earned: account.total_earned(),
            total_staked: account.total_staked(),
            referrer_bonus_given: None,
            referrer_received: None,
        }
    }
}

/// Reward buckets of one account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub from_signups: TokenAmount,
    pub from_own_staking: TokenAmount,
    pub from_referral_staking: TokenAmount,
    pub total_referral_rewards: TokenAmount,
}

impl RewardBreakdown {
    pub fn from_counters(counters: &RewardCounters) -> stakeline_core::Result<Self> {
        Ok(Self {
            from_signups: counters.from_signups,
            from_own_staking: counters.from_own_staking,
            from_referral_staking: counters.from_referral_staking,
            total_referral_rewards: counters.total_referral_rewards()?,
        })
    }
}

/// Account snapshot with referral summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub wallet_address: Address,
    pub wallet_type: WalletKind,
    pub referral_code: ReferralCode,
    pub referral_link: String,
    pub referrer: Option<Address>,
    pub total_referrals: u64,
    pub token_balance: TokenAmount,
    pub total_earned: TokenAmount,
    pub total_staked: TokenAmount,
    /// Own stake bonuses plus bonuses on referred stakes
    pub earned_from_staking: TokenAmount,
    pub reward_breakdown: RewardBreakdown,
    pub created_at: DateTime<Utc>,
}

/// Stake confirmation as shown to the staker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub user_address: Address,
    pub amount: TokenAmount,
    pub bonus_5_percent: TokenAmount,
    pub referrer_bonus: TokenAmount,
    pub staked_amount: TokenAmount,
    pub staked_until: DateTime<Utc>,
    pub days_remaining: i64,
    pub tx_hash: TxHash,
}

/// Result of `ProcessStake`, identical for the first call and every replay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub success: bool,
    pub staking_id: PositionId,
    pub amount: TokenAmount,
    pub user_bonus: TokenAmount,
    pub referrer_bonus: TokenAmount,
    pub new_token_balance: TokenAmount,
    pub total_staked: TokenAmount,
    pub unlock_date: DateTime<Utc>,
    pub invoice: Invoice,
    /// Set when the tx_hash had already been processed
    #[serde(skip)]
    pub replayed: bool,
}

impl StakeReceipt {
    pub(crate) fn from_position(position: &StakingPosition, replayed: bool) -> Self {
        Self {
            success: true,
            staking_id: position.id,
            amount: position.principal,
            user_bonus: position.bonus_received,
            referrer_bonus: position.referrer_bonus,
            new_token_balance: position.owner_snapshot.token_balance,
            total_staked: position.owner_snapshot.total_staked,
            unlock_date: position.unlock_date,
            invoice: Invoice {
                user_address: position.owner.clone(),
                amount: position.principal,
                bonus_5_percent: position.bonus_received,
                referrer_bonus: position.referrer_bonus,
                staked_amount: position.staked_amount,
                staked_until: position.unlock_date,
                // counted from creation so a replay renders the same invoice
                days_remaining: days_until(position.created_at, position.unlock_date),
                tx_hash: position.tx_hash.clone(),
            },
            replayed,
        }
    }
}

/// Confirmation of a released position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockReceipt {
    pub success: bool,
    pub position_id: PositionId,
    pub message: String,
    pub amount: TokenAmount,
    pub unlocked_at: DateTime<Utc>,
    /// Owner balances right after the release
    pub stats: BalanceSnapshot,
}

impl UnlockReceipt {
    /// `None` while the position is still locked
    pub(crate) fn from_position(position: &StakingPosition) -> Option<Self> {
        let unlocked_at = position.unlocked_at?;
        let stats = position.release_snapshot?;
        Some(Self {
            success: true,
            position_id: position.id,
            message: format!("{} {} released", position.staked_amount, SYMBOL),
            amount: position.staked_amount,
            unlocked_at,
            stats,
        })
    }
}

/// One row of the staking list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub id: PositionId,
    pub amount: TokenAmount,
    pub bonus_received: TokenAmount,
    pub referrer_bonus: TokenAmount,
    pub staked_amount: TokenAmount,
    pub staked_at: DateTime<Utc>,
    pub unlock_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub is_unlocked: bool,
    pub can_unlock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub tx_hash: TxHash,
}

impl PositionView {
    pub fn at(position: &StakingPosition, now: DateTime<Utc>) -> Self {
        Self {
            id: position.id,
            amount: position.principal,
            bonus_received: position.bonus_received,
            referrer_bonus: position.referrer_bonus,
            staked_amount: position.staked_amount,
            staked_at: position.created_at,
            unlock_date: position.unlock_date,
            days_remaining: position.days_remaining(now),
            is_unlocked: position.is_unlocked,
            can_unlock: position.can_unlock(now),
            unlocked_at: position.unlocked_at,
            tx_hash: position.tx_hash.clone(),
        }
    }
}

/// Staking positions of one account, newest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionList {
    pub total_staked: TokenAmount,
    pub active_stakings: usize,
    pub completed_stakings: usize,
    pub stakings: Vec<PositionView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stakeline_core::{StakeSplit, LOCK_PERIOD_DAYS};

    fn position() -> StakingPosition {
        StakingPosition::new(
            PositionId(4),
            Address::new("0xbob").unwrap(),
            TxHash::new("0xfeed").unwrap(),
            StakeSplit::compute(TokenAmount::from_tokens(1), true).unwrap(),
            Utc::now(),
            BalanceSnapshot::default(),
        )
    }

    #[test]
    fn test_invoice_amounts_are_strings() {
        let receipt = StakeReceipt::from_position(&position(), false);
        let json = serde_json::to_value(&receipt).unwrap();

        assert_eq!(json["invoice"]["bonus_5_percent"], "0.05");
        assert_eq!(json["invoice"]["staked_amount"], "0.95");
        assert_eq!(json["invoice"]["days_remaining"], LOCK_PERIOD_DAYS);
        assert!(json.get("replayed").is_none());
    }

    #[test]
    fn test_replay_renders_identically() {
        let pos = position();
        let first = serde_json::to_string(&StakeReceipt::from_position(&pos, false)).unwrap();
        let again = serde_json::to_string(&StakeReceipt::from_position(&pos, true)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_unlock_receipt_requires_release() {
        let mut pos = position();
        assert!(UnlockReceipt::from_position(&pos).is_none());

        let later = pos.unlock_date + Duration::seconds(1);
        pos.unlock(later).unwrap();
        pos.release_snapshot = Some(BalanceSnapshot::default());
        let receipt = UnlockReceipt::from_position(&pos).unwrap();
        assert_eq!(receipt.amount.to_string(), "0.95");
        assert_eq!(receipt.unlocked_at, later);
    }

    #[test]
    fn test_position_view_eligibility() {
        let pos = position();
        let view = PositionView::at(&pos, pos.created_at);
        assert!(!view.can_unlock);
        assert_eq!(view.days_remaining, LOCK_PERIOD_DAYS);

        let view = PositionView::at(&pos, pos.unlock_date);
        assert!(view.can_unlock);
        assert_eq!(view.days_remaining, 0);
    }
}
