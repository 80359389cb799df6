//! Reward aggregation and ledger audit
//!
//! Running counters on each account are the fast path for statistics.
//! The reward history is the slow path: replaying it must reproduce the
//! counters, `total_earned` and `token_balance` exactly, and the open
//! positions must add up to `total_staked`.

use crate::context::LedgerContext;
use crate::error::LedgerResult;
use crate::views::RewardBreakdown;
use serde::{Deserialize, Serialize};
use stakeline_core::{Account, Address, RewardCounters, RewardEntry, RewardKind, TokenAmount};
use std::sync::Arc;

/// Totals recomputed from reward history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedTotals {
    pub counters: RewardCounters,
    /// Sum of earning credits
    pub earned: TokenAmount,
    /// Sum of every credit, unlock payouts included
    pub credited: TokenAmount,
}

/// Result of checking one account against its history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub address: Address,
    pub recorded: RewardBreakdown,
    pub replayed: RewardBreakdown,
    pub total_staked: TokenAmount,
    pub open_positions_staked: TokenAmount,
    /// Human-readable description of every mismatch
    pub issues: Vec<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Read-side projection over balances and reward history
pub struct RewardAggregator {
    ctx: Arc<LedgerContext>,
}

impl RewardAggregator {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Breakdown from the account's running counters
    pub fn breakdown(account: &Account) -> LedgerResult<RewardBreakdown> {
        Ok(RewardBreakdown::from_counters(account.rewards())?)
    }

    /// Recompute counters and totals from history entries
    pub fn replay<'a>(
        entries: impl IntoIterator<Item = &'a RewardEntry>,
    ) -> LedgerResult<ReplayedTotals> {
        let mut totals = ReplayedTotals::default();
        for entry in entries {
            let bucket = match entry.kind {
                RewardKind::SignupReferral => Some(&mut totals.counters.from_signups),
                RewardKind::StakingSelf => Some(&mut totals.counters.from_own_staking),
                RewardKind::StakingReferral => Some(&mut totals.counters.from_referral_staking),
                RewardKind::StakingUnlock => None,
            };
            if let Some(bucket) = bucket {
                *bucket = bucket.checked_add(entry.amount)?;
            }
            if entry.kind.is_earning() {
                totals.earned = totals.earned.checked_add(entry.amount)?;
            }
            totals.credited = totals.credited.checked_add(entry.amount)?;
        }
        Ok(totals)
    }

    /// Check one account's counters and balances against history and positions
    pub fn audit(&self, address: &Address) -> LedgerResult<AuditReport> {
        // account, history and positions must come from one point in time
        let _locks = self.ctx.locks.acquire([address]);
        let account = self.ctx.require_account(address)?;
        let history = self
            .ctx
            .with_retry("rewards_of", |store| store.rewards_of(address))?;
        let positions = self
            .ctx
            .with_retry("positions_of", |store| store.positions_of(address))?;

        let totals = Self::replay(&history)?;
        let recorded = Self::breakdown(&account)?;
        let replayed = RewardBreakdown::from_counters(&totals.counters)?;

        let open_positions_staked = positions
            .iter()
            .filter(|p| !p.is_unlocked)
            .try_fold(TokenAmount::ZERO, |sum, p| sum.checked_add(p.staked_amount))?;

        let mut issues = Vec::new();
        if recorded != replayed {
            issues.push(format!(
                "reward counters {:?} differ from history {:?}",
                recorded, replayed
            ));
        }
        if account.total_earned() != totals.earned {
            issues.push(format!(
                "total_earned {} but history sums to {}",
                account.total_earned(),
                totals.earned
            ));
        }
        if account.token_balance() != totals.credited {
            issues.push(format!(
                "token_balance {} but credits sum to {}",
                account.token_balance(),
                totals.credited
            ));
        }
        if account.total_staked() != open_positions_staked {
            issues.push(format!(
                "total_staked {} but open positions hold {}",
                account.total_staked(),
                open_positions_staked
            ));
        }
        if recorded.total_referral_rewards > account.total_earned() {
            issues.push("referral rewards exceed total_earned".to_string());
        }

        if !issues.is_empty() {
            tracing::warn!(address = %address, issues = issues.len(), "Ledger audit found mismatches");
        }

        Ok(AuditReport {
            address: address.clone(),
            recorded,
            replayed,
            total_staked: account.total_staked(),
            open_positions_staked,
            issues,
        })
    }

    /// Audit every account
    pub fn audit_all(&self) -> LedgerResult<Vec<AuditReport>> {
        let addresses = self.ctx.with_retry("addresses", |store| store.addresses())?;
        addresses.iter().map(|address| self.audit(address)).collect()
    }
}
