//! Staking engine
//!
//! ```text
//! created ──(now >= unlock_date)──► matured ──unlock──► unlocked
//! ```
//!
//! `created` and `matured` are both stored as `is_unlocked == false`;
//! eligibility is computed from the clock on every read.

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::views::{PositionList, PositionView, StakeReceipt, UnlockReceipt};
use stakeline_core::{
    Address, PositionId, RewardEntry, RewardKind, StakeSplit, StakingPosition, TokenAmount,
    TxHash, UnlockRefusal,
};
use stakeline_storage::{StoreError, UniqueKey, WriteBatch};
use std::sync::Arc;

/// Creates, lists and releases staking positions
pub struct StakingEngine {
    ctx: Arc<LedgerContext>,
}

impl StakingEngine {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        Self { ctx }
    }

    /// Lock `principal` for the lock period and pay out the bonuses.
    ///
    /// Idempotent on `tx_hash`: a repeated submission by the same owner
    /// returns the original receipt without touching any balance.
    pub fn process_stake(
        &self,
        owner: &str,
        principal: TokenAmount,
        tx_hash: &str,
    ) -> LedgerResult<StakeReceipt> {
        if principal.is_zero() {
            return Err(LedgerError::InvalidAmount(
                "stake amount must be positive".to_string(),
            ));
        }
        let owner = Address::new(owner)?;
        let tx_hash = TxHash::new(tx_hash)?;
        let account = self.ctx.require_account(&owner)?;

        if let Some(position) = self.position_by_tx(&tx_hash)? {
            return self.replay(position, &owner);
        }

        let referrer = account.referrer.clone();
        let _locks = self
            .ctx
            .locks
            .acquire(std::iter::once(&owner).chain(referrer.as_ref()));

        if let Some(position) = self.position_by_tx(&tx_hash)? {
            return self.replay(position, &owner);
        }

        let mut account = self.ctx.require_account(&owner)?;
        let split = StakeSplit::compute(principal, referrer.is_some())?;
        let now = self.ctx.clock.now();
        let id = self
            .ctx
            .with_retry("next_position_id", |store| store.next_position_id())?;

        account.credit_own_stake(&split)?;
        let position = StakingPosition::new(
            id,
            owner.clone(),
            tx_hash.clone(),
            split,
            now,
            account.snapshot(),
        );

        let mut batch = WriteBatch::new();
        batch
            .create_position(position.clone())
            .update_account(account)
            .append_reward(
                RewardEntry::new(owner.clone(), split.bonus_received, RewardKind::StakingSelf, now)
                    .with_position(id),
            );

        if let Some(referrer) = &referrer {
            let mut credited = self.ctx.require_account(referrer)?;
            credited.credit_referral_stake(split.referrer_bonus)?;
            batch.update_account(credited).append_reward(
                RewardEntry::new(
                    referrer.clone(),
                    split.referrer_bonus,
                    RewardKind::StakingReferral,
                    now,
                )
                .with_position(id)
                .with_referee(owner.clone()),
            );
        }

        match self.ctx.commit("process_stake", batch) {
            Ok(()) => {
                tracing::info!(
                    owner = %owner.short(),
                    position = %id,
                    principal = %principal,
                    staked = %split.staked_amount,
                    "Stake processed"
                );
                Ok(StakeReceipt::from_position(&position, false))
            }
            // another request with the same tx_hash committed first, or a
            // retried commit finds its own earlier attempt already applied
            Err(err @ StoreError::Conflict(UniqueKey::TxHash(_) | UniqueKey::PositionId(_))) => {
                match self.position_by_tx(&tx_hash)? {
                    Some(winner) => self.replay(winner, &owner),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Release a matured position back to its owner's balance
    pub fn unlock(&self, id: PositionId, requester: &str) -> LedgerResult<UnlockReceipt> {
        let requester = Address::new(requester)?;
        let position = self.require_position(id)?;
        if position.owner != requester {
            return Err(LedgerError::Forbidden {
                position: id,
                requester,
            });
        }

        let _locks = self.ctx.locks.acquire([&position.owner]);
        let mut position = self.require_position(id)?;
        let now = self.ctx.clock.now();

        match position.unlock(now) {
            Ok(()) => {}
            Err(UnlockRefusal::AlreadyUnlocked) => {
                tracing::debug!(position = %id, "Unlock repeated");
                return Err(LedgerError::AlreadyUnlocked(Box::new(self.unlock_receipt(&position)?)));
            }
            Err(UnlockRefusal::NotMatured) => {
                return Err(LedgerError::NotMatured {
                    position: id,
                    unlock_date: position.unlock_date,
                    days_remaining: position.days_remaining(now),
                });
            }
        }

        let mut account = self.ctx.require_account(&position.owner)?;
        account.release_stake(position.staked_amount)?;
        position.release_snapshot = Some(account.snapshot());

        let mut batch = WriteBatch::new();
        batch
            .update_position(position.clone())
            .update_account(account)
            .append_reward(
                RewardEntry::new(
                    position.owner.clone(),
                    position.staked_amount,
                    RewardKind::StakingUnlock,
                    now,
                )
                .with_position(id),
            );
        match self.ctx.commit("unlock", batch) {
            Ok(()) => {}
            // a retry after an acknowledged-as-failed write that did land
            Err(err @ StoreError::Conflict(UniqueKey::Reward(..))) => {
                let stored = self.require_position(id)?;
                if !stored.is_unlocked {
                    return Err(err.into());
                }
                tracing::debug!(position = %id, "Unlock already applied by an earlier attempt");
                return self.unlock_receipt(&stored);
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            owner = %position.owner.short(),
            position = %id,
            released = %position.staked_amount,
            "Stake unlocked"
        );
        self.unlock_receipt(&position)
    }

    /// Positions of `owner`, newest first. Unknown owners have none.
    pub fn list_positions(&self, owner: &str) -> LedgerResult<PositionList> {
        let owner = Address::new(owner)?;
        let account = self.ctx.find_account(&owner)?;
        let mut positions = self
            .ctx
            .with_retry("positions_of", |store| store.positions_of(&owner))?;
        positions.sort_by(|a, b| b.id.cmp(&a.id));

        let now = self.ctx.clock.now();
        let completed = positions.iter().filter(|p| p.is_unlocked).count();

        Ok(PositionList {
            total_staked: account.map(|a| a.total_staked()).unwrap_or_default(),
            active_stakings: positions.len() - completed,
            completed_stakings: completed,
            stakings: positions.iter().map(|p| PositionView::at(p, now)).collect(),
        })
    }

    fn position_by_tx(&self, tx_hash: &TxHash) -> LedgerResult<Option<StakingPosition>> {
        Ok(self
            .ctx
            .with_retry("position_by_tx", |store| store.position_by_tx(tx_hash))?)
    }

    fn require_position(&self, id: PositionId) -> LedgerResult<StakingPosition> {
        self.ctx
            .with_retry("position", |store| store.position(id))?
            .ok_or(LedgerError::PositionNotFound(id))
    }

    fn replay(&self, position: StakingPosition, owner: &Address) -> LedgerResult<StakeReceipt> {
        if &position.owner != owner {
            tracing::warn!(
                tx_hash = %position.tx_hash,
                owner = %owner.short(),
                "tx_hash reused by a different account"
            );
            return Err(LedgerError::DuplicateTransaction(position.tx_hash));
        }
        tracing::debug!(tx_hash = %position.tx_hash, position = %position.id, "Stake replayed");
        Ok(StakeReceipt::from_position(&position, true))
    }

    fn unlock_receipt(&self, position: &StakingPosition) -> LedgerResult<UnlockReceipt> {
        UnlockReceipt::from_position(position).ok_or_else(|| {
            LedgerError::Storage(StoreError::Codec(format!(
                "position {} is unlocked without a release record",
                position.id
            )))
        })
    }
}
