//! Wallet bootstrap and account statistics

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::referral::ReferralResolver;
use crate::views::{AccountStats, BootstrapOutcome, RewardBreakdown};
use stakeline_core::{
    Account, Address, ReferralCode, RewardEntry, RewardKind, TokenAmount, WalletKind,
};
use stakeline_storage::{StoreError, UniqueKey, WriteBatch};
use std::sync::Arc;

/// Fresh codes tried before giving up on a creation
const CODE_ATTEMPTS: usize = 8;

/// Creates accounts and reports their state
pub struct AccountService {
    ctx: Arc<LedgerContext>,
    resolver: ReferralResolver,
}

impl AccountService {
    pub fn new(ctx: Arc<LedgerContext>) -> Self {
        let resolver = ReferralResolver::new(ctx.clone());
        Self { ctx, resolver }
    }

    /// Return the account for `address`, creating it on first sight.
    ///
    /// A referral code is honoured only on creation. The referrer's signup
    /// credit commits in the same batch as the new account.
    pub fn bootstrap(
        &self,
        address: &str,
        referral_code: Option<&str>,
        wallet_kind: WalletKind,
    ) -> LedgerResult<BootstrapOutcome> {
        let address = Address::new(address)?;

        if let Some(existing) = self.ctx.find_account(&address)? {
            return Ok(self.existing(&existing));
        }

        let referral_code = referral_code.map(str::trim).filter(|code| !code.is_empty());
        let referrer = match referral_code {
            Some(code) => self.resolver.resolve(code, &address)?.map(|a| a.address),
            None => None,
        };

        let _locks = self.ctx.locks.acquire(std::iter::once(&address).chain(referrer.as_ref()));

        // a concurrent bootstrap may have won while we waited
        if let Some(existing) = self.ctx.find_account(&address)? {
            tracing::debug!(address = %address.short(), "Bootstrap lost race, returning existing account");
            return Ok(self.existing(&existing));
        }

        let now = self.ctx.clock.now();
        let reward = self.ctx.config.signup_reward;

        for _ in 0..CODE_ATTEMPTS {
            let account = Account::new(
                address.clone(),
                wallet_kind,
                ReferralCode::generate(),
                referrer.clone(),
                now,
            )?;

            let mut batch = WriteBatch::new();
            batch.create_account(account.clone());

            if let Some(referrer) = &referrer {
                let mut credited = self.ctx.require_account(referrer)?;
                credited.credit_signup_reward(reward)?;
                batch.update_account(credited);
                batch.append_reward(
                    RewardEntry::new(referrer.clone(), reward, RewardKind::SignupReferral, now)
                        .with_referee(address.clone()),
                );
            }

            match self.ctx.commit("bootstrap", batch) {
                Ok(()) => {
                    tracing::info!(
                        address = %address.short(),
                        referrer = referrer.as_ref().map(|r| r.short()),
                        "Account created"
                    );
                    return Ok(self.created(&account, referral_code.is_some(), referrer.is_some(), reward));
                }
                Err(StoreError::Conflict(UniqueKey::ReferralCode(code))) => {
                    tracing::debug!(%code, "Referral code collision, regenerating");
                }
                Err(StoreError::Conflict(UniqueKey::Address(_))) => {
                    let existing = self.ctx.require_account(&address)?;
                    return Ok(self.existing(&existing));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::Storage(StoreError::Backend(format!(
            "no unique referral code after {} attempts",
            CODE_ATTEMPTS
        ))))
    }

    /// Account snapshot with referral summary and reward breakdown
    pub fn stats(&self, address: &str) -> LedgerResult<AccountStats> {
        let address = Address::new(address)?;
        let account = self.ctx.require_account(&address)?;
        let total_referrals = self
            .ctx
            .with_retry("referral_count", |store| store.referral_count(&address))?;

        let counters = account.rewards();
        let earned_from_staking = counters
            .from_own_staking
            .checked_add(counters.from_referral_staking)?;

        Ok(AccountStats {
            wallet_address: account.address.clone(),
            wallet_type: account.wallet_kind,
            referral_code: account.referral_code.clone(),
            referral_link: self.ctx.config.referral_link(account.referral_code.as_str()),
            referrer: account.referrer.clone(),
            total_referrals,
            token_balance: account.token_balance(),
            total_earned: account.total_earned(),
            total_staked: account.total_staked(),
            earned_from_staking,
            reward_breakdown: RewardBreakdown::from_counters(counters)?,
            created_at: account.created_at,
        })
    }

    /// Credit history of an account, oldest first
    pub fn reward_history(&self, address: &str) -> LedgerResult<Vec<RewardEntry>> {
        let address = Address::new(address)?;
        self.ctx.require_account(&address)?;
        Ok(self
            .ctx
            .with_retry("rewards_of", |store| store.rewards_of(&address))?)
    }

    fn existing(&self, account: &Account) -> BootstrapOutcome {
        BootstrapOutcome::new(
            account,
            self.ctx.config.referral_link(account.referral_code.as_str()),
            false,
        )
    }

    fn created(
        &self,
        account: &Account,
        code_supplied: bool,
        credited: bool,
        reward: TokenAmount,
    ) -> BootstrapOutcome {
        let mut outcome = BootstrapOutcome::new(
            account,
            self.ctx.config.referral_link(account.referral_code.as_str()),
            true,
        );
        if code_supplied {
            outcome.referrer_bonus_given = Some(credited);
        }
        if credited {
            outcome.referrer_received = Some(reward);
        }
        outcome
    }
}
