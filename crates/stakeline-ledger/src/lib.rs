//! # Stakeline Ledger
//!
//! Staking and referral reward engine on top of a [`LedgerStore`].
//!
//! ```text
//!  client ──► AccountService ──► ReferralResolver
//!        └──► StakingEngine ──┐
//!                             ├──► LedgerStore::commit (atomic batch)
//!  audit ──► RewardAggregator ┘
//! ```
//!
//! Every balance change happens while holding the [`LockTable`] entries of
//! the accounts involved and lands in one atomic [`WriteBatch`] together
//! with its reward history entry. Uniqueness of addresses, referral codes
//! and transaction hashes is enforced by the store at commit time.
//!
//! [`WriteBatch`]: stakeline_storage::WriteBatch

pub mod accounts;
pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod referral;
pub mod rewards;
pub mod staking;
pub mod views;

pub use accounts::AccountService;
pub use config::LedgerConfig;
pub use context::LedgerContext;
pub use error::{LedgerError, LedgerResult};
pub use locks::LockTable;
pub use referral::ReferralResolver;
pub use rewards::{AuditReport, ReplayedTotals, RewardAggregator};
pub use staking::StakingEngine;
pub use views::*;

use stakeline_core::{Address, Clock, PositionId, RewardEntry, SystemClock, TokenAmount, WalletKind};
use stakeline_storage::{LedgerStore, MemoryStore};
use std::sync::Arc;

/// Entry point bundling every ledger service over one shared context
#[derive(Clone)]
pub struct Ledger {
    ctx: Arc<LedgerContext>,
    accounts: Arc<AccountService>,
    staking: Arc<StakingEngine>,
    rewards: Arc<RewardAggregator>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        let ctx = Arc::new(LedgerContext::new(store, clock, config));
        Self {
            accounts: Arc::new(AccountService::new(ctx.clone())),
            staking: Arc::new(StakingEngine::new(ctx.clone())),
            rewards: Arc::new(RewardAggregator::new(ctx.clone())),
            ctx,
        }
    }

    /// Ledger over a fresh in-memory store and the system clock
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config)
    }

    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.ctx.config
    }

    pub fn bootstrap_wallet(
        &self,
        address: &str,
        referral_code: Option<&str>,
        wallet_kind: WalletKind,
    ) -> LedgerResult<BootstrapOutcome> {
        self.accounts.bootstrap(address, referral_code, wallet_kind)
    }

    pub fn stats(&self, address: &str) -> LedgerResult<AccountStats> {
        self.accounts.stats(address)
    }

    pub fn reward_history(&self, address: &str) -> LedgerResult<Vec<RewardEntry>> {
        self.accounts.reward_history(address)
    }

    pub fn process_stake(
        &self,
        owner: &str,
        principal: TokenAmount,
        tx_hash: &str,
    ) -> LedgerResult<StakeReceipt> {
        self.staking.process_stake(owner, principal, tx_hash)
    }

    pub fn unlock(&self, position: PositionId, requester: &str) -> LedgerResult<UnlockReceipt> {
        self.staking.unlock(position, requester)
    }

    pub fn list_positions(&self, owner: &str) -> LedgerResult<PositionList> {
        self.staking.list_positions(owner)
    }

    pub fn audit(&self, address: &str) -> LedgerResult<AuditReport> {
        let address = Address::new(address)?;
        self.rewards.audit(&address)
    }

    pub fn audit_all(&self) -> LedgerResult<Vec<AuditReport>> {
        self.rewards.audit_all()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{LedgerError, LedgerResult};
    pub use crate::views::*;
    pub use crate::{Ledger, LedgerConfig};
}
