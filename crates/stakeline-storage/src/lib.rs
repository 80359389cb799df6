//! # Stakeline Storage
//!
//! Durable keyed storage for accounts, staking positions and reward history.
//!
//! ## Storage Layout
//!
//! - `accounts` - account rows keyed by address
//! - `referral_codes` - referral code -> address (unique index)
//! - `positions` - position rows keyed by big-endian id
//! - `tx_hashes` - tx_hash -> position id (unique index)
//! - `owner_positions` - `owner \0 id` secondary index
//! - `referrals` - `referrer \0 referee` secondary index
//! - `rewards` - `account \0 seq` reward history
//! - `reward_keys` - `account \0 kind:position` (unique per position-linked reward)
//!
//! Every mutation goes through [`LedgerStore::commit`], which checks all
//! unique keys of a [`WriteBatch`] before applying any of it.

pub mod batch;
pub mod error;
pub mod memory;
pub mod rocks;

use stakeline_core::{Account, Address, PositionId, ReferralCode, RewardEntry, StakingPosition, TxHash};

pub use batch::{WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult, UniqueKey};
pub use memory::MemoryStore;
pub use rocks::RocksStore;

/// Transactional ledger storage
pub trait LedgerStore: Send + Sync {
    /// Account by wallet address
    fn account(&self, address: &Address) -> StoreResult<Option<Account>>;

    /// Account owning a referral code
    fn account_by_code(&self, code: &ReferralCode) -> StoreResult<Option<Account>>;

    /// Position by id
    fn position(&self, id: PositionId) -> StoreResult<Option<StakingPosition>>;

    /// Position created with a tx_hash
    fn position_by_tx(&self, tx_hash: &TxHash) -> StoreResult<Option<StakingPosition>>;

    /// All positions of an owner, ascending by id
    fn positions_of(&self, owner: &Address) -> StoreResult<Vec<StakingPosition>>;

    /// Number of accounts whose referrer is `referrer`
    fn referral_count(&self, referrer: &Address) -> StoreResult<u64>;

    /// Reward history of an account in commit order
    fn rewards_of(&self, account: &Address) -> StoreResult<Vec<RewardEntry>>;

    /// Every account address, ascending
    fn addresses(&self) -> StoreResult<Vec<Address>>;

    /// Reserve a fresh position id
    fn next_position_id(&self) -> StoreResult<PositionId>;

    /// Apply a batch atomically.
    ///
    /// Returns [`StoreError::Conflict`] without applying anything when a
    /// create op collides with an existing row or with another op in the
    /// same batch.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Storage backend selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    RocksDb(std::path::PathBuf),
}

/// Open the configured backend
pub fn open(backend: &Backend) -> StoreResult<std::sync::Arc<dyn LedgerStore>> {
    match backend {
        Backend::Memory => {
            tracing::info!("Using in-memory ledger store");
            Ok(std::sync::Arc::new(MemoryStore::new()))
        }
        Backend::RocksDb(path) => {
            tracing::info!("Opening RocksDB ledger store at {:?}", path);
            Ok(std::sync::Arc::new(RocksStore::open(path)?))
        }
    }
}
