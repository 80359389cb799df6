//! In-memory ledger store
//!
//! All tables sit behind one `RwLock`. Reads share it; `commit` validates
//! the whole batch and applies it under a single write guard, so readers
//! never see half a batch.

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult, UniqueKey};
use crate::LedgerStore;
use parking_lot::RwLock;
use stakeline_core::{
    Account, Address, PositionId, ReferralCode, RewardEntry, RewardKind, StakingPosition, TxHash,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<Address, Account>,
    codes: HashMap<ReferralCode, Address>,
    positions: BTreeMap<PositionId, StakingPosition>,
    tx_index: HashMap<TxHash, PositionId>,
    owner_index: HashMap<Address, BTreeSet<PositionId>>,
    referral_counts: HashMap<Address, u64>,
    rewards: HashMap<Address, Vec<RewardEntry>>,
    reward_keys: HashSet<(Address, RewardKind, PositionId)>,
    reward_seq: u64,
}

impl Tables {
    fn validate(&self, ops: &[WriteOp]) -> StoreResult<()> {
        let mut new_addresses = HashSet::new();
        let mut new_codes = HashSet::new();
        let mut new_ids = HashSet::new();
        let mut new_txs = HashSet::new();
        let mut new_rewards = HashSet::new();

        for op in ops {
            match op {
                WriteOp::CreateAccount(account) => {
                    if self.accounts.contains_key(&account.address)
                        || !new_addresses.insert(account.address.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::Address(
                            account.address.clone(),
                        )));
                    }
                    if self.codes.contains_key(&account.referral_code)
                        || !new_codes.insert(account.referral_code.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::ReferralCode(
                            account.referral_code.clone(),
                        )));
                    }
                }
                WriteOp::UpdateAccount(account) => match self.accounts.get(&account.address) {
                    Some(current) => check_immutable(current, account)?,
                    None if new_addresses.contains(&account.address) => {}
                    None => return Err(StoreError::Missing(format!("account {}", account.address))),
                },
                WriteOp::CreatePosition(position) => {
                    if self.positions.contains_key(&position.id) || !new_ids.insert(position.id) {
                        return Err(StoreError::Conflict(UniqueKey::PositionId(position.id)));
                    }
                    if self.tx_index.contains_key(&position.tx_hash)
                        || !new_txs.insert(position.tx_hash.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::TxHash(
                            position.tx_hash.clone(),
                        )));
                    }
                }
                WriteOp::UpdatePosition(position) => {
                    if !self.positions.contains_key(&position.id) && !new_ids.contains(&position.id) {
                        return Err(StoreError::Missing(format!("position {}", position.id)));
                    }
                }
                WriteOp::AppendReward(entry) => {
                    if let Some(key) = entry.position_key() {
                        if self.reward_keys.contains(&key) || !new_rewards.insert(key.clone()) {
                            let (account, kind, id) = key;
                            return Err(StoreError::Conflict(UniqueKey::Reward(account, kind, id)));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, ops: Vec<WriteOp>) {
        for op in ops {
            match op {
                WriteOp::CreateAccount(account) => {
                    self.codes
                        .insert(account.referral_code.clone(), account.address.clone());
                    if let Some(referrer) = &account.referrer {
                        *self.referral_counts.entry(referrer.clone()).or_insert(0) += 1;
                    }
                    self.accounts.insert(account.address.clone(), account);
                }
                WriteOp::UpdateAccount(account) => {
                    self.accounts.insert(account.address.clone(), account);
                }
                WriteOp::CreatePosition(position) => {
                    self.tx_index.insert(position.tx_hash.clone(), position.id);
                    self.owner_index
                        .entry(position.owner.clone())
                        .or_default()
                        .insert(position.id);
                    self.positions.insert(position.id, position);
                }
                WriteOp::UpdatePosition(position) => {
                    self.positions.insert(position.id, position);
                }
                WriteOp::AppendReward(mut entry) => {
                    self.reward_seq += 1;
                    entry.seq = self.reward_seq;
                    if let Some(key) = entry.position_key() {
                        self.reward_keys.insert(key);
                    }
                    self.rewards.entry(entry.account.clone()).or_default().push(entry);
                }
            }
        }
    }
}

pub(crate) fn check_immutable(current: &Account, next: &Account) -> StoreResult<()> {
    if current.referral_code != next.referral_code || current.referrer != next.referrer {
        return Err(StoreError::Rejected(format!(
            "referral fields of {} are immutable",
            current.address
        )));
    }
    Ok(())
}

/// Ledger store kept entirely in process memory
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    fn account(&self, address: &Address) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().accounts.get(address).cloned())
    }

    fn account_by_code(&self, code: &ReferralCode) -> StoreResult<Option<Account>> {
        let tables = self.tables.read();
        Ok(tables
            .codes
            .get(code)
            .and_then(|address| tables.accounts.get(address))
            .cloned())
    }

    fn position(&self, id: PositionId) -> StoreResult<Option<StakingPosition>> {
        Ok(self.tables.read().positions.get(&id).cloned())
    }

    fn position_by_tx(&self, tx_hash: &TxHash) -> StoreResult<Option<StakingPosition>> {
        let tables = self.tables.read();
        Ok(tables
            .tx_index
            .get(tx_hash)
            .and_then(|id| tables.positions.get(id))
            .cloned())
    }

    fn positions_of(&self, owner: &Address) -> StoreResult<Vec<StakingPosition>> {
        let tables = self.tables.read();
        Ok(tables
            .owner_index
            .get(owner)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.positions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn referral_count(&self, referrer: &Address) -> StoreResult<u64> {
        Ok(self
            .tables
            .read()
            .referral_counts
            .get(referrer)
            .copied()
            .unwrap_or(0))
    }

    fn rewards_of(&self, account: &Address) -> StoreResult<Vec<RewardEntry>> {
        Ok(self
            .tables
            .read()
            .rewards
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    fn addresses(&self) -> StoreResult<Vec<Address>> {
        Ok(self.tables.read().accounts.keys().cloned().collect())
    }

    fn next_position_id(&self) -> StoreResult<PositionId> {
        Ok(PositionId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.into_ops();
        let mut tables = self.tables.write();
        tables.validate(&ops)?;
        tables.apply(ops);
        Ok(())
    }
}
