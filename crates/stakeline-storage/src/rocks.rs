//! RocksDB ledger store
//!
//! Rows are bincode-encoded. A commit checks every unique index while
//! holding the commit mutex, then writes the whole batch with one RocksDB
//! `WriteBatch`, which the database applies atomically.

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult, UniqueKey};
use crate::memory::check_immutable;
use crate::LedgerStore;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, Direction, IteratorMode, Options, WriteBatch as RawBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stakeline_core::{Account, Address, PositionId, ReferralCode, RewardEntry, StakingPosition, TxHash};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const CF_ACCOUNTS: &str = "accounts";
const CF_CODES: &str = "referral_codes";
const CF_POSITIONS: &str = "positions";
const CF_TX_HASHES: &str = "tx_hashes";
const CF_OWNER_POSITIONS: &str = "owner_positions";
const CF_REFERRALS: &str = "referrals";
const CF_REWARDS: &str = "rewards";
const CF_REWARD_KEYS: &str = "reward_keys";
const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 9] = [
    CF_ACCOUNTS,
    CF_CODES,
    CF_POSITIONS,
    CF_TX_HASHES,
    CF_OWNER_POSITIONS,
    CF_REFERRALS,
    CF_REWARDS,
    CF_REWARD_KEYS,
    CF_META,
];

const META_NEXT_POSITION: &[u8] = b"next_position_id";
const META_REWARD_SEQ: &[u8] = b"reward_seq";

/// Ledger store persisted in RocksDB
pub struct RocksStore {
    db: DB,
    commit_lock: Mutex<u64>,
    next_id: AtomicU64,
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn read_u64(bytes: &[u8]) -> StoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Codec(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// `prefix \0 suffix` composite key
fn composite(prefix: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(0);
    key.extend_from_slice(suffix);
    key
}

fn prefix_of(owner: &str) -> Vec<u8> {
    composite(owner, &[])
}

/// `account \0 kind:id` key of a position-linked reward
fn reward_key(entry: &RewardEntry) -> Option<Vec<u8>> {
    entry.position.map(|id| {
        composite(
            entry.account.as_str(),
            format!("{}:{}", entry.kind.as_str(), id).as_bytes(),
        )
    })
}

impl RocksStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path.as_ref(), COLUMN_FAMILIES)?;

        let store = Self {
            db,
            commit_lock: Mutex::new(0),
            next_id: AtomicU64::new(1),
        };

        let meta = store.cf(CF_META)?;
        let next_id = match store.db.get_cf(&meta, META_NEXT_POSITION)? {
            Some(bytes) => read_u64(&bytes)?,
            None => 1,
        };
        let reward_seq = match store.db.get_cf(&meta, META_REWARD_SEQ)? {
            Some(bytes) => read_u64(&bytes)?,
            None => 0,
        };
        drop(meta);

        store.next_id.store(next_id, Ordering::SeqCst);
        *store.commit_lock.lock() = reward_seq;

        tracing::debug!(next_id, reward_seq, "RocksDB ledger store opened");
        Ok(store)
    }

    fn cf(&self, name: &'static str) -> StoreResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("column family {} missing", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> StoreResult<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(&handle, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, cf: &'static str, key: &[u8]) -> StoreResult<bool> {
        let handle = self.cf(cf)?;
        Ok(self.db.get_pinned_cf(&handle, key)?.is_some())
    }

    /// Keys under `prefix \0`, in key order
    fn scan_prefix(&self, cf: &'static str, prefix: &[u8]) -> StoreResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let handle = self.cf(cf)?;
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(&handle, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn validate(&self, ops: &[WriteOp]) -> StoreResult<()> {
        let mut new_addresses = HashSet::new();
        let mut new_codes = HashSet::new();
        let mut new_ids = HashSet::new();
        let mut new_txs = HashSet::new();
        let mut new_rewards = HashSet::new();

        for op in ops {
            match op {
                WriteOp::CreateAccount(account) => {
                    if self.exists(CF_ACCOUNTS, account.address.as_str().as_bytes())?
                        || !new_addresses.insert(account.address.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::Address(
                            account.address.clone(),
                        )));
                    }
                    if self.exists(CF_CODES, account.referral_code.as_str().as_bytes())?
                        || !new_codes.insert(account.referral_code.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::ReferralCode(
                            account.referral_code.clone(),
                        )));
                    }
                }
                WriteOp::UpdateAccount(account) => {
                    match self.get::<Account>(CF_ACCOUNTS, account.address.as_str().as_bytes())? {
                        Some(current) => check_immutable(&current, account)?,
                        None if new_addresses.contains(&account.address) => {}
                        None => {
                            return Err(StoreError::Missing(format!("account {}", account.address)))
                        }
                    }
                }
                WriteOp::CreatePosition(position) => {
                    if self.exists(CF_POSITIONS, &position.id.0.to_be_bytes())?
                        || !new_ids.insert(position.id)
                    {
                        return Err(StoreError::Conflict(UniqueKey::PositionId(position.id)));
                    }
                    if self.exists(CF_TX_HASHES, position.tx_hash.as_str().as_bytes())?
                        || !new_txs.insert(position.tx_hash.clone())
                    {
                        return Err(StoreError::Conflict(UniqueKey::TxHash(
                            position.tx_hash.clone(),
                        )));
                    }
                }
                WriteOp::UpdatePosition(position) => {
                    if !self.exists(CF_POSITIONS, &position.id.0.to_be_bytes())?
                        && !new_ids.contains(&position.id)
                    {
                        return Err(StoreError::Missing(format!("position {}", position.id)));
                    }
                }
                WriteOp::AppendReward(entry) => {
                    if let (Some(key), Some(id)) = (reward_key(entry), entry.position) {
                        if self.exists(CF_REWARD_KEYS, &key)? || !new_rewards.insert(key) {
                            return Err(StoreError::Conflict(UniqueKey::Reward(
                                entry.account.clone(),
                                entry.kind,
                                id,
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl LedgerStore for RocksStore {
    fn account(&self, address: &Address) -> StoreResult<Option<Account>> {
        self.get(CF_ACCOUNTS, address.as_str().as_bytes())
    }

    fn account_by_code(&self, code: &ReferralCode) -> StoreResult<Option<Account>> {
        let handle = self.cf(CF_CODES)?;
        match self.db.get_cf(&handle, code.as_str().as_bytes())? {
            Some(address) => self.get(CF_ACCOUNTS, &address),
            None => Ok(None),
        }
    }

    fn position(&self, id: PositionId) -> StoreResult<Option<StakingPosition>> {
        self.get(CF_POSITIONS, &id.0.to_be_bytes())
    }

    fn position_by_tx(&self, tx_hash: &TxHash) -> StoreResult<Option<StakingPosition>> {
        let handle = self.cf(CF_TX_HASHES)?;
        match self.db.get_cf(&handle, tx_hash.as_str().as_bytes())? {
            Some(id) => self.get(CF_POSITIONS, &id),
            None => Ok(None),
        }
    }

    fn positions_of(&self, owner: &Address) -> StoreResult<Vec<StakingPosition>> {
        let prefix = prefix_of(owner.as_str());
        let mut positions = Vec::new();
        for (key, _) in self.scan_prefix(CF_OWNER_POSITIONS, &prefix)? {
            let id = &key[prefix.len()..];
            match self.get(CF_POSITIONS, id)? {
                Some(position) => positions.push(position),
                None => {
                    return Err(StoreError::Codec(format!(
                        "owner index of {} points at a missing position",
                        owner
                    )))
                }
            }
        }
        Ok(positions)
    }

    fn referral_count(&self, referrer: &Address) -> StoreResult<u64> {
        let prefix = prefix_of(referrer.as_str());
        Ok(self.scan_prefix(CF_REFERRALS, &prefix)?.len() as u64)
    }

    fn rewards_of(&self, account: &Address) -> StoreResult<Vec<RewardEntry>> {
        let prefix = prefix_of(account.as_str());
        self.scan_prefix(CF_REWARDS, &prefix)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    fn addresses(&self) -> StoreResult<Vec<Address>> {
        let handle = self.cf(CF_ACCOUNTS)?;
        let mut addresses = Vec::new();
        for item in self.db.iterator_cf(&handle, IteratorMode::Start) {
            let (_, value) = item?;
            let account: Account = decode(&value)?;
            addresses.push(account.address);
        }
        Ok(addresses)
    }

    fn next_position_id(&self) -> StoreResult<PositionId> {
        Ok(PositionId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.into_ops();
        let mut reward_seq = self.commit_lock.lock();
        self.validate(&ops)?;

        let accounts = self.cf(CF_ACCOUNTS)?;
        let codes = self.cf(CF_CODES)?;
        let positions = self.cf(CF_POSITIONS)?;
        let tx_hashes = self.cf(CF_TX_HASHES)?;
        let owner_positions = self.cf(CF_OWNER_POSITIONS)?;
        let referrals = self.cf(CF_REFERRALS)?;
        let rewards = self.cf(CF_REWARDS)?;
        let reward_keys = self.cf(CF_REWARD_KEYS)?;
        let meta = self.cf(CF_META)?;

        let mut raw = RawBatch::default();
        let mut seq = *reward_seq;
        let mut high_water: Option<u64> = None;

        for op in ops {
            match op {
                WriteOp::CreateAccount(account) => {
                    let key = account.address.as_str().as_bytes();
                    raw.put_cf(&codes, account.referral_code.as_str().as_bytes(), key);
                    if let Some(referrer) = &account.referrer {
                        raw.put_cf(&referrals, composite(referrer.as_str(), key), b"");
                    }
                    raw.put_cf(&accounts, key, encode(&account)?);
                }
                WriteOp::UpdateAccount(account) => {
                    raw.put_cf(&accounts, account.address.as_str().as_bytes(), encode(&account)?);
                }
                WriteOp::CreatePosition(position) => {
                    let id = position.id.0.to_be_bytes();
                    raw.put_cf(&tx_hashes, position.tx_hash.as_str().as_bytes(), id);
                    raw.put_cf(&owner_positions, composite(position.owner.as_str(), &id), b"");
                    raw.put_cf(&positions, id, encode(&position)?);
                    high_water = Some(high_water.unwrap_or(0).max(position.id.0 + 1));
                }
                WriteOp::UpdatePosition(position) => {
                    raw.put_cf(&positions, position.id.0.to_be_bytes(), encode(&position)?);
                }
                WriteOp::AppendReward(mut entry) => {
                    seq += 1;
                    entry.seq = seq;
                    if let Some(key) = reward_key(&entry) {
                        raw.put_cf(&reward_keys, key, seq.to_be_bytes());
                    }
                    raw.put_cf(
                        &rewards,
                        composite(entry.account.as_str(), &seq.to_be_bytes()),
                        encode(&entry)?,
                    );
                }
            }
        }

        if seq != *reward_seq {
            raw.put_cf(&meta, META_REWARD_SEQ, seq.to_be_bytes());
        }
        if let Some(next) = high_water {
            let persisted = next.max(self.next_id.load(Ordering::SeqCst));
            raw.put_cf(&meta, META_NEXT_POSITION, persisted.to_be_bytes());
        }

        self.db.write(raw)?;
        *reward_seq = seq;
        Ok(())
    }
}
