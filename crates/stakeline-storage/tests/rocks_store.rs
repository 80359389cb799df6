//! Integration tests for the RocksDB ledger store

use chrono::Utc;
use stakeline_core::{
    Account, Address, BalanceSnapshot, PositionId, ReferralCode, RewardEntry, RewardKind,
    StakeSplit, StakingPosition, TokenAmount, TxHash, WalletKind,
};
use stakeline_storage::{LedgerStore, RocksStore, StoreError, UniqueKey, WriteBatch};

fn account(addr: &str, referrer: Option<&str>) -> Account {
    Account::new(
        Address::new(addr).unwrap(),
        WalletKind::Real,
        ReferralCode::generate(),
        referrer.map(|r| Address::new(r).unwrap()),
        Utc::now(),
    )
    .unwrap()
}

fn position(store: &RocksStore, owner: &str, tx: &str) -> StakingPosition {
    StakingPosition::new(
        store.next_position_id().unwrap(),
        Address::new(owner).unwrap(),
        TxHash::new(tx).unwrap(),
        StakeSplit::compute("2.5".parse().unwrap(), true).unwrap(),
        Utc::now(),
        BalanceSnapshot::default(),
    )
}

#[test]
fn test_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let alice = account("0xalice", None);
    let bob = account("0xbob", Some("0xalice"));

    let first_id = {
        let store = RocksStore::open(dir.path()).unwrap();
        let pos = position(&store, "0xbob", "0xtx1");
        let id = pos.id;

        let mut batch = WriteBatch::new();
        batch
            .create_account(alice.clone())
            .create_account(bob.clone())
            .create_position(pos)
            .append_reward(RewardEntry::new(
                alice.address.clone(),
                TokenAmount::signup_reward(),
                RewardKind::SignupReferral,
                Utc::now(),
            ));
        store.commit(batch).unwrap();
        id
    };

    let store = RocksStore::open(dir.path()).unwrap();
    assert_eq!(store.account(&alice.address).unwrap(), Some(alice.clone()));
    assert_eq!(
        store.account_by_code(&bob.referral_code).unwrap().map(|a| a.address),
        Some(bob.address.clone())
    );
    assert_eq!(store.referral_count(&alice.address).unwrap(), 1);

    let positions = store.positions_of(&bob.address).unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].id, first_id);
    assert_eq!(positions[0].staked_amount.to_string(), "2.375");

    let rewards = store.rewards_of(&alice.address).unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].seq, 1);

    // ids keep increasing after a restart
    assert!(store.next_position_id().unwrap() > first_id);
}

#[test]
fn test_tx_hash_conflict_applies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();

    let mut batch = WriteBatch::new();
    batch.create_account(account("0xalice", None));
    batch.create_position(position(&store, "0xalice", "0xdup"));
    store.commit(batch).unwrap();

    let mut batch = WriteBatch::new();
    batch.create_account(account("0xbob", None));
    batch.create_position(position(&store, "0xbob", "0xdup"));
    let err = store.commit(batch).unwrap_err();

    assert!(matches!(err, StoreError::Conflict(UniqueKey::TxHash(_))));
    assert!(store.account(&Address::new("0xbob").unwrap()).unwrap().is_none());
    assert!(store.positions_of(&Address::new("0xbob").unwrap()).unwrap().is_empty());
}

#[test]
fn test_prefix_scan_does_not_leak_between_owners() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();

    // "0xab" is a byte prefix of "0xabc"
    let mut batch = WriteBatch::new();
    batch.create_account(account("0xab", None));
    batch.create_account(account("0xabc", None));
    batch.create_position(position(&store, "0xab", "0x1"));
    batch.create_position(position(&store, "0xabc", "0x2"));
    batch.create_position(position(&store, "0xabc", "0x3"));
    store.commit(batch).unwrap();

    assert_eq!(store.positions_of(&Address::new("0xab").unwrap()).unwrap().len(), 1);
    assert_eq!(store.positions_of(&Address::new("0xabc").unwrap()).unwrap().len(), 2);
    assert_eq!(store.addresses().unwrap().len(), 2);
}

#[test]
fn test_update_position_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = RocksStore::open(dir.path()).unwrap();
    let mut pos = position(&store, "0xalice", "0xtx");

    let mut batch = WriteBatch::new();
    batch.create_account(account("0xalice", None));
    batch.create_position(pos.clone());
    store.commit(batch).unwrap();

    let later = pos.unlock_date;
    pos.unlock(later).unwrap();
    let mut batch = WriteBatch::new();
    batch.update_position(pos.clone());
    store.commit(batch).unwrap();

    let stored = store.position(pos.id).unwrap().unwrap();
    assert!(stored.is_unlocked);
    assert_eq!(stored.unlocked_at, Some(later));
    assert!(store.position(PositionId(9_999)).unwrap().is_none());
}

#[test]
fn test_position_reward_is_unique_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let alice = account("0xalice", None);
    let pos_id;
    let unlock;
    {
        let store = RocksStore::open(dir.path()).unwrap();
        let pos = position(&store, "0xalice", "0xtx");
        pos_id = pos.id;
        unlock = RewardEntry::new(
            alice.address.clone(),
            pos.staked_amount,
            RewardKind::StakingUnlock,
            Utc::now(),
        )
        .with_position(pos.id);

        let mut batch = WriteBatch::new();
        batch
            .create_account(alice.clone())
            .create_position(pos)
            .append_reward(unlock.clone());
        store.commit(batch).unwrap();
    }

    let store = RocksStore::open(dir.path()).unwrap();
    let mut batch = WriteBatch::new();
    batch.update_account(alice.clone()).append_reward(unlock);
    let err = store.commit(batch).unwrap_err();

    assert!(matches!(
        err,
        StoreError::Conflict(UniqueKey::Reward(_, RewardKind::StakingUnlock, id)) if id == pos_id
    ));
    assert_eq!(store.rewards_of(&alice.address).unwrap().len(), 1);
}
