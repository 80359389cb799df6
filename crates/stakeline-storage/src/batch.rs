//! Atomic write batches

use stakeline_core::{Account, RewardEntry, StakingPosition};

/// One mutation inside a [`WriteBatch`]
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Insert if neither the address nor the referral code is taken
    CreateAccount(Account),
    /// Replace an existing account row
    UpdateAccount(Account),
    /// Insert if neither the id nor the tx_hash is taken
    CreatePosition(StakingPosition),
    /// Replace an existing position row
    UpdatePosition(StakingPosition),
    /// Append to the account's reward history
    AppendReward(RewardEntry),
}

/// Set of mutations committed all-or-nothing
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_account(&mut self, account: Account) -> &mut Self {
        self.ops.push(WriteOp::CreateAccount(account));
        self
    }

    pub fn update_account(&mut self, account: Account) -> &mut Self {
        self.ops.push(WriteOp::UpdateAccount(account));
        self
    }

    pub fn create_position(&mut self, position: StakingPosition) -> &mut Self {
        self.ops.push(WriteOp::CreatePosition(position));
        self
    }

    pub fn update_position(&mut self, position: StakingPosition) -> &mut Self {
        self.ops.push(WriteOp::UpdatePosition(position));
        self
    }

    pub fn append_reward(&mut self, entry: RewardEntry) -> &mut Self {
        self.ops.push(WriteOp::AppendReward(entry));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
