//! Shared state of the ledger services

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::locks::LockTable;
use stakeline_core::{Account, Address, Clock};
use stakeline_storage::{LedgerStore, StoreResult, WriteBatch};
use std::sync::Arc;
use std::time::Duration;

/// Store, clock, locks and configuration shared by every service
pub struct LedgerContext {
    pub store: Arc<dyn LedgerStore>,
    pub clock: Arc<dyn Clock>,
    pub locks: LockTable,
    pub config: LedgerConfig,
}

impl LedgerContext {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            locks: LockTable::new(),
            config,
        }
    }

    /// Run a store call, retrying transient failures with linear backoff
    pub(crate) fn with_retry<T>(
        &self,
        operation: &'static str,
        mut call: impl FnMut(&dyn LedgerStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut attempt = 0u32;
        loop {
            match call(self.store.as_ref()) {
                Err(err) if err.is_transient() && attempt < self.config.commit_retries => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %err, "Retrying store call");
                    let backoff = self.config.retry_backoff_ms.saturating_mul(attempt as u64);
                    std::thread::sleep(Duration::from_millis(backoff));
                }
                other => return other,
            }
        }
    }

    /// Commit a batch, retrying transient failures
    pub(crate) fn commit(&self, operation: &'static str, batch: WriteBatch) -> StoreResult<()> {
        self.with_retry(operation, |store| store.commit(batch.clone()))
    }

    pub(crate) fn find_account(&self, address: &Address) -> LedgerResult<Option<Account>> {
        Ok(self.with_retry("account", |store| store.account(address))?)
    }

    pub(crate) fn require_account(&self, address: &Address) -> LedgerResult<Account> {
        self.find_account(address)?
            .ok_or_else(|| LedgerError::AccountNotFound(address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeline_core::SystemClock;
    use stakeline_storage::{MemoryStore, StoreError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn context(retries: u32) -> LedgerContext {
        let config = LedgerConfig {
            commit_retries: retries,
            retry_backoff_ms: 0,
            ..LedgerConfig::default()
        };
        LedgerContext::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config)
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let ctx = context(3);
        let calls = AtomicU32::new(0);
        let result = ctx.with_retry("test", |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Unavailable("busy".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let ctx = context(2);
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = ctx.with_retry("test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("busy".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_failures_are_not_retried() {
        let ctx = context(5);
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = ctx.with_retry("test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("corrupt".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
