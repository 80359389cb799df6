//! Per-account lock table
//!
//! Every balance mutation runs while holding the mutex of each account it
//! touches. Multi-account operations take their locks in address order, so
//! two operations can never wait on each other in a cycle.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use stakeline_core::Address;
use std::sync::Arc;

/// Lazily populated map of account mutexes
#[derive(Default)]
pub struct LockTable {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

/// Guards held for the duration of one operation
pub struct LockSet {
    _guards: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every address in sorted, de-duplicated order
    pub fn acquire<'a>(&self, addresses: impl IntoIterator<Item = &'a Address>) -> LockSet {
        let mut keys: Vec<&Address> = addresses.into_iter().collect();
        keys.sort();
        keys.dedup();

        let guards = keys
            .into_iter()
            .map(|address| {
                // clone the Arc out so the shard lock is released before blocking
                let mutex = self.locks.entry(address.clone()).or_default().value().clone();
                mutex.lock_arc()
            })
            .collect();

        LockSet { _guards: guards }
    }

    /// Number of accounts that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_duplicate_addresses_do_not_self_deadlock() {
        let table = LockTable::new();
        let a = addr("0xa");
        let _set = table.acquire([&a, &a]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_same_account_is_serialized() {
        let table = Arc::new(LockTable::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let a = addr("0xa");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                let inside = inside.clone();
                let a = a.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _set = table.acquire([&a]);
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_opposite_orders_do_not_deadlock() {
        let table = Arc::new(LockTable::new());
        let (a, b) = (addr("0xa"), addr("0xb"));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let table = table.clone();
                let (a, b) = (a.clone(), b.clone());
                thread::spawn(move || {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            let _set = table.acquire([&a, &b]);
                        } else {
                            let _set = table.acquire([&b, &a]);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
