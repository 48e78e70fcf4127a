//! Single-writer serialization per aggregate id.
//!
//! Every read-modify-write of a session, battle, or tournament runs under
//! that aggregate's keyed mutex, so concurrent submissions against the same
//! participant or concurrent joins against the same tournament cannot race
//! on the shared counters and scores.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of keyed async mutexes, one per aggregate id.
pub struct AggregateLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AggregateLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for `key`, creating it on first use. The guard
    /// serializes all mutations of the aggregate behind the key.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for an aggregate that reached a terminal state.
    /// Late holders keep their guard; only the registry entry goes away.
    pub async fn discard(&self, key: &str) {
        self.inner.lock().await.remove(key);
    }

    /// Number of registered keys.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl Default for AggregateLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(AggregateLocks::new());
        let counter = Arc::new(AtomicI32::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("tournament:1").await;
                // Read-modify-write with a yield in the middle; the keyed
                // lock must keep it atomic.
                let seen = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(seen + 1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = AggregateLocks::new();
        let _a = locks.acquire("battle:1").await;
        // Must not deadlock.
        let _b = locks.acquire("battle:2").await;
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn discard_removes_the_entry() {
        let locks = AggregateLocks::new();
        drop(locks.acquire("session:123456").await);
        locks.discard("session:123456").await;
        assert!(locks.is_empty().await);
    }
}
