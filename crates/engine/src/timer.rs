//! Cancellable timer chains, one per aggregate.
//!
//! A chain is a spawned task that alternates sleeping and acting on its
//! aggregate. [`TimerService`] hands out one [`CancellationToken`] per chain
//! key and guarantees that arming a new chain cancels the previous one, so a
//! pin can never have two live question loops broadcasting at once.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Registry of the outstanding timer chain per aggregate key.
pub struct TimerService {
    chains: Mutex<HashMap<String, CancellationToken>>,
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// Cancel any outstanding chain for `key` and hand out a fresh token
    /// for the new one.
    pub async fn arm(&self, key: &str) -> CancellationToken {
        let mut chains = self.chains.lock().await;
        if let Some(previous) = chains.remove(key) {
            tracing::debug!(key, "Cancelling previous timer chain");
            previous.cancel();
        }
        let token = CancellationToken::new();
        chains.insert(key.to_string(), token.clone());
        token
    }

    /// Cancel the chain for `key`, if any. Idempotent.
    pub async fn cancel(&self, key: &str) {
        if let Some(token) = self.chains.lock().await.remove(key) {
            token.cancel();
        }
    }

    /// Forget a chain that ran to completion. Does not cancel.
    pub async fn complete(&self, key: &str) {
        self.chains.lock().await.remove(key);
    }

    /// Number of outstanding chains.
    pub async fn active_chains(&self) -> usize {
        self.chains.lock().await.len()
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep for `secs` unless the token fires first. Returns `false` when the
/// chain was cancelled and the caller must stop without acting.
pub async fn sleep_or_cancelled(token: &CancellationToken, secs: u64) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
    }
}
