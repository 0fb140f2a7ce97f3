//! Per-client limiter, strike and block state behind one store-wide lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::GuardConfig;
use crate::token_bucket::TokenBucket;

/// State tracked for one client key.
#[derive(Debug, Clone)]
pub struct ClientState {
    pub(crate) limiter: TokenBucket,
    pub(crate) strikes: u32,
    pub(crate) blocked_until: Option<Instant>,
    pub(crate) last_seen_at: Instant,
}

impl ClientState {
    fn new(config: &GuardConfig, now: Instant) -> Self {
        Self {
            limiter: TokenBucket::per_minute(config.per_ip_per_minute, config.per_ip_burst, now),
            strikes: 0,
            blocked_until: None,
            last_seen_at: now,
        }
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }

    /// Remaining block time, `None` when not blocked at `now`.
    pub fn block_remaining(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    pub fn is_blocked(&self, now: Instant) -> bool {
        self.block_remaining(now).is_some()
    }
}

/// Map from client key to [`ClientState`].
#[derive(Debug, Default)]
pub struct ClientStore {
    clients: Mutex<HashMap<String, ClientState>>,
}

impl ClientStore {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::with_capacity(512)),
        }
    }

    /// Take the store lock. All reads and writes for a request happen through
    /// the returned guard, which is held for one critical section.
    pub fn lock(&self) -> ClientStoreGuard<'_> {
        // Entries are only touched through short, non-panicking updates, so
        // recovering a poisoned map keeps admission working.
        ClientStoreGuard {
            clients: self.clients.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of a client's state, without creating or refreshing it.
    pub fn snapshot(&self, key: &str) -> Option<ClientState> {
        self.lock().clients.get(key).cloned()
    }
}

/// Exclusive access to the client map.
pub struct ClientStoreGuard<'a> {
    clients: MutexGuard<'a, HashMap<String, ClientState>>,
}

impl ClientStoreGuard<'_> {
    /// Return the state for `key` with `last_seen_at` refreshed, creating a
    /// fresh one (full bucket, no strikes, not blocked) on first sighting.
    pub fn get_or_create(&mut self, key: &str, config: &GuardConfig, now: Instant) -> &mut ClientState {
        let state = self
            .clients
            .entry(key.to_string())
            .or_insert_with(|| ClientState::new(config, now));

        if now > state.last_seen_at {
            state.last_seen_at = now;
        }
        state
    }

    pub fn get(&self, key: &str) -> Option<&ClientState> {
        self.clients.get(key)
    }

    /// Delete one entry. Only the sweep calls this.
    pub(crate) fn remove(&mut self, key: &str) -> Option<ClientState> {
        self.clients.remove(key)
    }

    /// Remove every entry last seen before `now - stale_after` that is not
    /// blocked at `now`. Returns how many were removed.
    pub fn sweep(&mut self, now: Instant, stale_after: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(stale_after) else {
            // Process younger than the stale window: nothing can be stale.
            return 0;
        };

        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|(_, state)| state.last_seen_at < cutoff && !state.is_blocked(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
