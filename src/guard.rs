//! Admission decisions: allowlist, block check, dual token buckets, strikes.
//!
//! ```text
//! request key
//!     → allowlist hit?          → Exempt (no state touched)
//!     → store lock: get_or_create
//!         → blocked?            → Blocked { remaining }
//!         → client && global?   → Admitted (forgive one strike)
//!         → otherwise           → RateLimited (strike; block at threshold)
//!     → every 1024th request    → sweep stale entries
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::allowlist::Allowlist;
use crate::client_state::ClientStore;
use crate::config::GuardConfig;
use crate::stats::{GuardStats, GuardStatsSnapshot};
use crate::token_bucket::Limiter;

/// Number of guarded requests between opportunistic sweeps.
pub const SWEEP_EVERY: u64 = 1024;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Client is allowlisted.
    Exempt,
    Admitted,
    /// Client is serving a block.
    Blocked { remaining: Duration },
    /// A limiter denied the request. `strikes` is the count after this
    /// denial and before any reset; `blocked` is set when it started a block.
    RateLimited { strikes: u32, blocked: bool },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Exempt | Decision::Admitted)
    }
}

/// Read-only view of one client's enforcement state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub strikes: u32,
    pub blocked: bool,
    pub block_remaining_seconds: u64,
    /// Whole tokens left in the client's own bucket.
    pub available_tokens: u32,
}

/// The admission guard. Owns all of its state; share it with `Arc`.
#[derive(Debug)]
pub struct DdosGuard {
    config: GuardConfig,
    allowlist: Allowlist,
    global: Limiter,
    clients: ClientStore,
    request_counter: AtomicU64,
    stats: GuardStats,
}

impl DdosGuard {
    pub fn new(config: GuardConfig) -> Self {
        let allowlist = Allowlist::parse(&config.whitelist);
        let global = Limiter::per_minute(config.global_per_minute, config.global_burst);

        Self {
            config,
            allowlist,
            global,
            clients: ClientStore::new(),
            request_counter: AtomicU64::new(0),
            stats: GuardStats::new(),
        }
    }

    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Decide whether `client` may proceed at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> Decision {
        if self.allowlist.contains(client) {
            self.stats.record(&Decision::Exempt);
            return Decision::Exempt;
        }

        let decision = self.decide(client, now);
        self.stats.record(&decision);

        let seen = self.request_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if seen % SWEEP_EVERY == 0 {
            self.sweep_at(now);
        }

        decision
    }

    fn decide(&self, client: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock();
        let state = clients.get_or_create(client, &self.config, now);

        if let Some(remaining) = state.block_remaining(now) {
            return Decision::Blocked { remaining };
        }
        state.blocked_until = None;

        // Both buckets are always charged; a grant from one is not refunded
        // when the other denies.
        let client_granted = state.limiter.try_admit_at(now);
        let global_granted = self.global.try_admit_at(now);

        if client_granted && global_granted {
            state.strikes = state.strikes.saturating_sub(1);
            return Decision::Admitted;
        }

        state.strikes = state.strikes.saturating_add(1);
        let strikes = state.strikes;
        let blocked = strikes >= self.config.strike_threshold;
        if blocked {
            state.blocked_until = Some(block_deadline(now, self.config.block_duration()));
            state.strikes = 0;
            debug!(
                subsystem = "http_ddos_guard",
                client = %client,
                block_seconds = self.config.block_seconds,
                "Strike threshold reached, blocking client"
            );
        }

        Decision::RateLimited { strikes, blocked }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Evict entries idle for three block durations that are not blocked.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock();
        let removed = clients.sweep(now, self.config.stale_after());
        let remaining = clients.len();
        drop(clients);

        self.stats.record_sweep(removed);
        debug!(subsystem = "http_ddos_guard", removed, remaining, "Swept idle clients");
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn client_status(&self, client: &str) -> Option<ClientStatus> {
        self.client_status_at(client, Instant::now())
    }

    pub fn client_status_at(&self, client: &str, now: Instant) -> Option<ClientStatus> {
        self.clients.snapshot(client).map(|mut state| {
            let remaining = state.block_remaining(now);
            ClientStatus {
                strikes: state.strikes(),
                blocked: remaining.is_some(),
                block_remaining_seconds: remaining.map(|r| r.as_secs()).unwrap_or(0),
                available_tokens: state.limiter.available_tokens_at(now),
            }
        })
    }

    pub fn stats(&self) -> GuardStatsSnapshot {
        self.stats.snapshot(self.tracked_clients())
    }
}

/// `now + block`, shortened until it fits in an `Instant`.
fn block_deadline(now: Instant, mut block: Duration) -> Instant {
    loop {
        if let Some(deadline) = now.checked_add(block) {
            return deadline;
        }
        block /= 2;
    }
}
