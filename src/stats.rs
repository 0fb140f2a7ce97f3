use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::guard::Decision;

/// Lock-free guard counters.
#[derive(Debug, Default)]
pub struct GuardStats {
    total_requests: AtomicU64,
    exempt_requests: AtomicU64,
    admitted_requests: AtomicU64,
    rate_limited_requests: AtomicU64,
    blocked_requests: AtomicU64,
    blocks_started: AtomicU64,
    sweeps: AtomicU64,
    swept_clients: AtomicU64,
}

/// Point-in-time copy of [`GuardStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStatsSnapshot {
    pub total_requests: u64,
    pub exempt_requests: u64,
    pub admitted_requests: u64,
    pub rate_limited_requests: u64,
    pub blocked_requests: u64,
    pub blocks_started: u64,
    pub sweeps: u64,
    pub swept_clients: u64,
    pub tracked_clients: usize,
}

impl GuardStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, decision: &Decision) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let counter = match decision {
            Decision::Exempt => &self.exempt_requests,
            Decision::Admitted => &self.admitted_requests,
            Decision::Blocked { .. } => &self.blocked_requests,
            Decision::RateLimited { blocked, .. } => {
                if *blocked {
                    self.blocks_started.fetch_add(1, Ordering::Relaxed);
                }
                &self.rate_limited_requests
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, removed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept_clients.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, tracked_clients: usize) -> GuardStatsSnapshot {
        GuardStatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            exempt_requests: self.exempt_requests.load(Ordering::Relaxed),
            admitted_requests: self.admitted_requests.load(Ordering::Relaxed),
            rate_limited_requests: self.rate_limited_requests.load(Ordering::Relaxed),
            blocked_requests: self.blocked_requests.load(Ordering::Relaxed),
            blocks_started: self.blocks_started.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            swept_clients: self.swept_clients.load(Ordering::Relaxed),
            tracked_clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_counts_by_outcome() {
        let stats = GuardStats::new();
        stats.record(&Decision::Exempt);
        stats.record(&Decision::Admitted);
        stats.record(&Decision::Admitted);
        stats.record(&Decision::RateLimited { strikes: 1, blocked: false });
        stats.record(&Decision::RateLimited { strikes: 3, blocked: true });
        stats.record(&Decision::Blocked { remaining: Duration::from_secs(10) });
        stats.record_sweep(7);

        let snapshot = stats.snapshot(4);
        assert_eq!(snapshot.total_requests, 6);
        assert_eq!(snapshot.exempt_requests, 1);
        assert_eq!(snapshot.admitted_requests, 2);
        assert_eq!(snapshot.rate_limited_requests, 2);
        assert_eq!(snapshot.blocks_started, 1);
        assert_eq!(snapshot.blocked_requests, 1);
        assert_eq!(snapshot.sweeps, 1);
        assert_eq!(snapshot.swept_clients, 7);
        assert_eq!(snapshot.tracked_clients, 4);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = GuardStats::new().snapshot(0);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["total_requests"], 0);
        assert_eq!(json["tracked_clients"], 0);
    }
}
