//! Per-client token buckets.
//!
//! Each client gets a bucket holding up to `burst` tokens that refills
//! continuously at `rps` tokens per second. A request spends one token; an
//! empty bucket rejects. Buckets live only in this process and are dropped by
//! a periodic sweep once their client has been quiet for `stale_after`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LimiterConfig;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    /// `retry_after` is the time until one whole token is available again.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

pub struct BucketStore {
    enabled: bool,
    rps: f64,
    burst: f64,
    stale_after: Duration,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl BucketStore {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            enabled: config.enabled,
            rps: config.rps.max(0.0),
            burst: f64::from(config.burst),
            stale_after: config.stale_after(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn allow(&self, client: IpAddr) -> bool {
        self.check(client).is_allowed()
    }

    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        if !self.enabled {
            return Decision::Allowed;
        }

        let mut buckets = self.lock();
        let bucket = buckets.entry(client).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Decision::Allowed
        } else {
            let missing = 1.0 - bucket.tokens;
            let retry_after = Duration::try_from_secs_f64(missing / self.rps)
                .unwrap_or(Duration::from_secs(u64::from(u32::MAX)));
            Decision::Denied { retry_after }
        }
    }

    /// Drop every bucket idle for longer than the staleness threshold.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let stale_after = self.stale_after;
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_seen) <= stale_after);
        before - buckets.len()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the repeating sweep on its own task. The first sweep happens one
    /// `interval` after the call; intervals under a second are raised to one.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let interval = interval.max(Duration::from_secs(1));
        let store = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "swept stale rate limit buckets");
                        }
                    }
                }
            }
            info!("rate limit sweeper stopped");
        });

        SweeperHandle { cancel, task }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Bucket>> {
        // Bucket updates cannot leave the map half-written, so a poisoned
        // lock is still safe to use.
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the sweeper task; `shutdown` cancels it and waits for it to exit.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("rate limit sweeper task failed: {}", e);
        }
    }
}
