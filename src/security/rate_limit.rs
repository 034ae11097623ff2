//! Fixed-window rate limiting keyed by (route, partition key).
//!
//! # Algorithm
//!
//! On each check the stored `(attempts, expires_at)` for the identity is
//! loaded. A missing or expired entry starts a new window
//! `(0, now + window)`. If `attempts` already equals the ceiling the check
//! is rejected with the seconds left in the window; otherwise the count is
//! incremented and the request allowed. Rejected attempts are not counted.
//!
//! Windows are fixed, not sliding: a client can pass up to twice the ceiling
//! across a window boundary (end of one window plus start of the next).
//!
//! # Thread Safety
//!
//! The read-modify-write runs under the [`DashMap`] shard write lock held by
//! the entry guard, so concurrent checks on one identity never lose updates.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::context::RequestContext;
use crate::error::RouterError;
use crate::observability::metrics;
use crate::routing::{CompiledRoute, PartitionKey, RateLimitSpec};

/// Source of the current time in whole unix seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    attempts: u32,
    expires_at: u64,
}

/// An admitted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateOutcome {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the window resets.
    pub reset_at: u64,
}

/// Fixed-window counters.
pub struct RateWindow {
    entries: DashMap<String, WindowEntry>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateWindow")
            .field("entries", &self.entries.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RateWindow {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Count one attempt for `identity` against `ceiling` per `window_secs`.
    pub fn check(
        &self,
        identity: &str,
        ceiling: u32,
        window_secs: u64,
    ) -> Result<RateOutcome, RouterError> {
        let now = self.clock.now();

        // The guard holds the shard lock until it drops.
        let mut entry = self
            .entries
            .entry(identity.to_string())
            .or_insert(WindowEntry {
                attempts: 0,
                expires_at: 0,
            });

        if now >= entry.expires_at {
            *entry = WindowEntry {
                attempts: 0,
                expires_at: now.saturating_add(window_secs),
            };
        }

        if entry.attempts >= ceiling {
            let retry_after_secs = entry.expires_at - now;
            return Err(RouterError::RateLimitExceeded {
                limit: ceiling,
                retry_after_secs,
                reset_at: entry.expires_at,
            });
        }

        entry.attempts += 1;
        Ok(RateOutcome {
            limit: ceiling,
            remaining: ceiling - entry.attempts,
            reset_at: entry.expires_at,
        })
    }

    /// Drop entries whose window has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically purge expired entries on the tokio runtime.
    pub fn run_cleanup_loop(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let window = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = window.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = window.len(), "Purged expired rate windows");
                }
            }
        })
    }
}

/// Rate-limit identity for a request: route discriminator plus the
/// selected partition value. The user id is only the one set by
/// authentication middleware. Missing user ids and API keys fall back to the
/// client IP, then to `anonymous`.
pub fn identity_for(route: &CompiledRoute, spec: &RateLimitSpec, ctx: &RequestContext) -> String {
    let ip = ctx.client_ip.map(|ip| ip.to_string());
    let selected = match spec.key {
        PartitionKey::Ip => None,
        PartitionKey::UserId => ctx.user_id.as_deref().map(|u| format!("user:{}", u)),
        PartitionKey::ApiKey => ctx.api_key().map(|k| format!("key:{}", k)),
    };
    let value = selected
        .or_else(|| ip.map(|ip| format!("ip:{}", ip)))
        .unwrap_or_else(|| "anonymous".to_string());
    format!("{}|{}", route.discriminator(), value)
}

/// Check the route's limit, if it has one.
pub fn enforce(
    window: &RateWindow,
    route: &CompiledRoute,
    ctx: &RequestContext,
) -> Result<Option<RateOutcome>, RouterError> {
    let Some(spec) = route.rate_limit() else {
        return Ok(None);
    };
    let identity = identity_for(route, spec, ctx);
    match window.check(&identity, spec.ceiling, spec.window_secs) {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e) => {
            tracing::warn!(identity = %identity, route = %route.discriminator(), "Rate limit exceeded");
            metrics::record_rate_limited(&route.discriminator());
            Err(e)
        }
    }
}
