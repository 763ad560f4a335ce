//! Background eviction of idle attempt records.
//!
//! Pruning inside the limiter is lazy, so a key that never comes back keeps
//! its record until something removes it. The sweeper bounds that memory in
//! long-lived processes.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Spawn a task that calls [`RateLimiter::sweep_stale`] every `interval`.
///
/// Records that are unblocked and idle for at least `retention` are removed.
/// Pass a retention no shorter than the policy window, as
/// [`GuardConfig::validate`](crate::config::GuardConfig::validate) enforces.
/// Abort the returned handle to stop sweeping.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    info!(
        interval = ?interval,
        retention = ?retention,
        "Starting stale record sweeper"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let removed = limiter.sweep_stale(retention);
            debug!(
                removed = removed,
                tracked = limiter.tracked_keys(),
                "Sweep pass complete"
            );
        }
    })
}
