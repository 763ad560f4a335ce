//! Core rate limiter implementation.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::key::IdentityKey;
use super::policy::RateLimitPolicy;
use super::record::{AttemptRecord, Decision};

/// Sliding-window attempt limiter with a hard lockout.
///
/// Each identity key gets an [`AttemptRecord`]. Once the attempts inside the
/// policy window exceed `max_attempts`, the key is blocked for
/// `block_duration` and every call is rejected until the block expires,
/// whatever happens to the window in the meantime.
///
/// The limiter is an explicit instance; share it with `Arc<RateLimiter>`.
/// Recording calls for one key are serialized on that key's map shard, so
/// concurrent attempts cannot both slip in under the threshold.
///
/// Every method has an `_at` variant taking the current instant, which is
/// sampled once per call by the plain variants.
pub struct RateLimiter {
    /// Attempt records indexed by identity key
    records: DashMap<IdentityKey, AttemptRecord>,
}

impl RateLimiter {
    /// Create an empty rate limiter.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Record an attempt for `key` and report whether it is admitted.
    ///
    /// The call itself is the recording act: invoke it before the gated
    /// operation, and again after that operation fails so the failure counts
    /// toward the budget. A blocked key is rejected without being charged.
    pub fn is_allowed(&self, key: &IdentityKey, policy: &RateLimitPolicy) -> bool {
        self.is_allowed_at(key, policy, Instant::now())
    }

    /// [`is_allowed`](Self::is_allowed) evaluated at `now`.
    pub fn is_allowed_at(&self, key: &IdentityKey, policy: &RateLimitPolicy, now: Instant) -> bool {
        self.record_attempt_at(key, policy, now).is_allowed()
    }

    /// Record an attempt for `key`, returning the full decision.
    pub fn record_attempt(&self, key: &IdentityKey, policy: &RateLimitPolicy) -> Decision {
        self.record_attempt_at(key, policy, Instant::now())
    }

    /// [`record_attempt`](Self::record_attempt) evaluated at `now`.
    pub fn record_attempt_at(
        &self,
        key: &IdentityKey,
        policy: &RateLimitPolicy,
        now: Instant,
    ) -> Decision {
        let mut record = self
            .records
            .entry(key.clone())
            .or_insert_with(AttemptRecord::new);

        let was_blocked = record.remaining_block(now).is_some();
        let decision = record.record(now, policy);

        trace!(
            key = %key,
            attempts = record.len(),
            decision = ?decision,
            "Evaluated attempt"
        );

        if let Decision::Blocked { retry_after } = decision {
            if !was_blocked {
                warn!(
                    key = %key,
                    max_attempts = policy.max_attempts(),
                    window = ?policy.window(),
                    retry_after = ?retry_after,
                    "Attempt limit exceeded, blocking key"
                );
            }
        }

        decision
    }

    /// Decide whether `key` may attempt now, without recording anything.
    ///
    /// Only an active block denies admission. `remaining` reports how many
    /// more recorded attempts the window tolerates before a block starts.
    pub fn check_admission(&self, key: &IdentityKey, policy: &RateLimitPolicy) -> Decision {
        self.check_admission_at(key, policy, Instant::now())
    }

    /// [`check_admission`](Self::check_admission) evaluated at `now`.
    pub fn check_admission_at(
        &self,
        key: &IdentityKey,
        policy: &RateLimitPolicy,
        now: Instant,
    ) -> Decision {
        match self.records.get(key) {
            Some(record) => record.admission(now, policy),
            None => Decision::Allowed {
                remaining: policy.max_attempts(),
            },
        }
    }

    /// Time until `key` is unblocked; zero if it is not blocked.
    pub fn time_until_unblocked(&self, key: &IdentityKey) -> Duration {
        self.time_until_unblocked_at(key, Instant::now())
    }

    /// [`time_until_unblocked`](Self::time_until_unblocked) evaluated at `now`.
    pub fn time_until_unblocked_at(&self, key: &IdentityKey, now: Instant) -> Duration {
        self.records
            .get(key)
            .and_then(|record| record.remaining_block(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Forget everything about `key`. Unknown keys are ignored.
    pub fn reset(&self, key: &IdentityKey) {
        if self.records.remove(key).is_some() {
            debug!(key = %key, "Reset attempt history");
        }
    }

    /// Remove records that are unblocked and idle for at least `retention`.
    ///
    /// `retention` must be at least the longest policy window in use;
    /// a shorter one evicts attempts that still count toward a budget.
    /// Returns the number of records removed.
    pub fn sweep_stale(&self, retention: Duration) -> usize {
        self.sweep_stale_at(retention, Instant::now())
    }

    /// [`sweep_stale`](Self::sweep_stale) evaluated at `now`.
    pub fn sweep_stale_at(&self, retention: Duration, now: Instant) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.is_stale(now, retention));
        let removed = before.saturating_sub(self.records.len());

        if removed > 0 {
            debug!(removed = removed, remaining = self.records.len(), "Swept stale records");
        }
        removed
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Number of attempts retained for `key`, if it is tracked.
    pub fn attempt_count(&self, key: &IdentityKey) -> Option<usize> {
        self.records.get(key).map(|record| record.len())
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
