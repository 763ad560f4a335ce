//! Per-key attempt history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::policy::RateLimitPolicy;

/// Outcome of evaluating an attempt against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed
    Allowed {
        /// Attempts still available in the current window
        remaining: u32,
    },
    /// The key is locked out
    Blocked {
        /// Time until the lockout expires
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Attempt history for a single identity key.
///
/// Timestamps are kept in arrival order and pruned lazily whenever the
/// record is evaluated.
#[derive(Debug, Clone, Default)]
pub struct AttemptRecord {
    /// Attempt instants, oldest first
    timestamps: VecDeque<Instant>,
    /// When set and in the future, the key is blocked
    blocked_until: Option<Instant>,
}

impl AttemptRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time remaining on an active block, if any.
    ///
    /// A block ending exactly at `now` has expired.
    pub fn remaining_block(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Drop timestamps at or before `now - window`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Count attempts inside the window without pruning.
    pub fn count_in_window(&self, now: Instant, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < window)
            .count()
    }

    /// Record an attempt at `now` and decide whether it is admitted.
    ///
    /// A blocked key is rejected without recording. Otherwise the attempt is
    /// appended to the pruned window, and exceeding `max_attempts` starts a
    /// block of `block_duration`. Timestamps are kept when a block starts
    /// and age out of the window normally.
    pub fn record(&mut self, now: Instant, policy: &RateLimitPolicy) -> Decision {
        if let Some(retry_after) = self.remaining_block(now) {
            return Decision::Blocked { retry_after };
        }
        self.blocked_until = None;

        self.prune(now, policy.window());
        self.timestamps.push_back(now);

        let count = self.timestamps.len();
        let max = policy.max_attempts() as usize;
        if count <= max {
            Decision::Allowed {
                remaining: (max - count) as u32,
            }
        } else {
            self.blocked_until = Some(now + policy.block_duration());
            Decision::Blocked {
                retry_after: policy.block_duration(),
            }
        }
    }

    /// Decide admission at `now` without recording anything.
    pub fn admission(&self, now: Instant, policy: &RateLimitPolicy) -> Decision {
        if let Some(retry_after) = self.remaining_block(now) {
            return Decision::Blocked { retry_after };
        }
        let count = self.count_in_window(now, policy.window());
        Decision::Allowed {
            remaining: (policy.max_attempts() as usize).saturating_sub(count) as u32,
        }
    }

    /// Whether the record can be discarded: not blocked, and idle for at
    /// least `retention`.
    pub fn is_stale(&self, now: Instant, retention: Duration) -> bool {
        if self.remaining_block(now).is_some() {
            return false;
        }
        match self.timestamps.back() {
            Some(newest) => now.saturating_duration_since(*newest) >= retention,
            None => true,
        }
    }

    /// Number of retained timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no timestamps are retained.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The block deadline, if one was ever set and not cleared.
    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocked_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(window_ms: u64, max: u32, block_ms: u64) -> RateLimitPolicy {
        RateLimitPolicy::new(
            Duration::from_millis(window_ms),
            max,
            Duration::from_millis(block_ms),
        )
        .unwrap()
    }

    fn advance(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_record_within_limit() {
        let policy = policy(1000, 3, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        assert_eq!(record.record(now, &policy), Decision::Allowed { remaining: 2 });
        assert_eq!(record.record(now, &policy), Decision::Allowed { remaining: 1 });
        assert_eq!(record.record(now, &policy), Decision::Allowed { remaining: 0 });
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_record_exceeding_limit_blocks() {
        let policy = policy(1000, 2, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        record.record(now, &policy);
        record.record(now, &policy);
        let decision = record.record(now, &policy);

        assert_eq!(
            decision,
            Decision::Blocked {
                retry_after: Duration::from_millis(5000)
            }
        );
        assert_eq!(record.blocked_until(), Some(advance(now, 5000)));
    }

    #[test]
    fn test_blocked_record_does_not_append() {
        let policy = policy(1000, 1, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        record.record(now, &policy);
        record.record(now, &policy);
        let len = record.len();

        let decision = record.record(advance(now, 100), &policy);
        assert!(!decision.is_allowed());
        assert_eq!(record.len(), len);
    }

    #[test]
    fn test_prune_excludes_boundary() {
        let mut record = AttemptRecord::new();
        let start = Instant::now();
        let policy = policy(1000, 10, 0);

        record.record(start, &policy);
        record.record(advance(start, 1), &policy);

        // Exactly window-old timestamps fall outside the window
        record.prune(advance(start, 1000), Duration::from_millis(1000));
        assert_eq!(record.len(), 1);
        assert_eq!(
            record.count_in_window(advance(start, 1001), Duration::from_millis(1000)),
            0
        );
    }

    #[test]
    fn test_remaining_block_expires_exactly() {
        let policy = policy(1000, 1, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        record.record(now, &policy);
        record.record(now, &policy);

        assert_eq!(
            record.remaining_block(advance(now, 4999)),
            Some(Duration::from_millis(1))
        );
        assert_eq!(record.remaining_block(advance(now, 5000)), None);
    }

    #[test]
    fn test_admission_does_not_mutate() {
        let policy = policy(1000, 2, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        record.record(now, &policy);
        assert_eq!(record.admission(now, &policy), Decision::Allowed { remaining: 1 });
        assert_eq!(record.admission(now, &policy), Decision::Allowed { remaining: 1 });
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_zero_block_duration_expires_immediately() {
        let policy = policy(1000, 1, 0);
        let mut record = AttemptRecord::new();
        let now = Instant::now();

        assert!(record.record(now, &policy).is_allowed());
        assert_eq!(
            record.record(now, &policy),
            Decision::Blocked {
                retry_after: Duration::ZERO
            }
        );
        assert_eq!(record.remaining_block(now), None);
    }

    #[test]
    fn test_is_stale() {
        let policy = policy(1000, 1, 5000);
        let mut record = AttemptRecord::new();
        let now = Instant::now();
        assert!(record.is_stale(now, Duration::from_millis(1000)));

        record.record(now, &policy);
        assert!(!record.is_stale(advance(now, 999), Duration::from_millis(1000)));
        assert!(record.is_stale(advance(now, 1000), Duration::from_millis(1000)));

        // Blocked records are never stale
        record.record(now, &policy);
        assert!(!record.is_stale(advance(now, 4000), Duration::from_millis(1000)));
        assert!(record.is_stale(advance(now, 5000), Duration::from_millis(1000)));
    }
}
