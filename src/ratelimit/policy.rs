//! Rate limit policies.
//!
//! A policy is the `(window, max_attempts, block_duration)` triple governing
//! one use of the limiter. Policies are validated when they are built, so
//! every limiter call made with one is well defined.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LoginGuardError, Result};

/// Default sliding window for the login policy.
const DEFAULT_LOGIN_WINDOW: Duration = Duration::from_secs(60);
/// Default attempt budget for the login policy.
const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 5;
/// Default lockout for the login policy.
const DEFAULT_LOGIN_BLOCK: Duration = Duration::from_secs(15 * 60);
/// Upper bound for windows and lockouts, keeping instant arithmetic in range.
const MAX_POLICY_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// A validated rate limit policy.
///
/// Deserializes through [`PolicyRule`], so invalid values fail at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRule", into = "PolicyRule")]
pub struct RateLimitPolicy {
    window: Duration,
    max_attempts: u32,
    block_duration: Duration,
}

impl RateLimitPolicy {
    /// Create a policy.
    ///
    /// Fails if `window` is zero or `max_attempts` is zero, or if either
    /// duration exceeds ten years. A zero `block_duration` is allowed and
    /// makes the block expire immediately.
    pub fn new(window: Duration, max_attempts: u32, block_duration: Duration) -> Result<Self> {
        if window.is_zero() {
            return Err(LoginGuardError::Config(
                "window must be greater than zero".to_string(),
            ));
        }
        if max_attempts == 0 {
            return Err(LoginGuardError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if window > MAX_POLICY_DURATION || block_duration > MAX_POLICY_DURATION {
            return Err(LoginGuardError::Config(
                "window and block_duration must not exceed ten years".to_string(),
            ));
        }
        Ok(Self {
            window,
            max_attempts,
            block_duration,
        })
    }

    /// The default login policy: 5 attempts per minute, 15 minute lockout.
    pub fn login() -> Self {
        Self {
            window: DEFAULT_LOGIN_WINDOW,
            max_attempts: DEFAULT_LOGIN_MAX_ATTEMPTS,
            block_duration: DEFAULT_LOGIN_BLOCK,
        }
    }

    /// Length of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Attempts permitted within the window before blocking.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// How long a key stays blocked once the threshold is exceeded.
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::login()
    }
}

/// Wire form of a policy as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Sliding window length in milliseconds
    pub window_ms: u64,
    /// Attempts permitted within the window
    pub max_attempts: u32,
    /// Lockout length in milliseconds
    #[serde(default)]
    pub block_duration_ms: u64,
}

impl TryFrom<PolicyRule> for RateLimitPolicy {
    type Error = LoginGuardError;

    fn try_from(rule: PolicyRule) -> Result<Self> {
        RateLimitPolicy::new(
            Duration::from_millis(rule.window_ms),
            rule.max_attempts,
            Duration::from_millis(rule.block_duration_ms),
        )
    }
}

impl From<RateLimitPolicy> for PolicyRule {
    fn from(policy: RateLimitPolicy) -> Self {
        Self {
            window_ms: policy.window.as_millis() as u64,
            max_attempts: policy.max_attempts,
            block_duration_ms: policy.block_duration.as_millis() as u64,
        }
    }
}

/// The named policies used by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Policy guarding sign-in attempts
    #[serde(default)]
    pub login: RateLimitPolicy,
}
