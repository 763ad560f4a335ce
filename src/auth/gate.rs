//! Login gate composing the limiter with a credential check.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use super::verifier::{CredentialVerifier, Credentials, Verification};
use crate::error::Result;
use crate::ratelimit::{Decision, IdentityKey, RateLimitPolicy, RateLimiter};

/// Outcome of a gated sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted; the key's history was reset
    Authenticated,
    /// Credentials rejected and the failure recorded
    Rejected {
        /// Further failures tolerated before a lockout
        remaining: u32,
    },
    /// The key is locked out; the verifier was not called, or this failure
    /// started the lockout
    Throttled {
        /// Time until another attempt is admitted
        retry_after: Duration,
    },
}

impl LoginOutcome {
    /// Short machine-readable name of the outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            LoginOutcome::Authenticated => "authenticated",
            LoginOutcome::Rejected { .. } => "rejected",
            LoginOutcome::Throttled { .. } => "throttled",
        }
    }

    /// Human-readable message for the sign-in screen.
    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Authenticated => "Signed in.".to_string(),
            LoginOutcome::Rejected { .. } => "Invalid username or password.".to_string(),
            LoginOutcome::Throttled { retry_after } => format!(
                "Too many login attempts. Try again in {}.",
                format_wait(*retry_after)
            ),
        }
    }
}

/// Render a wait time for people: seconds under a minute, otherwise whole
/// minutes rounded up.
pub fn format_wait(wait: Duration) -> String {
    let millis = wait.as_millis();
    if millis < 60_000 {
        let secs = millis.div_ceil(1000);
        plural(secs, "second")
    } else {
        let minutes = millis.div_ceil(60_000);
        plural(minutes, "minute")
    }
}

fn plural(n: u128, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Runs sign-in attempts through the limiter.
///
/// Admission is checked before the verifier is called, and only a rejected
/// credential check is recorded against the key. A successful sign-in
/// clears the key's history.
pub struct LoginGate<V: CredentialVerifier> {
    /// Shared limiter state
    limiter: Arc<RateLimiter>,
    /// Policy applied to sign-in attempts
    policy: RwLock<RateLimitPolicy>,
    /// The credential check being gated
    verifier: V,
}

impl<V: CredentialVerifier> LoginGate<V> {
    /// Create a gate over a shared limiter.
    pub fn new(limiter: Arc<RateLimiter>, policy: RateLimitPolicy, verifier: V) -> Self {
        Self {
            limiter,
            policy: RwLock::new(policy),
            verifier,
        }
    }

    /// Replace the sign-in policy.
    pub fn set_policy(&self, policy: RateLimitPolicy) {
        let mut current = self.policy.write();
        *current = policy;
    }

    /// Get the current sign-in policy.
    pub fn policy(&self) -> RateLimitPolicy {
        *self.policy.read()
    }

    /// The limiter this gate records into.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Attempt a sign-in for the client identified by `key`.
    pub async fn attempt(&self, key: &IdentityKey, credentials: &Credentials) -> Result<LoginOutcome> {
        self.attempt_at(key, credentials, Instant::now()).await
    }

    /// [`attempt`](Self::attempt) evaluated at `now`.
    ///
    /// Verifier errors are propagated and nothing is recorded for them.
    #[instrument(skip(self, key, credentials, now), fields(key = %key, username = %credentials.username))]
    pub async fn attempt_at(
        &self,
        key: &IdentityKey,
        credentials: &Credentials,
        now: Instant,
    ) -> Result<LoginOutcome> {
        let policy = self.policy();

        if let Decision::Blocked { retry_after } = self.limiter.check_admission_at(key, &policy, now) {
            debug!(retry_after = ?retry_after, "Sign-in refused, key is blocked");
            return Ok(LoginOutcome::Throttled { retry_after });
        }

        match self.verifier.verify(credentials).await? {
            Verification::Accepted => {
                self.limiter.reset(key);
                info!("Sign-in succeeded");
                Ok(LoginOutcome::Authenticated)
            }
            Verification::Rejected => {
                let outcome = match self.limiter.record_attempt_at(key, &policy, now) {
                    Decision::Allowed { remaining } => LoginOutcome::Rejected { remaining },
                    Decision::Blocked { retry_after } => LoginOutcome::Throttled { retry_after },
                };
                info!(outcome = outcome.kind(), "Sign-in rejected");
                Ok(outcome)
            }
        }
    }
}
