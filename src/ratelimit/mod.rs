//! Login attempt rate limiting and state management.

mod key;
mod limiter;
mod policy;
mod record;
mod sweeper;

pub use key::IdentityKey;
pub use limiter::RateLimiter;
pub use policy::{PolicyRule, PolicySet, RateLimitPolicy};
pub use record::{AttemptRecord, Decision};
pub use sweeper::spawn_sweeper;
