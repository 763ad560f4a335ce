//! Sign-in flow gated by the attempt limiter.

mod gate;
mod verifier;

pub use gate::{format_wait, LoginGate, LoginOutcome};
pub use verifier::{CredentialVerifier, Credentials, StaticVerifier, Verification};
