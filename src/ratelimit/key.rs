//! Identity keys used to bucket attempt history.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{LoginGuardError, Result};

/// An opaque key identifying one client to the limiter.
///
/// The limiter places no constraint on the format beyond non-emptiness.
/// Whether the key actually distinguishes an abusive client (rather than
/// being constant or trivially spoofed) is up to whoever derives it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Create a key, rejecting empty or whitespace-only values.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(LoginGuardError::InvalidKey(
                "identity key must not be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Derive a key from a client address.
    pub fn from_ip(addr: IpAddr) -> Self {
        Self(format!("ip:{}", addr))
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdentityKey {
    type Err = LoginGuardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
