//! Credential verification seam.
//!
//! The limiter gates the credential check but never performs it. Whatever
//! actually checks passwords (a remote data service in production) plugs in
//! through [`CredentialVerifier`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

/// A sign-in request as submitted by a user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Secret presented for the account
    pub password: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a completed credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The credentials are valid
    Accepted,
    /// The credentials are wrong
    Rejected,
}

/// Trait for credential checks gated by the login limiter.
///
/// Return `Err` only when the check could not be completed; a wrong password
/// is `Ok(Verification::Rejected)`.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check the given credentials.
    async fn verify(&self, credentials: &Credentials) -> Result<Verification>;
}

/// Verifier backed by an in-memory account table.
#[derive(Debug, Clone, Default)]
pub struct StaticVerifier {
    accounts: HashMap<String, String>,
}

impl StaticVerifier {
    /// Create a verifier from a username to password map.
    pub fn new(accounts: HashMap<String, String>) -> Self {
        Self { accounts }
    }

    /// Add or replace an account.
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), password.into());
        self
    }
}

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, credentials: &Credentials) -> Result<Verification> {
        match self.accounts.get(&credentials.username) {
            Some(password) if *password == credentials.password => Ok(Verification::Accepted),
            _ => Ok(Verification::Rejected),
        }
    }
}
