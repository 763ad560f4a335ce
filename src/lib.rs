//! Loginguard - Login Attempt Rate Limiting
//!
//! This crate throttles repeated sign-in attempts per client identity before
//! any credential check is issued. Attempts are counted in a sliding window
//! per identity key; exceeding the budget locks the key out for a fixed
//! period. The guard is advisory and must be paired with enforcement at the
//! service that actually checks credentials.

pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod replay;
