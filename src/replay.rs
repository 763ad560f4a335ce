//! Replay of scripted sign-in attempts through a [`LoginGate`].
//!
//! Each input line is `<offset_ms> <client_key> <username> <password>`.
//! Blank lines and lines starting with `#` are skipped. Attempts run at
//! `start + offset_ms`, so a script reproduces the same decisions however
//! fast it is fed in.

use serde::Serialize;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::auth::{CredentialVerifier, Credentials, LoginGate, LoginOutcome};
use crate::error::{LoginGuardError, Result};
use crate::ratelimit::IdentityKey;

/// One parsed line of a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayAttempt {
    /// 1-based line number in the script
    pub line: usize,
    /// Offset from the start of the replay
    pub offset: Duration,
    /// Client identity
    pub key: IdentityKey,
    /// Submitted credentials
    pub credentials: Credentials,
}

/// Decision emitted for one replayed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayRecord {
    /// 1-based line number in the script
    pub line: usize,
    /// Offset from the start of the replay in milliseconds
    pub offset_ms: u64,
    /// Client identity the attempt was charged to
    pub client_key: String,
    /// Outcome kind: authenticated, rejected or throttled
    pub outcome: &'static str,
    /// Failures still tolerated, for rejected attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    /// Lockout time left in milliseconds, for throttled attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Message for the sign-in screen
    pub message: String,
}

impl ReplayRecord {
    fn new(attempt: &ReplayAttempt, outcome: LoginOutcome) -> Self {
        let (remaining, retry_after_ms) = match outcome {
            LoginOutcome::Authenticated => (None, None),
            LoginOutcome::Rejected { remaining } => (Some(remaining), None),
            LoginOutcome::Throttled { retry_after } => {
                (None, Some(retry_after.as_millis() as u64))
            }
        };
        Self {
            line: attempt.line,
            offset_ms: attempt.offset.as_millis() as u64,
            client_key: attempt.key.to_string(),
            outcome: outcome.kind(),
            remaining,
            retry_after_ms,
            message: outcome.message(),
        }
    }
}

/// Parse one script line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ReplayAttempt>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let replay_err = |reason: String| LoginGuardError::Replay {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let [offset, key, username, password] = fields.as_slice() else {
        return Err(replay_err(format!(
            "expected 4 fields (offset_ms client_key username password), found {}",
            fields.len()
        )));
    };

    let offset_ms: u64 = offset
        .parse()
        .map_err(|e| replay_err(format!("invalid offset '{}': {}", offset, e)))?;
    let key = IdentityKey::new(*key).map_err(|e| replay_err(e.to_string()))?;

    Ok(Some(ReplayAttempt {
        line: line_no,
        offset: Duration::from_millis(offset_ms),
        key,
        credentials: Credentials::new(*username, *password),
    }))
}

/// Run every attempt in `input` through `gate`, writing one JSON object per
/// attempt to `output`. Returns the number of attempts replayed.
pub async fn run<V, R, W>(gate: &LoginGate<V>, input: R, mut output: W) -> Result<usize>
where
    V: CredentialVerifier,
    R: BufRead,
    W: Write,
{
    let start = Instant::now();
    let mut replayed = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let Some(attempt) = parse_line(index + 1, &line)? else {
            continue;
        };

        let outcome = gate
            .attempt_at(&attempt.key, &attempt.credentials, start + attempt.offset)
            .await?;
        debug!(line = attempt.line, outcome = outcome.kind(), "Replayed attempt");

        let record = ReplayRecord::new(&attempt, outcome);
        let json = serde_json::to_string(&record)
            .map_err(|e| LoginGuardError::Replay {
                line: attempt.line,
                reason: e.to_string(),
            })?;
        writeln!(output, "{}", json)?;
        replayed += 1;
    }

    Ok(replayed)
}
