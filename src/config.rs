//! Configuration management for loginguard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{LoginGuardError, Result};
use crate::ratelimit::PolicySet;

/// Prefix for environment variable overrides, e.g.
/// `LOGINGUARD__POLICIES__LOGIN__MAX_ATTEMPTS=3`.
const ENV_PREFIX: &str = "LOGINGUARD";

/// Main configuration for loginguard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named rate limit policies
    #[serde(default)]
    pub policies: PolicySet,

    /// Stale record sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Replay command configuration
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether to run the sweeper
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,

    /// Seconds between sweep passes
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Idle time before an unblocked record is evicted, in milliseconds.
    /// Defaults to the login policy window and may not be shorter.
    #[serde(default)]
    pub retention_ms: Option<u64>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_secs: default_sweep_interval(),
            retention_ms: None,
        }
    }
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

/// Replay command configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Accounts known to the replay verifier (username to password)
    #[serde(default)]
    pub accounts: HashMap<String, String>,
}

impl GuardConfig {
    /// Load configuration from an optional file, overlaid with
    /// `LOGINGUARD__*` environment variables.
    ///
    /// The `config` crate lowercases map keys, so replay account names are
    /// taken from the file as written; they cannot be set from the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        let mut accounts = None;

        if let Some(path) = path {
            if !path.exists() {
                return Err(LoginGuardError::Config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            accounts = Some(Self::parse_yaml(&std::fs::read_to_string(path)?)?.replay.accounts);
            builder = builder.add_source(config::File::from(path));
        }

        let mut loaded = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<GuardConfig>())
            .map_err(|e| LoginGuardError::Config(format!("Failed to load configuration: {}", e)))?;

        if let Some(accounts) = accounts {
            loaded.replay.accounts = accounts;
        }
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Self::parse_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LoginGuardError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Check constraints spanning several sections.
    ///
    /// Sweeper retention must cover the login window; evicting a record
    /// that still holds in-window attempts would refund them.
    pub fn validate(&self) -> Result<()> {
        let window = self.policies.login.window();
        if self.sweep_retention() < window {
            return Err(LoginGuardError::Config(format!(
                "sweeper.retention_ms ({}) must be at least the login window ({})",
                self.sweep_retention().as_millis(),
                window.as_millis()
            )));
        }
        Ok(())
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper.interval_secs.max(1))
    }

    /// Idle retention for the sweeper, falling back to the login window.
    pub fn sweep_retention(&self) -> Duration {
        self.sweeper
            .retention_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.policies.login.window())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitPolicy;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.policies.login, RateLimitPolicy::login());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.sweeper.enabled);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.sweep_retention(), Duration::from_secs(60));
        assert!(config.replay.accounts.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
logging:
  level: debug
  format: json
policies:
  login:
    window_ms: 30000
    max_attempts: 3
    block_duration_ms: 600000
sweeper:
  enabled: false
  interval_secs: 5
  retention_ms: 120000
replay:
  accounts:
    alice: correct-horse
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.policies.login.max_attempts(), 3);
        assert_eq!(config.policies.login.window(), Duration::from_secs(30));
        assert_eq!(config.policies.login.block_duration(), Duration::from_secs(600));
        assert!(!config.sweeper.enabled);
        assert_eq!(config.sweep_retention(), Duration::from_secs(120));
        assert_eq!(config.replay.accounts["alice"], "correct-horse");
    }

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let yaml = r#"
sweeper:
  interval_secs: 10
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.policies.login, RateLimitPolicy::login());
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_policy_rejected_at_load() {
        let yaml = r#"
policies:
  login:
    window_ms: 0
    max_attempts: 5
"#;
        let result = GuardConfig::from_yaml(yaml);
        assert!(matches!(result, Err(LoginGuardError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = GuardConfig::load(Some(Path::new("/nonexistent/loginguard.yaml")));
        assert!(matches!(result, Err(LoginGuardError::Config(_))));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = std::env::temp_dir().join(format!("loginguard-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("guard.yaml");
        std::fs::write(
            &path,
            "policies:\n  login:\n    window_ms: 1000\n    max_attempts: 2\n    block_duration_ms: 5000\n",
        )
        .unwrap();

        let config = GuardConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.policies.login.max_attempts(), 2);

        let config = GuardConfig::from_file(&path).unwrap();
        assert_eq!(config.policies.login.window(), Duration::from_secs(1));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_retention_shorter_than_window_rejected() {
        let yaml = r#"
sweeper:
  retention_ms: 0
"#;
        let result = GuardConfig::from_yaml(yaml);
        assert!(matches!(result, Err(LoginGuardError::Config(_))));

        let yaml = r#"
policies:
  login:
    window_ms: 60000
    max_attempts: 5
sweeper:
  retention_ms: 59999
"#;
        assert!(GuardConfig::from_yaml(yaml).is_err());

        let yaml = r#"
policies:
  login:
    window_ms: 60000
    max_attempts: 5
sweeper:
  retention_ms: 60000
"#;
        assert!(GuardConfig::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_sweeping_at_valid_retention_keeps_budget() {
        use crate::ratelimit::{IdentityKey, RateLimiter};
        use std::time::Instant;

        let config = GuardConfig::default();
        let policy = config.policies.login;
        let limiter = RateLimiter::new();
        let key = IdentityKey::new("k").unwrap();
        let start = Instant::now();

        let admitted = (0..10u64)
            .filter(|i| {
                let now = start + Duration::from_millis(i * 100);
                limiter.sweep_stale_at(config.sweep_retention(), now);
                limiter.is_allowed_at(&key, &policy, now)
            })
            .count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_load_rejects_short_retention() {
        let dir = std::env::temp_dir().join(format!("loginguard-retention-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("guard.yaml");
        std::fs::write(&path, "sweeper:\n  retention_ms: 1000\n").unwrap();

        let result = GuardConfig::load(Some(path.as_path()));
        assert!(matches!(result, Err(LoginGuardError::Config(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_load_preserves_account_case() {
        use crate::auth::{CredentialVerifier, Credentials, StaticVerifier, Verification};

        let dir = std::env::temp_dir().join(format!("loginguard-accounts-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("guard.yaml");
        std::fs::write(&path, "replay:\n  accounts:\n    Alice: pw\n").unwrap();

        let config = GuardConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.replay.accounts.get("Alice").map(String::as_str), Some("pw"));

        let verifier = StaticVerifier::new(config.replay.accounts);
        let verification = verifier.verify(&Credentials::new("Alice", "pw")).await.unwrap();
        assert_eq!(verification, Verification::Accepted);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
