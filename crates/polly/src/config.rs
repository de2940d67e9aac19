use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::scheduler::{self, JobTiming};
use crate::store::sql::PoolSettings;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "polly.yaml";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load a config file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path.as_ref()).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references.
///
/// `$$` is a literal `$`. A `$` not followed by `{` is kept as is.
/// Nested references are not supported.
///
/// ```yaml
/// database:
///   url: ${DATABASE_URL:-sqlite://polly.db}
/// mail:
///   token: ${MAIL_TOKEN}
/// ```
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(reference) = tail.strip_prefix('{') {
            let end = reference.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            out.push_str(&resolve_var(&reference[..end])?);
            rest = &reference[end + 1..];
        } else {
            out.push('$');
            rest = tail;
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn resolve_var(reference: &str) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub max_concurrent_requests: usize,
    pub max_body_bytes: usize,
    /// Bearer token for `/api/v1`. Without it the API only accepts loopback clients.
    pub api_token: Option<String>,
    /// Bearer token for `/api/admin/v1`. Without it admin endpoints are loopback-only.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
            max_concurrent_requests: 256,
            max_body_bytes: 1024 * 1024,
            api_token: None,
            admin_token: None,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// ============================================================================
// DatabaseConfig
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// sqlx connection URL. `sqlite::memory:` keeps everything in process.
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://polly.db".to_string(),
            max_connections: 5,
            acquire_timeout_seconds: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections.max(1),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_seconds),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:")
    }
}

// ============================================================================
// LeaderConfig
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaderConfig {
    /// Leader-election sidecar. Unset means this instance always leads.
    pub elector_url: Option<String>,
    /// Name to compare with the elected leader. Defaults to `$HOSTNAME`.
    pub hostname: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            elector_url: None,
            hostname: None,
            timeout_seconds: 10,
        }
    }
}

impl LeaderConfig {
    pub fn resolved_hostname(&self) -> String {
        self.hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ============================================================================
// MailConfig
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    /// Mail gateway endpoint. Unset means mails are only logged.
    pub gateway_url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            token: None,
            timeout_seconds: 10,
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ============================================================================
// SearchConfig
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Search index base URL. Unset disables the index sync job.
    pub url: Option<String>,
    pub timeout_seconds: u64,
    /// Age after which `INDEXED` bookkeeping records are purged.
    pub retention_days: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: 10,
            retention_days: 30,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

// ============================================================================
// JobsConfig
// ============================================================================

/// Per-job overrides. Anything left out falls back to the job's own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    pub mail_dispatch: JobConfig,
    pub index_sync: JobConfig,
    pub stale_purge: JobConfig,
}

impl JobsConfig {
    pub fn mail_dispatch(&self) -> JobSettings {
        self.mail_dispatch.resolve(JobSettings::MAIL_DISPATCH)
    }

    pub fn index_sync(&self) -> JobSettings {
        self.index_sync.resolve(JobSettings::INDEX_SYNC)
    }

    pub fn stale_purge(&self) -> JobSettings {
        self.stale_purge.resolve(JobSettings::STALE_PURGE)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub enabled: Option<bool>,
    pub initial_delay_seconds: Option<u64>,
    pub period_seconds: Option<u64>,
    /// Only run on the elected leader.
    pub leader_only: Option<bool>,
}

impl JobConfig {
    fn resolve(&self, defaults: JobSettings) -> JobSettings {
        JobSettings {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            initial_delay_seconds: self
                .initial_delay_seconds
                .unwrap_or(defaults.initial_delay_seconds),
            period_seconds: self.period_seconds.unwrap_or(defaults.period_seconds),
            leader_only: self.leader_only.unwrap_or(defaults.leader_only),
        }
    }
}

/// Effective settings of one scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub enabled: bool,
    pub initial_delay_seconds: u64,
    pub period_seconds: u64,
    pub leader_only: bool,
}

impl JobSettings {
    pub const MAIL_DISPATCH: Self = Self {
        enabled: true,
        initial_delay_seconds: 10,
        period_seconds: 60,
        leader_only: false,
    };

    pub const INDEX_SYNC: Self = Self {
        enabled: true,
        initial_delay_seconds: 30,
        period_seconds: 300,
        leader_only: true,
    };

    pub const STALE_PURGE: Self = Self {
        enabled: true,
        initial_delay_seconds: 60,
        period_seconds: 3600,
        leader_only: true,
    };

    pub fn timing(&self) -> scheduler::Result<JobTiming> {
        JobTiming::from_secs(self.initial_delay_seconds, self.period_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    // ========================================================================
    // Config Tests
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout_seconds, 30);
        assert!(config.server.api_token.is_none());
        assert_eq!(config.database.url, "sqlite://polly.db");
        assert!(config.leader.elector_url.is_none());
        assert!(config.mail.gateway_url.is_none());
        assert_eq!(config.search.retention_days, 30);
        assert_eq!(config.jobs.mail_dispatch(), JobSettings::MAIL_DISPATCH);
        assert!(config.jobs.index_sync().leader_only);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let config = Config::load(tmp_dir.path().join("missing.yaml"))
            .await
            .unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[tokio::test]
    async fn test_load_empty_file_returns_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.database.max_connections, 5);
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let file = write_config(
            r#"
server:
  host: "127.0.0.1"
  port: 3000
  api_token: "secret"
database:
  url: "sqlite::memory:"
  max_connections: 2
leader:
  elector_url: "localhost:4040"
  hostname: "polly-0"
mail:
  gateway_url: "http://mail.local/send"
search:
  url: "http://search.local"
  retention_days: 7
jobs:
  mail_dispatch:
    period_seconds: 5
  index_sync:
    enabled: false
"#,
        );

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.api_token.as_deref(), Some("secret"));
        assert!(config.database.is_in_memory());
        assert_eq!(config.database.pool_settings().max_connections, 2);
        assert_eq!(config.leader.elector_url.as_deref(), Some("localhost:4040"));
        assert_eq!(config.leader.resolved_hostname(), "polly-0");
        assert_eq!(
            config.mail.gateway_url.as_deref(),
            Some("http://mail.local/send")
        );
        assert_eq!(config.search.retention(), chrono::Duration::days(7));

        let mail = config.jobs.mail_dispatch();
        assert_eq!(mail.period_seconds, 5);
        assert_eq!(mail.initial_delay_seconds, 10);
        assert!(!mail.leader_only);
        assert!(!config.jobs.index_sync().enabled);
        assert_eq!(config.jobs.stale_purge(), JobSettings::STALE_PURGE);
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let file = write_config("invalid: yaml: content: [");
        assert!(Config::load(file.path()).await.is_err());
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(matches!(
            Config::parse("agents_dir: x\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_zero_period_is_rejected_when_building_timing() {
        let settings = JobSettings {
            period_seconds: 0,
            ..JobSettings::MAIL_DISPATCH
        };
        assert!(settings.timing().is_err());
        assert!(JobSettings::INDEX_SYNC.timing().is_ok());
    }

    #[test]
    fn test_config_error_display() {
        let io_error = ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test",
        ));
        assert!(io_error.to_string().contains("failed to read config file"));
    }

    // ========================================================================
    // Environment Variable Expansion Tests
    // ========================================================================

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "plain string without variables";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_expand_env_vars_required_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("POLLY_TEST_REQUIRED", "test_value") };
        let result = expand_env_vars("prefix ${POLLY_TEST_REQUIRED} suffix").unwrap();
        assert_eq!(result, "prefix test_value suffix");
        unsafe { std::env::remove_var("POLLY_TEST_REQUIRED") };
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::remove_var("POLLY_MISSING_12345") };
        match expand_env_vars("value: ${POLLY_MISSING_12345}") {
            Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, "POLLY_MISSING_12345"),
            other => panic!("expected MissingEnvVar error, got {other:?}"),
        }
    }

    #[test]
    fn test_expand_env_vars_defaults() {
        // SAFETY: variable names are unique to this test
        unsafe {
            std::env::remove_var("POLLY_UNSET_DEFAULT");
            std::env::set_var("POLLY_SET_DEFAULT", "actual");
        }
        assert_eq!(
            expand_env_vars("a: ${POLLY_UNSET_DEFAULT:-fallback}").unwrap(),
            "a: fallback"
        );
        assert_eq!(
            expand_env_vars("a: ${POLLY_UNSET_DEFAULT:-}").unwrap(),
            "a: "
        );
        assert_eq!(
            expand_env_vars("a: ${POLLY_SET_DEFAULT:-ignored}").unwrap(),
            "a: actual"
        );
        unsafe { std::env::remove_var("POLLY_SET_DEFAULT") };
    }

    #[test]
    fn test_expand_env_vars_dollar_handling() {
        assert_eq!(
            expand_env_vars("price: $$100 and ${POLLY_ESCAPE:-value}").unwrap(),
            "price: $100 and value"
        );
        assert_eq!(expand_env_vars("cost is $50").unwrap(), "cost is $50");
        assert_eq!(expand_env_vars("trailing $").unwrap(), "trailing $");
    }

    #[test]
    fn test_expand_env_vars_unclosed_brace() {
        assert!(matches!(
            expand_env_vars("url: ${DATABASE_URL:-sqlite://x"),
            Err(ConfigError::UnclosedVarReference)
        ));
    }

    #[tokio::test]
    async fn test_config_load_with_env_var() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("POLLY_TEST_MAIL_TOKEN", "env_token_value") };
        let file = write_config("mail:\n  token: ${POLLY_TEST_MAIL_TOKEN}\n");

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.mail.token.as_deref(), Some("env_token_value"));

        unsafe { std::env::remove_var("POLLY_TEST_MAIL_TOKEN") };
    }

    #[tokio::test]
    async fn test_config_load_missing_env_var_errors() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::remove_var("POLLY_DEFINITELY_MISSING") };
        let file = write_config("mail:\n  token: ${POLLY_DEFINITELY_MISSING}\n");

        let err = Config::load(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("POLLY_DEFINITELY_MISSING"));
    }
}
