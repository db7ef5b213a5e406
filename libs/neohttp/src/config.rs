use std::time::Duration;

use cypher_api::{Error, Result};
use serde::Deserialize;

use crate::request;

/// Connection settings, threaded explicitly through bootstrap and every
/// request instead of living in process-wide state.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Discovery URI, e.g. `http://localhost:7474`.
    pub uri: String,

    /// Substituted for `{databaseName}` in the transaction endpoint.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Discovery attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Pause between discovery attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Deadline for each HTTP exchange, body included.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Send the `X-Stream: true` hint.
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Buffer and log every response body at debug level.
    #[serde(default)]
    pub log_bodies: bool,
}

fn default_database() -> String {
    "neo4j".into()
}

fn default_connect_attempts() -> u32 {
    4
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_stream() -> bool {
    true
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("uri", &self.uri)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_attempts", &self.connect_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("stream", &self.stream)
            .field("log_bodies", &self.log_bodies)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: default_database(),
            username: None,
            password: None,
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_ms: None,
            stream: default_stream(),
            log_bodies: false,
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::config(e.to_string()))
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn log_bodies(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// `Authorization` header value; none without a username.
    pub fn authorization(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| request::basic_auth(u, self.password.as_deref().unwrap_or_default()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::config("uri must not be empty"));
        }
        if self.connect_attempts == 0 {
            return Err(Error::config("connect_attempts must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg = ClientConfig::parse(r#"uri = "http://localhost:7474""#).unwrap();
        assert_eq!(cfg, ClientConfig::new("http://localhost:7474"));
        assert_eq!(cfg.connect_attempts, 4);
        assert_eq!(cfg.retry_delay(), Duration::from_secs(3));
        assert!(cfg.stream);
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.authorization(), None);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
uri = "http://db:7474"
database = "movies"
username = "neo4j"
password = "secret"
connect_attempts = 2
retry_delay_ms = 10
request_timeout_ms = 5000
log_bodies = true
"#
        )
        .unwrap();
        let cfg = ClientConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.database, "movies");
        assert_eq!(cfg.connect_attempts, 2);
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.authorization().as_deref(), Some("Basic bmVvNGo6c2VjcmV0"));
        assert!(cfg.log_bodies);
    }

    #[test]
    fn debug_hides_password() {
        let cfg = ClientConfig::new("http://x").credentials("neo4j", "hunter2");
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("hunter2"), "{shown}");
        assert!(shown.contains("<redacted>"), "{shown}");
        assert!(shown.contains("neo4j"), "{shown}");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ClientConfig::load("/nonexistent/cypher.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_uri_is_rejected() {
        assert!(matches!(ClientConfig::parse("database = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let cfg = ClientConfig::new("http://x").retry(0, Duration::ZERO);
        assert!(cfg.validate().is_err());
        assert!(ClientConfig::new(" ").validate().is_err());
        assert!(ClientConfig::new("http://x").validate().is_ok());
    }
}
