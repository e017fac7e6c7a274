//! Configuration management.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. `warden.toml` in the working directory, or the file named by
//!    `WARDEN_CONFIG` (optional)
//! 3. `WARDEN__`-prefixed environment variables, `__` between path segments
//!    (`WARDEN__SESSION__SECRET`, `WARDEN__DATABASE__URL`)

use serde::Deserialize;
use thiserror::Error;

use warden_auth::SessionPolicy;
use warden_observability::LogFormat;

/// Secret used when none is configured. Only fit for local development.
pub const DEV_SESSION_SECRET: &str = "dev-secret";

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_TTL_SECS: i64 = 366 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
    /// Create the default roles and permissions on an empty store.
    pub seed_defaults: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            log: LogConfig::default(),
            seed_defaults: true,
            bootstrap_admin: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Without one the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: i64,
    pub sliding: bool,
    pub cookie_name: String,
    /// Mark the cookie `Secure` (HTTPS only).
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SESSION_SECRET.to_string(),
            ttl_secs: 7 * 24 * 60 * 60,
            sliding: true,
            cookie_name: "warden_session".to_string(),
            secure: false,
        }
    }
}

impl SessionConfig {
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            ttl: chrono::Duration::seconds(self.ttl_secs),
            sliding: self.sliding,
        }
    }

    pub fn uses_insecure_secret(&self) -> bool {
        self.secret.is_empty() || self.secret == DEV_SESSION_SECRET
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

/// Account created at startup with the admin role.
#[derive(Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WardenConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WARDEN_CONFIG").unwrap_or_else(|_| "warden.toml".to_string());
        Self::load_from(&path)
    }

    /// Load with `path` as the (optional) file source.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let loaded: WardenConfig = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_secs <= 0 {
            return Err(ConfigError::Invalid("session.ttl_secs must be positive".into()));
        }
        if self.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_secs must be at most {MAX_SESSION_TTL_SECS}"
            )));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Invalid("session.cookie_name must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigError::Invalid(
                    "bootstrap_admin needs a username and password".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_sources() {
        let cfg = WardenConfig::load_from("/nonexistent/warden-test").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.session.ttl_secs, 604_800);
        assert!(cfg.session.sliding);
        assert_eq!(cfg.session.cookie_name, "warden_session");
        assert!(cfg.session.uses_insecure_secret());
        assert!(cfg.seed_defaults);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.session.policy(), SessionPolicy::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("warden-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("warden.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
seed_defaults = false

[server]
port = 9090

[session]
secret = "s3cret"
ttl_secs = 3600
sliding = false

[log]
format = "pretty"

[bootstrap_admin]
username = "root"
password = "changeme"
"#
        )
        .unwrap();

        let cfg = WardenConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(!cfg.seed_defaults);
        assert!(!cfg.session.uses_insecure_secret());
        assert_eq!(cfg.session.policy().ttl, chrono::Duration::hours(1));
        assert!(!cfg.session.policy().sliding);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.bootstrap_admin.as_ref().unwrap().username, "root");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let mut cfg = WardenConfig::default();
        cfg.session.ttl_secs = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_ttl_beyond_one_year() {
        let mut cfg = WardenConfig::default();
        cfg.session.ttl_secs = 100_000_000_000_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        cfg.session.ttl_secs = MAX_SESSION_TTL_SECS;
        assert!(cfg.validate().is_ok());
    }
}
