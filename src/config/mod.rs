//! Configuration module for the FixFinder backend.
//!
//! All configuration is loaded from environment variables with sensible defaults
//! and handed to the rest of the application through `AppState`.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,
    /// True when no secret was configured and a per-process one was generated
    pub jwt_secret_generated: bool,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Allowed CORS origin (any origin when unset)
    pub client_url: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// How often the conversation reaper runs
    pub reaper_interval: Duration,
    /// Optional JSON file with users to provision at startup
    pub seed_path: Option<PathBuf>,
}

/// Invalid or missing configuration.
#[derive(Debug)]
pub enum ConfigError {
    MissingSecret,
    Invalid { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingSecret => {
                write!(f, "FIXFINDER_JWT_SECRET must be set in production")
            }
            ConfigError::Invalid { var, value } => write!(f, "invalid {}: {:?}", var, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("FIXFINDER_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let (jwt_secret, jwt_secret_generated) = match env::var("FIXFINDER_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => (secret, false),
            _ if environment == Environment::Production => {
                return Err(ConfigError::MissingSecret)
            }
            _ => (uuid::Uuid::new_v4().to_string(), true),
        };

        let db_path = env::var("FIXFINDER_DB_PATH")
            .unwrap_or_else(|_| "./data/fixfinder.sqlite".to_string())
            .into();

        let index_path = env::var("FIXFINDER_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_raw =
            env::var("FIXFINDER_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:4000".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "FIXFINDER_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let client_url = env::var("FIXFINDER_CLIENT_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level = env::var("FIXFINDER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let reaper_interval = match env::var("FIXFINDER_REAPER_INTERVAL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "FIXFINDER_REAPER_INTERVAL_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs.max(1))
            }
            Err(_) => Duration::from_secs(60),
        };

        let seed_path = env::var("FIXFINDER_SEED_PATH").ok().map(PathBuf::from);

        Ok(Self {
            environment,
            jwt_secret,
            jwt_secret_generated,
            db_path,
            index_path,
            bind_addr,
            client_url,
            log_level,
            reaper_interval,
            seed_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "FIXFINDER_ENV",
        "FIXFINDER_JWT_SECRET",
        "FIXFINDER_DB_PATH",
        "FIXFINDER_INDEX_PATH",
        "FIXFINDER_BIND_ADDR",
        "FIXFINDER_CLIENT_URL",
        "FIXFINDER_LOG_LEVEL",
        "FIXFINDER_REAPER_INTERVAL_SECS",
        "FIXFINDER_SEED_PATH",
    ];

    // Both scenarios share process-wide env vars, so they run in one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert!(config.jwt_secret_generated);
        assert!(!config.jwt_secret.is_empty());
        assert_eq!(config.db_path, PathBuf::from("./data/fixfinder.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
        assert!(config.client_url.is_none());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reaper_interval, Duration::from_secs(60));
        assert!(config.seed_path.is_none());

        env::set_var("FIXFINDER_ENV", "production");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingSecret)
        ));

        env::set_var("FIXFINDER_JWT_SECRET", "s3cret");
        env::set_var("FIXFINDER_BIND_ADDR", "not-an-address");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { var: "FIXFINDER_BIND_ADDR", .. })
        ));

        env::set_var("FIXFINDER_BIND_ADDR", "0.0.0.0:8080");
        let config = Config::from_env().unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.jwt_secret_generated);

        for var in VARS {
            env::remove_var(var);
        }
    }
}
