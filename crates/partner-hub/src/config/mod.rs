use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEV_TOKEN_SECRET: &str = "partner-hub-development-secret";
const DEFAULT_TOKEN_TTL_SECS: u64 = 4 * 60 * 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Error envelopes only carry internal detail outside production.
    pub fn exposes_error_detail(self) -> bool {
        !matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub auth: AuthConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let data_path = env::var("APP_DATA_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let max_attempts = parse_number("APP_PIPELINE_MAX_ATTEMPTS", 3)
            .and_then(|value| narrow::<u32>("APP_PIPELINE_MAX_ATTEMPTS", value))?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "APP_PIPELINE_MAX_ATTEMPTS",
            });
        }

        let token_secret = match env::var("APP_TOKEN_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingTokenSecret)
            }
            _ => DEV_TOKEN_SECRET.to_string(),
        };
        let token_ttl_secs = parse_number("APP_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;

        let operator_email =
            env::var("APP_OPERATOR_EMAIL").unwrap_or_else(|_| "operator@localhost".to_string());
        let queue_capacity = parse_number("APP_NOTIFICATION_QUEUE", 256)
            .and_then(|value| narrow::<usize>("APP_NOTIFICATION_QUEUE", value))?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { data_path },
            pipeline: PipelineConfig {
                max_attempts,
            },
            auth: AuthConfig {
                token_secret,
                token_ttl_secs,
            },
            notifications: NotificationConfig {
                operator_email,
                queue_capacity,
            },
        })
    }
}

fn narrow<T: TryFrom<u64>>(key: &'static str, value: u64) -> Result<T, ConfigError> {
    T::try_from(value).map_err(|_| ConfigError::InvalidNumber { key })
}

fn parse_number(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the marketplace snapshot lives. `None` keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub data_path: Option<PathBuf>,
}

/// Retry budget for approval/rejection commits.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Session token signing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            token_secret: secret.into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// Outbound e-mail settings.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub operator_email: String,
    pub queue_capacity: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    MissingTokenSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive integer")
            }
            ConfigError::MissingTokenSecret => {
                write!(f, "APP_TOKEN_SECRET must be set in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::MissingTokenSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_DATA_PATH",
            "APP_PIPELINE_MAX_ATTEMPTS",
            "APP_TOKEN_SECRET",
            "APP_TOKEN_TTL_SECS",
            "APP_OPERATOR_EMAIL",
            "APP_NOTIFICATION_QUEUE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.storage.data_path.is_none());
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.auth.token_ttl_secs, 4 * 60 * 60);
        assert_eq!(config.notifications.operator_email, "operator@localhost");
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn production_requires_token_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        let err = AppConfig::load().expect_err("secret is mandatory");
        assert!(matches!(err, ConfigError::MissingTokenSecret));

        env::set_var("APP_TOKEN_SECRET", "s3cret");
        let config = AppConfig::load().expect("config loads with secret");
        assert!(!config.environment.exposes_error_detail());
        reset_env();
    }

    #[test]
    fn rejects_zero_pipeline_attempts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PIPELINE_MAX_ATTEMPTS", "0");
        let err = AppConfig::load().expect_err("zero attempts rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "APP_PIPELINE_MAX_ATTEMPTS"
            }
        ));
        reset_env();
    }

    #[test]
    fn rejects_pipeline_attempts_beyond_u32() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PIPELINE_MAX_ATTEMPTS", "4294967296");
        let err = AppConfig::load().expect_err("out of range attempts rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "APP_PIPELINE_MAX_ATTEMPTS"
            }
        ));

        env::set_var("APP_PIPELINE_MAX_ATTEMPTS", "4294967295");
        let config = AppConfig::load().expect("u32::MAX attempts load");
        assert_eq!(config.pipeline.max_attempts, u32::MAX);
        reset_env();
    }
}
