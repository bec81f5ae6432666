use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::submission::reference::PLACEHOLDER;

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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub submissions: SubmissionConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            submissions: SubmissionConfig::from_env()?,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

pub const DEFAULT_REFERENCE_PATTERN: &str = "####-####";

/// Knobs for the submission lifecycle: reference format, batch sizes, catalog sources
/// and notification mailboxes.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionConfig {
    pub reference_pattern: String,
    pub queue_batch_size: usize,
    pub delayed_after_minutes: i64,
    pub conflict_retries: u8,
    pub form_templates_csv: Option<PathBuf>,
    pub payment_templates_csv: Option<PathBuf>,
    pub internal_mailbox: String,
    pub support_mailbox: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            reference_pattern: DEFAULT_REFERENCE_PATTERN.to_string(),
            queue_batch_size: 50,
            delayed_after_minutes: 60,
            conflict_retries: 5,
            form_templates_csv: None,
            payment_templates_csv: None,
            internal_mailbox: "internal-filings@efs.local".to_string(),
            support_mailbox: "efs-support@efs.local".to_string(),
        }
    }
}

impl SubmissionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let reference_pattern =
            env::var("EFS_REFERENCE_PATTERN").unwrap_or(defaults.reference_pattern);
        if !reference_pattern.contains(PLACEHOLDER) {
            return Err(ConfigError::InvalidReferencePattern {
                value: reference_pattern,
            });
        }
        let queue_batch_size = parse_var("EFS_QUEUE_BATCH_SIZE", defaults.queue_batch_size)?;
        let delayed_after_minutes: i64 =
            parse_var("EFS_DELAYED_AFTER_MINUTES", defaults.delayed_after_minutes)?;
        if delayed_after_minutes < 0
            || chrono::Duration::try_minutes(delayed_after_minutes).is_none()
        {
            return Err(ConfigError::InvalidNumber {
                name: "EFS_DELAYED_AFTER_MINUTES",
                value: delayed_after_minutes.to_string(),
            });
        }
        let conflict_retries = parse_var("EFS_CONFLICT_RETRIES", defaults.conflict_retries)?;

        Ok(Self {
            reference_pattern,
            queue_batch_size,
            delayed_after_minutes,
            conflict_retries,
            form_templates_csv: env::var("EFS_FORM_TEMPLATES_CSV").ok().map(PathBuf::from),
            payment_templates_csv: env::var("EFS_PAYMENT_TEMPLATES_CSV")
                .ok()
                .map(PathBuf::from),
            internal_mailbox: env::var("EFS_INTERNAL_MAILBOX")
                .unwrap_or(defaults.internal_mailbox),
            support_mailbox: env::var("EFS_SUPPORT_MAILBOX").unwrap_or(defaults.support_mailbox),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidReferencePattern { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative number (found '{value}')")
            }
            ConfigError::InvalidReferencePattern { value } => write!(
                f,
                "EFS_REFERENCE_PATTERN must contain at least one '{PLACEHOLDER}' (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidReferencePattern { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
