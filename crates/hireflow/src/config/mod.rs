use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::pipeline::FeeConfig;

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

/// Top-level configuration for the placement service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sweep: SweepConfig,
    pub fees: FeeConfig,
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

        let sweep_token =
            env::var("APP_SWEEP_TOKEN").unwrap_or_else(|_| "local-sweep-token".to_string());

        let mut fees = FeeConfig::default();
        if let Ok(raw) = env::var("APP_UPFRONT_PERCENT") {
            fees.upfront_percent = raw
                .parse::<u8>()
                .ok()
                .filter(|percent| *percent <= 100)
                .ok_or(ConfigError::InvalidPercent { value: raw })?;
        }
        if let Ok(raw) = env::var("APP_OFFER_VALIDITY_DAYS") {
            fees.offer_validity_days = parse_days("APP_OFFER_VALIDITY_DAYS", &raw)?;
        }
        if let Ok(raw) = env::var("APP_GUARANTEE_PERIOD_DAYS") {
            fees.guarantee_period_days = parse_days("APP_GUARANTEE_PERIOD_DAYS", &raw)?;
        }
        if let Ok(currency) = env::var("APP_FEE_CURRENCY") {
            fees.currency = currency.trim().to_ascii_lowercase();
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            sweep: SweepConfig { token: sweep_token },
            fees,
        })
    }
}

fn parse_days(var: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.parse::<i64>()
        .ok()
        .filter(|days| *days > 0)
        .ok_or(ConfigError::InvalidDays {
            var,
            value: raw.to_string(),
        })
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

/// Shared-secret credential the external scheduler presents to the sweep
/// endpoint.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub token: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPercent { value: String },
    InvalidDays { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPercent { value } => {
                write!(f, "APP_UPFRONT_PERCENT must be 0..=100, got '{value}'")
            }
            ConfigError::InvalidDays { var, value } => {
                write!(f, "{var} must be a positive day count, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
