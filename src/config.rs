use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_STAGING_TTL_SECS: u64 = 2700; // 45 minutes
const DEFAULT_STAGING_TIMEOUT_MS: u64 = 2000;
const DEFAULT_ROUTING_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5000;

/// Staging store (staged-order TTL store) configuration
#[derive(Clone, Debug, Deserialize)]
pub struct StagingConfig {
    /// Staged-order time-to-live in seconds; refreshed on every mutation
    #[serde(default = "default_staging_ttl")]
    pub ttl_secs: u64,

    /// Per-operation deadline for staging store I/O
    #[serde(default = "default_staging_timeout")]
    pub timeout_ms: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_staging_ttl(),
            timeout_ms: default_staging_timeout(),
        }
    }
}

/// Routing (distance) service configuration
#[derive(Clone, Debug, Deserialize)]
pub struct RoutingConfig {
    /// OSRM-compatible base URL
    #[serde(default = "default_routing_url")]
    pub base_url: String,

    /// Deadline for the route lookup; overruns surface as a timeout failure
    #[serde(default = "default_routing_timeout")]
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_url(),
            timeout_ms: default_routing_timeout(),
        }
    }
}

/// Base URLs of the collaborating lookup services
#[derive(Clone, Debug, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_url")]
    pub basket_url: String,
    #[serde(default = "default_lookup_url")]
    pub catalog_url: String,
    #[serde(default = "default_lookup_url")]
    pub customer_url: String,
    #[serde(default = "default_lookup_url")]
    pub coupon_url: String,

    /// Deadline applied to every lookup call
    #[serde(default = "default_lookup_timeout")]
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            basket_url: default_lookup_url(),
            catalog_url: default_lookup_url(),
            customer_url: default_lookup_url(),
            coupon_url: default_lookup_url(),
            timeout_ms: default_lookup_timeout(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL for the staging store
    pub redis_url: String,

    /// JWT verification secret
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Currency code recorded on every order
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub lookups: LookupConfig,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_staging_ttl() -> u64 {
    DEFAULT_STAGING_TTL_SECS
}
fn default_staging_timeout() -> u64 {
    DEFAULT_STAGING_TIMEOUT_MS
}
fn default_routing_timeout() -> u64 {
    DEFAULT_ROUTING_TIMEOUT_MS
}
fn default_routing_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_lookup_url() -> String {
    "http://localhost:8081".to_string()
}
fn default_lookup_timeout() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (STOREFRONT__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default: it must come from a config file or the
    // environment so an insecure fallback never reaches production.
    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("STOREFRONT").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set STOREFRONT__JWT_SECRET with a secure random string (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            jwt_secret: "a_sufficiently_long_testing_secret_0123456789".into(),
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            environment: "test".into(),
            log_level: DEFAULT_LOG_LEVEL.into(),
            log_json: false,
            currency: DEFAULT_CURRENCY.into(),
            staging: StagingConfig::default(),
            routing: RoutingConfig::default(),
            lookups: LookupConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn staging_defaults_are_sane() {
        let staging = StagingConfig::default();
        assert_eq!(staging.ttl_secs, DEFAULT_STAGING_TTL_SECS);
        assert!(staging.timeout_ms > 0);
    }
}
