use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tutor_core::{ModelTier, PricingTable, session::DEFAULT_SYSTEM_PROMPT};

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for chat completions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    /// Canned local replies; needs no credentials.
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub syllabus_path: PathBuf,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,
    pub openai_api_base: Option<String>,
    pub system_prompt: String,
    pub default_model: ModelTier,
    pub pricing: PricingTable,
    /// Deadline for one provider call; `None` waits indefinitely.
    pub provider_timeout: Option<Duration>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let syllabus_path = std::env::var("SYLLABUS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./syllabus.json"));

        let provider_str = std::env::var("TUTOR_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "offline" => Provider::Offline,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TUTOR_PROVIDER".to_string(),
                    format!("'{}' is not one of: openai, offline", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_org_id = std::env::var("OPENAI_ORG_ID").ok();
        let openai_api_base = std::env::var("OPENAI_API_BASE").ok();

        let system_prompt =
            std::env::var("SYSTEM_PROMPT").unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        let default_model = match std::env::var("DEFAULT_MODEL") {
            Ok(value) => value
                .parse::<ModelTier>()
                .map_err(|e| ConfigError::InvalidValue("DEFAULT_MODEL".to_string(), e.to_string()))?,
            Err(_) => ModelTier::Economy,
        };

        let defaults = PricingTable::default();
        let pricing = PricingTable {
            economy_per_1k: rate_from_env("PRICE_ECONOMY_PER_1K", defaults.economy_per_1k)?,
            premium_prompt_per_1k: rate_from_env(
                "PRICE_PREMIUM_PROMPT_PER_1K",
                defaults.premium_prompt_per_1k,
            )?,
            premium_completion_per_1k: rate_from_env(
                "PRICE_PREMIUM_COMPLETION_PER_1K",
                defaults.premium_completion_per_1k,
            )?,
        };

        let provider_timeout = match std::env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(e) => {
                    return Err(ConfigError::InvalidValue(
                        "PROVIDER_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    ));
                }
            },
            Err(_) => Some(Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS)),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        if provider == Provider::OpenAI && openai_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            syllabus_path,
            provider,
            openai_api_key,
            openai_org_id,
            openai_api_base,
            system_prompt,
            default_model,
            pricing,
            provider_timeout,
            log_level,
        })
    }
}

/// Reads a non-negative per-1000-token rate, falling back to `default`.
fn rate_from_env(var: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate >= 0.0 => Ok(rate),
            _ => Err(ConfigError::InvalidValue(
                var.to_string(),
                format!("'{}' is not a non-negative number", raw),
            )),
        },
        Err(_) => Ok(default),
    }
}
