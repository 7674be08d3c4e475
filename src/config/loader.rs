//! Configuration loading from disk and environment.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::config::schema::{LogFormat, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "HM_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    Env { key: String, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ServiceConfig = toml::from_str(&content)?;

    apply_overrides(&mut config, utf8_vars(std::env::vars_os()))?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build configuration from defaults and environment only.
pub fn load_from_env() -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();
    apply_overrides(&mut config, utf8_vars(std::env::vars_os()))?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `HM_*` overrides. Unknown keys are ignored.
pub fn apply_overrides<I>(config: &mut ServiceConfig, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        match name {
            "BIND_ADDRESS" => config.listener.bind_address = value,
            "MAX_RUNNING" => config.admission.max_running = parse(&key, &value)?,
            "MAX_IN_FLIGHT" => config.admission.max_in_flight = parse(&key, &value)?,
            "RETRY_AFTER_SECS" => config.admission.retry_after_secs = parse(&key, &value)?,
            "REQUEST_TIMEOUT_MS" => config.timeouts.request_ms = parse(&key, &value)?,
            "SHUTDOWN_TIMEOUT_MS" => config.timeouts.shutdown_ms = parse(&key, &value)?,
            "LOG_LEVEL" => config.observability.log_level = value.to_lowercase(),
            "LOG_FORMAT" => {
                config.observability.log_format = match value.to_lowercase().as_str() {
                    "text" => LogFormat::Text,
                    "json" => LogFormat::Json,
                    _ => return Err(ConfigError::Env { key: key.clone(), value }),
                }
            }
            "ADMIN_API_KEY" => config.admin.api_key = value,
            _ => {}
        }
    }
    Ok(())
}

/// Keep only variables whose name and value are valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}
