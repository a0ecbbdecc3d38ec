//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_gateway(config)?;
    validate_approval(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_gateway(config: &Config) -> ConfigResult<()> {
    let g = &config.gateway;

    if !(g.base_url.starts_with("http://") || g.base_url.starts_with("https://")) {
        return Err(invalid(
            "gateway.base_url",
            format!("'{}' must start with http:// or https://", g.base_url),
        ));
    }

    if g.request_timeout_secs == 0 {
        return Err(invalid(
            "gateway.request_timeout_secs",
            "request timeout must be at least 1 second",
        ));
    }

    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;

    if a.poll_interval_ms == 0 {
        return Err(invalid(
            "approval.poll_interval_ms",
            "poll interval must be greater than zero",
        ));
    }

    if a.default_timeout_secs == 0 {
        return Err(invalid(
            "approval.default_timeout_secs",
            "default timeout must be greater than zero",
        ));
    }

    if a.min_timeout_secs > a.default_timeout_secs {
        return Err(invalid(
            "approval.min_timeout_secs",
            format!(
                "min_timeout_secs ({}) exceeds default_timeout_secs ({})",
                a.min_timeout_secs, a.default_timeout_secs
            ),
        ));
    }

    if a.default_risk_level.trim().is_empty() {
        return Err(invalid(
            "approval.default_risk_level",
            "default risk level must not be empty",
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let level = config.logging.level.to_ascii_lowercase();
    if !matches!(
        level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: trace, debug, info, warn, error, off",
                config.logging.level
            ),
        ));
    }
    Ok(())
}
