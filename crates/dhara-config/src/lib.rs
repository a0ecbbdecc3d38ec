#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the DharaHIL approval client.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dhara_config::Config;
//!
//! // defaults → /etc/dhara → ~/.dhara → explicit file → DHARA_* env fallbacks
//! let resolved = Config::load(None).unwrap();
//! println!("gateway: {}", resolved.config.gateway.base_url);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed to [`Config::load`]
//! 2. **User** (`~/.dhara/config.toml`)
//! 3. **System** (`/etc/dhara/config.toml`)
//! 4. **Environment variables** (`DHARA_*`), fallback only
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependency on `dhara-hil`. The client and engine
//! convert from these types at construction time.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a config file is unreadable or malformed,
    /// or if the merged configuration fails validation.
    pub fn load(explicit_path: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit_path)
    }

    /// Parse a configuration from a TOML string layered over the defaults.
    ///
    /// Environment variables are not consulted.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string is not valid TOML or fails
    /// validation.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_owned(),
            source: e,
        })?;
        validate::validate(&config)?;
        Ok(config)
    }
}
