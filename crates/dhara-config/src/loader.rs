//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/dhara/config.toml` (system)
//! 3. Merge `~/.dhara/config.toml` (user)
//! 4. Merge an explicit file, if one was given
//! 5. Apply `DHARA_*` env var fallbacks for fields no file set
//! 6. Resolve `${VAR}` references
//! 7. Deserialize merged tree → `Config`
//! 8. Validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_all_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// A loaded configuration plus where its values came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Which layer set each dotted field path.
    pub field_sources: FieldSources,
    /// Config files that were found and merged, in merge order.
    pub loaded_files: Vec<String>,
}

/// Load configuration with the full layer chain and the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(explicit_path: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let user_dir = directories::BaseDirs::new().map(|d| d.home_dir().join(".dhara"));
    load_with(
        Some(Path::new("/etc/dhara")),
        user_dir.as_deref(),
        explicit_path,
        &collect_env_vars(),
    )
}

/// Load configuration from explicit directories and an injected env map.
///
/// `system_dir` and `user_dir` are directories expected to contain a
/// `config.toml`; either may be `None` to skip that layer.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, an explicit
/// file is missing, or validation fails.
pub fn load_with<S: ::std::hash::BuildHasher>(
    system_dir: Option<&Path>,
    user_dir: Option<&Path>,
    explicit_path: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_all_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let optional_layers = [
        (system_dir.map(|d| d.join("config.toml")), ConfigLayer::System),
        (user_dir.map(|d| d.join("config.toml")), ConfigLayer::User),
    ];
    for (path, layer) in optional_layers {
        let Some(path) = path else { continue };
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            info!(path = %path.display(), layer = %layer, "loaded config");
            loaded_files.push(path.display().to_string());
        }
    }

    if let Some(path) = explicit_path {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded explicit config");
        loaded_files.push(path.display().to_string());
    }

    let applied = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    debug!(applied, "env var fallbacks applied");

    resolve_env_references(&mut merged, env_vars);

    let config: Config = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: "<merged config>".to_owned(),
        source: e,
    })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Read and parse a TOML file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) {
        std::fs::write(dir.join("config.toml"), body).unwrap();
    }

    #[test]
    fn defaults_only() {
        let resolved = load_with(None, None, None, &HashMap::new()).unwrap();
        assert_eq!(resolved.config.approval.default_timeout_secs, 600);
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("gateway.base_url"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn user_layer_overrides_system_layer() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        write_config(
            system.path(),
            "[gateway]\nbase_url = \"https://system\"\ntenant_id = \"acme\"",
        );
        write_config(user.path(), "[gateway]\nbase_url = \"https://user\"");

        let resolved =
            load_with(Some(system.path()), Some(user.path()), None, &HashMap::new()).unwrap();

        assert_eq!(resolved.config.gateway.base_url, "https://user");
        assert_eq!(resolved.config.gateway.tenant_id, "acme");
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn env_fallback_fills_only_unset_fields() {
        let user = tempfile::tempdir().unwrap();
        write_config(user.path(), "[gateway]\ntenant_id = \"from-file\"");
        let env: HashMap<String, String> = [
            ("DHARA_TENANT_ID", "from-env"),
            ("DHARA_API_KEY", "secret"),
            ("DHARA_POLL_INTERVAL_MS", "100"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let resolved = load_with(None, Some(user.path()), None, &env).unwrap();

        assert_eq!(resolved.config.gateway.tenant_id, "from-file");
        assert_eq!(resolved.config.gateway.api_key.as_deref(), Some("secret"));
        assert_eq!(resolved.config.approval.poll_interval_ms, 100);
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_with(None, None, Some(&missing), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn explicit_file_resolves_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hil.toml");
        std::fs::write(&path, "[gateway]\napi_key = \"${HIL_KEY}\"").unwrap();
        let env: HashMap<String, String> =
            std::iter::once(("HIL_KEY".to_owned(), "abc".to_owned())).collect();

        let resolved = load_with(None, None, Some(&path), &env).unwrap();
        assert_eq!(resolved.config.gateway.api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[gateway\nbase_url = ");
        let err = load_with(None, Some(dir.path()), None, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[approval]\npoll_interval_ms = 0");
        let err = load_with(None, Some(dir.path()), None, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
