//! Conduit configuration system.
//!
//! Provides TOML-based configuration with validation. All config sections
//! use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use conduit_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{ConduitConfig, LogLevel, CONFIG_SCHEMA_VERSION};

use conduit_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path, creating it if missing, and
/// validate the result.
pub fn load_config() -> Result<ConduitConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<ConduitConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &ConduitConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let config = ConduitConfig::default();
        let json = config_to_json(&config);
        assert!(json.contains("\"ipc\""));
        assert!(json.contains("\"capturer\""));
        assert!(json.contains("\"guest\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"INFO\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = ConduitConfig::default();
        let json = config_to_json(&config);
        let parsed: ConduitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn filters_default_follows_build_profile() {
        let config = ConduitConfig::default();
        assert_eq!(config.ipc.filters_enabled, cfg!(debug_assertions));
    }

    #[test]
    fn log_level_maps_to_directive() {
        assert_eq!(LogLevel::Warning.directive(), "conduit=warn");
        assert_eq!(LogLevel::default().directive(), "conduit=info");
    }

    #[test]
    fn load_config_from_rejects_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capturer]\nmax_thumbnail_edge = 99999\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
