//! Reading `ConduitConfig` from TOML.

use crate::schema::ConduitConfig;
use crate::validation;
use conduit_common::ConfigError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};

/// Parse the TOML file at `path`.
///
/// Sections and keys left out take their defaults. Out-of-range values are
/// reported with a warning but kept; the caller decides what to do with them.
pub fn load_from_path(path: &Path) -> Result<ConduitConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ConfigError::FileNotFound(path.to_path_buf())
        } else {
            ConfigError::ParseError(format!("cannot read {}: {e}", path.display()))
        }
    })?;

    let config: ConduitConfig = toml::from_str(&text)
        .map_err(|e| ConfigError::ParseError(format!("invalid TOML in {}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "config has out-of-range values");
    }

    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load the user's config file, writing the starter file on first run.
///
/// A first run yields `ConduitConfig::default()`, which is exactly what the
/// starter file describes.
pub fn load_default() -> Result<ConduitConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            info!(path = %path.display(), "first run; writing starter config");
            create_default_config(&path)?;
            Ok(ConduitConfig::default())
        }
        other => other,
    }
}
