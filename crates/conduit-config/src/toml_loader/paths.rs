//! Where the Conduit config file lives, and writing the starter file there.

use conduit_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::info;

use super::template::default_config_toml;

const APP_DIR: &str = "conduit";
const FILE_NAME: &str = "config.toml";

/// `<dir>/conduit/config.toml`.
pub(crate) fn config_path_under(dir: &Path) -> PathBuf {
    dir.join(APP_DIR).join(FILE_NAME)
}

/// The config file under the user's config directory (`dirs::config_dir`).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("no user config directory on this platform".into())
    })?;
    Ok(config_path_under(&base))
}

/// Write the commented starter config to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, target: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("cannot {what} {}: {e}", target.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err("create directory", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_err("write", path, e))?;

    info!(path = %path.display(), "wrote starter config");
    Ok(())
}
