//! Browser-side coordination settings: IPC, capture, guest windows.

use serde::{Deserialize, Serialize};

/// Channel registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Consult registered filters before dispatching inbound messages.
    /// On by default in debug builds only.
    pub filters_enabled: bool,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            filters_enabled: cfg!(debug_assertions),
        }
    }
}

/// Desktop capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturerConfig {
    /// When false no capture handler is installed.
    pub enabled: bool,
    /// Largest thumbnail edge a renderer may request (valid range: 1-16384).
    pub max_thumbnail_edge: u32,
}

impl Default for CapturerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_thumbnail_edge: 4096,
        }
    }
}

/// Guest window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestConfig {
    /// Host-wide popup policy. When false every window-open request is
    /// suppressed.
    pub allow_popups: bool,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self { allow_popups: true }
    }
}
