//! Configuration schema types for Conduit.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod browser;
mod system;

pub use browser::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Conduit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub ipc: IpcConfig,
    pub capturer: CapturerConfig,
    pub guest: GuestConfig,
    pub logging: LoggingConfig,
}
