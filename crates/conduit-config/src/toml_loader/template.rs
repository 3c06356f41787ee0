//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Conduit Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[ipc]
# Run registered filters before dispatching renderer messages.
# Defaults to true in debug builds, false in release builds.
# filters_enabled = false

[capturer]
# enabled = true
# max_thumbnail_edge = 4096   # 1-16384

[guest]
# Set to false to refuse every window.open request.
# allow_popups = true

[logging]
# level = "INFO"              # DEBUG | INFO | WARNING | ERROR
"##
    .to_string()
}
