//! Configuration validation.
//!
//! Checks numeric ranges and collects every error into a single
//! `ConfigError`.

mod helpers;


use crate::schema::ConduitConfig;
use conduit_common::ConfigError;

use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ConduitConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_capturer(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_capturer(errors: &mut Vec<String>, config: &ConduitConfig) {
    validate_range(
        errors,
        "capturer.max_thumbnail_edge",
        config.capturer.max_thumbnail_edge,
        1,
        16384,
    );
}
