//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate a tracing level name or an `EnvFilter` directive list.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let known = ["trace", "debug", "info", "warn", "error", "off"];
    let valid = !level.trim().is_empty()
        && level.split(',').all(|directive| {
            let severity = directive.rsplit('=').next().unwrap_or(directive);
            known.contains(&severity.trim().to_lowercase().as_str())
        });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
