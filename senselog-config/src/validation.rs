//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid");
}

const PLACEHOLDERS: [&str; 3] = ["run_id", "file_id", "node"];

/// A CSV header must be a single non-empty line.
pub fn validate_header(header: &str) -> Result<(), ValidationError> {
    if header.is_empty() || header.contains(['\n', '\r']) {
        return Err(ValidationError::new("invalid_header"));
    }
    Ok(())
}

/// Output templates must name a file and only use known placeholders.
pub fn validate_template(template: &str) -> Result<(), ValidationError> {
    if template.trim().is_empty() || template.ends_with(['/', '\\']) {
        return Err(ValidationError::new("invalid_output_template"));
    }

    for capture in PLACEHOLDER.captures_iter(template) {
        if !PLACEHOLDERS.contains(&&capture[1]) {
            return Err(ValidationError::new("unknown_placeholder"));
        }
    }
    Ok(())
}

/// Validate log level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
