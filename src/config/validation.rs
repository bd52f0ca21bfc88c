//! Configuration validation.
//!
//! Returns all validation errors, not just the first.

use std::fmt;

use crate::config::schema::KazeConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &KazeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !(0.0..=1.0).contains(&config.router.initial_weight) {
        errors.push(ValidationError::new("router.initial_weight", "must be within [0, 1]"));
    }
    if !(config.router.step > 0.0 && config.router.step <= 1.0) {
        errors.push(ValidationError::new("router.step", "must be within (0, 1]"));
    }

    let timeouts = [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("timeouts.ping_ms", config.timeouts.ping_ms),
        ("timeouts.ping_ms", config.timeouts.ping_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    for (name, net) in &config.networks {
        let provider_urls = [("kazescan", &net.kazescan), ("krypton_db", &net.krypton_db)];
        for (key, url) in provider_urls {
            if let Some(url) = url {
                check_url(&mut errors, format!("networks.{}.{}", name, key), url);
            }
        }
        for (i, node) in net.nodes.iter().enumerate() {
            check_url(&mut errors, format!("networks.{}.nodes[{}]", name, i), node);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: String, value: &str) {
    match url::Url::parse(value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        Ok(u) => errors.push(ValidationError::new(field, format!("unsupported scheme '{}'", u.scheme()))),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}
