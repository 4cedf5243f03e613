// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(invalid(format!("{} cannot be empty", field)));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(invalid(format!(
                "{} must be between {} and {}",
                field, min, max
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<()> {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            return Err(invalid(format!(
                "{} must be one of: {}",
                field,
                allowed.join(", ")
            )));
        }
        Ok(())
    }

    /// Validate a Redis connection URL
    pub fn is_redis_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("redis://") && !value.starts_with("rediss://") {
            return Err(invalid(format!(
                "{} must start with redis:// or rediss://",
                field
            )));
        }
        Ok(())
    }

    /// Validate an HTTP(S) URL
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(invalid(format!("{} must be a valid URL", field)));
        }
        Ok(())
    }

    /// Validate email format (basic), accepting `Name <addr>` mailboxes
    pub fn is_email(value: &str, field: &str) -> Result<()> {
        let addr = match (value.find('<'), value.find('>')) {
            (Some(start), Some(end)) if start < end => &value[start + 1..end],
            _ => value,
        };
        let valid = addr
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

        if !valid {
            return Err(invalid(format!("{} must be a valid email", field)));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(invalid(format!("{} must be a valid port number", field)));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}
