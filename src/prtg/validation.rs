//! Input checks run before any request is sent.

use crate::config::Settings;
use crate::prtg::constants::ERRORS;
use crate::prtg::error::{PrtgError, Result};
use crate::types::{Target, TimeRange};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Static Patterns
static METRIC_FIND_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(channel|sensor|device|group):(\*)|(tags|sensor|device|group)=([$\sa-zA-Z0-9\-_]+)")
        .expect("Failed to compile metric find regex")
});

/// `device:core-sw` style lookups by the object's own name
static METRIC_FIND_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(sensor|device|group):([$\sa-zA-Z0-9\-_.{}]+)$")
        .expect("Failed to compile metric find literal regex")
});

#[derive(Debug, Clone)]
pub struct Validator;

impl Validator {
    pub fn validate_time_range(range: &TimeRange) -> Result<()> {
        if range.to < range.from {
            return Err(PrtgError::invalid_query(
                "Invalid time range",
                vec![format!(
                    "End time ({}) must not be before start time ({})",
                    range.to, range.from
                )],
            ));
        }
        Ok(())
    }

    /// Errors listing each missing name of a target
    pub fn validate_target(target: &Target) -> Result<()> {
        let fields = [
            ("group", &target.group),
            ("device", &target.device),
            ("sensor", &target.sensor),
            ("channel", &target.channel),
        ];

        let errors: Vec<String> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| format!("{} is required", name))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PrtgError::invalid_query("Incomplete target", errors))
        }
    }

    pub fn validate_metric_find(query: &str) -> Result<()> {
        if METRIC_FIND_REGEX.is_match(query) || METRIC_FIND_LITERAL_REGEX.is_match(query.trim()) {
            Ok(())
        } else {
            Err(PrtgError::invalid_query(
                ERRORS.metric_find_syntax,
                vec![format!("Query: {}", query)],
            ))
        }
    }

    pub fn validate_settings(settings: &Settings) -> Result<()> {
        let mut errors = Vec::new();

        match Url::parse(&settings.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(format!("Unsupported URL scheme: {}", url.scheme())),
            Err(e) => errors.push(format!("Invalid URL {:?}: {}", settings.url, e)),
        }

        if settings.username.trim().is_empty() {
            errors.push("Username cannot be empty".to_string());
        }

        if settings.passhash.trim().is_empty() {
            errors.push("Passhash cannot be empty".to_string());
        }

        if settings.request_timeout.is_zero() {
            errors.push("Request timeout must be greater than zero".to_string());
        }

        if settings.query_timeout.is_zero() {
            errors.push("Query timeout must be greater than zero".to_string());
        }

        if settings.use_cache && settings.cache_timeout.is_zero() {
            errors.push("Cache timeout must be greater than zero".to_string());
        }

        if settings.max_concurrent_requests == 0 {
            errors.push("At least one concurrent request must be allowed".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PrtgError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn valid_settings() -> Settings {
        Settings {
            url: "https://prtg.local".into(),
            username: "api".into(),
            passhash: "123".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_time_range() {
        assert!(Validator::validate_time_range(&TimeRange::new(10, 20)).is_ok());
        assert!(Validator::validate_time_range(&TimeRange::new(10, 10)).is_ok());
        assert!(Validator::validate_time_range(&TimeRange::new(20, 10)).is_err());
    }

    #[test]
    fn test_incomplete_target_lists_missing_fields() {
        let target = Target {
            group: Some("Servers".into()),
            device: Some(" ".into()),
            sensor: Some("Ping".into()),
            ..Target::default()
        };
        match Validator::validate_target(&target).unwrap_err() {
            PrtgError::InvalidQuery { errors, .. } => {
                assert_eq!(errors, vec!["device is required", "channel is required"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_metric_find_syntax() {
        for query in [
            "group:*",
            "device:*",
            "Sensor:*",
            "channel:sensor=1234",
            "device:group=Servers",
            "sensor:device=$device",
            "device:tags=core",
            "device:core-sw",
        ] {
            assert!(Validator::validate_metric_find(query).is_ok(), "{}", query);
        }

        for query in ["", "devices", "library:*", "device:", "channel"] {
            assert!(Validator::validate_metric_find(query).is_err(), "{}", query);
        }
    }

    #[test]
    fn test_settings() {
        assert!(Validator::validate_settings(&valid_settings()).is_ok());

        let bad = Settings {
            url: "ftp://prtg.local".into(),
            passhash: String::new(),
            request_timeout: Duration::ZERO,
            ..valid_settings()
        };
        match Validator::validate_settings(&bad).unwrap_err() {
            PrtgError::Config(message) => {
                assert!(message.contains("Unsupported URL scheme: ftp"));
                assert!(message.contains("Passhash cannot be empty"));
                assert!(message.contains("Request timeout"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
