#![forbid(unsafe_code)]

//! Application configuration.
//!
//! One [`AppConfig`] collects the knobs of every component. It can be
//! loaded from TOML or JSON at startup:
//!
//! ```toml
//! # pca.toml
//! [errors]
//! debug = false
//!
//! [retry]
//! max_retries = 2
//! delay_ms = 1500
//!
//! [table]
//! page_size = 20
//!
//! [logging]
//! filter = "info,pca.store=debug"
//! format = "json"
//! ```
//!
//! # Defaults
//!
//! Every field defaults to the behaviour of an unconfigured client, so
//! `AppConfig::default()` changes nothing.

#[cfg(feature = "config-file")]
use std::path::Path;

use pca_core::error::ErrorClassifier;
use pca_runtime::form::FormFlags;
use pca_runtime::retry::{BackoffStrategy, RetryPolicy};
use pca_widgets::table::{DEFAULT_PAGE_SIZE, TableConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted `retry.max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub errors: ErrorsConfig,
    pub retry: RetryConfig,
    pub table: TableSettings,
    pub form: FormSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Attach the raw backend error to every `ErrorResult`.
    pub debug: bool,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            debug: cfg!(debug_assertions),
        }
    }
}

/// Linear backoff for network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Delay before the first retry; retry `n` waits `n × delay_ms`.
    pub delay_ms: u64,
    /// Upper bound for a single delay. Unset means uncapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay_ms: 2000,
            max_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    /// Rows per page; 0 shows everything on one page.
    pub page_size: usize,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub reset_on_submit: bool,
}

impl Default for FormSettings {
    fn default() -> Self {
        let flags = FormFlags::default();
        Self {
            validate_on_change: flags.validate_on_change,
            validate_on_blur: flags.validate_on_blur,
            reset_on_submit: flags.reset_on_submit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    /// Requires the `json-logs` feature; falls back to compact otherwise.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check every value is within its accepted range.
    ///
    /// Returns a list of problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            errors.push(format!(
                "retry.max_retries must be <= {MAX_RETRIES_LIMIT}, got {}",
                self.retry.max_retries
            ));
        }
        if self.retry.max_retries > 0 && self.retry.delay_ms == 0 {
            errors.push("retry.delay_ms must be > 0 when retries are enabled".into());
        }
        if let Some(max) = self.retry.max_delay_ms
            && max < self.retry.delay_ms
        {
            errors.push(format!(
                "retry.max_delay_ms must be >= retry.delay_ms ({}), got {max}",
                self.retry.delay_ms
            ));
        }
        if self.logging.filter.trim().is_empty() {
            errors.push("logging.filter must not be empty".into());
        }

        errors
    }

    /// `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            BackoffStrategy::Linear {
                base_ms: self.retry.delay_ms,
                max_ms: self.retry.max_delay_ms.unwrap_or(u64::MAX),
            },
        )
    }

    #[must_use]
    pub fn table_config(&self) -> TableConfig {
        TableConfig::default().page_size(self.table.page_size)
    }

    #[must_use]
    pub fn form_defaults(&self) -> FormFlags {
        FormFlags {
            validate_on_change: self.form.validate_on_change,
            validate_on_blur: self.form.validate_on_blur,
            reset_on_submit: self.form.reset_on_submit,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> ErrorClassifier {
        ErrorClassifier::new(self.errors.debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_match_unconfigured_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.table_config(), TableConfig::default());
        assert_eq!(config.form_defaults(), FormFlags::default());
        assert_eq!(config.classifier(), ErrorClassifier::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn capped_delays() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 3;
        config.retry.delay_ms = 1000;
        config.retry.max_delay_ms = Some(2500);
        let policy = config.retry_policy();
        assert_eq!(policy.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2500));
    }

    #[test]
    fn validate_reports_each_problem() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 50;
        config.retry.delay_ms = 0;
        config.logging.filter = "  ".into();
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("retry.max_retries")));
        assert!(errors.iter().any(|e| e.contains("retry.delay_ms")));
        assert!(errors.iter().any(|e| e.contains("logging.filter")));
        assert!(matches!(
            config.validated(),
            Err(ConfigError::Validation(list)) if list.len() == 3
        ));
    }

    #[test]
    fn max_delay_below_base_is_rejected() {
        let mut config = AppConfig::default();
        config.retry.max_delay_ms = Some(10);
        assert!(config.validate()[0].contains("retry.max_delay_ms"));
    }
}
