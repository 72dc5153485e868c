#![forbid(unsafe_code)]

//! Global `tracing` subscriber installation.
//!
//! Library crates only emit events; the application calls [`init`] once at
//! startup. Targets in use: `pca.store`, `pca.form`, `pca.table`,
//! `pca.error`, `pca.retry`, `pca.reactive`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;

/// Build the filter: `RUST_LOG` when set, else the configured directives.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.filter.clone());
    Ok(EnvFilter::try_new(directives)?)
}

/// Install the global subscriber.
///
/// Fails when a global subscriber is already installed or the filter does
/// not parse.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init()?,
        #[cfg(feature = "json-logs")]
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        #[cfg(not(feature = "json-logs"))]
        LogFormat::Json => {
            registry.with(fmt::layer().compact()).try_init()?;
            tracing::warn!(
                target: "pca",
                "json log format needs the json-logs feature, using compact"
            );
        }
    }
    tracing::debug!(target: "pca", filter = %config.filter, format = ?config.format, "logging initialized");
    Ok(())
}
