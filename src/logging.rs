//! Tracing setup.
//!
//! Logging is opt-in: nothing is installed until an init function is
//! called, so the crate stays quiet inside host programs that bring
//! their own subscriber. The filter comes from `RUST_LOG`, then
//! `ROCMEM_LOG`, then the default level.

use std::env;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "ROCMEM_LOG";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Installs the subscriber, swallowing any filter error. Suited to
/// tests and tools where logging is best-effort.
pub fn init_logging_default() {
    let _ = init_logging_from_env();
}

/// Installs a formatting subscriber filtered by the environment.
///
/// Calling this more than once is harmless, and an already-installed
/// global subscriber is left in place.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let filter = build_env_filter()?;
    TRACING_INITIALIZED.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
    Ok(())
}

/// Whether an init function has run in this process.
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}

fn build_env_filter() -> Result<EnvFilter, LoggingError> {
    let directives = env::var("RUST_LOG")
        .or_else(|_| env::var(LOG_LEVEL_ENV))
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidFilter(format!("{}: {}", directives, e)))
}
