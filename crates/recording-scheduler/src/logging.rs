//! Logging setup for hosts embedding the planner.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host. `init_logging` is a convenience for hosts and tests that want
//! the usual formatted output with local timestamps.

use chrono::Local;
use tracing_subscriber::{
    EnvFilter,
    fmt::{format::Writer, time::FormatTime},
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "recording_scheduler=info";

/// Timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Build a filter from a directive, falling back to [`DEFAULT_LOG_FILTER`]
/// when none is given.
pub fn build_filter(directive: Option<&str>) -> Result<EnvFilter> {
    let directive = directive.unwrap_or(DEFAULT_LOG_FILTER);
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Logging(format!("Invalid filter directive: {e}")))
}

/// Install a global formatted subscriber.
///
/// Fails when the directive is invalid or a global subscriber is already set.
pub fn init_logging(directive: Option<&str>) -> Result<()> {
    let filter = build_filter(directive)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTimer)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to install subscriber: {e}")))
}
