use std::fmt;

use anyhow::{anyhow, Result};
use chrono::Local;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use crate::commands::AtCommand;

/// Wall-clock `HH:MM:SS` timestamps.
struct LocalClock;

impl FormatTime for LocalClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%H:%M:%S"))
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
/// Fails if a subscriber is already installed.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(LocalClock)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Logs a command handed to a port. Credentials stay hidden.
pub fn log_send_command(port: &str, command: &AtCommand) {
    tracing::debug!(port, timeout = ?command.timeout, "--> 'AT{}'", command.loggable());
}

pub fn log_recv_reply(port: &str, reply: &str) {
    tracing::debug!(port, "<-- '{}'", reply.trim().escape_debug());
}

pub fn log_step(sequence: &str, step: impl fmt::Debug) {
    tracing::debug!("running {sequence} step {step:?}");
}
