//! Phase transitions reported to the caller

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Phase of an acquisition operation
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing running
    #[default]
    #[display("idle")]
    Idle,
    /// Identifying the tag and negotiating a technology
    #[display("detecting")]
    Detecting,
    /// Opening Classic sectors
    #[display("authenticating")]
    Authenticating,
    /// Reading memory or running probes
    #[display("reading")]
    Reading,
    /// Writing memory
    #[display("writing")]
    Writing,
    /// Finished; possibly with per-unit failures
    #[display("done")]
    Done,
    /// Finished with a session-level error
    #[display("error")]
    Error,
}

impl Phase {
    /// Whether the operation has ended
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Human-readable status after a phase transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// New phase
    pub phase: Phase,
    /// Message for display
    pub message: String,
    /// Failed units, reported with [`Phase::Done`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<usize>,
}

impl Status {
    /// Status without a failure count
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            failures: None,
        }
    }

    /// Terminal success carrying the number of failed units
    pub fn done(message: impl Into<String>, failures: usize) -> Self {
        Self {
            phase: Phase::Done,
            message: message.into(),
            failures: Some(failures),
        }
    }
}

/// Receiver of status updates
pub trait StatusSink {
    /// Handle one update
    fn report(&mut self, status: Status);
}

impl<F: FnMut(Status)> StatusSink for F {
    fn report(&mut self, status: Status) {
        self(status)
    }
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&mut self, status: Status) {
        info!(phase = %status.phase, failures = ?status.failures, "{}", status.message);
    }
}
