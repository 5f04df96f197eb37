//! Purger Error Hierarchy
//!
//! Errors are grouped by where they surface: intake errors go back to the
//! caller synchronously, upstream and submit errors stay inside the worker
//! pool, and drain errors decide the process exit status.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request rejected before it entered the queue
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// A single upstream purge call failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A batch reached a terminal failure
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Shutdown left work unpurged
    #[error(transparent)]
    Drain(#[from] DrainError),

    /// Infrastructure-level failures (sockets, signals, io)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Acceptance-time errors. These are the only errors a caller of
/// [`crate::PurgeService::submit_purge`] ever sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    /// Empty batch or blank URL
    #[error("invalid purge batch: {0}")]
    InvalidBatch(String),

    /// Queue full under rejecting intake; retry later
    #[error("purge queue is full (capacity {capacity})")]
    Backpressure { capacity: usize },

    /// Intake closed; do not retry against this instance
    #[error("purger is shutting down")]
    ShuttingDown,

    /// Caller cancelled while waiting for queue space
    #[error("purge request cancelled before it was accepted")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Transport failures (connect, TLS, body decode)
    #[error("purge request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered but did not accept the purge
    #[error("unexpected purge response status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },

    /// Single attempt exceeded its timeout
    #[error("purge request timed out after {0:?}")]
    Timeout(Duration),

    /// Generic rejection, used by non-HTTP clients
    #[error("purge request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("all attempts to submit purge request failed")]
    ExhaustedRetries {
        attempts: usize,
        #[source]
        last_error: UpstreamError,
    },

    #[error("purge submission cancelled after {attempts} attempt(s)")]
    Cancelled {
        attempts: usize,
        last_error: Option<UpstreamError>,
    },

    #[error("no upstream purge targets configured")]
    NoTargets,
}

impl SubmitError {
    pub fn attempts(&self) -> usize {
        match self {
            SubmitError::ExhaustedRetries { attempts, .. } => *attempts,
            SubmitError::Cancelled { attempts, .. } => *attempts,
            SubmitError::NoTargets => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubmitError::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrainError {
    /// `failed` already includes `timed_out`
    #[error("failed to purge OCSP responses for {failed} certificates before exit: all attempts to submit purge request failed")]
    Unpurged { failed: u64, timed_out: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Listener could not be bound
    #[error("Failed to bind {service} server on {address}: {reason}")]
    ServerBind {
        service: &'static str,
        address: String,
        reason: String,
    },

    #[error("{0}")]
    SignalSendFailed(String),
}
