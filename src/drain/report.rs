use crate::DrainError;

/// How the drain phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every worker exited before the deadline
    Completed,
    /// Deadline elapsed first, or the workers were gone before the queue
    /// emptied; leftovers count as failed
    TimedOut,
}

/// Lifecycle of the purge subsystem, observable through
/// [`crate::DrainCoordinator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Accepting,
    Draining,
    Done(DrainOutcome),
}

/// Final accounting of every batch accepted by the queue.
///
/// Always satisfies `purged + failed == total_accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub total_accepted: u64,
    pub purged: u64,
    /// Includes `timed_out`
    pub failed: u64,
    /// Accepted batches with no terminal outcome when the report was taken
    pub timed_out: u64,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// The shutdown log line.
    pub fn summary(&self) -> String {
        match self.into_result() {
            Ok(report) => format!(
                "Shutting down; finished purging OCSP responses for {} certificates.",
                report.purged
            ),
            Err(e) => e.to_string(),
        }
    }

    pub fn into_result(self) -> std::result::Result<DrainReport, DrainError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DrainError::Unpurged {
                failed: self.failed,
                timed_out: self.timed_out,
            })
        }
    }
}
