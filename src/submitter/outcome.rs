use crate::SubmitError;

/// Terminal result of one batch's attempt sequence.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// A target accepted the purge
    Purged { attempts: usize, target: String },
    /// Attempts exhausted or cancelled; carries the last error observed
    Failed { error: SubmitError },
}

impl SubmissionOutcome {
    pub fn is_purged(&self) -> bool {
        matches!(self, SubmissionOutcome::Purged { .. })
    }

    /// Upstream calls made for this batch
    pub fn attempts(&self) -> usize {
        match self {
            SubmissionOutcome::Purged { attempts, .. } => *attempts,
            SubmissionOutcome::Failed { error } => error.attempts(),
        }
    }

    pub fn error(&self) -> Option<&SubmitError> {
        match self {
            SubmissionOutcome::Purged { .. } => None,
            SubmissionOutcome::Failed { error } => Some(error),
        }
    }
}
