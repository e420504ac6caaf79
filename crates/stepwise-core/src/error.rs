//! Error types for the attempt-tracking core.
//!
//! [`AttemptError`] signals a defect in the calling code: starting twice,
//! indexing past the end of the history, mutating a restricted view. Hosts
//! should treat these as bugs rather than user input problems.
//! [`ManualMarkError`] is the recoverable, user-facing counterpart returned
//! when validating a mark typed in by a grader.

use thiserror::Error;

use crate::step::StepId;

/// Errors raised by question attempts, step sequences and restricted views.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    /// `start` was called on an attempt that already has steps.
    #[error("cannot start a question that is already started")]
    AlreadyStarted,

    /// A mutator or behaviour-dependent query was called before `start`.
    #[error("this question attempt has not been started yet")]
    NotStarted,

    /// A step index outside `[0, len)`.
    #[error("index {index} out of bounds: the attempt has {len} steps")]
    StepOutOfRange { index: usize, len: usize },

    /// A restricted view was requested for a step that does not exist.
    #[error("last step {lastseq} out of range: the attempt has {len} steps")]
    LastSeqOutOfRange { lastseq: usize, len: usize },

    /// A mutating call on a restricted-history view.
    #[error("cannot modify a question attempt with restricted history")]
    RestrictedHistory,

    /// The record stream did not contain the requested attempt.
    #[error("question attempt {0} not found in the record stream")]
    AttemptNotFound(i64),

    /// The question bank has no question with this id.
    #[error("question {0} not found")]
    QuestionNotFound(i64),

    /// A behaviour name that is not registered.
    #[error("unknown behaviour: {0}")]
    UnknownBehaviour(String),

    /// The behaviour refused an action it can never accept in this state.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Submitted-response numbers count from 1.
    #[error("try number {0} not found, it should be 1 or more")]
    TryNumberNotFound(usize),

    /// The caller echoed back a stale sequence check count.
    #[error("sequence check count {submitted} does not match the current count {expected}")]
    SequenceCheckMismatch { expected: usize, submitted: usize },

    /// A persisted row could not be turned back into a step.
    #[error("corrupt step record {step_id:?}: {message}")]
    CorruptRecord {
        step_id: Option<StepId>,
        message: String,
    },
}

impl AttemptError {
    /// Returns `true` for errors that indicate a bug in the caller rather
    /// than a problem with the data being processed.
    pub fn is_programming_error(&self) -> bool {
        !matches!(
            self,
            AttemptError::CorruptRecord { .. } | AttemptError::SequenceCheckMismatch { .. }
        )
    }
}

/// Validation failures for a manually entered mark.
///
/// The `Display` output is meant to be shown back to the grader.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManualMarkError {
    /// The input is not a number.
    #[error("That is not a valid number.")]
    InvalidFormat,

    /// The input is a number outside `[min_fraction, max_fraction] * max_mark`.
    #[error("That mark is out of the valid range ({min} to {max}).")]
    OutOfRange { min: f64, max: f64 },

    /// The attempt could not be asked for its fraction bounds.
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

impl ManualMarkError {
    /// Returns `true` if the host should redisplay its form with this message.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ManualMarkError::Attempt(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AttemptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_programming_errors() {
        assert!(AttemptError::AlreadyStarted.is_programming_error());
        assert!(AttemptError::RestrictedHistory.is_programming_error());
        assert!(!AttemptError::CorruptRecord {
            step_id: Some(3),
            message: "bad state".into()
        }
        .is_programming_error());
        assert!(!AttemptError::SequenceCheckMismatch {
            expected: 3,
            submitted: 2
        }
        .is_programming_error());
    }

    #[test]
    fn manual_mark_errors_render_for_graders() {
        assert_eq!(
            ManualMarkError::InvalidFormat.to_string(),
            "That is not a valid number."
        );
        let err = ManualMarkError::OutOfRange { min: 0.0, max: 2.0 };
        assert!(err.to_string().contains("0 to 2"));
        assert!(err.is_user_error());
        assert!(!ManualMarkError::from(AttemptError::NotStarted).is_user_error());
    }
}
