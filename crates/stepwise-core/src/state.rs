//! The question-state domain.
//!
//! Every step records one of these states. Behaviours decide which state a
//! pending step moves to; the attempt itself only ever reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fractions closer than this to 0 or 1 count as wrong or right.
const FRACTION_TOLERANCE: f64 = 0.000001;

/// The state of a question attempt after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionState {
    NotStarted,
    Unprocessed,
    Todo,
    Invalid,
    Complete,
    NeedsGrading,
    Finished,
    GaveUp,
    GradedWrong,
    GradedPartial,
    GradedRight,
    ManFinished,
    ManGaveUp,
    MangrWrong,
    MangrPartial,
    MangrRight,
}

impl QuestionState {
    /// All states, in declaration order.
    pub const ALL: [QuestionState; 16] = [
        QuestionState::NotStarted,
        QuestionState::Unprocessed,
        QuestionState::Todo,
        QuestionState::Invalid,
        QuestionState::Complete,
        QuestionState::NeedsGrading,
        QuestionState::Finished,
        QuestionState::GaveUp,
        QuestionState::GradedWrong,
        QuestionState::GradedPartial,
        QuestionState::GradedRight,
        QuestionState::ManFinished,
        QuestionState::ManGaveUp,
        QuestionState::MangrWrong,
        QuestionState::MangrPartial,
        QuestionState::MangrRight,
    ];

    /// Stable lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionState::NotStarted => "notstarted",
            QuestionState::Unprocessed => "unprocessed",
            QuestionState::Todo => "todo",
            QuestionState::Invalid => "invalid",
            QuestionState::Complete => "complete",
            QuestionState::NeedsGrading => "needsgrading",
            QuestionState::Finished => "finished",
            QuestionState::GaveUp => "gaveup",
            QuestionState::GradedWrong => "gradedwrong",
            QuestionState::GradedPartial => "gradedpartial",
            QuestionState::GradedRight => "gradedright",
            QuestionState::ManFinished => "manfinished",
            QuestionState::ManGaveUp => "mangaveup",
            QuestionState::MangrWrong => "mangrwrong",
            QuestionState::MangrPartial => "mangrpartial",
            QuestionState::MangrRight => "mangrright",
        }
    }

    /// The student can still change their response.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            QuestionState::Todo | QuestionState::Invalid | QuestionState::Complete
        )
    }

    /// The attempt has reached a terminal state for the student.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            QuestionState::NeedsGrading
                | QuestionState::Finished
                | QuestionState::GaveUp
                | QuestionState::GradedWrong
                | QuestionState::GradedPartial
                | QuestionState::GradedRight
                | QuestionState::ManFinished
                | QuestionState::ManGaveUp
                | QuestionState::MangrWrong
                | QuestionState::MangrPartial
                | QuestionState::MangrRight
        )
    }

    pub fn is_graded(self) -> bool {
        matches!(
            self,
            QuestionState::GradedWrong
                | QuestionState::GradedPartial
                | QuestionState::GradedRight
                | QuestionState::MangrWrong
                | QuestionState::MangrPartial
                | QuestionState::MangrRight
        )
    }

    /// A grader has commented on (and possibly re-marked) the attempt.
    pub fn is_commented(self) -> bool {
        matches!(
            self,
            QuestionState::ManFinished
                | QuestionState::ManGaveUp
                | QuestionState::MangrWrong
                | QuestionState::MangrPartial
                | QuestionState::MangrRight
        )
    }

    pub fn is_gave_up(self) -> bool {
        matches!(self, QuestionState::GaveUp | QuestionState::ManGaveUp)
    }

    pub fn is_correct(self) -> bool {
        matches!(self, QuestionState::GradedRight | QuestionState::MangrRight)
    }

    pub fn is_partially_correct(self) -> bool {
        matches!(
            self,
            QuestionState::GradedPartial | QuestionState::MangrPartial
        )
    }

    /// The automatically graded state for a fraction.
    pub fn graded_state_for_fraction(fraction: f64) -> QuestionState {
        if fraction < FRACTION_TOLERANCE {
            QuestionState::GradedWrong
        } else if fraction > 1.0 - FRACTION_TOLERANCE {
            QuestionState::GradedRight
        } else {
            QuestionState::GradedPartial
        }
    }

    /// The manually graded state for a fraction, or `ManFinished` if the
    /// grader left the mark blank.
    pub fn manually_graded_state_for_fraction(fraction: Option<f64>) -> QuestionState {
        match fraction {
            None => QuestionState::ManFinished,
            Some(f) if f < FRACTION_TOLERANCE => QuestionState::MangrWrong,
            Some(f) if f > 1.0 - FRACTION_TOLERANCE => QuestionState::MangrRight,
            Some(_) => QuestionState::MangrPartial,
        }
    }

    /// The state a finished attempt moves to when a grader comments on it.
    ///
    /// Returns `None` for states that cannot be commented on (the attempt is
    /// not finished yet).
    pub fn corresponding_commented_state(self, fraction: Option<f64>) -> Option<QuestionState> {
        match self {
            QuestionState::GaveUp | QuestionState::ManGaveUp if fraction.is_none() => {
                Some(QuestionState::ManGaveUp)
            }
            s if s.is_finished() => Some(Self::manually_graded_state_for_fraction(fraction)),
            _ => None,
        }
    }

    /// A short CSS-style class name for the state.
    pub fn state_class(self, show_correctness: bool) -> &'static str {
        match self {
            QuestionState::NotStarted | QuestionState::Unprocessed | QuestionState::Todo => {
                "notyetanswered"
            }
            QuestionState::Invalid => "invalidanswer",
            QuestionState::Complete => "answersaved",
            QuestionState::NeedsGrading => "requiresgrading",
            QuestionState::Finished | QuestionState::ManFinished => "complete",
            QuestionState::GaveUp | QuestionState::ManGaveUp => "notanswered",
            s if !show_correctness => {
                debug_assert!(s.is_graded());
                "complete"
            }
            QuestionState::GradedRight | QuestionState::MangrRight => "correct",
            QuestionState::GradedPartial | QuestionState::MangrPartial => "partiallycorrect",
            QuestionState::GradedWrong | QuestionState::MangrWrong => "incorrect",
        }
    }

    /// Human-readable default description of the state.
    pub fn default_string(self, show_correctness: bool) -> &'static str {
        match self {
            QuestionState::NotStarted => "Not started",
            QuestionState::Unprocessed => "Unprocessed",
            QuestionState::Todo => "Not yet answered",
            QuestionState::Invalid => "Incomplete answer",
            QuestionState::Complete => "Answer saved",
            QuestionState::NeedsGrading => "Requires grading",
            QuestionState::Finished | QuestionState::ManFinished => "Complete",
            QuestionState::GaveUp | QuestionState::ManGaveUp => "Not answered",
            s if !show_correctness => {
                debug_assert!(s.is_graded());
                "Complete"
            }
            QuestionState::GradedRight | QuestionState::MangrRight => "Correct",
            QuestionState::GradedPartial | QuestionState::MangrPartial => "Partially correct",
            QuestionState::GradedWrong | QuestionState::MangrWrong => "Incorrect",
        }
    }
}

impl fmt::Display for QuestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        QuestionState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == lower)
            .ok_or_else(|| format!("unknown question state: {s}"))
    }
}
