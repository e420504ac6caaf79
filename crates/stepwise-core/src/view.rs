//! Read-only access to a question attempt.
//!
//! [`AttemptView`] is implemented by both the live
//! [`QuestionAttempt`](crate::attempt::QuestionAttempt) and the
//! [`RestrictedHistory`](crate::restricted::RestrictedHistory) view. Every
//! query is a provided method over four accessors, so the two answer
//! identically for the steps they hold. Behaviours and observers receive a
//! `&dyn AttemptView`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attempt::{AttemptId, QuestionAttempt};
use crate::error::{ManualMarkError, Result};
use crate::marks::{format_float, format_float_trimmed, parse_mark};
use crate::sequence::{StepIter, StepSequence, StepsWithSubmittedResponse};
use crate::state::QuestionState;
use crate::step::{Step, StoredFile, SubmittedData, VarMap};
use crate::traits::{
    Behaviour, ClassifiedResponses, CommentFormat, DisplayOptions, QuestionDefinition,
    WhichTries, COMMENT_FORMAT_VAR, COMMENT_VAR, MARK_VAR, MAX_MARK_VAR,
};

/// Stored marks within this of the current maximum are treated as current.
const MAX_MARK_TOLERANCE: f64 = 0.0000005;

/// Scalar fields of an attempt, copied as-is into restricted views.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFields {
    pub(crate) id: Option<AttemptId>,
    pub(crate) usage_id: Uuid,
    pub(crate) slot: Option<u32>,
    pub(crate) variant: u32,
    pub(crate) max_mark: f64,
    pub(crate) min_fraction: Option<f64>,
    pub(crate) max_fraction: Option<f64>,
    pub(crate) question_summary: Option<String>,
    pub(crate) response_summary: Option<String>,
    pub(crate) right_answer: Option<String>,
    pub(crate) flagged: bool,
}

impl AttemptFields {
    pub(crate) fn new(usage_id: Uuid, max_mark: f64) -> Self {
        Self {
            id: None,
            usage_id,
            slot: None,
            variant: 1,
            max_mark,
            min_fraction: None,
            max_fraction: None,
            question_summary: None,
            response_summary: None,
            right_answer: None,
            flagged: false,
        }
    }
}

/// Queries over an attempt and its step history.
pub trait AttemptView {
    fn fields(&self) -> &AttemptFields;

    fn steps(&self) -> &StepSequence;

    fn question(&self) -> &dyn QuestionDefinition;

    /// Fails with `NotStarted` before the attempt has a behaviour.
    fn behaviour(&self) -> Result<&dyn Behaviour>;

    /// The unrestricted attempt this view is based on.
    fn full_qa(&self) -> &QuestionAttempt;

    fn as_view(&self) -> &dyn AttemptView;

    // Scalar fields.

    fn database_id(&self) -> Option<AttemptId> {
        self.fields().id
    }

    fn usage_id(&self) -> Uuid {
        self.fields().usage_id
    }

    fn slot(&self) -> Option<u32> {
        self.fields().slot
    }

    fn variant(&self) -> u32 {
        self.fields().variant
    }

    fn max_mark(&self) -> f64 {
        self.fields().max_mark
    }

    fn is_flagged(&self) -> bool {
        self.fields().flagged
    }

    fn min_fraction(&self) -> Result<f64> {
        match self.fields().min_fraction {
            Some(f) => Ok(f),
            None => Ok(self.behaviour()?.min_fraction(self.question())),
        }
    }

    fn max_fraction(&self) -> Result<f64> {
        match self.fields().max_fraction {
            Some(f) => Ok(f),
            None => Ok(self.behaviour()?.max_fraction(self.question())),
        }
    }

    fn question_summary(&self) -> Option<&str> {
        self.fields().question_summary.as_deref()
    }

    fn response_summary(&self) -> Option<&str> {
        self.fields().response_summary.as_deref()
    }

    fn right_answer_summary(&self) -> Option<&str> {
        self.fields().right_answer.as_deref()
    }

    fn behaviour_name(&self) -> Result<&str> {
        Ok(self.behaviour()?.name())
    }

    // Steps.

    fn num_steps(&self) -> usize {
        self.steps().len()
    }

    fn step(&self, index: usize) -> Result<&Step> {
        self.steps().get(index)
    }

    fn last_step(&self) -> Option<&Step> {
        self.steps().last()
    }

    fn sequence_check_count(&self) -> usize {
        self.steps().sequence_check_count()
    }

    fn has_autosaved_step(&self) -> bool {
        self.steps().has_autosave()
    }

    fn step_iter(&self) -> StepIter<'_> {
        self.steps().iter()
    }

    fn reverse_step_iter(&self) -> std::iter::Rev<StepIter<'_>> {
        self.steps().reverse_iter()
    }

    /// Iterates the unrestricted history, even from a restricted view.
    fn full_step_iter(&self) -> StepIter<'_> {
        self.full_qa().steps().iter()
    }

    fn steps_with_submitted_response(&self) -> Result<StepsWithSubmittedResponse<'_>> {
        let behaviour = self.behaviour()?;
        Ok(StepsWithSubmittedResponse::find(self.steps(), |step| {
            behaviour.step_has_a_submitted_response(step)
        }))
    }

    // State and marks.

    fn state(&self) -> QuestionState {
        self.last_step()
            .map(Step::state)
            .unwrap_or(QuestionState::NotStarted)
    }

    fn state_string(&self, show_correctness: bool) -> Result<String> {
        if self.num_steps() == 1 && self.state() == QuestionState::Complete {
            return Ok("Not changed".to_string());
        }
        Ok(self.behaviour()?.state_string(self.as_view(), show_correctness))
    }

    fn state_class(&self, show_correctness: bool) -> &'static str {
        self.state().state_class(show_correctness)
    }

    fn last_action_time(&self) -> Option<DateTime<Utc>> {
        self.last_step().map(Step::timecreated)
    }

    fn fraction(&self) -> Option<f64> {
        self.last_step().and_then(Step::fraction)
    }

    fn has_marks(&self) -> bool {
        self.fraction().is_some()
    }

    fn mark(&self) -> Option<f64> {
        self.fraction_to_mark(self.fraction())
    }

    fn fraction_to_mark(&self, fraction: Option<f64>) -> Option<f64> {
        fraction.map(|f| f * self.max_mark())
    }

    /// The current mark with `dp` decimal places, or empty if ungraded.
    fn format_mark(&self, dp: usize) -> String {
        self.format_fraction_as_mark(self.fraction(), dp)
    }

    fn format_fraction_as_mark(&self, fraction: Option<f64>, dp: usize) -> String {
        self.fraction_to_mark(fraction)
            .map(|mark| format_float(mark, dp))
            .unwrap_or_default()
    }

    fn format_max_mark(&self, dp: usize) -> String {
        format_float(self.max_mark(), dp)
    }

    // Latest-value queries.

    fn last_qt_var(&self, name: &str) -> Option<&str> {
        self.steps().last_qt_var(name)
    }

    fn last_qt_var_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.last_qt_var(name).unwrap_or(default)
    }

    fn last_behaviour_var(&self, name: &str) -> Option<&str> {
        self.steps().last_behaviour_var(name)
    }

    fn last_behaviour_var_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.last_behaviour_var(name).unwrap_or(default)
    }

    fn last_step_with_qt_var(&self, name: &str) -> Option<&Step> {
        self.steps().last_step_with_qt_var(name)
    }

    fn last_step_with_behaviour_var(&self, name: &str) -> Option<&Step> {
        self.steps().last_step_with_behaviour_var(name)
    }

    fn last_qt_data(&self) -> VarMap {
        self.steps().last_qt_data()
    }

    fn last_qt_files(&self, name: &str) -> &[StoredFile] {
        self.steps().last_qt_files(name)
    }

    /// A metadata variable from step 0.
    fn metadata(&self, name: &str) -> Result<Option<&str>> {
        Ok(self.step(0)?.metadata_var(name))
    }

    // Behaviour-delegated queries.

    fn summarise_action(&self, step: &Step) -> Result<String> {
        Ok(self.behaviour()?.summarise_action(self.as_view(), step))
    }

    fn classify_response(&self, which: WhichTries) -> Result<ClassifiedResponses> {
        self.behaviour()?.classify_response(self.as_view(), which)
    }

    fn can_finish_during_attempt(&self) -> Result<bool> {
        Ok(self.behaviour()?.can_finish_during_attempt(self.as_view()))
    }

    fn check_file_access(
        &self,
        options: &DisplayOptions,
        component: &str,
        filearea: &str,
    ) -> Result<bool> {
        Ok(self
            .behaviour()?
            .check_file_access(self.as_view(), options, component, filearea))
    }

    /// The question's correct response with any behaviour variables it needs.
    fn correct_response(&self) -> Result<Option<SubmittedData>> {
        let Some(qt) = self.question().correct_response() else {
            return Ok(None);
        };
        let behaviour = self.behaviour()?.correct_response(self.as_view());
        Ok(Some(SubmittedData {
            qt,
            behaviour,
            ..SubmittedData::default()
        }))
    }

    /// Data for starting a new attempt that continues from this one.
    fn resume_data(&self) -> Result<SubmittedData> {
        Ok(self
            .behaviour()?
            .resume_data(self.as_view())?
            .into_submitted())
    }

    // Manual grading.

    fn has_manual_comment(&self) -> bool {
        self.last_behaviour_var(COMMENT_VAR)
            .is_some_and(|c| !c.is_empty())
    }

    /// The latest grader comment and its format.
    fn manual_comment(&self) -> Option<(String, CommentFormat)> {
        let step = self.last_step_with_behaviour_var(COMMENT_VAR)?;
        let comment = step.behaviour_var(COMMENT_VAR)?.to_string();
        let format = step
            .behaviour_var(COMMENT_FORMAT_VAR)
            .and_then(|f| f.parse::<i32>().ok())
            .and_then(CommentFormat::from_code)
            .unwrap_or_default();
        Some((comment, format))
    }

    /// The mark to prefill a grading form with.
    ///
    /// The exact string the grader typed is returned if it was entered
    /// against the current maximum mark; otherwise the current mark.
    fn current_manual_mark(&self) -> Option<String> {
        let stored_max = self.last_behaviour_var(MAX_MARK_VAR).and_then(parse_mark);
        if let Some(stored_max) = stored_max {
            if (stored_max - self.max_mark()).abs() < MAX_MARK_TOLERANCE {
                if let Some(mark) = self.last_behaviour_var(MARK_VAR) {
                    return Some(mark.to_string());
                }
            }
        }
        self.mark().map(|mark| format_float_trimmed(mark, 7))
    }

    /// Check a grader's mark, returning the parsed value.
    ///
    /// Blank input is accepted as "no mark".
    fn validate_manual_mark(&self, input: &str) -> std::result::Result<Option<f64>, ManualMarkError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        let mark = parse_mark(input).ok_or(ManualMarkError::InvalidFormat)?;
        let min = self.max_mark() * self.min_fraction()?;
        let max = self.max_mark() * self.max_fraction()?;
        if mark < min || mark > max {
            return Err(ManualMarkError::OutOfRange { min, max });
        }
        Ok(Some(mark))
    }
}
