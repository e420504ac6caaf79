//! Read-only views of an attempt as it was at an earlier step.

use crate::attempt::{AttemptId, BehaviourSpec, QuestionAttempt};
use crate::error::{AttemptError, Result};
use crate::sequence::StepSequence;
use crate::step::{ActionOptions, SubmittedData};
use crate::traits::{Behaviour, CommentFormat, QuestionDefinition, StepDecision};
use crate::view::{AttemptFields, AttemptView};

/// An attempt truncated to steps `0..=lastseq`.
///
/// Holds its own copy of the step prefix and scalar fields, and its own
/// behaviour instance, so every query answers for the truncated history.
/// [`AttemptView::full_qa`] and [`AttemptView::full_step_iter`] reach the
/// complete attempt. Every mutator fails.
#[derive(Debug)]
pub struct RestrictedHistory<'a> {
    base: &'a QuestionAttempt,
    fields: AttemptFields,
    steps: StepSequence,
    behaviour: Option<Box<dyn Behaviour>>,
}

impl<'a> RestrictedHistory<'a> {
    pub fn new(base: &'a QuestionAttempt, lastseq: usize) -> Result<Self> {
        let steps = base.steps().prefix(lastseq)?;
        Ok(Self {
            base,
            fields: base.fields().clone(),
            steps,
            behaviour: base.behaviour().ok().map(|b| b.boxed_clone()),
        })
    }

    /// The step this view ends at.
    pub fn lastseq(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn start(
        &mut self,
        _spec: BehaviourSpec<'_>,
        _variant: u32,
        _data: SubmittedData,
        _options: ActionOptions,
    ) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn process_action(
        &mut self,
        _data: SubmittedData,
        _options: ActionOptions,
    ) -> Result<StepDecision> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn process_autosave(&mut self, _data: SubmittedData, _options: ActionOptions) -> Result<bool> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn finish(&mut self, _options: ActionOptions) -> Result<StepDecision> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn manual_grade(
        &mut self,
        _comment: &str,
        _mark: Option<f64>,
        _format: CommentFormat,
        _options: ActionOptions,
    ) -> Result<StepDecision> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn regrade(&mut self, _old: &dyn AttemptView, _force_finish: bool) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_flagged(&mut self, _flagged: bool) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_slot(&mut self, _slot: u32) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_database_id(&mut self, _id: AttemptId) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_usage_id(&mut self, _usage_id: uuid::Uuid) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_question_summary(&mut self, _summary: Option<String>) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_max_mark(&mut self, _max_mark: f64) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }

    pub fn set_metadata(&mut self, _name: &str, _value: &str) -> Result<()> {
        Err(AttemptError::RestrictedHistory)
    }
}

impl AttemptView for RestrictedHistory<'_> {
    fn fields(&self) -> &AttemptFields {
        &self.fields
    }

    fn steps(&self) -> &StepSequence {
        &self.steps
    }

    fn question(&self) -> &dyn QuestionDefinition {
        self.base.question()
    }

    fn behaviour(&self) -> Result<&dyn Behaviour> {
        self.behaviour.as_deref().ok_or(AttemptError::NotStarted)
    }

    fn full_qa(&self) -> &QuestionAttempt {
        self.base
    }

    fn as_view(&self) -> &dyn AttemptView {
        self
    }
}
