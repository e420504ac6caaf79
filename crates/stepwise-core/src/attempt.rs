//! The question attempt aggregate.
//!
//! A [`QuestionAttempt`] owns the step history of one question in one usage.
//! Every mutation goes through a behaviour, which decides whether a pending
//! step is kept, and every kept change is reported to the usage observer.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{AttemptError, Result};
use crate::registry::BehaviourRegistry;
use crate::restricted::RestrictedHistory;
use crate::sequence::StepSequence;
use crate::state::QuestionState;
use crate::step::{ActionOptions, PendingStep, Step, SubmittedData};
use crate::traits::{
    Behaviour, CommentFormat, NullObserver, QuestionDefinition, StepDecision, UsageObserver,
    VariantSelectionStrategy, COMMENT_FORMAT_VAR, COMMENT_VAR, FINISH_VAR, MARK_VAR,
    MAX_MARK_VAR,
};
use crate::view::{AttemptFields, AttemptView};

/// Persisted id of a question attempt.
pub type AttemptId = i64;

/// Where `start` gets its behaviour from.
#[derive(Debug, Clone, Copy)]
pub enum BehaviourSpec<'a> {
    /// Look the name up through the question's `make_behaviour`.
    Named(&'a str),
    /// Clone an existing behaviour (regrade, resume).
    Instance(&'a dyn Behaviour),
}

impl<'a> From<&'a str> for BehaviourSpec<'a> {
    fn from(name: &'a str) -> Self {
        BehaviourSpec::Named(name)
    }
}

/// One learner's attempt at one question.
pub struct QuestionAttempt {
    pub(crate) fields: AttemptFields,
    pub(crate) question: Arc<dyn QuestionDefinition>,
    pub(crate) steps: StepSequence,
    pub(crate) behaviour: Option<Box<dyn Behaviour>>,
    pub(crate) observer: Arc<dyn UsageObserver>,
    pub(crate) registry: Arc<BehaviourRegistry>,
}

impl QuestionAttempt {
    /// A new, unstarted attempt. The max mark defaults to the question's
    /// default mark.
    pub fn new(
        question: Arc<dyn QuestionDefinition>,
        usage_id: Uuid,
        registry: Arc<BehaviourRegistry>,
    ) -> Self {
        let max_mark = question.default_mark();
        Self {
            fields: AttemptFields::new(usage_id, max_mark),
            question,
            steps: StepSequence::new(),
            behaviour: None,
            observer: Arc::new(NullObserver),
            registry,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_max_mark(mut self, max_mark: f64) -> Self {
        self.fields.max_mark = max_mark;
        self
    }

    pub fn set_observer(&mut self, observer: Arc<dyn UsageObserver>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> &Arc<dyn UsageObserver> {
        &self.observer
    }

    /// Shared handle to the question definition.
    pub fn question_handle(&self) -> Arc<dyn QuestionDefinition> {
        Arc::clone(&self.question)
    }

    pub fn registry(&self) -> &Arc<BehaviourRegistry> {
        &self.registry
    }

    // Scalar setters. Slot, database id and usage id are assigned by the
    // host while it builds the usage, so they are not reported.

    pub fn set_slot(&mut self, slot: u32) {
        self.fields.slot = Some(slot);
    }

    pub fn set_database_id(&mut self, id: AttemptId) {
        self.fields.id = Some(id);
    }

    pub fn set_usage_id(&mut self, usage_id: Uuid) {
        self.fields.usage_id = usage_id;
    }

    pub fn set_flagged(&mut self, flagged: bool) {
        self.fields.flagged = flagged;
        self.observer.notify_attempt_modified(&*self);
    }

    pub fn set_question_summary(&mut self, summary: Option<String>) {
        self.fields.question_summary = summary;
        self.observer.notify_attempt_modified(&*self);
    }

    /// Change the weight of this question. Fractions are not rescaled, so
    /// marks change proportionally.
    pub fn set_max_mark(&mut self, max_mark: f64) {
        self.fields.max_mark = max_mark;
        self.observer.notify_attempt_modified(&*self);
    }

    /// Set a metadata variable on step 0.
    pub fn set_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        let first = self.steps.first_mut().ok_or(AttemptError::NotStarted)?;
        let existed = match first.metadata_var(name) {
            Some(current) if current == value => return Ok(()),
            Some(_) => true,
            None => false,
        };
        first.set_metadata_var(name, value);
        if existed {
            self.observer.notify_metadata_modified(&*self, name);
        } else {
            self.observer.notify_metadata_added(&*self, name);
        }
        Ok(())
    }

    /// Pick the variant to pass to [`QuestionAttempt::start`].
    pub fn select_variant(&self, strategy: &dyn VariantSelectionStrategy) -> u32 {
        strategy.choose_variant(
            self.question.num_variants(),
            &self.question.variants_selection_seed(),
        )
    }

    /// Reject a form submitted against an out-of-date history.
    pub fn verify_sequence_check(&self, submitted: usize) -> Result<()> {
        let expected = self.steps.sequence_check_count();
        if submitted != expected {
            return Err(AttemptError::SequenceCheckMismatch {
                expected,
                submitted,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------------

    /// Create step 0.
    ///
    /// With non-empty `data` the attempt is resumed from existing state:
    /// step 0 is marked complete and the behaviour applies it. Otherwise
    /// the behaviour initialises a fresh first step for `variant`.
    pub fn start(
        &mut self,
        spec: BehaviourSpec<'_>,
        variant: u32,
        data: SubmittedData,
        options: ActionOptions,
    ) -> Result<()> {
        if !self.steps.is_empty() {
            return Err(AttemptError::AlreadyStarted);
        }

        let behaviour = match spec {
            BehaviourSpec::Named(name) => self.question.make_behaviour(name, &self.registry)?,
            BehaviourSpec::Instance(existing) => existing.boxed_clone(),
        };
        self.fields.variant = variant;
        self.fields.min_fraction = Some(behaviour.min_fraction(self.question.as_ref()));
        self.fields.max_fraction = Some(behaviour.max_fraction(self.question.as_ref()));
        self.behaviour = Some(behaviour);

        let resumed = !data.is_empty();
        let mut first = Step::new(data, options);
        let behaviour = self.behaviour()?;
        if resumed {
            first.set_state(QuestionState::Complete);
            behaviour.apply_attempt_state(&*self, &mut first);
        } else {
            behaviour.init_first_step(&*self, &mut first, variant);
        }
        self.add_step(first);

        let (question_summary, right_answer) = {
            let behaviour = self.behaviour()?;
            (
                behaviour.question_summary(&*self),
                behaviour.right_answer_summary(&*self),
            )
        };
        self.fields.question_summary = question_summary;
        self.fields.right_answer = right_answer;

        debug!(
            question = self.question.id(),
            behaviour = %self.behaviour_name()?,
            variant,
            resumed,
            "started question attempt"
        );
        Ok(())
    }

    /// Start a new attempt that carries on from `old`.
    pub fn start_based_on(&mut self, old: &dyn AttemptView) -> Result<()> {
        let data = old.resume_data()?;
        self.start(
            BehaviourSpec::Instance(old.behaviour()?),
            old.variant(),
            data,
            ActionOptions::default(),
        )
    }

    /// Submit an action. Any pending autosave is discarded first.
    pub fn process_action(
        &mut self,
        data: SubmittedData,
        options: ActionOptions,
    ) -> Result<StepDecision> {
        self.ensure_started()?;
        self.discard_autosaved_step();

        let mut pending = PendingStep::new(data, options);
        let decision = self.behaviour()?.process_action(&*self, &mut pending)?;
        match decision {
            StepDecision::Keep => {
                let (step, summary, variant) = pending.into_parts();
                debug!(slot = ?self.fields.slot, state = %step.state(), "keeping step");
                self.add_step(step);
                if let Some(summary) = summary {
                    self.fields.response_summary = summary;
                }
                if let Some(variant) = variant {
                    self.fields.variant = variant;
                }
            }
            StepDecision::Discard => {
                debug!(slot = ?self.fields.slot, "behaviour discarded action");
            }
        }
        Ok(decision)
    }

    /// Store in-progress data without committing it.
    ///
    /// Returns `true` if the behaviour kept the autosave. A kept autosave
    /// replaces any earlier one.
    pub fn process_autosave(&mut self, data: SubmittedData, options: ActionOptions) -> Result<bool> {
        self.ensure_started()?;
        let mut pending = PendingStep::new(data, options);
        let decision = self.behaviour()?.process_autosave(&*self, &mut pending)?;
        if decision == StepDecision::Discard {
            return Ok(false);
        }
        let (step, _, _) = pending.into_parts();
        self.add_autosaved_step(step);
        Ok(true)
    }

    /// Commit any pending autosave, then tell the behaviour to finish.
    pub fn finish(&mut self, options: ActionOptions) -> Result<StepDecision> {
        self.ensure_started()?;
        self.convert_autosaved_step_to_real_step();
        self.process_action(
            SubmittedData::new().with_behaviour(FINISH_VAR, "1"),
            options,
        )
    }

    /// Record a grader's comment and, optionally, a mark out of the current
    /// max mark.
    pub fn manual_grade(
        &mut self,
        comment: &str,
        mark: Option<f64>,
        format: CommentFormat,
        options: ActionOptions,
    ) -> Result<StepDecision> {
        let mut data = SubmittedData::new()
            .with_behaviour(COMMENT_VAR, comment)
            .with_behaviour(COMMENT_FORMAT_VAR, format.code().to_string());
        if let Some(mark) = mark {
            data = data
                .with_behaviour(MARK_VAR, mark.to_string())
                .with_behaviour(MAX_MARK_VAR, self.fields.max_mark.to_string());
        }
        self.process_action(data, options)
    }

    /// Rebuild this (unstarted) attempt by replaying every step of `old`.
    ///
    /// Each replayed step keeps its timestamp, user and persisted id, and the
    /// old step is reported as deleted. A trailing autosave is replayed as an
    /// autosave. With `force_finish`, an attempt that did not end finished is
    /// finished afterwards.
    pub fn regrade(&mut self, old: &dyn AttemptView, force_finish: bool) -> Result<()> {
        let behaviour = old.behaviour()?;
        let autosave_index = old.has_autosaved_step().then(|| old.num_steps() - 1);

        for (index, step) in old.step_iter() {
            self.observer.notify_step_deleted(step, &*self);
            let options = ActionOptions {
                timestamp: Some(step.timecreated()),
                user_id: step.user_id(),
                existing_step_id: step.id(),
            };

            if index == 0 {
                self.start(
                    BehaviourSpec::Instance(behaviour),
                    old.variant(),
                    step.all_data(),
                    options,
                )?;
            } else if autosave_index == Some(index) {
                self.process_autosave(step.submitted_data(), options)?;
            } else if step.has_behaviour_var(FINISH_VAR) && step.submitted_data().len() > 1 {
                // Legacy steps can hold a response and finish together.
                // Replay them as a save followed by a finish.
                let mut data = step.submitted_data();
                data.behaviour.remove(FINISH_VAR);
                self.process_action(data, options)?;
                self.finish(ActionOptions {
                    existing_step_id: None,
                    ..options
                })?;
            } else {
                self.process_action(step.submitted_data(), options)?;
            }
        }

        if force_finish && !self.state().is_finished() {
            self.finish(ActionOptions::default())?;
        }
        self.set_flagged(old.is_flagged());
        debug!(steps = self.num_steps(), "regraded question attempt");
        Ok(())
    }

    /// Replay this attempt into a fresh one with the same identity.
    pub fn regrade_copy(&self, new_max_mark: Option<f64>, force_finish: bool) -> Result<QuestionAttempt> {
        let mut fresh = QuestionAttempt::new(
            Arc::clone(&self.question),
            self.fields.usage_id,
            Arc::clone(&self.registry),
        )
        .with_observer(Arc::clone(&self.observer))
        .with_max_mark(new_max_mark.unwrap_or(self.fields.max_mark));
        fresh.fields.id = self.fields.id;
        fresh.fields.slot = self.fields.slot;
        fresh.regrade(self, force_finish)?;
        Ok(fresh)
    }

    /// A read-only view of the history up to and including step `lastseq`.
    pub fn at_step(&self, lastseq: usize) -> Result<RestrictedHistory<'_>> {
        RestrictedHistory::new(self, lastseq)
    }

    // ---------------------------------------------------------------------
    // Autosave handling
    // ---------------------------------------------------------------------

    /// Drop a pending autosave, if there is one.
    pub fn discard_autosaved_step(&mut self) {
        if let Some(step) = self.steps.discard_autosave() {
            self.observer.notify_step_deleted(&step, &*self);
        }
    }

    /// Turn a pending autosave into a committed step where it stands.
    pub fn convert_autosaved_step_to_real_step(&mut self) {
        if let Some(index) = self.steps.promote_autosave() {
            if let Ok(step) = self.steps.get(index) {
                self.observer.notify_step_modified(step, &*self, index);
            }
        }
    }

    fn add_step(&mut self, step: Step) {
        if let Some(discarded) = self.steps.append(step) {
            self.observer.notify_step_deleted(&discarded, &*self);
        }
        let index = self.steps.len() - 1;
        if let Ok(step) = self.steps.get(index) {
            self.observer.notify_step_added(step, &*self, index as i64);
        }
    }

    fn add_autosaved_step(&mut self, step: Step) {
        if let Some(replaced) = self.steps.append_autosaved(step) {
            self.observer.notify_step_deleted(&replaced, &*self);
        }
        let index = self.steps.len() - 1;
        if let Ok(step) = self.steps.get(index) {
            self.observer.notify_step_added(step, &*self, -(index as i64));
        }
    }

    fn ensure_started(&self) -> Result<()> {
        if self.steps.is_empty() || self.behaviour.is_none() {
            return Err(AttemptError::NotStarted);
        }
        Ok(())
    }
}

impl AttemptView for QuestionAttempt {
    fn fields(&self) -> &AttemptFields {
        &self.fields
    }

    fn steps(&self) -> &StepSequence {
        &self.steps
    }

    fn question(&self) -> &dyn QuestionDefinition {
        self.question.as_ref()
    }

    fn behaviour(&self) -> Result<&dyn Behaviour> {
        self.behaviour.as_deref().ok_or(AttemptError::NotStarted)
    }

    fn full_qa(&self) -> &QuestionAttempt {
        self
    }

    fn as_view(&self) -> &dyn AttemptView {
        self
    }
}

impl fmt::Debug for QuestionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionAttempt")
            .field("fields", &self.fields)
            .field("question", &self.question.id())
            .field("behaviour", &self.behaviour.as_ref().map(|b| b.name()))
            .field("steps", &self.steps.len())
            .finish()
    }
}
