//! Mock collaborators for testing attempts without real question types.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::registry::BehaviourRegistry;
use crate::state::QuestionState;
use crate::step::{PendingStep, Step, StepId, VarMap};
use crate::traits::{
    process_comment, Behaviour, ClassifiedParts, ClassifiedResponse, QuestionDefinition,
    QuestionId, StepDecision, UsageObserver, COMMENT_VAR, FINISH_VAR, SUBMIT_VAR,
};
use crate::view::AttemptView;

/// Response variable used by [`MockQuestion`].
pub const ANSWER_VAR: &str = "answer";

/// A question with one right answer in the `answer` variable.
#[derive(Debug, Clone)]
pub struct MockQuestion {
    id: QuestionId,
    name: String,
    right_answer: String,
    default_mark: f64,
    num_variants: u32,
    min_fraction: f64,
}

impl MockQuestion {
    pub fn new(right_answer: &str) -> Self {
        Self {
            id: 1,
            name: "Mock question".to_string(),
            right_answer: right_answer.to_string(),
            default_mark: 1.0,
            num_variants: 1,
            min_fraction: 0.0,
        }
    }

    pub fn with_id(mut self, id: QuestionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_default_mark(mut self, mark: f64) -> Self {
        self.default_mark = mark;
        self
    }

    pub fn with_variants(mut self, num_variants: u32) -> Self {
        self.num_variants = num_variants;
        self
    }

    /// Allow negative marks down to `fraction`.
    pub fn with_min_fraction(mut self, fraction: f64) -> Self {
        self.min_fraction = fraction;
        self
    }

    fn answer<'a>(&self, response: &'a VarMap) -> Option<&'a str> {
        response
            .get(ANSWER_VAR)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
    }
}

impl QuestionDefinition for MockQuestion {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "mock"
    }

    fn default_mark(&self) -> f64 {
        self.default_mark
    }

    fn num_variants(&self) -> u32 {
        self.num_variants
    }

    fn min_fraction(&self) -> f64 {
        self.min_fraction
    }

    fn is_complete_response(&self, response: &VarMap) -> bool {
        self.answer(response).is_some()
    }

    fn grade_response(&self, response: &VarMap) -> (f64, QuestionState) {
        let fraction = match self.answer(response) {
            Some(answer) if answer.eq_ignore_ascii_case(&self.right_answer) => 1.0,
            _ => 0.0,
        };
        (fraction, QuestionState::graded_state_for_fraction(fraction))
    }

    fn summarise_response(&self, response: &VarMap) -> Option<String> {
        self.answer(response).map(str::to_string)
    }

    fn question_summary(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn right_answer_summary(&self) -> Option<String> {
        Some(self.right_answer.clone())
    }

    fn correct_response(&self) -> Option<VarMap> {
        Some(VarMap::from([(
            ANSWER_VAR.to_string(),
            self.right_answer.clone(),
        )]))
    }

    fn classify_response(&self, response: &VarMap) -> ClassifiedParts {
        let classified = match self.answer(response) {
            None => ClassifiedResponse::no_response(),
            Some(answer) => {
                let (fraction, state) = self.grade_response(response);
                let class = if state.is_correct() { "right" } else { "wrong" };
                ClassifiedResponse::new(Some(class.to_string()), answer, Some(fraction))
            }
        };
        ClassifiedParts::from([(self.id.to_string(), classified)])
    }
}

/// Deferred-feedback style behaviour: save, then grade on finish.
///
/// A `submit` behaviour variable marks the step as a submitted try, which
/// is enough to exercise per-try classification.
#[derive(Debug, Clone, Default)]
pub struct MockBehaviour {
    discard_actions: bool,
}

impl MockBehaviour {
    /// A behaviour that discards every action except comments.
    pub fn discarding() -> Self {
        Self {
            discard_actions: true,
        }
    }

    fn process_save(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let response = pending.qt_data();
        let question = qa.question();
        if !pending.has_behaviour_var(SUBMIT_VAR)
            && question.is_same_response(&qa.last_qt_data(), &response)
        {
            return StepDecision::Discard;
        }
        let state = if question.is_complete_response(&response) {
            QuestionState::Complete
        } else {
            QuestionState::Todo
        };
        pending.set_state(state);
        pending.set_new_response_summary(question.summarise_response(&response));
        StepDecision::Keep
    }

    fn process_finish(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let mut response = pending.qt_data();
        if response.is_empty() {
            response = qa.last_qt_data();
        }
        let question = qa.question();
        if question.is_gradable_response(&response) {
            let (fraction, state) = question.grade_response(&response);
            pending.set_fraction(Some(fraction));
            pending.set_state(state);
        } else {
            pending.set_state(QuestionState::GaveUp);
        }
        pending.set_new_response_summary(question.summarise_response(&response));
        StepDecision::Keep
    }
}

impl Behaviour for MockBehaviour {
    fn name(&self) -> &str {
        if self.discard_actions {
            "mockdiscard"
        } else {
            "mock"
        }
    }

    fn boxed_clone(&self) -> Box<dyn Behaviour> {
        Box::new(self.clone())
    }

    fn process_action(
        &self,
        qa: &dyn AttemptView,
        pending: &mut PendingStep,
    ) -> Result<StepDecision> {
        if pending.has_behaviour_var(COMMENT_VAR) {
            return process_comment(qa, pending);
        }
        if self.discard_actions {
            return Ok(StepDecision::Discard);
        }
        if pending.has_behaviour_var(FINISH_VAR) {
            return Ok(self.process_finish(qa, pending));
        }
        Ok(self.process_save(qa, pending))
    }

    fn process_autosave(
        &self,
        qa: &dyn AttemptView,
        pending: &mut PendingStep,
    ) -> Result<StepDecision> {
        if self.discard_actions {
            return Ok(StepDecision::Discard);
        }
        Ok(self.process_save(qa, pending))
    }

    fn step_has_a_submitted_response(&self, step: &Step) -> bool {
        step.has_behaviour_var(SUBMIT_VAR)
    }
}

/// A registry holding `mock` and `mockdiscard`.
pub fn mock_registry() -> Arc<BehaviourRegistry> {
    let mut registry = BehaviourRegistry::new();
    registry
        .register("mock", || Box::new(MockBehaviour::default()))
        .register("mockdiscard", || Box::new(MockBehaviour::discarding()));
    Arc::new(registry)
}

/// A notification received by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    AttemptModified,
    StepAdded { seq: i64, state: QuestionState },
    StepModified { seq: usize },
    StepDeleted { step_id: Option<StepId> },
    MetadataAdded(String),
    MetadataModified(String),
}

/// Observer that records every notification in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, event: ObserverEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl UsageObserver for RecordingObserver {
    fn notify_attempt_modified(&self, _qa: &dyn AttemptView) {
        self.record(ObserverEvent::AttemptModified);
    }

    fn notify_step_added(&self, step: &Step, _qa: &dyn AttemptView, seq: i64) {
        self.record(ObserverEvent::StepAdded {
            seq,
            state: step.state(),
        });
    }

    fn notify_step_modified(&self, _step: &Step, _qa: &dyn AttemptView, seq: usize) {
        self.record(ObserverEvent::StepModified { seq });
    }

    fn notify_step_deleted(&self, step: &Step, _qa: &dyn AttemptView) {
        self.record(ObserverEvent::StepDeleted { step_id: step.id() });
    }

    fn notify_metadata_added(&self, _qa: &dyn AttemptView, name: &str) {
        self.record(ObserverEvent::MetadataAdded(name.to_string()));
    }

    fn notify_metadata_modified(&self, _qa: &dyn AttemptView, name: &str) {
        self.record(ObserverEvent::MetadataModified(name.to_string()));
    }
}
