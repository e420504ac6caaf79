//! Manually graded: finishing only records whether an answer was given.
//! A grader assigns the mark afterwards.

use stepwise_core::traits::{process_comment, COMMENT_VAR, FINISH_VAR};
use stepwise_core::{
    AttemptView, Behaviour, DisplayOptions, PendingStep, QuestionState, Result, StepDecision,
};

use super::{check_comment_file_access, process_save};

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualGraded;

impl ManualGraded {
    pub const NAME: &'static str = "manualgraded";

    fn process_finish(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let response = qa.last_qt_data();
        let question = qa.question();
        let state = if question.is_complete_response(&response) {
            QuestionState::NeedsGrading
        } else {
            QuestionState::GaveUp
        };
        pending.set_state(state);
        pending.set_new_response_summary(question.summarise_response(&response));
        StepDecision::Keep
    }
}

impl Behaviour for ManualGraded {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn boxed_clone(&self) -> Box<dyn Behaviour> {
        Box::new(*self)
    }

    fn process_action(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        if pending.has_behaviour_var(COMMENT_VAR) {
            process_comment(qa, pending)
        } else if pending.has_behaviour_var(FINISH_VAR) {
            Ok(self.process_finish(qa, pending))
        } else {
            Ok(process_save(qa, pending))
        }
    }

    fn process_autosave(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        Ok(process_save(qa, pending))
    }

    fn check_file_access(
        &self,
        qa: &dyn AttemptView,
        options: &DisplayOptions,
        component: &str,
        filearea: &str,
    ) -> bool {
        check_comment_file_access(qa, options, component, filearea)
    }
}
