//! Immediate feedback: each `submit` grades the response on the spot and
//! ends the attempt.

use stepwise_core::traits::{
    default_summarise_action, process_comment, COMMENT_VAR, FINISH_VAR, SUBMIT_VAR,
};
use stepwise_core::{
    AttemptView, Behaviour, DisplayOptions, PendingStep, QuestionState, Result, Step,
    StepDecision, VarMap,
};

use super::{check_comment_file_access, grade_last_response, process_save};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateFeedback;

impl ImmediateFeedback {
    pub const NAME: &'static str = "immediatefeedback";

    fn process_submit(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let response = pending.qt_data();
        let question = qa.question();
        if question.is_gradable_response(&response) {
            let (fraction, state) = question.grade_response(&response);
            pending.set_fraction(Some(fraction));
            pending.set_state(state);
        } else {
            pending.set_state(QuestionState::Invalid);
        }
        pending.set_new_response_summary(question.summarise_response(&response));
        StepDecision::Keep
    }
}

impl Behaviour for ImmediateFeedback {
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
            Ok(grade_last_response(qa, pending))
        } else if pending.has_behaviour_var(SUBMIT_VAR) {
            Ok(self.process_submit(qa, pending))
        } else {
            Ok(process_save(qa, pending))
        }
    }

    fn process_autosave(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        Ok(process_save(qa, pending))
    }

    fn step_has_a_submitted_response(&self, step: &Step) -> bool {
        step.has_behaviour_var(SUBMIT_VAR) && step.state() != QuestionState::Invalid
    }

    fn correct_response(&self, _qa: &dyn AttemptView) -> VarMap {
        VarMap::from([(SUBMIT_VAR.to_string(), "1".to_string())])
    }

    fn summarise_action(&self, qa: &dyn AttemptView, step: &Step) -> String {
        if !step.has_behaviour_var(SUBMIT_VAR) {
            return default_summarise_action(qa, step);
        }
        match qa.question().summarise_response(&step.qt_data()) {
            Some(summary) => format!("Submit: {summary}"),
            None => "Submit".to_string(),
        }
    }

    fn can_finish_during_attempt(&self, qa: &dyn AttemptView) -> bool {
        qa.state().is_finished()
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
