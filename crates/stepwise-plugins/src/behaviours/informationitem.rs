//! Information items carry no marks. Viewing them is recorded as `seen`
//! and finishing marks them done.

use stepwise_core::traits::{COMMENT_VAR, FINISH_VAR, MARK_VAR};
use stepwise_core::{
    AttemptError, AttemptView, Behaviour, DisplayOptions, PendingStep, QuestionDefinition,
    QuestionState, Result, StepDecision,
};

use super::check_comment_file_access;

/// Behaviour variable set when the student has viewed the item.
pub const SEEN_VAR: &str = "seen";

#[derive(Debug, Clone, Copy, Default)]
pub struct InformationItem;

impl InformationItem {
    pub const NAME: &'static str = "informationitem";

    fn process_seen(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        pending.set_state(QuestionState::Complete);
        StepDecision::Keep
    }

    fn process_finish(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        pending.set_state(QuestionState::Finished);
        StepDecision::Keep
    }

    fn process_comment(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        if pending
            .behaviour_var(MARK_VAR)
            .is_some_and(|m| !m.trim().is_empty())
        {
            return Err(AttemptError::InvalidAction(
                "information items cannot be graded".to_string(),
            ));
        }
        if !qa.state().is_finished() {
            return Err(AttemptError::InvalidAction(
                "cannot comment on an information item that is not finished".to_string(),
            ));
        }
        pending.set_state(QuestionState::ManFinished);
        Ok(StepDecision::Keep)
    }
}

impl Behaviour for InformationItem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn boxed_clone(&self) -> Box<dyn Behaviour> {
        Box::new(*self)
    }

    fn min_fraction(&self, _question: &dyn QuestionDefinition) -> f64 {
        0.0
    }

    fn max_fraction(&self, _question: &dyn QuestionDefinition) -> f64 {
        0.0
    }

    fn process_action(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        if pending.has_behaviour_var(COMMENT_VAR) {
            self.process_comment(qa, pending)
        } else if pending.has_behaviour_var(FINISH_VAR) {
            Ok(self.process_finish(qa, pending))
        } else if pending.has_behaviour_var(SEEN_VAR) {
            Ok(self.process_seen(qa, pending))
        } else {
            Ok(StepDecision::Discard)
        }
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stepwise_core::{ActionOptions, CommentFormat, SubmittedData};

    use super::*;
    use crate::behaviours::testing::attempt;
    use crate::qtypes::description::Description;

    fn started() -> stepwise_core::QuestionAttempt {
        let mut qa = attempt(Arc::new(Description::new(3, "Intro", "Read this first.")));
        qa.start(
            "deferredfeedback".into(),
            1,
            SubmittedData::new(),
            ActionOptions::default(),
        )
        .unwrap();
        qa
    }

    #[test]
    fn description_always_uses_information_item() {
        let qa = started();
        assert_eq!(qa.behaviour_name().unwrap(), InformationItem::NAME);
        assert_eq!(qa.max_fraction().unwrap(), 0.0);
        assert_eq!(qa.state(), QuestionState::Todo);
    }

    #[test]
    fn seen_then_finished() {
        let mut qa = started();
        let none = ActionOptions::default();
        let seen = SubmittedData::new().with_behaviour(SEEN_VAR, "1");
        assert_eq!(qa.process_action(seen.clone(), none).unwrap(), StepDecision::Keep);
        assert_eq!(qa.state(), QuestionState::Complete);

        // Anything else is ignored.
        assert_eq!(
            qa.process_action(SubmittedData::new().with_qt("answer", "x"), none)
                .unwrap(),
            StepDecision::Discard
        );

        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::Finished);
        assert_eq!(qa.process_action(seen, none).unwrap(), StepDecision::Discard);
        assert_eq!(qa.num_steps(), 3);
    }

    #[test]
    fn comment_without_mark_only() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.finish(none).unwrap();

        assert!(qa
            .manual_grade("Nice", Some(0.0), CommentFormat::Plain, none)
            .is_err());
        qa.manual_grade("Nice", None, CommentFormat::Plain, none)
            .unwrap();
        assert_eq!(qa.state(), QuestionState::ManFinished);
        assert!(qa.has_manual_comment());
    }
}
