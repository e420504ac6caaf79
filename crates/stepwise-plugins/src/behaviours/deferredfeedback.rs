//! Deferred feedback: the student saves answers, and everything is graded
//! when the attempt is finished.

use stepwise_core::traits::{process_comment, COMMENT_VAR, FINISH_VAR};
use stepwise_core::{AttemptView, Behaviour, DisplayOptions, PendingStep, Result, StepDecision};

use super::{check_comment_file_access, grade_last_response, process_save};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredFeedback;

impl DeferredFeedback {
    pub const NAME: &'static str = "deferredfeedback";
}

impl Behaviour for DeferredFeedback {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stepwise_core::{ActionOptions, QuestionState, SubmittedData, WhichTries};

    use super::*;
    use crate::behaviours::testing::attempt;
    use crate::qtypes::shortanswer::{ShortAnswer, ShortAnswerOption, ANSWER_VAR};

    fn capital_question() -> Arc<ShortAnswer> {
        Arc::new(
            ShortAnswer::new(1, "Capital", "What is the capital of France?")
                .with_answer(ShortAnswerOption::new("Paris", 1.0))
                .with_answer(ShortAnswerOption::new("Lyon", 0.5)),
        )
    }

    fn save(value: &str) -> SubmittedData {
        SubmittedData::new().with_qt(ANSWER_VAR, value)
    }

    #[test]
    fn saves_then_grades_on_finish() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();

        assert_eq!(qa.process_action(save("Lyon"), none).unwrap(), StepDecision::Keep);
        assert_eq!(qa.state(), QuestionState::Complete);
        assert_eq!(qa.fraction(), None);

        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::GradedPartial);
        assert_eq!(qa.fraction(), Some(0.5));
        assert_eq!(qa.response_summary(), Some("Lyon"));
    }

    #[test]
    fn unchanged_response_is_discarded() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();
        qa.process_action(save("Paris"), none).unwrap();
        assert_eq!(
            qa.process_action(save("Paris"), none).unwrap(),
            StepDecision::Discard
        );
        assert_eq!(qa.num_steps(), 2);
    }

    #[test]
    fn finishing_blank_gives_up() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();
        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::GaveUp);
        assert_eq!(qa.fraction(), None);

        // Finished attempts ignore saves and a second finish.
        assert_eq!(
            qa.process_action(save("Paris"), none).unwrap(),
            StepDecision::Discard
        );
        assert_eq!(qa.finish(none).unwrap(), StepDecision::Discard);
        assert_eq!(qa.num_steps(), 2);
    }

    #[test]
    fn finish_commits_pending_autosave_and_grades_it() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();
        qa.process_action(save("Lyon"), none).unwrap();
        assert!(qa.process_autosave(save("paris"), none).unwrap());
        assert!(!qa.process_autosave(save("paris"), none).unwrap());

        qa.finish(none).unwrap();
        assert_eq!(qa.num_steps(), 4);
        assert_eq!(qa.state(), QuestionState::GradedRight);
    }

    #[test]
    fn last_saved_response_is_the_only_try() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();
        qa.process_action(save("Lyon"), none).unwrap();
        qa.process_action(save("Paris"), none).unwrap();
        qa.finish(none).unwrap();

        assert_eq!(qa.steps_with_submitted_response().unwrap().len(), 1);
        let classified = qa.classify_response(WhichTries::AllTries).unwrap();
        match classified {
            stepwise_core::ClassifiedResponses::PerTry(tries) => {
                assert_eq!(tries.len(), 1);
                assert_eq!(tries[&1]["1"].response, "Paris");
            }
            other => panic!("expected per-try classification, got {other:?}"),
        }
    }

    #[test]
    fn comment_overrides_automatic_grade() {
        let mut qa = attempt(capital_question());
        let none = ActionOptions::default();
        qa.start(DeferredFeedback::NAME.into(), 1, SubmittedData::new(), none)
            .unwrap();
        qa.process_action(save("Lyon"), none).unwrap();
        qa.finish(none).unwrap();
        qa.manual_grade("Accepting it", Some(1.0), Default::default(), none)
            .unwrap();
        assert_eq!(qa.state(), QuestionState::MangrRight);
        assert_eq!(
            qa.summarise_action(qa.last_step().unwrap()).unwrap(),
            "Manually graded 1 with maximum mark 1, Commented: Accepting it"
        );
    }

    #[test]
    fn comment_files_follow_display_options() {
        let mut qa = attempt(capital_question());
        qa.start(
            DeferredFeedback::NAME.into(),
            1,
            SubmittedData::new(),
            ActionOptions::default(),
        )
        .unwrap();
        let hidden = DisplayOptions {
            manual_comment: false,
            ..DisplayOptions::default()
        };
        assert!(qa
            .check_file_access(&DisplayOptions::default(), "question", "response_bf_comment")
            .unwrap());
        assert!(!qa
            .check_file_access(&hidden, "question", "response_bf_comment")
            .unwrap());
    }
}
