//! Immediate feedback with certainty-based marking.
//!
//! Every response carries a `certainty` of 1, 2 or 3. A graded fraction is
//! scaled by the certainty, so confident right answers earn up to three
//! times the mark and confident wrong ones cost up to six times it.

use stepwise_core::traits::{
    default_summarise_action, process_comment, COMMENT_VAR, FINISH_VAR, SUBMIT_VAR,
};
use stepwise_core::{
    AttemptView, Behaviour, DisplayOptions, PendingStep, QuestionDefinition, QuestionState,
    Result, Step, StepDecision, VarMap,
};

use super::{check_comment_file_access, is_same_response};

/// Behaviour variable holding the student's certainty.
pub const CERTAINTY_VAR: &str = "certainty";

/// The unscaled fraction, kept on every graded step.
pub const RAW_FRACTION_VAR: &str = "_rawfraction";

/// How sure the student is of their answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Certainty {
    Low,
    Medium,
    High,
}

impl Certainty {
    /// Used when finishing a response that never had a certainty.
    pub const DEFAULT: Certainty = Certainty::Low;

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Certainty::Low),
            "2" => Some(Certainty::Medium),
            "3" => Some(Certainty::High),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Certainty::Low => "1",
            Certainty::Medium => "2",
            Certainty::High => "3",
        }
    }

    fn right_score(self) -> f64 {
        match self {
            Certainty::Low => 1.0,
            Certainty::Medium => 2.0,
            Certainty::High => 3.0,
        }
    }

    fn wrong_score(self) -> f64 {
        match self {
            Certainty::Low => 0.0,
            Certainty::Medium => -2.0,
            Certainty::High => -6.0,
        }
    }

    /// Scale a raw fraction, interpolating between the wrong and right scores.
    pub fn adjust_fraction(self, fraction: f64) -> f64 {
        self.right_score() * fraction + self.wrong_score() * (1.0 - fraction)
    }

    pub fn short_string(self) -> &'static str {
        match self {
            Certainty::Low => "C=1",
            Certainty::Medium => "C=2",
            Certainty::High => "C=3",
        }
    }

    fn of(step: &Step) -> Option<Self> {
        step.behaviour_var(CERTAINTY_VAR).and_then(Self::parse)
    }
}

fn with_certainty(summary: Option<String>, certainty: Option<Certainty>) -> Option<String> {
    match (summary, certainty) {
        (Some(summary), Some(c)) => Some(format!("{summary} [{}]", c.short_string())),
        (summary, _) => summary,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateCbm;

impl ImmediateCbm {
    pub const NAME: &'static str = "immediatecbm";

    /// Grade `response` at `certainty` into the pending step.
    fn grade(
        question: &dyn QuestionDefinition,
        response: &VarMap,
        certainty: Certainty,
        pending: &mut PendingStep,
    ) {
        let (fraction, state) = question.grade_response(response);
        pending.set_fraction(Some(certainty.adjust_fraction(fraction)));
        pending.set_state(state);
        pending.set_behaviour_var(RAW_FRACTION_VAR, fraction.to_string());
        pending.set_new_response_summary(with_certainty(
            question.summarise_response(response),
            Some(certainty),
        ));
    }

    fn process_save(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let certainty = pending.behaviour_var(CERTAINTY_VAR);
        if is_same_response(qa, pending) && certainty == qa.last_behaviour_var(CERTAINTY_VAR) {
            return StepDecision::Discard;
        }
        let response = pending.qt_data();
        let question = qa.question();
        let state = if question.is_complete_response(&response) {
            QuestionState::Complete
        } else {
            QuestionState::Todo
        };
        pending.set_state(state);
        pending.set_new_response_summary(with_certainty(
            question.summarise_response(&response),
            Certainty::of(pending),
        ));
        StepDecision::Keep
    }

    fn process_submit(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let response = pending.qt_data();
        let question = qa.question();
        match Certainty::of(pending) {
            Some(certainty) if question.is_gradable_response(&response) => {
                Self::grade(question, &response, certainty, pending);
            }
            _ => {
                pending.set_state(QuestionState::Invalid);
                pending.set_new_response_summary(question.summarise_response(&response));
            }
        }
        StepDecision::Keep
    }

    fn process_finish(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
        if qa.state().is_finished() {
            return StepDecision::Discard;
        }
        let response = qa.last_qt_data();
        let question = qa.question();
        if !question.is_gradable_response(&response) {
            pending.set_state(QuestionState::GaveUp);
            pending.set_new_response_summary(question.summarise_response(&response));
            return StepDecision::Keep;
        }
        let certainty = qa
            .last_step()
            .and_then(Certainty::of)
            .unwrap_or(Certainty::DEFAULT);
        Self::grade(question, &response, certainty, pending);
        StepDecision::Keep
    }
}

impl Behaviour for ImmediateCbm {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn boxed_clone(&self) -> Box<dyn Behaviour> {
        Box::new(*self)
    }

    fn min_fraction(&self, question: &dyn QuestionDefinition) -> f64 {
        Certainty::High.adjust_fraction(question.min_fraction())
    }

    fn max_fraction(&self, question: &dyn QuestionDefinition) -> f64 {
        Certainty::High.adjust_fraction(question.max_fraction())
    }

    fn process_action(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        if pending.has_behaviour_var(COMMENT_VAR) {
            process_comment(qa, pending)
        } else if pending.has_behaviour_var(FINISH_VAR) {
            Ok(self.process_finish(qa, pending))
        } else if pending.has_behaviour_var(SUBMIT_VAR) {
            Ok(self.process_submit(qa, pending))
        } else {
            Ok(self.process_save(qa, pending))
        }
    }

    fn process_autosave(&self, qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
        Ok(self.process_save(qa, pending))
    }

    fn step_has_a_submitted_response(&self, step: &Step) -> bool {
        step.has_behaviour_var(SUBMIT_VAR) && step.state() != QuestionState::Invalid
    }

    fn right_answer_summary(&self, qa: &dyn AttemptView) -> Option<String> {
        with_certainty(qa.question().right_answer_summary(), Some(Certainty::High))
    }

    fn correct_response(&self, _qa: &dyn AttemptView) -> VarMap {
        VarMap::from([
            (SUBMIT_VAR.to_string(), "1".to_string()),
            (CERTAINTY_VAR.to_string(), Certainty::High.code().to_string()),
        ])
    }

    fn summarise_action(&self, qa: &dyn AttemptView, step: &Step) -> String {
        if !step.has_behaviour_var(SUBMIT_VAR) {
            return default_summarise_action(qa, step);
        }
        let summary = qa.question().summarise_response(&step.qt_data());
        match with_certainty(summary, Certainty::of(step)) {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stepwise_core::{ActionOptions, ManualMarkError, SubmittedData};

    use super::*;
    use crate::behaviours::testing::attempt;
    use crate::qtypes::shortanswer::{ShortAnswer, ShortAnswerOption, ANSWER_VAR};

    fn started() -> stepwise_core::QuestionAttempt {
        let question = Arc::new(
            ShortAnswer::new(6, "Amphibian", "Name an amphibian.")
                .with_answer(ShortAnswerOption::new("frog", 1.0))
                .with_answer(ShortAnswerOption::new("newt", 0.25)),
        );
        let mut qa = attempt(question);
        qa.start(
            ImmediateCbm::NAME.into(),
            1,
            SubmittedData::new(),
            ActionOptions::default(),
        )
        .unwrap();
        qa
    }

    fn save(value: &str, certainty: &str) -> SubmittedData {
        SubmittedData::new()
            .with_qt(ANSWER_VAR, value)
            .with_behaviour(CERTAINTY_VAR, certainty)
    }

    fn submit(value: &str, certainty: &str) -> SubmittedData {
        save(value, certainty).with_behaviour(SUBMIT_VAR, "1")
    }

    #[test]
    fn certainty_scales_the_fraction() {
        assert_eq!(Certainty::Low.adjust_fraction(1.0), 1.0);
        assert_eq!(Certainty::Low.adjust_fraction(0.0), 0.0);
        assert_eq!(Certainty::Medium.adjust_fraction(0.0), -2.0);
        assert_eq!(Certainty::High.adjust_fraction(1.0), 3.0);
        assert_eq!(Certainty::High.adjust_fraction(0.0), -6.0);
        assert_eq!(Certainty::Medium.adjust_fraction(0.25), -1.0);
        assert_eq!(Certainty::parse(" 2 "), Some(Certainty::Medium));
        assert_eq!(Certainty::parse("4"), None);
    }

    #[test]
    fn right_answer_at_medium_certainty_scores_double() {
        let mut qa = started();
        let none = ActionOptions::default();
        assert_eq!(qa.right_answer_summary(), Some("frog [C=3]"));

        qa.process_action(save("toad", "1"), none).unwrap();
        assert_eq!(qa.state(), QuestionState::Complete);
        assert_eq!(qa.mark(), None);

        qa.process_action(submit("frog", "2"), none).unwrap();
        assert_eq!(qa.state(), QuestionState::GradedRight);
        assert_eq!(qa.mark(), Some(2.0));
        assert_eq!(qa.response_summary(), Some("frog [C=2]"));
        assert_eq!(
            qa.last_step().unwrap().behaviour_var(RAW_FRACTION_VAR),
            Some("1")
        );
        assert_eq!(
            qa.summarise_action(qa.last_step().unwrap()).unwrap(),
            "Submit: frog [C=2]"
        );

        // Finishing after a graded submit adds nothing.
        let steps = qa.num_steps();
        assert_eq!(qa.finish(none).unwrap(), StepDecision::Discard);
        assert_eq!(qa.num_steps(), steps);
    }

    #[test]
    fn changing_only_the_certainty_is_a_new_save() {
        let mut qa = started();
        let none = ActionOptions::default();
        assert_eq!(qa.process_action(save("frog", "1"), none).unwrap(), StepDecision::Keep);
        assert_eq!(qa.process_action(save("frog", "1"), none).unwrap(), StepDecision::Discard);
        assert_eq!(qa.process_action(save("frog", "3"), none).unwrap(), StepDecision::Keep);
    }

    #[test]
    fn submit_without_certainty_is_invalid() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.process_action(
            SubmittedData::new()
                .with_qt(ANSWER_VAR, "frog")
                .with_behaviour(SUBMIT_VAR, "1"),
            none,
        )
        .unwrap();
        assert_eq!(qa.state(), QuestionState::Invalid);
        assert_eq!(qa.mark(), None);

        qa.process_action(submit("frog", "3"), none).unwrap();
        assert_eq!(qa.state(), QuestionState::GradedRight);
        assert_eq!(qa.mark(), Some(3.0));
        assert_eq!(qa.steps_with_submitted_response().unwrap().len(), 1);
    }

    #[test]
    fn confident_wrong_answer_costs_six_and_widens_the_mark_range() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.process_action(save("lizard", "3"), none).unwrap();
        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::GradedWrong);
        assert_eq!(qa.mark(), Some(-6.0));

        assert_eq!(qa.min_fraction().unwrap(), -6.0);
        assert_eq!(qa.max_fraction().unwrap(), 3.0);
        assert_eq!(qa.validate_manual_mark("-4"), Ok(Some(-4.0)));
        assert_eq!(qa.validate_manual_mark("2.5"), Ok(Some(2.5)));
        assert_eq!(
            qa.validate_manual_mark("-7"),
            Err(ManualMarkError::OutOfRange { min: -6.0, max: 3.0 })
        );

        qa.manual_grade("Reptile, not amphibian", Some(-2.0), Default::default(), none)
            .unwrap();
        assert_eq!(qa.state(), QuestionState::MangrWrong);
        assert_eq!(qa.mark(), Some(-2.0));
    }

    #[test]
    fn partial_answer_finished_without_certainty_uses_low() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.process_action(SubmittedData::new().with_qt(ANSWER_VAR, "newt"), none)
            .unwrap();
        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::GradedPartial);
        assert_eq!(qa.mark(), Some(0.25));
        assert_eq!(qa.response_summary(), Some("newt [C=1]"));
    }

    #[test]
    fn blank_submit_then_finish_gives_up() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.process_action(SubmittedData::new().with_behaviour(SUBMIT_VAR, "1"), none)
            .unwrap();
        assert_eq!(qa.state(), QuestionState::Invalid);

        qa.finish(none).unwrap();
        assert_eq!(qa.state(), QuestionState::GaveUp);
        assert_eq!(qa.mark(), None);

        qa.manual_grade("Not good enough!", Some(0.5), Default::default(), none)
            .unwrap();
        assert_eq!(qa.state(), QuestionState::MangrPartial);
        assert_eq!(qa.mark(), Some(0.5));
    }

    #[test]
    fn regrade_keeps_the_scaled_mark() {
        let mut qa = started();
        let none = ActionOptions::default();
        qa.process_action(submit("newt", "2"), none).unwrap();
        assert_eq!(qa.mark(), Some(-1.0));

        let regraded = qa.regrade_copy(None, false).unwrap();
        assert_eq!(regraded.state(), QuestionState::GradedPartial);
        assert_eq!(regraded.mark(), Some(-1.0));
    }

    #[test]
    fn correct_response_is_submitted_with_high_certainty() {
        let qa = started();
        let correct = qa.correct_response().unwrap().unwrap();
        assert_eq!(correct.qt.get(ANSWER_VAR).map(String::as_str), Some("frog"));
        assert_eq!(correct.behaviour.get(CERTAINTY_VAR).map(String::as_str), Some("3"));
        assert_eq!(correct.behaviour.get(SUBMIT_VAR).map(String::as_str), Some("1"));
    }
}
