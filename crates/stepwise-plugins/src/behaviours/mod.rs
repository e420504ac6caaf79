//! Built-in question behaviours.

pub mod deferredfeedback;
pub mod immediatecbm;
pub mod immediatefeedback;
pub mod informationitem;
pub mod manualgraded;

use stepwise_core::traits::DisplayOptions;
use stepwise_core::{AttemptView, BehaviourRegistry, PendingStep, QuestionState, StepDecision};

pub use deferredfeedback::DeferredFeedback;
pub use immediatecbm::ImmediateCbm;
pub use immediatefeedback::ImmediateFeedback;
pub use informationitem::InformationItem;
pub use manualgraded::ManualGraded;

/// Names of every built-in behaviour, in registration order.
pub const BUILTIN_BEHAVIOURS: [&str; 5] = [
    DeferredFeedback::NAME,
    ImmediateFeedback::NAME,
    ImmediateCbm::NAME,
    ManualGraded::NAME,
    InformationItem::NAME,
];

/// Register every built-in behaviour not listed in `disabled`.
pub fn register_builtins(registry: &mut BehaviourRegistry, disabled: &[String]) {
    let enabled = |name: &str| !disabled.iter().any(|d| d == name);
    if enabled(DeferredFeedback::NAME) {
        registry.register(DeferredFeedback::NAME, || Box::new(DeferredFeedback));
    }
    if enabled(ImmediateFeedback::NAME) {
        registry.register(ImmediateFeedback::NAME, || Box::new(ImmediateFeedback));
    }
    if enabled(ImmediateCbm::NAME) {
        registry.register(ImmediateCbm::NAME, || Box::new(ImmediateCbm));
    }
    if enabled(ManualGraded::NAME) {
        registry.register(ManualGraded::NAME, || Box::new(ManualGraded));
    }
    if enabled(InformationItem::NAME) {
        registry.register(InformationItem::NAME, || Box::new(InformationItem));
    }
}

/// Has the student changed their answer since the latest step?
fn is_same_response(qa: &dyn AttemptView, pending: &PendingStep) -> bool {
    qa.question()
        .is_same_response(&qa.last_qt_data(), &pending.qt_data())
}

/// Store a response without grading it.
///
/// Discarded once the attempt is finished, or when nothing changed.
pub(crate) fn process_save(qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
    if qa.state().is_finished() || is_same_response(qa, pending) {
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
    pending.set_new_response_summary(question.summarise_response(&response));
    StepDecision::Keep
}

/// Grade the latest saved response, or give up if it cannot be graded.
pub(crate) fn grade_last_response(qa: &dyn AttemptView, pending: &mut PendingStep) -> StepDecision {
    if qa.state().is_finished() {
        return StepDecision::Discard;
    }
    let response = qa.last_qt_data();
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

/// Grader comment files are visible whenever manual comments are.
pub(crate) fn check_comment_file_access(
    qa: &dyn AttemptView,
    options: &DisplayOptions,
    component: &str,
    filearea: &str,
) -> bool {
    if component == "question" && filearea == "response_bf_comment" {
        return options.manual_comment;
    }
    qa.question().check_file_access(options, component, filearea)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_behaviours_are_skipped() {
        let mut registry = BehaviourRegistry::new();
        register_builtins(&mut registry, &["immediatefeedback".to_string()]);
        assert_eq!(registry.len(), BUILTIN_BEHAVIOURS.len() - 1);
        assert!(!registry.contains("immediatefeedback"));
        assert!(registry.contains("deferredfeedback"));
    }

    #[test]
    fn builtin_names_match_behaviours() {
        let mut registry = BehaviourRegistry::new();
        register_builtins(&mut registry, &[]);
        for name in BUILTIN_BEHAVIOURS {
            assert_eq!(registry.make(name).unwrap().name(), name);
        }
    }
}
