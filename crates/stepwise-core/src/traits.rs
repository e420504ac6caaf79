//! Core trait definitions for behaviours, question definitions and usage
//! observers.
//!
//! Concrete behaviours and question types live in `stepwise-plugins`. The
//! attempt hands itself to every callback as a read-only [`AttemptView`], so
//! behaviours never hold a back-reference to the attempt they drive.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AttemptError, Result};
use crate::marks::parse_mark;
use crate::registry::BehaviourRegistry;
use crate::sequence::StepsWithSubmittedResponse;
use crate::state::QuestionState;
use crate::step::{FileLoader, PendingStep, ResumeData, Step, VarMap};
use crate::view::AttemptView;

/// Id of a question definition in the question bank.
pub type QuestionId = i64;

/// Behaviour variable that ends the attempt.
pub const FINISH_VAR: &str = "finish";
/// Behaviour variable that submits a response for immediate grading.
pub const SUBMIT_VAR: &str = "submit";
/// Behaviour variables written by manual grading.
pub const COMMENT_VAR: &str = "comment";
pub const COMMENT_FORMAT_VAR: &str = "commentformat";
pub const MARK_VAR: &str = "mark";
pub const MAX_MARK_VAR: &str = "maxmark";

/// Fraction bounds are checked with this much slack.
const FRACTION_SLACK: f64 = 0.0000005;

// ---------------------------------------------------------------------------
// Small shared types
// ---------------------------------------------------------------------------

/// What a behaviour decided to do with a pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepDecision {
    /// Append the pending step to the history.
    Keep,
    /// Drop the pending step; nothing changes.
    Discard,
}

impl StepDecision {
    pub fn is_keep(self) -> bool {
        self == StepDecision::Keep
    }
}

/// Which submitted responses to classify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhichTries {
    FirstTry,
    #[default]
    LastTry,
    AllTries,
}

/// One part of a response, classified for statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResponse {
    /// Identifies which of the question's known answers this matched.
    pub response_class_id: Option<String>,
    /// The response as the student gave it.
    pub response: String,
    pub fraction: Option<f64>,
}

impl ClassifiedResponse {
    pub fn new(response_class_id: Option<String>, response: impl Into<String>, fraction: Option<f64>) -> Self {
        Self {
            response_class_id,
            response: response.into(),
            fraction,
        }
    }

    /// The "no response" classification.
    pub fn no_response() -> Self {
        Self::new(None, "[No response]", None)
    }
}

/// Classified parts keyed by sub-part id.
pub type ClassifiedParts = BTreeMap<String, ClassifiedResponse>;

/// Result of [`AttemptView::classify_response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifiedResponses {
    /// First or last try only.
    Single(ClassifiedParts),
    /// Every try, keyed by try number (from 1).
    PerTry(BTreeMap<usize, ClassifiedParts>),
}

/// What the viewer of an attempt is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub correctness: bool,
    pub marks: bool,
    pub feedback: bool,
    pub manual_comment: bool,
    pub history: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            correctness: true,
            marks: true,
            feedback: true,
            manual_comment: true,
            history: false,
        }
    }
}

/// Text format of a grader's comment, with its persisted code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentFormat {
    Moodle = 0,
    #[default]
    Html = 1,
    Plain = 2,
    Markdown = 4,
}

impl CommentFormat {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CommentFormat::Moodle),
            1 => Some(CommentFormat::Html),
            2 => Some(CommentFormat::Plain),
            4 => Some(CommentFormat::Markdown),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour trait
// ---------------------------------------------------------------------------

/// A policy deciding how a question attempt moves between states.
///
/// Behaviours are stateless: everything they need comes from the attempt
/// view they are handed. [`Behaviour::boxed_clone`] lets a regrade or a
/// restricted view carry over the same behaviour instance.
pub trait Behaviour: Send + Sync + fmt::Debug {
    /// Registry name (e.g. "deferredfeedback").
    fn name(&self) -> &str;

    fn boxed_clone(&self) -> Box<dyn Behaviour>;

    fn min_fraction(&self, question: &dyn QuestionDefinition) -> f64 {
        question.min_fraction()
    }

    fn max_fraction(&self, question: &dyn QuestionDefinition) -> f64 {
        question.max_fraction()
    }

    /// Initialise step 0 of a fresh attempt.
    fn init_first_step(&self, qa: &dyn AttemptView, step: &mut Step, variant: u32) {
        qa.question().start_attempt(step, variant);
        step.set_state(QuestionState::Todo);
    }

    /// Re-initialise from a step 0 that was created from existing data.
    fn apply_attempt_state(&self, qa: &dyn AttemptView, step: &mut Step) {
        qa.question().apply_attempt_state(step);
    }

    /// Decide what a submitted action does.
    fn process_action(&self, qa: &dyn AttemptView, pending: &mut PendingStep)
        -> Result<StepDecision>;

    /// Decide whether an autosave is worth keeping.
    fn process_autosave(
        &self,
        _qa: &dyn AttemptView,
        _pending: &mut PendingStep,
    ) -> Result<StepDecision> {
        Ok(StepDecision::Discard)
    }

    /// Data that lets a new attempt pick up where this one left off.
    fn resume_data(&self, qa: &dyn AttemptView) -> Result<ResumeData> {
        let mut data = default_resume_data(qa)?;
        data.behaviour.extend(self.own_resume_data(qa));
        Ok(data)
    }

    /// Extra behaviour variables carried into a resumed attempt.
    fn own_resume_data(&self, _qa: &dyn AttemptView) -> VarMap {
        VarMap::new()
    }

    /// Did this step submit a response (as opposed to just saving one)?
    fn step_has_a_submitted_response(&self, _step: &Step) -> bool {
        false
    }

    fn classify_response(
        &self,
        qa: &dyn AttemptView,
        which: WhichTries,
    ) -> Result<ClassifiedResponses> {
        default_classify_response(qa, self, which)
    }

    fn check_file_access(
        &self,
        qa: &dyn AttemptView,
        options: &DisplayOptions,
        component: &str,
        filearea: &str,
    ) -> bool {
        qa.question().check_file_access(options, component, filearea)
    }

    fn question_summary(&self, qa: &dyn AttemptView) -> Option<String> {
        qa.question().question_summary()
    }

    fn right_answer_summary(&self, qa: &dyn AttemptView) -> Option<String> {
        qa.question().right_answer_summary()
    }

    /// Behaviour variables that go with the question's correct response.
    fn correct_response(&self, _qa: &dyn AttemptView) -> VarMap {
        VarMap::new()
    }

    fn state_string(&self, qa: &dyn AttemptView, show_correctness: bool) -> String {
        qa.state().default_string(show_correctness).to_string()
    }

    /// One-line description of what a step did, for history tables.
    fn summarise_action(&self, qa: &dyn AttemptView, step: &Step) -> String {
        default_summarise_action(qa, step)
    }

    /// May the student end the attempt from this question alone?
    fn can_finish_during_attempt(&self, _qa: &dyn AttemptView) -> bool {
        false
    }
}

impl Clone for Box<dyn Behaviour> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Step 0's data, overlaid with the latest response and its files.
pub fn default_resume_data(qa: &dyn AttemptView) -> Result<ResumeData> {
    let first = qa.step(0)?;
    let mut data = ResumeData {
        qt: first.all_qt_vars().clone(),
        behaviour: first.all_behaviour_vars().clone(),
        metadata: first.metadata_vars().clone(),
        files: BTreeMap::new(),
    };
    for name in first.qt_file_vars() {
        data.qt.remove(name);
        data.files.insert(
            name.to_string(),
            FileLoader {
                step_id: first.id(),
                files: first.qt_files(name).to_vec(),
            },
        );
    }

    let latest = qa
        .reverse_step_iter()
        .map(|(_, step)| step)
        .find(|step| !step.qt_data().is_empty());
    if let Some(latest) = latest {
        for (name, value) in latest.qt_data() {
            if latest.qt_file_vars().any(|v| v == name) {
                data.qt.remove(&name);
                let files = latest.qt_files(&name).to_vec();
                data.files.insert(
                    name,
                    FileLoader {
                        step_id: latest.id(),
                        files,
                    },
                );
            } else {
                data.files.remove(&name);
                data.qt.insert(name, value);
            }
        }
    }
    Ok(data)
}

fn default_classify_response<B: Behaviour + ?Sized>(
    qa: &dyn AttemptView,
    behaviour: &B,
    which: WhichTries,
) -> Result<ClassifiedResponses> {
    let tries = StepsWithSubmittedResponse::find(qa.steps(), |step| {
        behaviour.step_has_a_submitted_response(step)
    });
    let question = qa.question();
    let classify = |step: &Step| question.classify_response(&step.qt_data());

    let picked = match which {
        WhichTries::AllTries => {
            let per_try = tries
                .iter()
                .map(|(try_no, step)| (try_no, classify(step)))
                .collect();
            return Ok(ClassifiedResponses::PerTry(per_try));
        }
        WhichTries::FirstTry => tries.get(1),
        WhichTries::LastTry => tries.get(tries.len()),
    };
    Ok(ClassifiedResponses::Single(
        picked.map(classify).unwrap_or_default(),
    ))
}

/// Generic history line: what was submitted, or a comment or a finish.
pub fn default_summarise_action(qa: &dyn AttemptView, step: &Step) -> String {
    if step.has_behaviour_var(COMMENT_VAR) {
        return summarise_manual_comment(step);
    }
    if step.has_behaviour_var(FINISH_VAR) {
        return "Attempt finished".to_string();
    }
    let response = step.qt_data();
    if response.is_empty() {
        return "Started".to_string();
    }
    match qa.question().summarise_response(&response) {
        Some(summary) => format!("Saved: {summary}"),
        None => "Saved".to_string(),
    }
}

/// History line for a manual grading step.
pub fn summarise_manual_comment(step: &Step) -> String {
    let comment = step
        .behaviour_var(COMMENT_VAR)
        .filter(|c| !c.is_empty())
        .map(|c| format!("Commented: {c}"));
    let mark = step
        .behaviour_var(MARK_VAR)
        .filter(|m| !m.is_empty())
        .map(|m| match step.behaviour_var(MAX_MARK_VAR) {
            Some(max) => format!("Manually graded {m} with maximum mark {max}"),
            None => format!("Manually graded {m}"),
        });
    match (mark, comment) {
        (Some(mark), Some(comment)) => format!("{mark}, {comment}"),
        (Some(mark), None) => mark,
        (None, Some(comment)) => comment,
        (None, None) => "Commented".to_string(),
    }
}

/// Shared handling of a grader's comment and mark.
///
/// Only finished attempts may be commented on. An entered mark is turned
/// into a fraction of the stored maximum mark and must lie within the
/// attempt's fraction bounds; a blank mark keeps the previous fraction.
pub fn process_comment(qa: &dyn AttemptView, pending: &mut PendingStep) -> Result<StepDecision> {
    let last = qa.last_step().ok_or(AttemptError::NotStarted)?;
    if !last.state().is_finished() {
        return Err(AttemptError::InvalidAction(
            "cannot manually grade a question that is not finished".to_string(),
        ));
    }

    let entered = pending
        .behaviour_var(MARK_VAR)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let fraction = match entered {
        None => last.fraction(),
        Some(raw) => {
            let mark = parse_mark(&raw)
                .ok_or_else(|| AttemptError::InvalidAction(format!("invalid mark '{raw}'")))?;
            let max_mark = pending
                .behaviour_var(MAX_MARK_VAR)
                .and_then(parse_mark)
                .unwrap_or_else(|| qa.max_mark());
            if max_mark <= 0.0 {
                return Err(AttemptError::InvalidAction(
                    "cannot grade a question with a maximum mark of zero".to_string(),
                ));
            }
            let fraction = mark / max_mark;
            if fraction > qa.max_fraction()? + FRACTION_SLACK
                || fraction < qa.min_fraction()? - FRACTION_SLACK
            {
                return Err(AttemptError::InvalidAction(format!(
                    "score {fraction} out of range when processing a manual grading action"
                )));
            }
            Some(fraction)
        }
    };

    let state = last
        .state()
        .corresponding_commented_state(fraction)
        .ok_or_else(|| {
            AttemptError::InvalidAction(format!("cannot comment on state {}", last.state()))
        })?;
    pending.set_fraction(fraction);
    pending.set_state(state);
    Ok(StepDecision::Keep)
}

// ---------------------------------------------------------------------------
// Question definition trait
// ---------------------------------------------------------------------------

/// The question being attempted.
pub trait QuestionDefinition: Send + Sync + fmt::Debug {
    fn id(&self) -> QuestionId;

    fn name(&self) -> &str;

    /// Question type name (e.g. "shortanswer").
    fn type_name(&self) -> &str;

    fn default_mark(&self) -> f64;

    fn num_variants(&self) -> u32 {
        1
    }

    /// Questions sharing a seed get the same variant in the same attempt.
    fn variants_selection_seed(&self) -> String {
        self.id().to_string()
    }

    fn min_fraction(&self) -> f64 {
        0.0
    }

    fn max_fraction(&self) -> f64 {
        1.0
    }

    /// Build the behaviour for an attempt. Question types that only work
    /// with one behaviour override this to ignore `preferred`.
    fn make_behaviour(
        &self,
        preferred: &str,
        registry: &BehaviourRegistry,
    ) -> Result<Box<dyn Behaviour>> {
        registry.make(preferred)
    }

    /// Store any randomisation (e.g. choice order) in step 0.
    fn start_attempt(&self, _step: &mut Step, _variant: u32) {}

    /// Restore state cached in step 0.
    fn apply_attempt_state(&self, _step: &Step) {}

    fn is_complete_response(&self, response: &VarMap) -> bool;

    fn is_gradable_response(&self, response: &VarMap) -> bool {
        self.is_complete_response(response)
    }

    fn is_same_response(&self, previous: &VarMap, new: &VarMap) -> bool {
        previous == new
    }

    /// Fraction and graded state for a response.
    fn grade_response(&self, response: &VarMap) -> (f64, QuestionState);

    fn summarise_response(&self, response: &VarMap) -> Option<String>;

    fn question_summary(&self) -> Option<String>;

    fn right_answer_summary(&self) -> Option<String> {
        None
    }

    /// A response that would get full marks, if there is one.
    fn correct_response(&self) -> Option<VarMap> {
        None
    }

    fn classify_response(&self, _response: &VarMap) -> ClassifiedParts {
        ClassifiedParts::new()
    }

    fn check_file_access(&self, _options: &DisplayOptions, _component: &str, _filearea: &str) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Usage observer trait
// ---------------------------------------------------------------------------

/// Receives change notifications so a host can persist attempts lazily.
///
/// `seq` in [`UsageObserver::notify_step_added`] is the step's index, negated
/// for an autosaved step.
pub trait UsageObserver: Send + Sync {
    fn notify_attempt_modified(&self, qa: &dyn AttemptView);

    fn notify_step_added(&self, step: &Step, qa: &dyn AttemptView, seq: i64);

    fn notify_step_modified(&self, step: &Step, qa: &dyn AttemptView, seq: usize);

    fn notify_step_deleted(&self, step: &Step, qa: &dyn AttemptView);

    fn notify_metadata_added(&self, qa: &dyn AttemptView, name: &str);

    fn notify_metadata_modified(&self, qa: &dyn AttemptView, name: &str);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl UsageObserver for NullObserver {
    fn notify_attempt_modified(&self, _qa: &dyn AttemptView) {}
    fn notify_step_added(&self, _step: &Step, _qa: &dyn AttemptView, _seq: i64) {}
    fn notify_step_modified(&self, _step: &Step, _qa: &dyn AttemptView, _seq: usize) {}
    fn notify_step_deleted(&self, _step: &Step, _qa: &dyn AttemptView) {}
    fn notify_metadata_added(&self, _qa: &dyn AttemptView, _name: &str) {}
    fn notify_metadata_modified(&self, _qa: &dyn AttemptView, _name: &str) {}
}

// ---------------------------------------------------------------------------
// Question bank and variant selection
// ---------------------------------------------------------------------------

/// Looks up question definitions when attempts are loaded from records.
pub trait QuestionBank {
    fn load_question(&self, id: QuestionId) -> Result<Arc<dyn QuestionDefinition>>;
}

impl QuestionBank for BTreeMap<QuestionId, Arc<dyn QuestionDefinition>> {
    fn load_question(&self, id: QuestionId) -> Result<Arc<dyn QuestionDefinition>> {
        self.get(&id)
            .cloned()
            .ok_or(AttemptError::QuestionNotFound(id))
    }
}

/// Chooses which variant of a question an attempt uses.
pub trait VariantSelectionStrategy {
    /// Returns a variant in `1..=num_variants`.
    fn choose_variant(&self, num_variants: u32, seed: &str) -> u32;
}

/// Always the same variant, clamped to the question's range.
#[derive(Debug, Clone, Copy)]
pub struct FixedVariant(pub u32);

impl VariantSelectionStrategy for FixedVariant {
    fn choose_variant(&self, num_variants: u32, _seed: &str) -> u32 {
        self.0.clamp(1, num_variants.max(1))
    }
}

/// Cycles through variants by attempt number, offset by the seed so
/// different questions do not all start on variant 1.
#[derive(Debug, Clone, Copy)]
pub struct RotatingVariant {
    pub attempt_number: u32,
}

impl VariantSelectionStrategy for RotatingVariant {
    fn choose_variant(&self, num_variants: u32, seed: &str) -> u32 {
        if num_variants <= 1 {
            return 1;
        }
        let offset = seed.bytes().map(u32::from).fold(0u32, u32::wrapping_add);
        let index = self
            .attempt_number
            .saturating_sub(1)
            .wrapping_add(offset)
            % num_variants;
        index + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_variant_is_clamped() {
        assert_eq!(FixedVariant(3).choose_variant(5, "q1"), 3);
        assert_eq!(FixedVariant(9).choose_variant(5, "q1"), 5);
        assert_eq!(FixedVariant(0).choose_variant(5, "q1"), 1);
        assert_eq!(FixedVariant(2).choose_variant(0, "q1"), 1);
    }

    #[test]
    fn rotating_variant_cycles() {
        let picks: Vec<u32> = (1..=6)
            .map(|n| RotatingVariant { attempt_number: n }.choose_variant(3, "seed"))
            .collect();
        assert!(picks.iter().all(|v| (1..=3).contains(v)));
        assert_eq!(picks[0], picks[3]);
        assert_ne!(picks[0], picks[1]);
        assert_eq!(RotatingVariant { attempt_number: 4 }.choose_variant(1, "x"), 1);
    }

    #[test]
    fn comment_format_codes() {
        for format in [
            CommentFormat::Moodle,
            CommentFormat::Html,
            CommentFormat::Plain,
            CommentFormat::Markdown,
        ] {
            assert_eq!(CommentFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(CommentFormat::from_code(3), None);
    }

    #[test]
    fn manual_comment_summary() {
        use crate::step::{ActionOptions, SubmittedData};
        let step = Step::new(
            SubmittedData::new()
                .with_behaviour(COMMENT_VAR, "Good work")
                .with_behaviour(MARK_VAR, "1.5")
                .with_behaviour(MAX_MARK_VAR, "2"),
            ActionOptions::default(),
        );
        assert_eq!(
            summarise_manual_comment(&step),
            "Manually graded 1.5 with maximum mark 2, Commented: Good work"
        );
    }
}
