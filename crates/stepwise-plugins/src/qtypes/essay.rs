//! Essay: free text plus optional attachments, always graded by hand.

use serde::{Deserialize, Serialize};
use stepwise_core::{
    Behaviour, BehaviourRegistry, DisplayOptions, QuestionDefinition, QuestionId, QuestionState,
    Result, VarMap,
};

use super::{default_mark, summary_of};
use crate::behaviours::ManualGraded;

/// The text response variable.
pub const TEXT_VAR: &str = "answer";
/// The attachments file variable.
pub const ATTACHMENTS_VAR: &str = "attachments";

/// Longest response summary, in characters.
const SUMMARY_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Essay {
    pub id: QuestionId,
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_mark")]
    pub default_mark: f64,
    /// Must the student type some text?
    #[serde(default = "default_response_required")]
    pub response_required: bool,
    /// Maximum attachments. Zero disables uploads.
    #[serde(default)]
    pub attachments: u32,
    #[serde(default)]
    pub attachments_required: u32,
    #[serde(default)]
    pub grader_info: String,
}

fn default_response_required() -> bool {
    true
}

impl Essay {
    pub fn new(id: QuestionId, name: &str, text: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: text.to_string(),
            default_mark: default_mark(),
            response_required: true,
            attachments: 0,
            attachments_required: 0,
            grader_info: String::new(),
        }
    }

    pub fn with_default_mark(mut self, mark: f64) -> Self {
        self.default_mark = mark;
        self
    }

    pub fn with_attachments(mut self, allowed: u32, required: u32) -> Self {
        self.attachments = allowed;
        self.attachments_required = required;
        self
    }

    pub fn text_optional(mut self) -> Self {
        self.response_required = false;
        self
    }

    fn text<'a>(&self, response: &'a VarMap) -> Option<&'a str> {
        response
            .get(TEXT_VAR)
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Number of attached files, read from the file variable's token.
    fn attachment_count(&self, response: &VarMap) -> usize {
        response
            .get(ATTACHMENTS_VAR)
            .filter(|token| !token.is_empty())
            .map_or(0, |token| token.split('|').count())
    }
}

impl QuestionDefinition for Essay {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "essay"
    }

    fn default_mark(&self) -> f64 {
        self.default_mark
    }

    fn make_behaviour(
        &self,
        _preferred: &str,
        registry: &BehaviourRegistry,
    ) -> Result<Box<dyn Behaviour>> {
        registry.make(ManualGraded::NAME)
    }

    fn is_complete_response(&self, response: &VarMap) -> bool {
        let has_text = self.text(response).is_some();
        let attached = self.attachment_count(response);
        let meets_text = has_text || !self.response_required;
        let meets_attachments = attached >= self.attachments_required as usize;
        meets_text && meets_attachments && (has_text || attached > 0)
    }

    fn is_same_response(&self, previous: &VarMap, new: &VarMap) -> bool {
        let get = |map: &VarMap, name: &str| map.get(name).cloned().unwrap_or_default();
        get(previous, TEXT_VAR) == get(new, TEXT_VAR)
            && get(previous, ATTACHMENTS_VAR) == get(new, ATTACHMENTS_VAR)
    }

    fn grade_response(&self, _response: &VarMap) -> (f64, QuestionState) {
        (0.0, QuestionState::NeedsGrading)
    }

    fn summarise_response(&self, response: &VarMap) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(text) = self.text(response) {
            let mut summary: String = text.chars().take(SUMMARY_LENGTH).collect();
            if text.chars().count() > SUMMARY_LENGTH {
                summary.push_str("...");
            }
            parts.push(summary);
        }
        match self.attachment_count(response) {
            0 => {}
            1 => parts.push("1 attachment".to_string()),
            n => parts.push(format!("{n} attachments")),
        }
        (!parts.is_empty()).then(|| parts.join("; "))
    }

    fn question_summary(&self) -> Option<String> {
        summary_of(&self.text)
    }

    fn right_answer_summary(&self) -> Option<String> {
        summary_of(&self.grader_info)
    }

    fn check_file_access(&self, _options: &DisplayOptions, component: &str, filearea: &str) -> bool {
        component == "question" && filearea == "response_attachments" && self.attachments > 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stepwise_core::{
        ActionOptions, AttemptView, FileSaver, StoredFile, SubmittedData,
    };

    use super::*;
    use crate::behaviours::testing::attempt;

    fn upload(name: &str) -> StoredFile {
        StoredFile {
            filepath: "/".to_string(),
            filename: name.to_string(),
            content_hash: format!("hash-{name}"),
            size: 10,
        }
    }

    #[test]
    fn completeness_rules() {
        let essay = Essay::new(1, "E", "Write.");
        assert!(!essay.is_complete_response(&VarMap::new()));
        assert!(!essay.is_complete_response(&VarMap::from([(
            TEXT_VAR.to_string(),
            "   ".to_string()
        )])));
        assert!(essay.is_complete_response(&VarMap::from([(
            TEXT_VAR.to_string(),
            "words".to_string()
        )])));

        let uploads = Essay::new(2, "E", "Upload.")
            .text_optional()
            .with_attachments(3, 2);
        let one = VarMap::from([(ATTACHMENTS_VAR.to_string(), "/a:1".to_string())]);
        let two = VarMap::from([(ATTACHMENTS_VAR.to_string(), "/a:1|/b:2".to_string())]);
        assert!(!uploads.is_complete_response(&one));
        assert!(uploads.is_complete_response(&two));
        assert_eq!(uploads.summarise_response(&two).as_deref(), Some("2 attachments"));
    }

    #[test]
    fn always_manually_graded() {
        let mut qa = attempt(Arc::new(Essay::new(1, "E", "Write.").with_attachments(1, 0)));
        qa.start(
            "immediatefeedback".into(),
            1,
            SubmittedData::new(),
            ActionOptions::default(),
        )
        .unwrap();
        assert_eq!(qa.behaviour_name().unwrap(), ManualGraded::NAME);
        assert!(qa
            .check_file_access(&DisplayOptions::default(), "question", "response_attachments")
            .unwrap());
    }

    #[test]
    fn attachments_are_kept_with_the_step() {
        let mut qa = attempt(Arc::new(Essay::new(1, "E", "Write.").with_attachments(2, 1)));
        let none = ActionOptions::default();
        qa.start("manualgraded".into(), 1, SubmittedData::new(), none)
            .unwrap();
        let files = FileSaver::new(vec![upload("notes.txt")]);
        qa.process_action(
            SubmittedData::new()
                .with_qt(TEXT_VAR, "See attached.")
                .with_files(ATTACHMENTS_VAR, files.clone()),
            none,
        )
        .unwrap();

        assert_eq!(qa.last_qt_files(ATTACHMENTS_VAR), files.files.as_slice());
        assert_eq!(qa.response_summary(), Some("See attached.; 1 attachment"));

        // Uploading the same file again is not a new response.
        assert!(!qa
            .process_action(
                SubmittedData::new()
                    .with_qt(TEXT_VAR, "See attached.")
                    .with_files(ATTACHMENTS_VAR, files),
                none,
            )
            .unwrap()
            .is_keep());
    }

    #[test]
    fn long_text_is_truncated_in_summary() {
        let essay = Essay::new(1, "E", "Write.");
        let long = "x".repeat(250);
        let summary = essay
            .summarise_response(&VarMap::from([(TEXT_VAR.to_string(), long)]))
            .unwrap();
        assert_eq!(summary.len(), SUMMARY_LENGTH + 3);
    }
}
