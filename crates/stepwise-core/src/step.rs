//! Steps: one recorded state transition of a question attempt.
//!
//! A step carries three independent variable channels (question-type,
//! behaviour and metadata), each a plain `String -> String` map. Names that
//! start with `_` are internal: cached by the question type or behaviour
//! rather than submitted by the student.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::QuestionState;

/// Persisted row id of a step.
pub type StepId = i64;

/// Id of the acting principal.
pub type UserId = i64;

/// One channel of step variables.
pub type VarMap = BTreeMap<String, String>;

/// Prefix marking internal variables.
pub const INTERNAL_VAR_PREFIX: char = '_';

/// Returns `true` if `name` is an internal (non-submitted) variable.
pub fn is_internal_var(name: &str) -> bool {
    name.starts_with(INTERNAL_VAR_PREFIX)
}

/// A file attached to a response variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Directory within the response file area, e.g. "/".
    pub filepath: String,
    pub filename: String,
    /// Hash of the file contents, supplied by the file store.
    pub content_hash: String,
    pub size: u64,
}

/// Files waiting to be attached to a new step.
///
/// The step records [`FileSaver::token`] as the value of the variable, so two
/// identical uploads compare equal as responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSaver {
    pub files: Vec<StoredFile>,
}

impl FileSaver {
    pub fn new(files: Vec<StoredFile>) -> Self {
        Self { files }
    }

    /// A stable value summarising the files, stored as the variable value.
    pub fn token(&self) -> String {
        let mut parts: Vec<String> = self
            .files
            .iter()
            .map(|f| format!("{}{}:{}", f.filepath, f.filename, f.content_hash))
            .collect();
        parts.sort();
        parts.join("|")
    }
}

/// Read access to files already attached to a committed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoader {
    /// The step the files belong to.
    pub step_id: Option<StepId>,
    pub files: Vec<StoredFile>,
}

impl FileLoader {
    /// Turn the loaded files into something that can be attached to a new step.
    pub fn to_saver(&self) -> FileSaver {
        FileSaver::new(self.files.clone())
    }
}

/// The data submitted for one action, split by channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmittedData {
    #[serde(default)]
    pub qt: VarMap,
    #[serde(default)]
    pub behaviour: VarMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: VarMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileSaver>,
}

impl SubmittedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_qt(mut self, name: &str, value: impl Into<String>) -> Self {
        self.qt.insert(name.to_string(), value.into());
        self
    }

    pub fn with_behaviour(mut self, name: &str, value: impl Into<String>) -> Self {
        self.behaviour.insert(name.to_string(), value.into());
        self
    }

    pub fn with_metadata(mut self, name: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(name.to_string(), value.into());
        self
    }

    pub fn with_files(mut self, name: &str, saver: FileSaver) -> Self {
        self.files.insert(name.to_string(), saver);
        self
    }

    /// Total number of variables across all channels.
    pub fn len(&self) -> usize {
        self.qt.len() + self.behaviour.len() + self.metadata.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Data a behaviour hands back so a new attempt can resume from this one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeData {
    pub qt: VarMap,
    pub behaviour: VarMap,
    pub metadata: VarMap,
    pub files: BTreeMap<String, FileLoader>,
}

impl ResumeData {
    /// Convert file loaders into savers so the data can start a new attempt.
    pub fn into_submitted(self) -> SubmittedData {
        let files = self
            .files
            .iter()
            .map(|(name, loader)| (name.clone(), loader.to_saver()))
            .collect();
        SubmittedData {
            qt: self.qt,
            behaviour: self.behaviour,
            metadata: self.metadata,
            files,
        }
    }
}

/// Timestamp, principal and superseded-row id for a new step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionOptions {
    /// When the action happened. Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    /// Who performed the action.
    pub user_id: Option<UserId>,
    /// Persisted id of the step this one replaces (used by regrade).
    pub existing_step_id: Option<StepId>,
}

impl ActionOptions {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn replacing(mut self, step_id: Option<StepId>) -> Self {
        self.existing_step_id = step_id;
        self
    }
}

/// One state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    id: Option<StepId>,
    state: QuestionState,
    fraction: Option<f64>,
    timecreated: DateTime<Utc>,
    user_id: Option<UserId>,
    qt_vars: VarMap,
    behaviour_vars: VarMap,
    metadata_vars: VarMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    qt_files: BTreeMap<String, Vec<StoredFile>>,
}

impl Step {
    /// Build a new unprocessed step from submitted data.
    pub fn new(data: SubmittedData, options: ActionOptions) -> Self {
        let mut qt_vars = data.qt;
        let mut qt_files = BTreeMap::new();
        for (name, saver) in data.files {
            qt_vars.insert(name.clone(), saver.token());
            qt_files.insert(name, saver.files);
        }
        Self {
            id: options.existing_step_id,
            state: QuestionState::Unprocessed,
            fraction: None,
            timecreated: options.timestamp.unwrap_or_else(Utc::now),
            user_id: options.user_id,
            qt_vars,
            behaviour_vars: data.behaviour,
            metadata_vars: data.metadata,
            qt_files,
        }
    }

    /// Rebuild a step from persisted values.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Option<StepId>,
        state: QuestionState,
        fraction: Option<f64>,
        timecreated: DateTime<Utc>,
        user_id: Option<UserId>,
        qt_vars: VarMap,
        behaviour_vars: VarMap,
        metadata_vars: VarMap,
        qt_files: BTreeMap<String, Vec<StoredFile>>,
    ) -> Self {
        Self {
            id,
            state,
            fraction,
            timecreated,
            user_id,
            qt_vars,
            behaviour_vars,
            metadata_vars,
            qt_files,
        }
    }

    pub fn id(&self) -> Option<StepId> {
        self.id
    }

    pub fn state(&self) -> QuestionState {
        self.state
    }

    pub fn fraction(&self) -> Option<f64> {
        self.fraction
    }

    pub fn timecreated(&self) -> DateTime<Utc> {
        self.timecreated
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn set_state(&mut self, state: QuestionState) {
        self.state = state;
    }

    pub fn set_fraction(&mut self, fraction: Option<f64>) {
        self.fraction = fraction;
    }

    pub fn set_id(&mut self, id: Option<StepId>) {
        self.id = id;
    }

    // Question-type variables.

    pub fn has_qt_var(&self, name: &str) -> bool {
        self.qt_vars.contains_key(name)
    }

    pub fn qt_var(&self, name: &str) -> Option<&str> {
        self.qt_vars.get(name).map(String::as_str)
    }

    pub fn set_qt_var(&mut self, name: &str, value: impl Into<String>) {
        self.qt_vars.insert(name.to_string(), value.into());
    }

    /// Submitted (non-internal) question-type variables.
    pub fn qt_data(&self) -> VarMap {
        self.qt_vars
            .iter()
            .filter(|(name, _)| !is_internal_var(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Every question-type variable, internal ones included.
    pub fn all_qt_vars(&self) -> &VarMap {
        &self.qt_vars
    }

    /// Files attached to a question-type variable.
    pub fn qt_files(&self, name: &str) -> &[StoredFile] {
        self.qt_files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_qt_files(&mut self, name: &str, saver: FileSaver) {
        self.qt_vars.insert(name.to_string(), saver.token());
        self.qt_files.insert(name.to_string(), saver.files);
    }

    /// Names of question-type variables that carry files.
    pub fn qt_file_vars(&self) -> impl Iterator<Item = &str> {
        self.qt_files.keys().map(String::as_str)
    }

    // Behaviour variables.

    pub fn has_behaviour_var(&self, name: &str) -> bool {
        self.behaviour_vars.contains_key(name)
    }

    pub fn behaviour_var(&self, name: &str) -> Option<&str> {
        self.behaviour_vars.get(name).map(String::as_str)
    }

    pub fn set_behaviour_var(&mut self, name: &str, value: impl Into<String>) {
        self.behaviour_vars.insert(name.to_string(), value.into());
    }

    /// Submitted (non-internal) behaviour variables.
    pub fn behaviour_data(&self) -> VarMap {
        self.behaviour_vars
            .iter()
            .filter(|(name, _)| !is_internal_var(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn all_behaviour_vars(&self) -> &VarMap {
        &self.behaviour_vars
    }

    // Metadata variables. Only step 0 carries them, and only the attempt may
    // change them once the step is committed.

    pub fn has_metadata_var(&self, name: &str) -> bool {
        self.metadata_vars.contains_key(name)
    }

    pub fn metadata_var(&self, name: &str) -> Option<&str> {
        self.metadata_vars.get(name).map(String::as_str)
    }

    pub fn metadata_vars(&self) -> &VarMap {
        &self.metadata_vars
    }

    pub(crate) fn set_metadata_var(&mut self, name: &str, value: impl Into<String>) {
        self.metadata_vars.insert(name.to_string(), value.into());
    }

    /// The data that was submitted to create this step, without internal vars.
    pub fn submitted_data(&self) -> SubmittedData {
        let files = self.submitted_files(|name| !is_internal_var(name));
        let mut qt = self.qt_data();
        for name in files.keys() {
            qt.remove(name);
        }
        SubmittedData {
            qt,
            behaviour: self.behaviour_data(),
            metadata: VarMap::new(),
            files,
        }
    }

    /// Everything stored in this step, internal variables and metadata included.
    pub fn all_data(&self) -> SubmittedData {
        let files = self.submitted_files(|_| true);
        let mut qt = self.qt_vars.clone();
        for name in files.keys() {
            qt.remove(name);
        }
        SubmittedData {
            qt,
            behaviour: self.behaviour_vars.clone(),
            metadata: self.metadata_vars.clone(),
            files,
        }
    }

    fn submitted_files(&self, keep: impl Fn(&str) -> bool) -> BTreeMap<String, FileSaver> {
        self.qt_files
            .iter()
            .filter(|(name, _)| keep(name))
            .map(|(name, files)| (name.clone(), FileSaver::new(files.clone())))
            .collect()
    }
}

/// A step under construction while a behaviour decides whether to keep it.
///
/// Besides the step itself, a behaviour can report that the response summary
/// or the variant number changed as a side effect of the action.
#[derive(Debug, Clone)]
pub struct PendingStep {
    step: Step,
    new_response_summary: Option<Option<String>>,
    new_variant: Option<u32>,
}

impl PendingStep {
    pub fn new(data: SubmittedData, options: ActionOptions) -> Self {
        Self {
            step: Step::new(data, options),
            new_response_summary: None,
            new_variant: None,
        }
    }

    pub fn set_new_response_summary(&mut self, summary: Option<String>) {
        self.new_response_summary = Some(summary);
    }

    pub fn response_summary_changed(&self) -> bool {
        self.new_response_summary.is_some()
    }

    pub fn new_response_summary(&self) -> Option<&str> {
        self.new_response_summary.as_ref().and_then(|s| s.as_deref())
    }

    pub fn set_new_variant(&mut self, variant: u32) {
        self.new_variant = Some(variant);
    }

    pub fn new_variant(&self) -> Option<u32> {
        self.new_variant
    }

    /// Split into the finished step and the side effects the behaviour recorded.
    pub(crate) fn into_parts(self) -> (Step, Option<Option<String>>, Option<u32>) {
        (self.step, self.new_response_summary, self.new_variant)
    }
}

impl Deref for PendingStep {
    type Target = Step;

    fn deref(&self) -> &Step {
        &self.step
    }
}

impl DerefMut for PendingStep {
    fn deref_mut(&mut self) -> &mut Step {
        &mut self.step
    }
}
