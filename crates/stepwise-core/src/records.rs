//! Persisted row shape and reconstruction of attempts from it.
//!
//! Rows arrive grouped by attempt, one per step. A negative sequence number
//! marks an autosaved step; its absolute value is the position it would
//! take in the committed history.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attempt::{AttemptId, QuestionAttempt};
use crate::error::{AttemptError, Result};
use crate::registry::BehaviourRegistry;
use crate::state::QuestionState;
use crate::step::{Step, StepId, StoredFile, UserId, VarMap};
use crate::traits::{QuestionBank, QuestionDefinition, QuestionId, UsageObserver};
use crate::view::AttemptView;

/// One persisted row: the attempt's columns plus, normally, one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptStepRecord {
    pub question_attempt_id: AttemptId,
    pub question_usage_id: Uuid,
    #[serde(default)]
    pub slot: Option<u32>,
    pub behaviour: String,
    pub question_id: QuestionId,
    pub variant: u32,
    pub max_mark: f64,
    pub min_fraction: f64,
    pub max_fraction: f64,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub question_summary: Option<String>,
    #[serde(default)]
    pub right_answer: Option<String>,
    #[serde(default)]
    pub response_summary: Option<String>,
    /// `None` for an attempt that has no steps yet.
    #[serde(default)]
    pub step: Option<StepRecord>,
}

/// The step columns of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub attempt_step_id: Option<StepId>,
    pub sequence_number: i64,
    pub state: QuestionState,
    #[serde(default)]
    pub fraction: Option<f64>,
    pub timecreated: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub qt_vars: VarMap,
    #[serde(default)]
    pub behaviour_vars: VarMap,
    #[serde(default)]
    pub metadata_vars: VarMap,
    #[serde(default)]
    pub qt_files: BTreeMap<String, Vec<StoredFile>>,
}

impl StepRecord {
    fn from_step(step: &Step, sequence_number: i64) -> Self {
        let qt_files = step
            .qt_file_vars()
            .map(|name| (name.to_string(), step.qt_files(name).to_vec()))
            .collect();
        Self {
            attempt_step_id: step.id(),
            sequence_number,
            state: step.state(),
            fraction: step.fraction(),
            timecreated: step.timecreated(),
            user_id: step.user_id(),
            qt_vars: step.all_qt_vars().clone(),
            behaviour_vars: step.all_behaviour_vars().clone(),
            metadata_vars: step.metadata_vars().clone(),
            qt_files,
        }
    }

    fn into_step(self) -> Step {
        Step::from_parts(
            self.attempt_step_id,
            self.state,
            self.fraction,
            self.timecreated,
            self.user_id,
            self.qt_vars,
            self.behaviour_vars,
            self.metadata_vars,
            self.qt_files,
        )
    }
}

/// Stand-in for a question that can no longer be loaded.
///
/// Keeps the attempt's mark so grades stay visible, but accepts nothing.
#[derive(Debug, Clone)]
pub struct MissingQuestion {
    id: QuestionId,
    default_mark: f64,
}

impl MissingQuestion {
    pub fn new(id: QuestionId, default_mark: f64) -> Self {
        Self { id, default_mark }
    }
}

impl QuestionDefinition for MissingQuestion {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn name(&self) -> &str {
        "Missing question"
    }

    fn type_name(&self) -> &str {
        "missingtype"
    }

    fn default_mark(&self) -> f64 {
        self.default_mark
    }

    fn is_complete_response(&self, _response: &VarMap) -> bool {
        false
    }

    fn is_gradable_response(&self, _response: &VarMap) -> bool {
        false
    }

    fn grade_response(&self, _response: &VarMap) -> (f64, QuestionState) {
        (0.0, QuestionState::GradedWrong)
    }

    fn summarise_response(&self, _response: &VarMap) -> Option<String> {
        None
    }

    fn question_summary(&self) -> Option<String> {
        Some("This question is missing. Unable to display anything.".to_string())
    }
}

/// Rebuild attempt `question_attempt_id` from a stream of rows.
///
/// Rows for other attempts before it are skipped; the rows of this attempt
/// are consumed and the stream is left at the first row after them. If the
/// question cannot be loaded a [`MissingQuestion`] with the stored max mark
/// is used instead. Only one autosave is kept, and only if it is not behind
/// the committed history; other autosave rows are reported to the observer
/// as deleted.
pub fn load_from_records<I>(
    records: &mut Peekable<I>,
    question_attempt_id: AttemptId,
    observer: Arc<dyn UsageObserver>,
    registry: Arc<BehaviourRegistry>,
    bank: &dyn QuestionBank,
) -> Result<QuestionAttempt>
where
    I: Iterator<Item = AttemptStepRecord>,
{
    while records
        .next_if(|r| r.question_attempt_id != question_attempt_id)
        .is_some()
    {}
    let header = records
        .peek()
        .ok_or(AttemptError::AttemptNotFound(question_attempt_id))?;

    let question: Arc<dyn QuestionDefinition> = match bank.load_question(header.question_id) {
        Ok(question) => question,
        Err(e) => {
            warn!(
                question_attempt_id,
                question_id = header.question_id,
                error = %e,
                "question could not be loaded, using a placeholder"
            );
            Arc::new(MissingQuestion::new(header.question_id, header.max_mark))
        }
    };
    let behaviour = registry.make(&header.behaviour)?;

    let mut qa = QuestionAttempt::new(question, header.question_usage_id, registry)
        .with_observer(observer)
        .with_max_mark(header.max_mark);
    qa.fields.id = Some(question_attempt_id);
    qa.fields.slot = header.slot;
    qa.fields.variant = header.variant;
    qa.fields.min_fraction = Some(header.min_fraction);
    qa.fields.max_fraction = Some(header.max_fraction);
    qa.fields.flagged = header.flagged;
    qa.fields.question_summary = header.question_summary.clone();
    qa.fields.right_answer = header.right_answer.clone();
    qa.fields.response_summary = header.response_summary.clone();
    qa.behaviour = Some(behaviour);

    let mut autosaved: Option<(Step, usize)> = None;
    while let Some(record) = records.next_if(|r| r.question_attempt_id == question_attempt_id) {
        let Some(step_record) = record.step else {
            continue;
        };
        let sequence_number = step_record.sequence_number;
        let step = step_record.into_step();
        if sequence_number < 0 {
            if autosaved.is_none() {
                autosaved = Some((step, sequence_number.unsigned_abs() as usize));
            } else {
                debug!(question_attempt_id, sequence_number, "dropping extra autosave row");
                qa.observer.notify_step_deleted(&step, &qa);
            }
        } else {
            if qa.steps.is_empty() {
                qa.question.apply_attempt_state(&step);
            }
            qa.steps.append(step);
        }
    }

    if let Some((step, position)) = autosaved {
        if !qa.steps.is_empty() && position >= qa.steps.len() {
            qa.steps.append_autosaved(step);
        } else {
            warn!(
                question_attempt_id,
                position, "autosave is behind the committed history, dropping it"
            );
            qa.observer.notify_step_deleted(&step, &qa);
        }
    }

    Ok(qa)
}

impl QuestionAttempt {
    /// The rows [`load_from_records`] reads back into this attempt.
    ///
    /// An unsaved attempt is written with id 0.
    pub fn to_records(&self) -> Vec<AttemptStepRecord> {
        let header = |step: Option<StepRecord>| AttemptStepRecord {
            question_attempt_id: self.database_id().unwrap_or_default(),
            question_usage_id: self.usage_id(),
            slot: self.slot(),
            behaviour: self
                .behaviour_name()
                .map(str::to_string)
                .unwrap_or_default(),
            question_id: self.question().id(),
            variant: self.variant(),
            max_mark: self.max_mark(),
            min_fraction: self.min_fraction().unwrap_or(0.0),
            max_fraction: self.max_fraction().unwrap_or(1.0),
            flagged: self.is_flagged(),
            question_summary: self.question_summary().map(str::to_string),
            right_answer: self.right_answer_summary().map(str::to_string),
            response_summary: self.response_summary().map(str::to_string),
            step,
        };

        if self.steps.is_empty() {
            return vec![header(None)];
        }
        let autosave_index = self.has_autosaved_step().then(|| self.num_steps() - 1);
        self.step_iter()
            .map(|(index, step)| {
                let sequence_number = if autosave_index == Some(index) {
                    -(index as i64)
                } else {
                    index as i64
                };
                header(Some(StepRecord::from_step(step, sequence_number)))
            })
            .collect()
    }
}
