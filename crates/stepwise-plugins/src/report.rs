//! Replay report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core::{AttemptView, ClassifiedResponses, QuestionState, UserId, WhichTries};
use uuid::Uuid;

use crate::runner::ScriptOutcome;

/// A complete replay report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub script: String,
    pub question: QuestionInfo,
    /// The history the report describes.
    pub attempt: AttemptSummary,
    /// The regraded copy, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regraded: Option<AttemptSummary>,
}

/// Summary of the question (without its definition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInfo {
    pub id: i64,
    pub name: String,
    pub type_name: String,
    pub summary: Option<String>,
    pub right_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub behaviour: String,
    pub state: QuestionState,
    /// State as shown to a grader.
    pub status: String,
    pub mark: String,
    pub max_mark: String,
    pub response: Option<String>,
    /// Last step shown, when the report is of an earlier point in history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_step: Option<usize>,
    pub steps: Vec<StepRow>,
    /// Every try, classified against the question's known answers.
    pub responses: ClassifiedResponses,
}

/// One row of the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRow {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub user: Option<UserId>,
    pub action: String,
    pub state: QuestionState,
    pub mark: String,
    pub autosaved: bool,
}

impl AttemptSummary {
    /// Summarise any view of an attempt.
    pub fn from_view(qa: &dyn AttemptView, dp: usize) -> Result<Self> {
        let autosave = qa.has_autosaved_step().then(|| qa.num_steps() - 1);
        let steps = qa
            .step_iter()
            .map(|(index, step)| {
                Ok(StepRow {
                    index,
                    time: step.timecreated(),
                    user: step.user_id(),
                    action: qa.summarise_action(step)?,
                    state: step.state(),
                    mark: qa.format_fraction_as_mark(step.fraction(), dp),
                    autosaved: autosave == Some(index),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            behaviour: qa.behaviour_name()?.to_string(),
            state: qa.state(),
            status: qa.state_string(true)?,
            mark: qa.format_mark(dp),
            max_mark: qa.format_max_mark(dp),
            response: qa.response_summary().map(str::to_string),
            at_step: None,
            steps,
            responses: qa.classify_response(WhichTries::AllTries)?,
        })
    }
}

impl AttemptReport {
    /// Build a report from a script run, optionally cut off at `at_step`.
    pub fn from_outcome(outcome: &ScriptOutcome, at_step: Option<usize>, dp: usize) -> Result<Self> {
        let qa = &outcome.attempt;
        let attempt = match at_step {
            Some(lastseq) => {
                let view = qa
                    .at_step(lastseq)
                    .with_context(|| format!("cannot show the attempt at step {lastseq}"))?;
                AttemptSummary {
                    at_step: Some(lastseq),
                    ..AttemptSummary::from_view(&view, dp)?
                }
            }
            None => AttemptSummary::from_view(qa, dp)?,
        };
        let regraded = outcome
            .regraded
            .as_ref()
            .map(|r| AttemptSummary::from_view(r, dp))
            .transpose()?;

        let question = qa.question();
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            script: outcome.script.clone(),
            question: QuestionInfo {
                id: question.id(),
                name: question.name().to_string(),
                type_name: question.type_name().to_string(),
                summary: qa.question_summary().map(str::to_string),
                right_answer: qa.right_answer_summary().map(str::to_string),
            },
            attempt,
            regraded,
        })
    }

    /// Did the regrade change the outcome?
    pub fn regrade_changed(&self) -> bool {
        self.regraded
            .as_ref()
            .is_some_and(|r| r.state != self.attempt.state || r.mark != self.attempt.mark)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AttemptReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::{create_registry, StepwiseConfig};
    use crate::parser::parse_script_str;
    use crate::runner::{run_script, RunOptions};

    const SCRIPT: &str = r#"
[question]
type = "shortanswer"
id = 8
name = "Frog"
text = "Name an amphibian."
default_mark = 3.0

[[question.answers]]
answer = "frog"
fraction = 1.0

[[question.answers]]
answer = "toad"
fraction = 0.5

[[actions]]
kind = "save"
qt = { answer = "toad" }

[[actions]]
kind = "finish"

[[actions]]
kind = "comment"
comment = "Close enough"
mark = 3.0
"#;

    fn outcome(regrade: bool) -> ScriptOutcome {
        let script = parse_script_str(SCRIPT, &PathBuf::from("frog.toml")).unwrap();
        let config = StepwiseConfig::default();
        let options = RunOptions {
            regrade,
            ..RunOptions::default()
        };
        run_script(&script, create_registry(&config).unwrap(), &config, options).unwrap()
    }

    #[test]
    fn report_rows_follow_history() {
        let report = AttemptReport::from_outcome(&outcome(false), None, 2).unwrap();
        assert_eq!(report.question.type_name, "shortanswer");
        assert_eq!(report.question.right_answer.as_deref(), Some("frog"));
        assert_eq!(report.attempt.steps.len(), 4);
        assert_eq!(report.attempt.state, QuestionState::MangrRight);
        assert_eq!(report.attempt.mark, "3.00");
        assert_eq!(report.attempt.max_mark, "3.00");
        assert_eq!(report.attempt.steps[1].action, "Saved: toad");
        assert_eq!(report.attempt.steps[2].mark, "1.50");
        assert_eq!(report.attempt.steps[0].mark, "");
        match &report.attempt.responses {
            ClassifiedResponses::PerTry(tries) => {
                assert_eq!(tries.len(), 1);
                let parts = &tries[&1];
                let toad = parts.values().next().unwrap();
                assert_eq!(toad.response, "toad");
                assert_eq!(toad.response_class_id.as_deref(), Some("2"));
                assert_eq!(toad.fraction, Some(0.5));
            }
            other => panic!("expected one entry per try, got {other:?}"),
        }
        assert!(!report.regrade_changed());
    }

    #[test]
    fn report_at_earlier_step() {
        let report = AttemptReport::from_outcome(&outcome(false), Some(2), 1).unwrap();
        assert_eq!(report.attempt.at_step, Some(2));
        assert_eq!(report.attempt.steps.len(), 3);
        assert_eq!(report.attempt.state, QuestionState::GradedPartial);
        assert_eq!(report.attempt.mark, "1.5");

        assert!(AttemptReport::from_outcome(&outcome(false), Some(9), 1).is_err());
    }

    #[test]
    fn json_roundtrip() {
        let report = AttemptReport::from_outcome(&outcome(true), None, 2).unwrap();
        assert!(report.regraded.is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("frog.json");
        report.save_json(&path).unwrap();
        let loaded = AttemptReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.attempt.steps.len(), report.attempt.steps.len());
        assert_eq!(loaded.attempt.state, report.attempt.state);
    }
}
