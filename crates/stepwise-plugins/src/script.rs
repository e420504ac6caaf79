//! Attempt scripts: a question plus the sequence of actions a student and
//! grader took on it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_core::{CommentFormat, SubmittedData, UserId};

use crate::qtypes::QuestionConfig;

/// A parsed attempt script.
#[derive(Debug, Clone)]
pub struct AttemptScript {
    /// Display name, from `[attempt] name` or the file stem.
    pub name: String,
    /// File the script was read from.
    pub source: PathBuf,
    pub question: QuestionConfig,
    pub attempt: AttemptSettings,
    pub actions: Vec<ScriptAction>,
}

/// How the attempt is set up before the first action.
#[derive(Debug, Clone, Default)]
pub struct AttemptSettings {
    /// Preferred behaviour. Falls back to the configured default.
    pub behaviour: Option<String>,
    pub variant: u32,
    /// Overrides the question's default mark.
    pub max_mark: Option<f64>,
    pub slot: Option<u32>,
    /// The student.
    pub user: Option<UserId>,
    pub start: Option<DateTime<Utc>>,
    pub flagged: bool,
}

/// What an action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Save,
    Submit,
    Autosave,
    Finish,
    Comment,
    Seen,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Save => "save",
            ActionKind::Submit => "submit",
            ActionKind::Autosave => "autosave",
            ActionKind::Finish => "finish",
            ActionKind::Comment => "comment",
            ActionKind::Seen => "seen",
        }
    }

    /// Does this action carry student response data?
    pub fn takes_response(self) -> bool {
        matches!(self, ActionKind::Save | ActionKind::Submit | ActionKind::Autosave)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "save" => Ok(ActionKind::Save),
            "submit" => Ok(ActionKind::Submit),
            "autosave" => Ok(ActionKind::Autosave),
            "finish" => Ok(ActionKind::Finish),
            "comment" | "grade" => Ok(ActionKind::Comment),
            "seen" => Ok(ActionKind::Seen),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone)]
pub struct ScriptAction {
    pub kind: ActionKind,
    /// Response data, plus the behaviour flag the kind implies.
    pub data: SubmittedData,
    /// Grader comment, for `comment` actions.
    pub comment: Option<String>,
    /// Grader mark out of the attempt's max mark.
    pub mark: Option<f64>,
    pub format: CommentFormat,
    pub at: Option<DateTime<Utc>>,
    pub user: Option<UserId>,
    /// Committed step count the client believes the attempt has.
    pub sequence_check: Option<usize>,
}

impl ScriptAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            data: SubmittedData::new(),
            comment: None,
            mark: None,
            format: CommentFormat::default(),
            at: None,
            user: None,
            sequence_check: None,
        }
    }
}
