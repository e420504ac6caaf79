//! TOML attempt script parser.
//!
//! Loads attempt scripts from TOML files and directories, and validates them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use stepwise_core::traits::SUBMIT_VAR;
use stepwise_core::{BehaviourRegistry, CommentFormat, FileSaver, StoredFile, UserId, VarMap};

use crate::behaviours::informationitem::SEEN_VAR;
use crate::behaviours::{register_builtins, InformationItem, ManualGraded, BUILTIN_BEHAVIOURS};
use crate::qtypes::QuestionConfig;
use crate::script::{ActionKind, AttemptScript, AttemptSettings, ScriptAction};

/// Intermediate TOML structure for parsing script files.
#[derive(Debug, Deserialize)]
struct TomlScriptFile {
    question: QuestionConfig,
    #[serde(default)]
    attempt: TomlAttempt,
    #[serde(default)]
    actions: Vec<TomlAction>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlAttempt {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    behaviour: Option<String>,
    #[serde(default = "default_variant")]
    variant: u32,
    #[serde(default)]
    max_mark: Option<f64>,
    #[serde(default)]
    slot: Option<u32>,
    #[serde(default)]
    user: Option<UserId>,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    flagged: bool,
}

fn default_variant() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TomlAction {
    kind: String,
    #[serde(default)]
    qt: VarMap,
    #[serde(default)]
    behaviour: VarMap,
    #[serde(default)]
    files: BTreeMap<String, Vec<TomlFile>>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    mark: Option<f64>,
    #[serde(default)]
    format: Option<CommentFormat>,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
    #[serde(default)]
    user: Option<UserId>,
    #[serde(default)]
    sequence_check: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TomlFile {
    #[serde(default = "default_filepath")]
    filepath: String,
    filename: String,
    content_hash: String,
    #[serde(default)]
    size: u64,
}

fn default_filepath() -> String {
    "/".to_string()
}

/// Parse a single TOML file into an `AttemptScript`.
pub fn parse_script(path: &Path) -> Result<AttemptScript> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script file: {}", path.display()))?;

    parse_script_str(&content, path)
}

/// Parse a TOML string into an `AttemptScript` (useful for testing).
pub fn parse_script_str(content: &str, source_path: &Path) -> Result<AttemptScript> {
    let parsed: TomlScriptFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let actions = parsed
        .actions
        .into_iter()
        .enumerate()
        .map(|(index, a)| {
            let kind: ActionKind = a
                .kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!("action {}: {}", index + 1, e))?;

            let mut action = ScriptAction::new(kind);
            action.data.qt = a.qt;
            action.data.behaviour = a.behaviour;
            action.data.files = a
                .files
                .into_iter()
                .map(|(name, files)| {
                    let files = files
                        .into_iter()
                        .map(|f| StoredFile {
                            filepath: f.filepath,
                            filename: f.filename,
                            content_hash: f.content_hash,
                            size: f.size,
                        })
                        .collect();
                    (name, FileSaver::new(files))
                })
                .collect();
            match kind {
                ActionKind::Submit => {
                    action.data.behaviour.insert(SUBMIT_VAR.to_string(), "1".to_string());
                }
                ActionKind::Seen => {
                    action.data.behaviour.insert(SEEN_VAR.to_string(), "1".to_string());
                }
                _ => {}
            }
            action.comment = a.comment;
            action.mark = a.mark;
            action.format = a.format.unwrap_or_default();
            action.at = a.at;
            action.user = a.user;
            action.sequence_check = a.sequence_check;
            Ok(action)
        })
        .collect::<Result<Vec<_>>>()?;

    let name = parsed.attempt.name.unwrap_or_else(|| {
        source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string())
    });

    Ok(AttemptScript {
        name,
        source: source_path.to_path_buf(),
        question: parsed.question,
        attempt: AttemptSettings {
            behaviour: parsed.attempt.behaviour,
            variant: parsed.attempt.variant,
            max_mark: parsed.attempt.max_mark,
            slot: parsed.attempt.slot,
            user: parsed.attempt.user,
            start: parsed.attempt.start,
            flagged: parsed.attempt.flagged,
        },
        actions,
    })
}

/// Recursively load all `.toml` script files from a directory.
pub fn load_script_directory(dir: &Path) -> Result<Vec<AttemptScript>> {
    let mut scripts = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            scripts.extend(load_script_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_script(&path) {
                Ok(script) => scripts.push(script),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(scripts)
}

/// A warning from script validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The 1-based action number (if applicable).
    pub action: Option<usize>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn script(message: impl Into<String>) -> Self {
        Self {
            action: None,
            message: message.into(),
        }
    }

    fn action(index: usize, message: impl Into<String>) -> Self {
        Self {
            action: Some(index + 1),
            message: message.into(),
        }
    }
}

/// Validate a script for common issues.
pub fn validate_script(script: &AttemptScript) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if script.actions.is_empty() {
        warnings.push(ValidationWarning::script("script has no actions"));
    }

    // Behaviour choice
    let forced = match &script.question {
        QuestionConfig::Essay(_) => Some(ManualGraded::NAME),
        QuestionConfig::Description(_) => Some(InformationItem::NAME),
        QuestionConfig::ShortAnswer(_) => None,
    };
    if let Some(name) = &script.attempt.behaviour {
        if !BUILTIN_BEHAVIOURS.contains(&name.as_str()) {
            warnings.push(ValidationWarning::script(format!("unknown behaviour: {name}")));
        } else if let Some(forced) = forced.filter(|f| *f != name.as_str()) {
            warnings.push(ValidationWarning::script(format!(
                "{} questions always use {forced}; behaviour {name} will be ignored",
                script.question.type_name()
            )));
        }
    }

    if let QuestionConfig::ShortAnswer(q) = &script.question {
        if q.answers.is_empty() {
            warnings.push(ValidationWarning::script("short answer question has no answers"));
        } else if !q.answers.iter().any(|a| a.fraction >= 1.0) {
            warnings.push(ValidationWarning::script("no answer is worth full marks"));
        }
    }

    // Grader marks may fall anywhere in the behaviour's fraction range.
    let question = script.question.build();
    let max_mark = script
        .attempt
        .max_mark
        .unwrap_or_else(|| question.default_mark());
    let mut builtins = BehaviourRegistry::new();
    register_builtins(&mut builtins, &[]);
    let (min_fraction, max_fraction) = match forced
        .or(script.attempt.behaviour.as_deref())
        .and_then(|name| builtins.make(name).ok())
    {
        Some(behaviour) => (
            behaviour.min_fraction(question.as_ref()),
            behaviour.max_fraction(question.as_ref()),
        ),
        None => (question.min_fraction(), question.max_fraction()),
    };
    let (lowest, highest) = (max_mark * min_fraction, max_mark * max_fraction);
    if script.attempt.variant == 0 {
        warnings.push(ValidationWarning::script("variants are numbered from 1"));
    }

    let mut last_time = script.attempt.start;
    let mut finished = false;
    for (index, action) in script.actions.iter().enumerate() {
        let has_response = !action.data.qt.is_empty() || !action.data.files.is_empty();

        if has_response && !action.kind.takes_response() {
            warnings.push(ValidationWarning::action(
                index,
                format!("response data on a {} action will be ignored", action.kind),
            ));
        }
        if action.kind == ActionKind::Comment {
            if action.comment.is_none() && action.mark.is_none() {
                warnings.push(ValidationWarning::action(
                    index,
                    "comment action has neither a comment nor a mark",
                ));
            }
            match action.mark {
                Some(mark) if mark > highest => warnings.push(ValidationWarning::action(
                    index,
                    format!("mark {mark} is above the maximum mark {highest}"),
                )),
                Some(mark) if mark < lowest => warnings.push(ValidationWarning::action(
                    index,
                    format!("mark {mark} is below the minimum mark {lowest}"),
                )),
                _ => {}
            }
            if !finished {
                warnings.push(ValidationWarning::action(
                    index,
                    "comment before the attempt is finished will be rejected",
                ));
            }
        } else if action.mark.is_some() || action.comment.is_some() {
            warnings.push(ValidationWarning::action(
                index,
                format!("comment and mark are ignored on a {} action", action.kind),
            ));
        }
        if finished && action.kind.takes_response() {
            warnings.push(ValidationWarning::action(
                index,
                format!("{} after finish will be discarded", action.kind),
            ));
        }
        if let (Some(previous), Some(at)) = (last_time, action.at) {
            if at < previous {
                warnings.push(ValidationWarning::action(
                    index,
                    "timestamp is earlier than the previous action",
                ));
            }
        }

        last_time = action.at.or(last_time);
        finished |= action.kind == ActionKind::Finish;
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[question]
type = "shortanswer"
id = 1
name = "Capital of France"
text = "What is the capital of France?"
default_mark = 2.0

[[question.answers]]
answer = "Paris"
fraction = 1.0

[[question.answers]]
answer = "Lyon"
fraction = 0.25

[attempt]
name = "capital-deferred"
behaviour = "deferredfeedback"
user = 42
start = "2024-05-01T09:00:00Z"

[[actions]]
kind = "save"
at = "2024-05-01T09:01:00Z"
qt = { answer = "Lyon" }

[[actions]]
kind = "autosave"
qt = { answer = "Paris" }

[[actions]]
kind = "finish"
sequence_check = 2

[[actions]]
kind = "comment"
comment = "Good recovery"
mark = 1.5
format = "plain"
user = 7
"#;

    #[test]
    fn parse_valid_toml() {
        let script = parse_script_str(VALID_TOML, &PathBuf::from("capital.toml")).unwrap();
        assert_eq!(script.name, "capital-deferred");
        assert_eq!(script.question.id(), 1);
        assert_eq!(script.attempt.behaviour.as_deref(), Some("deferredfeedback"));
        assert_eq!(script.attempt.variant, 1);
        assert_eq!(script.actions.len(), 4);
        assert_eq!(script.actions[0].kind, ActionKind::Save);
        assert_eq!(script.actions[0].data.qt["answer"], "Lyon");
        assert_eq!(script.actions[2].sequence_check, Some(2));
        assert_eq!(script.actions[3].format, CommentFormat::Plain);
        assert_eq!(script.actions[3].user, Some(7));
        assert!(validate_script(&script).is_empty());
    }

    #[test]
    fn submit_and_files() {
        let toml = r#"
[question]
type = "essay"
id = 2
name = "Essay"
attachments = 2

[[actions]]
kind = "submit"
qt = { answer = "Text" }

[[actions.files.attachments]]
filename = "notes.txt"
content_hash = "abc"
size = 3
"#;
        let script = parse_script_str(toml, &PathBuf::from("essay.toml")).unwrap();
        assert_eq!(script.name, "essay");
        let data = &script.actions[0].data;
        assert_eq!(data.behaviour.get(SUBMIT_VAR).map(String::as_str), Some("1"));
        assert_eq!(data.files["attachments"].files[0].filepath, "/");
    }

    #[test]
    fn unknown_action_kind() {
        let toml = r#"
[question]
type = "description"
id = 3
name = "Intro"

[[actions]]
kind = "dance"
"#;
        let err = parse_script_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("unknown action kind"));
    }

    #[test]
    fn validate_common_mistakes() {
        let toml = r#"
[question]
type = "essay"
id = 2
name = "Essay"

[attempt]
behaviour = "immediatefeedback"

[[actions]]
kind = "comment"
mark = 5.0

[[actions]]
kind = "finish"
at = "2024-05-01T10:00:00Z"
qt = { answer = "late" }

[[actions]]
kind = "save"
at = "2024-05-01T09:00:00Z"
qt = { answer = "later" }
"#;
        let script = parse_script_str(toml, &PathBuf::from("essay.toml")).unwrap();
        let warnings = validate_script(&script);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));
        assert!(has("always use manualgraded"));
        assert!(has("above the maximum mark"));
        assert!(has("before the attempt is finished"));
        assert!(has("response data on a finish action"));
        assert!(has("save after finish"));
        assert!(has("earlier than the previous action"));
        assert_eq!(
            warnings
                .iter()
                .find(|w| w.message.contains("earlier"))
                .and_then(|w| w.action),
            Some(3)
        );
    }

    #[test]
    fn validate_marks_against_the_behaviour_range() {
        let toml = r#"
[question]
type = "shortanswer"
id = 8
name = "Amphibian"

[[question.answers]]
answer = "frog"
fraction = 1.0

[attempt]
behaviour = "immediatecbm"

[[actions]]
kind = "submit"
qt = { answer = "toad" }
behaviour = { certainty = "3" }

[[actions]]
kind = "finish"

[[actions]]
kind = "comment"
mark = -4.5

[[actions]]
kind = "comment"
mark = -6.5

[[actions]]
kind = "comment"
mark = 3.5
"#;
        let script = parse_script_str(toml, &PathBuf::from("cbm.toml")).unwrap();
        let warnings = validate_script(&script);
        let at = |action: usize| warnings.iter().find(|w| w.action == Some(action));
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(at(4).unwrap().message.contains("below the minimum mark -6"));
        assert!(at(5).unwrap().message.contains("above the maximum mark 3"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_script_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capital.toml"), VALID_TOML).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("broken.toml"), "[question]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let scripts = load_script_directory(dir.path()).unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "capital-deferred");
    }
}
