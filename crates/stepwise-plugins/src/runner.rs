//! Replays an attempt script against a fresh question attempt.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use stepwise_core::{
    ActionOptions, AttemptView, BehaviourRegistry, QuestionAttempt, QuestionState,
    StepDecision,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StepwiseConfig;
use crate::observer::TracingObserver;
use crate::script::{ActionKind, AttemptScript, ScriptAction};

/// Options for a script run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Also replay the finished attempt into a regraded copy.
    pub regrade: bool,
    /// Finish the regraded copy if the script left the attempt open.
    pub force_finish: bool,
    /// Max mark for the regraded copy.
    pub new_max_mark: Option<f64>,
}

/// What one scripted action did.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// 1-based action number.
    pub index: usize,
    pub kind: ActionKind,
    /// Did the action add (or, for autosaves, store) a step?
    pub kept: bool,
    /// Attempt state after the action.
    pub state: QuestionState,
}

/// The result of replaying a script.
#[derive(Debug)]
pub struct ScriptOutcome {
    pub script: String,
    pub attempt: QuestionAttempt,
    pub actions: Vec<ActionOutcome>,
    pub regraded: Option<QuestionAttempt>,
}

impl ScriptOutcome {
    /// Number of actions the behaviour discarded.
    pub fn discarded(&self) -> usize {
        self.actions.iter().filter(|a| !a.kept).count()
    }
}

/// Replay `script` and return the resulting attempt.
pub fn run_script(
    script: &AttemptScript,
    registry: Arc<BehaviourRegistry>,
    config: &StepwiseConfig,
    options: RunOptions,
) -> Result<ScriptOutcome> {
    let question = script.question.build();
    let mut qa = QuestionAttempt::new(question, Uuid::new_v4(), registry)
        .with_observer(Arc::new(TracingObserver));
    if let Some(max_mark) = script.attempt.max_mark {
        qa.set_max_mark(max_mark);
    }
    if let Some(slot) = script.attempt.slot {
        qa.set_slot(slot);
    }

    let behaviour = script
        .attempt
        .behaviour
        .as_deref()
        .unwrap_or(&config.default_behaviour);
    let mut clock = script.attempt.start.unwrap_or_else(Utc::now);
    let start = ActionOptions {
        timestamp: Some(clock),
        user_id: script.attempt.user,
        existing_step_id: None,
    };
    qa.start(
        behaviour.into(),
        script.attempt.variant,
        Default::default(),
        start,
    )
    .with_context(|| format!("failed to start attempt for {}", script.name))?;

    let mut actions = Vec::with_capacity(script.actions.len());
    for (index, action) in script.actions.iter().enumerate() {
        clock = action.at.unwrap_or(clock);
        let options = ActionOptions {
            timestamp: Some(clock),
            user_id: action.user.or(script.attempt.user),
            existing_step_id: None,
        };
        let kept = apply_action(&mut qa, action, options)
            .with_context(|| format!("action {} ({}) failed", index + 1, action.kind))?;
        debug!(action = index + 1, kind = %action.kind, kept, "applied scripted action");
        actions.push(ActionOutcome {
            index: index + 1,
            kind: action.kind,
            kept,
            state: qa.state(),
        });
    }
    qa.set_flagged(script.attempt.flagged);

    let regraded = if options.regrade {
        let copy = qa
            .regrade_copy(options.new_max_mark, options.force_finish)
            .context("regrade failed")?;
        Some(copy)
    } else {
        None
    };

    info!(
        script = %script.name,
        steps = qa.num_steps(),
        state = %qa.state(),
        "replayed script"
    );
    Ok(ScriptOutcome {
        script: script.name.clone(),
        attempt: qa,
        actions,
        regraded,
    })
}

fn apply_action(
    qa: &mut QuestionAttempt,
    action: &ScriptAction,
    options: ActionOptions,
) -> Result<bool> {
    if let Some(expected) = action.sequence_check {
        qa.verify_sequence_check(expected)?;
    }
    let kept = match action.kind {
        ActionKind::Save | ActionKind::Submit | ActionKind::Seen => {
            qa.process_action(action.data.clone(), options)? == StepDecision::Keep
        }
        ActionKind::Autosave => qa.process_autosave(action.data.clone(), options)?,
        ActionKind::Finish => qa.finish(options)?.is_keep(),
        ActionKind::Comment => {
            let comment = action.comment.as_deref().unwrap_or_default();
            qa.manual_grade(comment, action.mark, action.format, options)?
                .is_keep()
        }
    };
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::create_registry;
    use crate::parser::parse_script_str;

    const SCRIPT: &str = r#"
[question]
type = "shortanswer"
id = 1
name = "Capital"
text = "What is the capital of France?"
default_mark = 2.0

[[question.answers]]
answer = "Paris"
fraction = 1.0

[attempt]
start = "2024-05-01T09:00:00Z"
user = 5

[[actions]]
kind = "save"
qt = { answer = "Lyon" }

[[actions]]
kind = "save"
qt = { answer = "Lyon" }

[[actions]]
kind = "autosave"
at = "2024-05-01T09:05:00Z"
qt = { answer = "paris" }

[[actions]]
kind = "finish"
sequence_check = 2
at = "2024-05-01T09:06:00Z"
"#;

    fn run(source: &str, options: RunOptions) -> Result<ScriptOutcome> {
        let script = parse_script_str(source, &PathBuf::from("capital.toml"))?;
        let config = StepwiseConfig::default();
        run_script(&script, create_registry(&config)?, &config, options)
    }

    #[test]
    fn replays_actions_in_order() {
        let outcome = run(SCRIPT, RunOptions::default()).unwrap();
        assert_eq!(outcome.script, "capital");
        let qa = &outcome.attempt;
        assert_eq!(qa.behaviour_name().unwrap(), "deferredfeedback");
        assert_eq!(qa.num_steps(), 4);
        assert_eq!(qa.state(), QuestionState::GradedRight);
        assert_eq!(qa.mark(), Some(2.0));
        assert_eq!(qa.step(0).unwrap().user_id(), Some(5));
        assert_eq!(outcome.discarded(), 1);
        assert_eq!(
            outcome.actions.iter().map(|a| a.kept).collect::<Vec<_>>(),
            vec![true, false, true, true]
        );
        assert!(outcome.regraded.is_none());
    }

    #[test]
    fn regrade_with_new_max_mark() {
        let options = RunOptions {
            regrade: true,
            new_max_mark: Some(10.0),
            ..RunOptions::default()
        };
        let outcome = run(SCRIPT, options).unwrap();
        let regraded = outcome.regraded.as_ref().unwrap();
        assert_eq!(regraded.num_steps(), outcome.attempt.num_steps());
        assert_eq!(regraded.state(), outcome.attempt.state());
        assert_eq!(regraded.mark(), Some(10.0));
        assert_eq!(
            regraded.last_action_time(),
            outcome.attempt.last_action_time()
        );
    }

    #[test]
    fn stale_sequence_check_fails_the_action() {
        let stale = SCRIPT.replace("sequence_check = 2", "sequence_check = 1");
        let err = run(&stale, RunOptions::default()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("action 4 (finish) failed"), "{message}");
    }

    #[test]
    fn comment_before_finish_is_an_error() {
        let script = r#"
[question]
type = "essay"
id = 2
name = "Essay"

[[actions]]
kind = "comment"
comment = "Too early"
"#;
        let err = run(script, RunOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("action 1 (comment) failed"));
    }
}
