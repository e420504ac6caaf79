//! Replay attempt example: driving a `QuestionAttempt` directly.
//!
//! Builds a short answer question in code, walks one learner through a
//! save, an autosave and a finish, lets a grader override the mark, then
//! regrades the history and looks at it as it stood after the first save.
//!
//! ```bash
//! cargo run -p stepwise-plugins --example replay_attempt
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use stepwise_core::{
    ActionOptions, AttemptView, CommentFormat, QuestionAttempt, QuestionDefinition,
    SubmittedData,
};
use stepwise_plugins::qtypes::shortanswer::ANSWER_VAR;
use stepwise_plugins::qtypes::{ShortAnswer, ShortAnswerOption};
use stepwise_plugins::{create_registry, StepwiseConfig, TracingObserver};
use uuid::Uuid;

fn answer(value: &str) -> SubmittedData {
    SubmittedData::new().with_qt(ANSWER_VAR, value)
}

fn print_history(title: &str, qa: &dyn AttemptView) -> anyhow::Result<()> {
    println!("{title}");
    for (index, step) in qa.step_iter() {
        println!(
            "  {index}  {:<12} {}",
            step.state().as_str(),
            qa.summarise_action(step)?
        );
    }
    println!(
        "  => {} ({} out of {})\n",
        qa.state_string(true)?,
        qa.format_mark(2),
        qa.format_max_mark(2)
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // The built-in behaviours, honouring nothing but the defaults.
    let config = StepwiseConfig::default();
    let registry = create_registry(&config)?;

    let question: Arc<dyn QuestionDefinition> = Arc::new(
        ShortAnswer::new(1, "Capital of France", "What is the capital of France?")
            .with_answer(ShortAnswerOption::new("Paris", 1.0))
            .with_answer(ShortAnswerOption::new("Marseille", 0.25))
            .with_default_mark(2.0),
    );

    let t0: DateTime<Utc> = "2024-05-01T09:00:00Z".parse()?;
    let learner = 42;
    let grader = 7;

    let mut qa = QuestionAttempt::new(question, Uuid::new_v4(), registry)
        .with_observer(Arc::new(TracingObserver));
    qa.start(
        config.default_behaviour.as_str().into(),
        1,
        SubmittedData::new(),
        ActionOptions::at(t0).by(learner),
    )?;

    qa.process_action(
        answer("Lyon"),
        ActionOptions::at(t0 + Duration::minutes(2)).by(learner),
    )?;
    // Autosaves are replaced by the next one until something commits them.
    qa.process_autosave(
        answer("Marseille"),
        ActionOptions::at(t0 + Duration::minutes(3)).by(learner),
    )?;
    qa.finish(ActionOptions::at(t0 + Duration::minutes(4)).by(learner))?;

    // Grader input is checked against the behaviour's mark range first.
    let mark = qa.validate_manual_mark("1")?;
    qa.manual_grade(
        "Marseille is not the capital.",
        mark,
        CommentFormat::Plain,
        ActionOptions::at(t0 + Duration::hours(1)).by(grader),
    )?;

    print_history("Attempt:", &qa)?;

    let regraded = qa.regrade_copy(Some(10.0), false)?;
    print_history("Regraded out of 10:", &regraded)?;

    let earlier = qa.at_step(1)?;
    print_history("As at step 1:", &earlier)?;

    Ok(())
}
