//! The `stepwise replay` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use stepwise_core::ClassifiedResponses;
use stepwise_plugins::config::load_config_from;
use stepwise_plugins::{create_registry, run_script, AttemptReport, AttemptSummary, RunOptions};

use super::load_scripts;

pub struct ReplayArgs {
    pub script: PathBuf,
    pub format: String,
    pub regrade: bool,
    pub force_finish: bool,
    pub new_max_mark: Option<f64>,
    pub at_step: Option<usize>,
    pub save: bool,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn execute(args: ReplayArgs) -> Result<()> {
    anyhow::ensure!(
        matches!(args.format.as_str(), "text" | "json"),
        "unknown format '{}' (expected text or json)",
        args.format
    );
    if let Some(max_mark) = args.new_max_mark {
        anyhow::ensure!(max_mark > 0.0, "new max mark must be positive");
    }

    let config = load_config_from(args.config.as_deref())?;
    let registry = create_registry(&config)?;
    let scripts = load_scripts(&args.script)?;
    anyhow::ensure!(
        !scripts.is_empty(),
        "no attempt scripts found in {}",
        args.script.display()
    );

    tracing::debug!(scripts = scripts.len(), "loaded attempt scripts");

    let options = RunOptions {
        regrade: args.regrade,
        force_finish: args.force_finish,
        new_max_mark: args.new_max_mark,
    };
    let dp = config.mark_decimal_places;

    let mut reports = Vec::with_capacity(scripts.len());
    for script in &scripts {
        let outcome = run_script(script, registry.clone(), &config, options)
            .with_context(|| format!("replaying {}", script.source.display()))?;
        let report = AttemptReport::from_outcome(&outcome, args.at_step, dp)?;
        if args.format == "text" {
            print_report(&report);
            if outcome.discarded() > 0 {
                println!("{} action(s) discarded", outcome.discarded());
            }
            println!();
        }
        reports.push(report);
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if args.save || args.output.is_some() {
        let output = args.output.unwrap_or(config.output_dir);
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        for report in &reports {
            let path = output.join(format!("{}-{timestamp}.json", report.script));
            report.save_json(&path)?;
            eprintln!("Report saved to: {}", path.display());
        }
    }

    Ok(())
}

fn print_report(report: &AttemptReport) {
    let attempt = &report.attempt;
    println!(
        "Script: {} ({}, {})",
        report.script, report.question.type_name, attempt.behaviour
    );
    if let Some(summary) = &report.question.summary {
        println!("Question: {summary}");
    }
    if let Some(right) = &report.question.right_answer {
        println!("Right answer: {right}");
    }
    if let Some(step) = attempt.at_step {
        println!("As at step {step}");
    }

    println!("{}", history_table(attempt));
    println!("{}", outcome_line("Result", attempt));
    print_responses(&attempt.responses);

    if let Some(regraded) = &report.regraded {
        if report.regrade_changed() {
            println!("{}", outcome_line("Regraded", regraded));
        } else {
            println!("Regrade: unchanged");
        }
    }
}

fn history_table(attempt: &AttemptSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Step", "Time", "User", "Action", "State", "Mark"]);

    for row in &attempt.steps {
        let action = if row.autosaved {
            format!("{} (autosaved)", row.action)
        } else {
            row.action.clone()
        };
        table.add_row(vec![
            Cell::new(row.index),
            Cell::new(row.time.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(row.user.map(|u| u.to_string()).unwrap_or_default()),
            Cell::new(action),
            Cell::new(row.state),
            Cell::new(&row.mark),
        ]);
    }
    table
}

fn outcome_line(label: &str, attempt: &AttemptSummary) -> String {
    if attempt.mark.is_empty() {
        format!("{label}: {}", attempt.status)
    } else {
        format!(
            "{label}: {} ({} out of {})",
            attempt.status, attempt.mark, attempt.max_mark
        )
    }
}

fn print_responses(responses: &ClassifiedResponses) {
    let ClassifiedResponses::PerTry(tries) = responses else {
        return;
    };
    for (try_no, parts) in tries {
        for classified in parts.values() {
            let class = classified.response_class_id.as_deref().unwrap_or("-");
            println!("Try {try_no}: {} [class {class}]", classified.response);
        }
    }
}
