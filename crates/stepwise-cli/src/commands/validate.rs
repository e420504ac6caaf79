//! The `stepwise validate` command.

use std::path::PathBuf;

use anyhow::Result;

use stepwise_plugins::validate_script;

use super::load_scripts;

pub fn execute(script_path: PathBuf) -> Result<()> {
    let scripts = load_scripts(&script_path)?;

    let mut total_warnings = 0;

    for script in &scripts {
        println!(
            "Script: {} ({} question, {} actions)",
            script.name,
            script.question.type_name(),
            script.actions.len()
        );

        let warnings = validate_script(script);
        for w in &warnings {
            let prefix = w
                .action
                .map(|n| format!("  [action {n}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if scripts.is_empty() {
        println!("No scripts found.");
    } else if total_warnings == 0 {
        println!("All scripts valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
