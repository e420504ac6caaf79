//! The `stepwise init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create stepwise.toml
    if std::path::Path::new("stepwise.toml").exists() {
        println!("stepwise.toml already exists, skipping.");
    } else {
        std::fs::write("stepwise.toml", SAMPLE_CONFIG)?;
        println!("Created stepwise.toml");
    }

    // Create example script
    std::fs::create_dir_all("scripts")?;
    let example_path = std::path::Path::new("scripts/example.toml");
    if example_path.exists() {
        println!("scripts/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SCRIPT)?;
        println!("Created scripts/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit scripts/example.toml to describe an attempt");
    println!("  2. Run: stepwise validate --script scripts/example.toml");
    println!("  3. Run: stepwise replay --script scripts/example.toml --regrade");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# stepwise configuration

# Behaviour used when a script does not choose one.
default_behaviour = "deferredfeedback"

# Decimal places for marks in reports.
mark_decimal_places = 2

# Built-in behaviours that scripts may not use.
disabled_behaviours = []

output_dir = "./stepwise-results"
"#;

const EXAMPLE_SCRIPT: &str = r#"[question]
type = "shortanswer"
id = 1
name = "Capital of France"
text = "What is the capital of France?"
default_mark = 1.0

[[question.answers]]
answer = "Paris"
fraction = 1.0

[[question.answers]]
answer = "*"
fraction = 0.0
feedback = "Try again."

[attempt]
name = "example"
behaviour = "deferredfeedback"
user = 1
start = "2024-01-15T10:00:00Z"

[[actions]]
kind = "save"
qt = { answer = "Lyon" }

[[actions]]
kind = "save"
at = "2024-01-15T10:02:00Z"
qt = { answer = "Paris" }

[[actions]]
kind = "finish"
at = "2024-01-15T10:03:00Z"
"#;
