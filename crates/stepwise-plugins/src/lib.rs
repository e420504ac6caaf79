//! stepwise-plugins: built-in behaviours and question types, configuration,
//! and TOML attempt scripts that can be replayed and reported on.

pub mod behaviours;
pub mod config;
pub mod observer;
pub mod parser;
pub mod qtypes;
pub mod report;
pub mod runner;
pub mod script;

pub use config::{create_registry, load_config, load_config_from, StepwiseConfig};
pub use observer::TracingObserver;
pub use parser::{
    load_script_directory, parse_script, parse_script_str, validate_script, ValidationWarning,
};
pub use report::{AttemptReport, AttemptSummary, StepRow};
pub use runner::{run_script, ActionOutcome, RunOptions, ScriptOutcome};
pub use script::{ActionKind, AttemptScript, AttemptSettings, ScriptAction};
