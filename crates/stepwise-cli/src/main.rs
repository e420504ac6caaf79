//! stepwise CLI: replay attempt scripts and inspect their step history.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stepwise", version, about = "Question attempt step history replayer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay attempt scripts and print the resulting history
    Replay {
        /// Path to a .toml attempt script or directory
        #[arg(long)]
        script: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Also regrade each finished attempt
        #[arg(long)]
        regrade: bool,

        /// Finish regraded attempts that were left open
        #[arg(long, requires = "regrade")]
        force_finish: bool,

        /// Max mark for the regraded attempt
        #[arg(long, requires = "regrade")]
        new_max_mark: Option<f64>,

        /// Show the attempt as it was after this step
        #[arg(long)]
        at_step: Option<usize>,

        /// Save a JSON report per script
        #[arg(long)]
        save: bool,

        /// Directory for saved reports (implies --save)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate attempt script TOML files
    Validate {
        /// Path to a script file or directory
        #[arg(long)]
        script: PathBuf,
    },

    /// List the behaviours that can be used
    Behaviours {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example attempt script
    Init,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            script,
            format,
            regrade,
            force_finish,
            new_max_mark,
            at_step,
            save,
            output,
            config,
        } => commands::replay::execute(commands::replay::ReplayArgs {
            script,
            format,
            regrade,
            force_finish,
            new_max_mark,
            at_step,
            save,
            output,
            config,
        }),
        Commands::Validate { script } => commands::validate::execute(script),
        Commands::Behaviours { config } => commands::behaviours::execute(config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
