//! The `stepwise behaviours` command.

use std::path::PathBuf;

use anyhow::Result;

use stepwise_plugins::config::load_config_from;
use stepwise_plugins::create_registry;

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let registry = create_registry(&config)?;

    println!("Behaviours:");
    for name in registry.names() {
        if name == config.default_behaviour {
            println!("  {name} (default)");
        } else {
            println!("  {name}");
        }
    }
    if !config.disabled_behaviours.is_empty() {
        println!("\nDisabled: {}", config.disabled_behaviours.join(", "));
    }

    Ok(())
}
