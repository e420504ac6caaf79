pub mod behaviours;
pub mod init;
pub mod replay;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use stepwise_plugins::{load_script_directory, parse_script, AttemptScript};

/// Load one script, or every script under a directory.
pub fn load_scripts(path: &Path) -> Result<Vec<AttemptScript>> {
    if path.is_dir() {
        load_script_directory(path)
    } else {
        Ok(vec![parse_script(path)?])
    }
}
