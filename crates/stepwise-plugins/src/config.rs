//! Configuration and behaviour registry factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stepwise_core::BehaviourRegistry;

use crate::behaviours::register_builtins;

/// Top-level stepwise configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepwiseConfig {
    /// Behaviour used when a script does not name one.
    #[serde(default = "default_behaviour")]
    pub default_behaviour: String,
    /// Decimal places used when displaying marks.
    #[serde(default = "default_mark_decimal_places")]
    pub mark_decimal_places: usize,
    /// Built-in behaviours that may not be used.
    #[serde(default)]
    pub disabled_behaviours: Vec<String>,
    /// Output directory for replay reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_behaviour() -> String {
    "deferredfeedback".to_string()
}
fn default_mark_decimal_places() -> usize {
    2
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./stepwise-results")
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            default_behaviour: default_behaviour(),
            mark_decimal_places: default_mark_decimal_places(),
            disabled_behaviours: Vec::new(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while let Some(offset) = result[pos..].find("${") {
        let start = pos + offset;
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
            // Substituted text is never rescanned.
            pos = start + value.len();
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `stepwise.toml` in the current directory
/// 2. `~/.config/stepwise/config.toml`
///
/// Environment variable overrides: `STEPWISE_DEFAULT_BEHAVIOUR`, `STEPWISE_MARK_DP`.
pub fn load_config() -> Result<StepwiseConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<StepwiseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("stepwise.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => StepwiseConfig::default(),
    };

    // Apply env var overrides
    if let Ok(name) = std::env::var("STEPWISE_DEFAULT_BEHAVIOUR") {
        config.default_behaviour = name;
    }
    if let Ok(dp) = std::env::var("STEPWISE_MARK_DP") {
        config.mark_decimal_places = dp
            .trim()
            .parse()
            .with_context(|| format!("STEPWISE_MARK_DP is not a number: {dp}"))?;
    }

    config.default_behaviour = resolve_env_vars(&config.default_behaviour);
    config.output_dir = PathBuf::from(resolve_env_vars(&config.output_dir.to_string_lossy()));

    Ok(config)
}

/// Parse a config file's contents.
pub fn parse_config(content: &str) -> Result<StepwiseConfig> {
    Ok(toml::from_str::<StepwiseConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("stepwise"))
}

/// Build the behaviour registry from the enabled built-ins.
pub fn create_registry(config: &StepwiseConfig) -> Result<Arc<BehaviourRegistry>> {
    let mut registry = BehaviourRegistry::new();
    register_builtins(&mut registry, &config.disabled_behaviours);
    if !registry.contains(&config.default_behaviour) {
        anyhow::bail!(
            "default behaviour '{}' is not available (registered: {})",
            config.default_behaviour,
            registry.names().collect::<Vec<_>>().join(", ")
        );
    }
    tracing::debug!(behaviours = registry.len(), "built behaviour registry");
    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_STEPWISE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_STEPWISE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_STEPWISE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_STEPWISE_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_substituted_values() {
        std::env::set_var("_STEPWISE_SELF_REF", "${_STEPWISE_SELF_REF}");
        std::env::set_var("_STEPWISE_OUTER", "${_STEPWISE_INNER}/out");
        std::env::set_var("_STEPWISE_INNER", "inner");
        assert_eq!(
            resolve_env_vars("${_STEPWISE_SELF_REF}"),
            "${_STEPWISE_SELF_REF}"
        );
        assert_eq!(
            resolve_env_vars("${_STEPWISE_OUTER}:${_STEPWISE_INNER}"),
            "${_STEPWISE_INNER}/out:inner"
        );
        std::env::remove_var("_STEPWISE_SELF_REF");
        std::env::remove_var("_STEPWISE_OUTER");
        std::env::remove_var("_STEPWISE_INNER");
    }

    #[test]
    fn default_config() {
        let config = StepwiseConfig::default();
        assert_eq!(config.default_behaviour, "deferredfeedback");
        assert_eq!(config.mark_decimal_places, 2);
        assert!(config.disabled_behaviours.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
default_behaviour = "immediatefeedback"
disabled_behaviours = ["informationitem"]
"#,
        )
        .unwrap();
        assert_eq!(config.default_behaviour, "immediatefeedback");
        assert_eq!(config.mark_decimal_places, 2);
        assert_eq!(config.disabled_behaviours, vec!["informationitem"]);
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwise.toml");
        std::fs::write(&path, "mark_decimal_places = 3\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.mark_decimal_places, 3);

        let missing = dir.path().join("missing.toml");
        let err = load_config_from(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "mark_decimal_places = \"lots\"\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn registry_honours_disabled_behaviours() {
        let config = StepwiseConfig {
            disabled_behaviours: vec!["manualgraded".to_string()],
            ..StepwiseConfig::default()
        };
        let registry = create_registry(&config).unwrap();
        assert!(!registry.contains("manualgraded"));
        assert!(registry.contains("deferredfeedback"));

        let config = StepwiseConfig {
            disabled_behaviours: vec!["deferredfeedback".to_string()],
            ..StepwiseConfig::default()
        };
        assert!(create_registry(&config).is_err());
    }
}
