//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/rscompose/rscompose.toml`
//! 3. Local config: `<project_dir>/.rscompose.toml`
//! 4. Environment variables: `RSCOMPOSE_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Validation behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Treat warnings as failures.
    pub strict: bool,
    /// Minimum shared `<PREFIX>_*` variables before the credentials check
    /// considers two services linked by a `<PREFIX>_HOST` value.
    pub env_prefix_min_vars: usize,
    /// Check names to skip (e.g. ["credentials"]).
    pub disabled: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            env_prefix_min_vars: 2,
            disabled: vec![],
        }
    }
}

/// Raw validation config for intermediate parsing (fields are Option to
/// detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawValidationConfig {
    pub strict: Option<bool>,
    pub env_prefix_min_vars: Option<usize>,
    pub disabled: Option<Vec<String>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub file_names: Option<Vec<String>>,
    #[serde(default)]
    pub validation: RawValidationConfig,
}

/// Unified configuration for rscompose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Descriptor file names, in search-precedence order.
    pub file_names: Vec<String>,
    /// Validation behavior.
    pub validation: ValidationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_names: vec![
                "compose.yaml".into(),
                "compose.yml".into(),
                "docker-compose.yaml".into(),
                "docker-compose.yml".into(),
            ],
            validation: ValidationConfig::default(),
        }
    }
}

/// Get the XDG config directory for rscompose.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rscompose").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("rscompose.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".rscompose.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl ValidationConfig {
    /// Merge check-name arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item
    /// - Duplicates are de-duplicated
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        // Sorted Vec for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Merge overlay onto self: scalars replace if Some, `disabled`
    /// union-merges with negation support.
    fn merge(&self, overlay: &RawValidationConfig) -> Self {
        Self {
            strict: overlay.strict.unwrap_or(self.strict),
            env_prefix_min_vars: overlay
                .env_prefix_min_vars
                .unwrap_or(self.env_prefix_min_vars),
            disabled: overlay
                .disabled
                .as_ref()
                .map(|o| Self::merge_array(&self.disabled, o))
                .unwrap_or_else(|| self.disabled.clone()),
        }
    }
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            file_names: overlay
                .file_names
                .clone()
                .unwrap_or_else(|| self.file_names.clone()),
            validation: self.validation.merge(&overlay.validation),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/rscompose/rscompose.toml`
    /// 3. Local config: `<project_dir>/.rscompose.toml`
    /// 4. Environment variables: `RSCOMPOSE_*` prefix (explicit override)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        Self::apply_env_overrides(current)
    }

    /// Apply RSCOMPOSE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("RSCOMPOSE")
                .separator("__")
                .list_separator(","),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get::<Vec<String>>("file_names") {
            settings.file_names = val;
        }
        if let Ok(val) = config.get_bool("validation.strict") {
            settings.validation.strict = val;
        }
        if let Ok(val) = config.get::<usize>("validation.env_prefix_min_vars") {
            settings.validation.env_prefix_min_vars = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("validation.disabled") {
            settings.validation.disabled = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# rscompose configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/rscompose/rscompose.toml
#   Local:  <project_dir>/.rscompose.toml
#   Env:    RSCOMPOSE_* environment variables (explicit overrides)

# Descriptor file names, in search-precedence order
# file_names = ["compose.yaml", "compose.yml", "docker-compose.yaml", "docker-compose.yml"]

[validation]
# Treat warnings as failures
# strict = false

# Minimum shared <PREFIX>_* variables before the credentials check links
# two services via a <PREFIX>_HOST value
# env_prefix_min_vars = 2

# Check names to skip. Local config merges with global; use "!name" to
# re-enable a check the global config disabled:
#   disabled = ["credentials", "!ports"]
# disabled = []
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load(None).expect("load defaults");
        assert_eq!(settings.file_names[0], "compose.yaml");
        assert!(!settings.validation.strict);
        assert_eq!(settings.validation.env_prefix_min_vars, 2);
    }

    #[test]
    fn given_template_when_parsing_then_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).expect("template parses");
        assert!(raw.file_names.is_none());
        assert!(raw.validation.strict.is_none());
    }

    #[test]
    fn test_merge_array_union() {
        let base = vec!["a".to_string(), "b".to_string()];
        let overlay = vec!["c".to_string()];
        let result = ValidationConfig::merge_array(&base, &overlay);
        assert_eq!(result, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_array_negation() {
        let base = vec!["a".to_string(), "b".to_string()];
        let overlay = vec!["!a".to_string(), "c".to_string()];
        let result = ValidationConfig::merge_array(&base, &overlay);
        assert_eq!(result, vec!["b", "c"]);
    }

    #[test]
    fn test_merge_array_negation_nonexistent() {
        let base = vec!["a".to_string()];
        let overlay = vec!["!x".to_string()];
        let result = ValidationConfig::merge_array(&base, &overlay);
        assert_eq!(result, vec!["a"]);
    }

    #[test]
    fn given_overlay_when_merging_then_scalars_replace_and_arrays_union() {
        let base = Settings::default();
        let overlay = RawSettings {
            file_names: Some(vec!["stack.yaml".to_string()]),
            validation: RawValidationConfig {
                strict: Some(true),
                env_prefix_min_vars: None,
                disabled: Some(vec!["credentials".to_string()]),
            },
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.file_names, vec!["stack.yaml"]);
        assert!(merged.validation.strict);
        assert_eq!(merged.validation.env_prefix_min_vars, 2);
        assert_eq!(merged.validation.disabled, vec!["credentials"]);
    }
}
