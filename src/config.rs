//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/restree/restree.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `RESTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::DEFAULT_INDENT_WIDTH;
use crate::util::path::expand_env_vars;

/// Unified configuration for restree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// TOML file holding form items and node rows
    pub data_file: PathBuf,
    /// Spaces per depth level in debug dumps
    pub indent_width: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            indent_width: DEFAULT_INDENT_WIDTH,
        }
    }
}

fn default_data_file() -> PathBuf {
    ProjectDirs::from("", "", "restree")
        .map(|dirs| dirs.data_dir().join("responses.toml"))
        .unwrap_or_else(|| PathBuf::from("responses.toml"))
}

/// Get the XDG config directory for restree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "restree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("restree.toml"))
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.data_file.to_string_lossy().as_ref());
        self.data_file = PathBuf::from(expanded);
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `config_file` - Optional explicit config file; must exist when given
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("data_file", defaults.data_file.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("indent_width", defaults.indent_width as u64)
            .map_err(config_err)?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RESTREE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Self = config.try_deserialize().map_err(config_err)?;

        // Expand ~ and $VAR in path-like fields
        settings.expand_paths();

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
        r#"# restree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/restree/restree.toml
#   Local:  any file passed with --config
#   Env:    RESTREE_* environment variables (e.g. RESTREE_DATA_FILE)

# TOML file holding form items and response nodes
# data_file = "~/.local/share/restree/responses.toml"

# Spaces per depth level in `restree debug` output
# indent_width = 2
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
    fn given_no_config_when_loading_defaults_then_uses_compiled_values() {
        let settings = Settings::default();
        assert!(settings.data_file.ends_with("responses.toml"));
        assert_eq!(settings.indent_width, 2);
    }

    #[test]
    fn given_tilde_in_data_file_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            data_file: PathBuf::from("~/restree/responses.toml"),
            indent_width: 2,
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let path = settings.data_file.to_string_lossy();
        assert!(
            path.starts_with(&home),
            "data_file should start with home dir: {}",
            path
        );
        assert!(!path.contains('~'));
    }

    #[test]
    fn given_settings_when_serializing_then_round_trips_through_toml() {
        let settings = Settings {
            data_file: PathBuf::from("/tmp/r.toml"),
            indent_width: 4,
        };

        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();

        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let parsed: Result<Settings, _> = toml::from_str(&Settings::template());
        assert!(parsed.is_ok());
    }
}
