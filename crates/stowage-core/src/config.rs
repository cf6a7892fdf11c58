//! Engine configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;

/// When deletes ask for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteConfirmationPolicy {
    /// Always confirm.
    Always,
    /// Confirm only deletes that cannot be undone.
    #[default]
    PermanentOnly,
    /// Never confirm.
    Never,
}

/// Configuration for the operation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct EngineConfig {
    /// Delete confirmation preference.
    #[builder(default)]
    pub delete_confirmation: DeleteConfirmationPolicy,

    /// Ask before a rename changes a file extension.
    #[builder(default = "true")]
    pub show_file_extension_warning: bool,

    /// Allow ':' in names (alternate data streams).
    #[builder(default = "false")]
    pub alternate_streams_visible: bool,

    /// Maximum number of undo entries kept.
    #[builder(default = "100")]
    pub history_capacity: usize,

    /// Buffer size of per-item outcome channels.
    #[builder(default = "100")]
    pub channel_size: usize,

    /// Shortcut name template; `{name}` is replaced by the item name.
    #[builder(default = "default_shortcut_template()")]
    pub shortcut_template: String,

    /// Extension appended to shortcut names (including the dot, or empty).
    #[builder(default = "default_link_extension()")]
    pub link_extension: String,

    /// Folder used when a shortcut cannot be created at its destination.
    #[builder(default = "dirs::desktop_dir()")]
    pub shortcut_fallback_dir: Option<PathBuf>,
}

fn default_shortcut_template() -> String {
    "{name} - Shortcut".to_string()
}

fn default_link_extension() -> String {
    if cfg!(windows) {
        ".lnk".to_string()
    } else {
        String::new()
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.history_capacity == Some(0) {
            return Err("History capacity must be at least 1".to_string());
        }
        if self.channel_size == Some(0) {
            return Err("Channel size must be at least 1".to_string());
        }
        if let Some(ref template) = self.shortcut_template {
            if !template.contains("{name}") {
                return Err("Shortcut template must contain {name}".to_string());
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_confirmation: DeleteConfirmationPolicy::default(),
            show_file_extension_warning: true,
            alternate_streams_visible: false,
            history_capacity: 100,
            channel_size: 100,
            shortcut_template: default_shortcut_template(),
            link_extension: default_link_extension(),
            shortcut_fallback_dir: dirs::desktop_dir(),
        }
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stowage")
            .join("config.toml")
    }

    /// Load a TOML config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(CoreError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = toml::from_str(&text).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Validate values that serde cannot check.
    pub fn check(&self) -> Result<(), CoreError> {
        let invalid = |message: &str| {
            Err(CoreError::InvalidConfig {
                message: message.to_string(),
            })
        };
        if self.history_capacity == 0 {
            return invalid("history_capacity must be at least 1");
        }
        if self.channel_size == 0 {
            return invalid("channel_size must be at least 1");
        }
        if !self.shortcut_template.contains("{name}") {
            return invalid("shortcut_template must contain {name}");
        }
        Ok(())
    }

    /// Shortcut file stem for an item name.
    pub fn shortcut_stem(&self, name: &str) -> String {
        self.shortcut_template.replace("{name}", name)
    }
}
