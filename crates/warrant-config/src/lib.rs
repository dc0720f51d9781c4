//! Configuration management for Warrant
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (WARRANT_* prefix, highest precedence)
//! 2. warrant.local.toml (gitignored, local overrides)
//! 3. warrant.toml (git-tracked, project config)
//! 4. ~/.config/warrant/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warrant configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarrantConfig {
    pub codec: CodecConfig,
    pub decision: DecisionConfig,
    pub time: TimeConfig,
}

/// Canonical key layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Separator between the main value and the scope, and between key segments.
    pub separator: String,
    /// Optional namespace prepended to every key. Empty means no prefix.
    pub prefix: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub strict: StrictSetting,
    pub audit: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            strict: StrictSetting::Flag(true),
            audit: true,
        }
    }
}

/// Scope strictness as written in config files.
///
/// Either a plain boolean applying to every axis, or a string of axis
/// letters (`s`, `a`, `o`) naming the strict axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrictSetting {
    Flag(bool),
    Axes(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// IANA timezone used to evaluate cron windows.
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl TimeConfig {
    /// Resolve the configured timezone name.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!("unknown timezone '{}'", self.timezone))
        })
    }
}

impl WarrantConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file without merging any other source.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration that matches scopes loosely and skips audit logging.
    pub fn permissive() -> Self {
        Self {
            decision: DecisionConfig {
                strict: StrictSetting::Flag(false),
                audit: false,
            },
            ..Default::default()
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.separator.is_empty() {
            return Err(ConfigError::ValidationError(
                "codec.separator must not be empty".to_string(),
            ));
        }
        if !self.codec.prefix.is_empty() && self.codec.prefix.contains(&self.codec.separator) {
            return Err(ConfigError::ValidationError(format!(
                "codec.prefix '{}' must not contain the separator '{}'",
                self.codec.prefix, self.codec.separator
            )));
        }
        if let StrictSetting::Axes(axes) = &self.decision.strict {
            if let Some(c) = axes
                .chars()
                .find(|c| !matches!(c.to_ascii_lowercase(), 's' | 'a' | 'o'))
            {
                return Err(ConfigError::ValidationError(format!(
                    "decision.strict contains unknown axis '{c}'"
                )));
            }
        }
        self.time.tz()?;
        Ok(())
    }
}
