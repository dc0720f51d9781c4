//! Configuration loader with multi-source merging

use crate::{Paths, WarrantConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARRANT".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARRANT")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/warrant/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<WarrantConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = WarrantConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/warrant/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project config (warrant.toml)
        if Paths::is_configured(&self.project_dir) {
            builder = builder.add_source(
                config::File::from(Paths::project_config_file(&self.project_dir))
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (warrant.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (WARRANT_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let warrant_config: WarrantConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        warrant_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(warrant_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> WarrantConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrictSetting;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("WARRANT_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, WarrantConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r##"
[codec]
separator = "#"
prefix = "tenant-7"

[decision]
strict = "a"
audit = false

[time]
timezone = "Asia/Tehran"
"##;
        fs::write(project_dir.join("warrant.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.codec.separator, "#");
        assert_eq!(config.codec.prefix, "tenant-7");
        assert_eq!(config.decision.strict, StrictSetting::Axes("a".to_string()));
        assert!(!config.decision.audit);
        assert_eq!(config.time.timezone, "Asia/Tehran");
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("warrant.toml"),
            r#"
[decision]
strict = true
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("warrant.local.toml"),
            r#"
[decision]
strict = false
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.decision.strict, StrictSetting::Flag(false));
        assert!(config.decision.audit);
    }

    #[test]
    fn test_invalid_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("warrant.toml"),
            "[time]\ntimezone = \"Nowhere/Special\"\n",
        )
        .expect("Failed to write config");

        assert!(loader(project_dir).load().is_err());
        assert_eq!(
            loader(project_dir).load_or_default(),
            WarrantConfig::default()
        );
    }
}
