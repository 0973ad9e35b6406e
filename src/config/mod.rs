//! Site configuration management for `loom.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[build]`   | Content roots (templates, assets, data, output)  |
//! | `[data]`    | Programmatic data module runner                  |
//! | `[watch]`   | Incremental rebuild loop                         |
//! | `[serve]`   | Development server (interface, port)             |
//! | `[extra]`   | User-defined fields handed to data modules       |
//!
//! # Example
//!
//! ```toml
//! [build]
//! templates = "templates"
//! output = "dist"
//!
//! [data]
//! runner = ["python3"]
//! suffix = "py"
//!
//! [serve]
//! port = 8000
//!
//! [extra]
//! site_name = "My Site"
//! ```

mod build;
mod data;
pub mod defaults;
mod error;
mod serve;
mod watch;

pub use error::ConfigError;

use build::BuildConfig;
use data::DataConfig;
use serve::ServeConfig;
use watch::WatchConfig;

use crate::cli::Cli;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Default config filename.
pub const CONFIG_FILE: &str = "loom.toml";

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing loom.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Content roots and output layout
    #[serde(default)]
    pub build: BuildConfig,

    /// Programmatic data modules
    #[serde(default)]
    pub data: DataConfig,

    /// Watch loop settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Resolve the project from CLI arguments and load its configuration.
    ///
    /// The project path may be the project directory or the config file itself.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let project = cli.project();
        let (root, config_path) = if project.is_file() {
            let root = project.parent().unwrap_or(Path::new("./")).to_path_buf();
            (root, project.to_path_buf())
        } else {
            (project.to_path_buf(), project.join(CONFIG_FILE))
        };

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else if cli.is_init() {
            Self::default()
        } else {
            return Err(ConfigError::NotFound(normalize_path(&config_path)));
        };

        config.config_path = normalize_path(&config_path);
        if let Some(port) = cli.port() {
            config.serve.port = port;
        }

        Ok(config.with_root(&root))
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Anchor every configured directory at `root` and normalize to absolute paths.
    pub fn with_root(mut self, root: &Path) -> Self {
        let root = normalize_path(root);

        self.build.templates = normalize_path(&root.join(&self.build.templates));
        self.build.assets = normalize_path(&root.join(&self.build.assets));
        self.build.data = normalize_path(&root.join(&self.build.data));
        self.build.output = normalize_path(&root.join(&self.build.output));
        if self.config_path.as_os_str().is_empty() {
            self.config_path = root.join(CONFIG_FILE);
        }

        self.build.root = Some(root);
        self
    }

    /// Directory assets are copied into.
    pub fn asset_output(&self) -> PathBuf {
        self.build.output.join(&self.build.asset_prefix)
    }

    /// Validate configuration before building or watching.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::check_dir("[build.templates]", &self.build.templates)?;
        Self::check_dir("[build.assets]", &self.build.assets)?;

        if self.build.output == self.build.templates || self.build.templates.starts_with(&self.build.output) {
            return Err(ConfigError::Validation(
                "[build.output] must not contain [build.templates]".into(),
            ));
        }

        if self.build.asset_prefix.is_absolute() {
            return Err(ConfigError::Validation(
                "[build.asset_prefix] must be a relative path".into(),
            ));
        }

        if self.data.suffix.is_empty() || self.data.suffix.starts_with('.') {
            return Err(ConfigError::Validation(
                "[data.suffix] must be a non-empty suffix without a leading dot".into(),
            ));
        }

        Self::check_command_installed("[data.runner]", &self.data.runner)?;

        if self.serve.port == 0 {
            return Err(ConfigError::Validation("[serve.port] must be non-zero".into()));
        }

        Ok(())
    }

    fn check_dir(field: &str, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "{field} `{}` not found",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(ConfigError::Validation(format!(
                "{field} `{}` is not a directory",
                path.display()
            )));
        }
        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<(), ConfigError> {
        let Some(cmd) = command.first() else {
            return Err(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd).map_err(|_| {
            ConfigError::Validation(format!("{field}: `{cmd}` not found. Please install it first."))
        })?;

        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists.
///
/// Paths that do not exist (deleted files reported by the watcher) keep
/// working as long as their parent exists.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

// ============================================================================
// Tests
// ============================================================================
