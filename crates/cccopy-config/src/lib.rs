//! Project configuration for CCCopy
//!
//! Loads the project template — a small INI file describing the shared
//! Production tree, the per-user Work tree, the source/exclude pattern
//! lists and the upload group — into an immutable [`ProjectConfig`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cccopy_config::ProjectConfig;
//!
//! let config = ProjectConfig::load("project/alpha.ini").expect("template");
//! println!("production tree: {}", config.production_dir.display());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod error;
pub mod expand;
pub mod template;

pub use error::{ConfigError, ConfigResult};
pub use expand::expand_value;
pub use template::Template;

/// Immutable per-session project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Shared multi-user Production tree
    pub production_dir: PathBuf,
    /// Per-user Work tree
    pub working_dir: PathBuf,
    /// Ordered include globs
    pub sources: Vec<String>,
    /// Ordered exclude globs
    pub excludes: Vec<String>,
    /// OS group granting write access on Production, if configured
    pub upload_group: Option<String>,
    /// Numeric project identifier used in the per-user settings path
    pub project_id: u32,
    /// Rotating backups to keep per uploaded file (0 = none)
    pub backup_count: u32,
    /// Log file path from the template, consumed by the log collaborator
    pub log_path: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load and validate a project template file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let template = Template::load(path.as_ref())?;
        Self::from_template(&template)
    }

    /// Build a configuration from an already parsed template.
    pub fn from_template(template: &Template) -> ConfigResult<Self> {
        let production_dir = required_path(template, "PRODUCTION_DIR")?;
        let working_dir = required_path(template, "WORKING_DIR")?;
        let project_id = template
            .get("CONFIG", "PROJECT_ID")
            .ok_or_else(|| ConfigError::missing_required("CONFIG.PROJECT_ID"))?
            .parse::<u32>()
            .map_err(|e| ConfigError::invalid_value("CONFIG.PROJECT_ID".into(), e.to_string()))?;

        let sources = template.numbered_values("SOURCES");
        if sources.is_empty() {
            return Err(ConfigError::missing_required("SOURCES"));
        }
        let excludes = template.numbered_values("EXCLUDES");

        let upload_group = template.get("UPLOAD", "GROUP").map(str::to_string);
        let backup_count = match template.get("UPLOAD", "BACKUP_COUNT") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::invalid_value("UPLOAD.BACKUP_COUNT".into(), e.to_string())
            })?,
            None => 0,
        };
        let log_path = match template.get("LOG", "PATH") {
            Some(raw) => Some(PathBuf::from(expand_value(raw)?)),
            None => None,
        };

        debug!(
            production = %production_dir.display(),
            working = %working_dir.display(),
            sources = sources.len(),
            excludes = excludes.len(),
            "Project template loaded"
        );

        Ok(Self {
            production_dir,
            working_dir,
            sources,
            excludes,
            upload_group,
            project_id,
            backup_count,
            log_path,
        })
    }

    /// Per-user settings directory for this project:
    /// `<home>/.cccopy/<project_id>/`.
    pub fn settings_dir(&self) -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| ConfigError::expansion("~".to_string(), "HOME is not set".to_string()))?;
        Ok(PathBuf::from(home)
            .join(".cccopy")
            .join(self.project_id.to_string()))
    }

    /// Per-user settings INI path for this project.
    pub fn settings_file(&self) -> ConfigResult<PathBuf> {
        Ok(self.settings_dir()?.join("config.ini"))
    }
}

fn required_path(template: &Template, key: &str) -> ConfigResult<PathBuf> {
    let raw = template
        .get("CONFIG", key)
        .ok_or_else(|| ConfigError::missing_required(format!("CONFIG.{key}")))?;
    Ok(PathBuf::from(expand_value(raw)?))
}
