use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::item::Classifier;
use crate::shell::ShellArea;

/// Workspace description, loaded from TOML.
///
/// Describes the panel's classification policy and labels, plus the tabs
/// and sessions to materialize in the in-memory shell and session server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub classify: Classifier,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub tabs: Vec<TabConfig>,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    #[serde(default)]
    pub kernel_specs: Vec<KernelSpecConfig>,
}

/// Provider group name overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelsConfig {
    pub open_tabs: Option<String>,
    pub sessions: Option<String>,
}

/// One open tab or panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabConfig {
    pub label: String,
    /// Document path. Tabs with a path are documents and track title changes.
    pub path: Option<String>,
    #[serde(rename = "type", default = "default_tab_type")]
    pub type_tag: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default = "default_area")]
    pub area: ShellArea,
    #[serde(default)]
    pub pinned: bool,
}

fn default_tab_type() -> String {
    "file".to_string()
}

fn default_area() -> ShellArea {
    ShellArea::Main
}

/// One running compute session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub session_type: String,
    /// Kernel spec name.
    pub kernel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSpecConfig {
    pub name: String,
    pub display_name: String,
}

impl WorkspaceConfig {
    /// A small workspace with one item per provider, written by `runpanel init`.
    pub fn starter() -> Self {
        Self {
            tabs: vec![
                TabConfig {
                    label: "Launcher".to_string(),
                    path: None,
                    type_tag: "launcher".to_string(),
                    caption: String::new(),
                    area: ShellArea::Main,
                    pinned: false,
                },
                TabConfig {
                    label: "Untitled.ipynb".to_string(),
                    path: Some("Untitled.ipynb".to_string()),
                    type_tag: "notebook".to_string(),
                    caption: String::new(),
                    area: ShellArea::Main,
                    pinned: false,
                },
            ],
            sessions: vec![SessionConfig {
                path: "Untitled.ipynb".to_string(),
                name: String::new(),
                session_type: "notebook".to_string(),
                kernel: Some("python3".to_string()),
            }],
            kernel_specs: vec![KernelSpecConfig {
                name: "python3".to_string(),
                display_name: "Python 3".to_string(),
            }],
            ..Self::default()
        }
    }

    /// Read a workspace file. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };
        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Write the workspace as TOML, creating parent directories.
    ///
    /// An existing file is only replaced when `overwrite` is set.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<(), ConfigError> {
        if !overwrite && path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Write(path.to_path_buf(), e))?;
        }
        std::fs::write(path, contents).map_err(|e| ConfigError::Write(path.to_path_buf(), e))
    }
}

/// `<config dir>/runpanel/workspace.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("runpanel").join("workspace.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read workspace {}: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse workspace {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to write workspace {}: {}", .0.display(), .1)]
    Write(PathBuf, #[source] std::io::Error),

    #[error("workspace {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to serialize workspace: {0}")]
    Serialize(#[from] toml::ser::Error),
}
