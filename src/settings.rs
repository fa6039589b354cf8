//! Adapter settings read from `.jest-test-tree.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TestTreeError};

pub const SETTINGS_FILE_NAME: &str = ".jest-test-tree.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSettings {
    /// Leave projects without any test file out of the displayed tree.
    #[serde(default = "default_true")]
    pub hide_empty_projects: bool,
    /// Jest executable; auto-detected when unset.
    #[serde(default)]
    pub path_to_jest: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_ignore_globs")]
    pub ignore_globs: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_ignore_globs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            hide_empty_projects: true,
            path_to_jest: None,
            debounce_ms: default_debounce_ms(),
            ignore_globs: default_ignore_globs(),
        }
    }
}

impl AdapterSettings {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| TestTreeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Settings file in the workspace root.
    pub fn load_for_workspace(workspace: &Path) -> Result<Self> {
        Self::load(&workspace.join(SETTINGS_FILE_NAME))
    }

    /// Configured Jest command, else the local install, else `jest`.
    pub fn jest_command(&self, workspace: &Path) -> String {
        match &self.path_to_jest {
            Some(path) => path.clone(),
            None => path_to_jest(workspace),
        }
    }
}

fn local_jest_executable(workspace: &Path) -> PathBuf {
    let bin = workspace.join("node_modules").join(".bin");
    if cfg!(windows) {
        bin.join("jest.cmd")
    } else {
        bin.join("jest")
    }
}

/// Local `node_modules/.bin/jest` if installed, else the global `jest`.
pub fn path_to_jest(workspace: &Path) -> String {
    let local = local_jest_executable(workspace);
    if local.exists() {
        local.to_string_lossy().into_owned()
    } else {
        "jest".to_string()
    }
}
