//! Project discovery.
//!
//! This module detects how a workspace is organised and which directories
//! own a Jest project:
//! - Nx workspaces (`angular.json` / `workspace.json` with `nx.json`)
//! - NPM/Yarn/pnpm workspaces
//! - Create React App projects
//! - Standard projects (`package.json` with a Jest config)

pub mod detector;
pub mod jest_config;
pub mod npm;
pub mod nx;
pub mod react;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use detector::WorkspaceDetector;
pub use jest_config::JestSettings;

/// Everything needed to load and run one Jest project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name; also the id of its root node.
    pub project_name: String,
    /// Directory scanned for test files.
    pub root_path: PathBuf,
    pub jest_config: Option<PathBuf>,
    /// Command line that starts Jest, split on whitespace when spawned.
    pub jest_command: String,
    /// Working directory for Jest runs.
    pub jest_execution_directory: PathBuf,
    pub setup_file: Option<PathBuf>,
    pub ts_config: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn new(project_name: impl Into<String>, root_path: PathBuf) -> Self {
        Self {
            project_name: project_name.into(),
            jest_execution_directory: root_path.clone(),
            root_path,
            jest_config: None,
            jest_command: "jest".to_string(),
            setup_file: None,
            ts_config: None,
        }
    }

    pub fn with_jest_config(mut self, jest_config: Option<PathBuf>) -> Self {
        self.jest_config = jest_config;
        self
    }

    pub fn with_jest_command(mut self, jest_command: impl Into<String>) -> Self {
        self.jest_command = jest_command.into();
        self
    }

    pub fn with_execution_directory(mut self, directory: PathBuf) -> Self {
        self.jest_execution_directory = directory;
        self
    }

    pub fn with_setup_file(mut self, setup_file: Option<PathBuf>) -> Self {
        self.setup_file = setup_file;
        self
    }

    pub fn with_ts_config(mut self, ts_config: Option<PathBuf>) -> Self {
        self.ts_config = ts_config;
        self
    }

    /// True if `path` lies inside this project's root.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root_path)
    }
}

/// How a workspace is organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepoKind {
    Nx,
    NpmWorkspace,
    CreateReactApp,
    Standard,
}

impl RepoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Nx => "nx",
            RepoKind::NpmWorkspace => "npm_workspace",
            RepoKind::CreateReactApp => "create_react_app",
            RepoKind::Standard => "standard",
        }
    }
}

/// A detected workspace and its Jest projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub root_path: PathBuf,
    pub kind: RepoKind,
    pub projects: Vec<ProjectConfig>,
}

impl WorkspaceInfo {
    pub fn new(root_path: PathBuf, kind: RepoKind) -> Self {
        Self {
            root_path,
            kind,
            projects: Vec::new(),
        }
    }

    pub fn with_projects(mut self, projects: Vec<ProjectConfig>) -> Self {
        self.projects = projects;
        self
    }

    pub fn get_project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.project_name == name)
    }

    pub fn project_names(&self) -> Vec<&str> {
        self.projects.iter().map(|p| p.project_name.as_str()).collect()
    }
}
