//! Workspace type detection.

use std::path::Path;

use tracing::info;

use crate::error::Result;

use super::jest_config::{find_jest_config, project_name, setup_file, ts_config};
use super::{npm, nx, react, ProjectConfig, RepoKind, WorkspaceInfo};

/// Detects workspace type and parses workspace configuration
pub struct WorkspaceDetector;

impl WorkspaceDetector {
    /// Detect how the workspace at `path` is organised. Layouts are tried in
    /// a fixed order and the first match wins.
    pub fn detect(path: &Path) -> Option<RepoKind> {
        if nx::workspace_file(path).is_some() {
            return Some(RepoKind::Nx);
        }

        if npm::is_npm_workspace(path) {
            return Some(RepoKind::NpmWorkspace);
        }

        if react::is_create_react_app(path) {
            return Some(RepoKind::CreateReactApp);
        }

        if path.join("package.json").exists() && find_jest_config(path).is_some() {
            return Some(RepoKind::Standard);
        }

        None
    }

    /// Parse workspace information at the given path. `None` means no known
    /// layout matched, which leaves the workspace empty rather than failing.
    pub fn parse(path: &Path, jest_command: &str) -> Result<Option<WorkspaceInfo>> {
        let Some(kind) = Self::detect(path) else {
            info!("No Jest project layout recognised in {}", path.display());
            return Ok(None);
        };
        info!("Detected {} workspace at {}", kind.as_str(), path.display());

        let workspace = match kind {
            RepoKind::Nx => nx::parse_nx_workspace(path, jest_command)?,
            RepoKind::NpmWorkspace => npm::parse_npm_workspace(path, jest_command)?,
            RepoKind::CreateReactApp => react::parse_create_react_app(path)?,
            RepoKind::Standard => parse_standard(path, jest_command),
        };
        Ok(Some(workspace))
    }

    /// Project owning `file_path`, preferring the deepest matching root.
    pub fn find_project_for_path<'a>(workspace: &'a WorkspaceInfo, file_path: &Path) -> Option<&'a ProjectConfig> {
        workspace
            .projects
            .iter()
            .filter(|p| p.contains(file_path))
            .max_by_key(|p| p.root_path.components().count())
    }
}

fn parse_standard(path: &Path, jest_command: &str) -> WorkspaceInfo {
    let jest_config = find_jest_config(path);
    let setup = setup_file(jest_config.as_deref());

    let project = ProjectConfig::new(project_name(path), path.to_path_buf())
        .with_jest_config(jest_config)
        .with_jest_command(jest_command)
        .with_setup_file(setup)
        .with_ts_config(ts_config(path));

    WorkspaceInfo::new(path.to_path_buf(), RepoKind::Standard).with_projects(vec![project])
}
