//! Nx workspace parsing.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

use super::jest_config::{read_json, ts_config};
use super::{ProjectConfig, RepoKind, WorkspaceInfo};

/// Builders and executors that run a project's tests with Jest.
const JEST_BUILDERS: &[&str] = &["@nrwl/jest:jest", "@nx/jest:jest"];

/// Workspace description file, `angular.json` or `workspace.json`.
pub fn workspace_file(root: &Path) -> Option<PathBuf> {
    if !root.join("nx.json").exists() {
        return None;
    }
    ["angular.json", "workspace.json"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
}

/// Parse an Nx workspace. Every project whose test target runs Jest becomes
/// a project rooted at its Jest config's directory.
pub fn parse_nx_workspace(root: &Path, jest_command: &str) -> Result<WorkspaceInfo> {
    let mut workspace = WorkspaceInfo::new(root.to_path_buf(), RepoKind::Nx);

    let Some(file) = workspace_file(root) else {
        return Ok(workspace);
    };
    let json = read_json(&file)?;

    if let Some(projects) = json.get("projects").and_then(|v| v.as_object()) {
        for (name, entry) in projects {
            let definition = match entry {
                Value::Object(_) => entry.clone(),
                // Newer layouts point at a directory holding project.json.
                Value::String(dir) => match read_json(&root.join(dir).join("project.json")) {
                    Ok(json) => json,
                    Err(e) => {
                        debug!("Skipping Nx project {}: {}", name, e);
                        continue;
                    }
                },
                _ => continue,
            };

            if let Some(project) = parse_nx_project(root, name, &definition, jest_command) {
                workspace.projects.push(project);
            }
        }
    }

    workspace.projects.sort_by(|a, b| a.project_name.cmp(&b.project_name));
    Ok(workspace)
}

fn parse_nx_project(root: &Path, name: &str, definition: &Value, jest_command: &str) -> Option<ProjectConfig> {
    let test = definition
        .get("architect")
        .or_else(|| definition.get("targets"))?
        .get("test")?;

    let builder = test
        .get("builder")
        .or_else(|| test.get("executor"))
        .and_then(|v| v.as_str())?;
    if !JEST_BUILDERS.contains(&builder) {
        return None;
    }

    let options = test.get("options")?;
    let jest_config = root.join(options.get("jestConfig")?.as_str()?);
    let project_root = jest_config.parent()?.to_path_buf();
    let resolve = |key: &str| options.get(key).and_then(|v| v.as_str()).map(|p| root.join(p));

    Some(
        ProjectConfig::new(name, project_root.clone())
            .with_jest_config(Some(jest_config))
            .with_jest_command(jest_command)
            .with_execution_directory(root.to_path_buf())
            .with_setup_file(resolve("setupFile"))
            .with_ts_config(resolve("tsConfig").or_else(|| ts_config(&project_root))),
    )
}
