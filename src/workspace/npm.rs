//! NPM/Yarn/pnpm workspace parsing.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::jest_config::{find_jest_config, has_jest_config, project_name, read_json, setup_file, ts_config};
use super::{ProjectConfig, RepoKind, WorkspaceInfo};

/// True if `package.json` declares workspaces or `pnpm-workspace.yaml` exists.
pub fn is_npm_workspace(path: &Path) -> bool {
    if path.join("pnpm-workspace.yaml").exists() {
        return true;
    }
    read_json(&path.join("package.json"))
        .map(|json| json.get("workspaces").is_some())
        .unwrap_or(false)
}

/// Parse an NPM workspace. Each member package that owns a Jest config
/// becomes a project.
pub fn parse_npm_workspace(path: &Path, jest_command: &str) -> Result<WorkspaceInfo> {
    let mut workspace = WorkspaceInfo::new(path.to_path_buf(), RepoKind::NpmWorkspace);
    let mut packages = Vec::new();

    // Try package.json first
    let package_json_path = path.join("package.json");
    if package_json_path.exists() {
        let json = read_json(&package_json_path)?;
        if let Some(workspaces) = json.get("workspaces") {
            for pattern in extract_workspace_patterns(workspaces) {
                packages.extend(expand_npm_glob_pattern(path, &pattern));
            }
        }
    }

    // Also check pnpm-workspace.yaml
    let pnpm_workspace_path = path.join("pnpm-workspace.yaml");
    if pnpm_workspace_path.exists() && packages.is_empty() {
        let content = std::fs::read_to_string(&pnpm_workspace_path)?;
        // Simple YAML parsing for packages field
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(item) = trimmed.strip_prefix("- ") {
                let pattern = item.trim().trim_matches(|c| c == '\'' || c == '"');
                packages.extend(expand_npm_glob_pattern(path, pattern));
            }
        }
    }

    packages.sort();
    packages.dedup();
    workspace.projects = packages
        .iter()
        .filter(|pkg| has_jest_config(pkg))
        .map(|pkg| package_project(pkg, jest_command))
        .collect();

    Ok(workspace)
}

fn package_project(pkg_path: &Path, jest_command: &str) -> ProjectConfig {
    let jest_config = find_jest_config(pkg_path);
    let setup = setup_file(jest_config.as_deref());

    ProjectConfig::new(project_name(pkg_path), pkg_path.to_path_buf())
        .with_jest_config(jest_config)
        .with_jest_command(jest_command)
        .with_setup_file(setup)
        .with_ts_config(ts_config(pkg_path))
}

fn extract_workspace_patterns(workspaces: &serde_json::Value) -> Vec<String> {
    match workspaces {
        serde_json::Value::Array(arr) => arr.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        serde_json::Value::Object(obj) => {
            // yarn workspaces format: { "packages": [...] }
            if let Some(packages) = obj.get("packages") {
                extract_workspace_patterns(packages)
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn expand_npm_glob_pattern(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let mut results = Vec::new();

    // Handle patterns like "packages/*" or "apps/*"
    if let Some(base) = pattern.strip_suffix("/*") {
        let base_path = root.join(base);
        if let Ok(entries) = std::fs::read_dir(&base_path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() && path.join("package.json").exists() {
                    results.push(path);
                }
            }
        }
    } else if let Some(base) = pattern.strip_suffix("/**") {
        collect_npm_packages(&root.join(base), &mut results);
    } else if !pattern.contains('*') {
        let path = root.join(pattern);
        if path.join("package.json").exists() {
            results.push(path);
        }
    }

    results
}

fn collect_npm_packages(dir: &Path, results: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if path.join("package.json").exists() {
                    results.push(path.clone());
                }
                // Recurse (but not into node_modules)
                if path.file_name().map_or(true, |n| n != "node_modules") {
                    collect_npm_packages(&path, results);
                }
            }
        }
    }
}
