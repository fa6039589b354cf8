//! Create React App detection.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;

use super::jest_config::{find_jest_config, project_name, read_json, ts_config};
use super::{ProjectConfig, RepoKind, WorkspaceInfo};

/// True if `react-scripts` is a dependency or dev dependency.
pub fn is_create_react_app(path: &Path) -> bool {
    let Ok(json) = read_json(&path.join("package.json")) else {
        return false;
    };
    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|field| json.get(field).and_then(Value::as_object))
        .any(|deps| deps.contains_key("react-scripts"))
}

/// A Create React App project runs Jest through its `test` script when one
/// exists, else through `react-scripts` directly.
pub fn parse_create_react_app(path: &Path) -> Result<WorkspaceInfo> {
    let json = read_json(&path.join("package.json"))?;
    let has_test_script = json.get("scripts").and_then(|s| s.get("test")).is_some();
    let jest_command = if has_test_script {
        "npm run test --"
    } else {
        "npx react-scripts test --"
    };

    let project = ProjectConfig::new(project_name(path), path.to_path_buf())
        .with_jest_config(find_jest_config(path))
        .with_jest_command(jest_command)
        .with_ts_config(ts_config(path));

    Ok(WorkspaceInfo::new(path.to_path_buf(), RepoKind::CreateReactApp).with_projects(vec![project]))
}
