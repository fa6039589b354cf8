//! Reading the parts of a Jest configuration the tree needs.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TestTreeError};

/// Config file names Jest looks for, in its own lookup order.
pub const JEST_CONFIG_NAMES: &[&str] = &[
    "jest.config.js",
    "jest.config.ts",
    "jest.config.mjs",
    "jest.config.cjs",
    "jest.config.json",
];

/// Jest's built-in `testMatch`.
pub const DEFAULT_TEST_MATCH: &[&str] = &["**/__tests__/**/*.[jt]s?(x)", "**/?(*.)+(spec|test).[jt]s?(x)"];

/// Test-file selection settings of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JestSettings {
    pub test_regex: Vec<String>,
    pub test_match: Vec<String>,
}

impl Default for JestSettings {
    fn default() -> Self {
        Self {
            test_regex: Vec::new(),
            test_match: DEFAULT_TEST_MATCH.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl JestSettings {
    /// Reads `testRegex` (string or array) and `testMatch` from a config object.
    pub fn from_value(config: &Value) -> Self {
        let mut settings = Self::default();

        match config.get("testRegex") {
            Some(Value::String(regex)) => settings.test_regex = vec![regex.clone()],
            Some(Value::Array(regexes)) => settings.test_regex = string_array(regexes),
            _ => {}
        }

        if let Some(Value::Array(patterns)) = config.get("testMatch") {
            let patterns = string_array(patterns);
            if !patterns.is_empty() {
                settings.test_match = patterns;
            }
        }

        settings
    }

    /// Loads settings for a project rooted at `root`.
    ///
    /// JSON configs are read directly; a `jest` key in `package.json` is used
    /// next. Configs written in JavaScript or TypeScript are not evaluated, so
    /// Jest's defaults apply for them.
    pub fn load(root: &Path, jest_config: Option<&Path>) -> Result<Self> {
        if let Some(config) = jest_config {
            if config.extension().and_then(|e| e.to_str()) == Some("json") {
                return Ok(Self::from_value(&read_json(config)?));
            }
            debug!("Not evaluating {}; using default test patterns", config.display());
        }

        let package_json = root.join("package.json");
        if package_json.exists() {
            if let Some(config) = read_json(&package_json)?.get("jest") {
                return Ok(Self::from_value(config));
            }
        }

        Ok(Self::default())
    }

    pub fn uses_regex(&self) -> bool {
        !self.test_regex.is_empty()
    }
}

fn string_array(values: &[Value]) -> Vec<String> {
    values.iter().filter_map(|v| v.as_str().map(String::from)).collect()
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| TestTreeError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// First Jest config file found directly in `dir`.
pub fn find_jest_config(dir: &Path) -> Option<PathBuf> {
    JEST_CONFIG_NAMES.iter().map(|name| dir.join(name)).find(|p| p.exists())
}

/// True if `dir` has a Jest config file or a `jest` key in `package.json`.
pub fn has_jest_config(dir: &Path) -> bool {
    find_jest_config(dir).is_some()
        || read_json(&dir.join("package.json"))
            .map(|json| json.get("jest").is_some())
            .unwrap_or(false)
}

/// `displayName` or `name` from `package.json`, else `"default"`.
pub fn project_name(dir: &Path) -> String {
    let package_json = dir.join("package.json");
    if !package_json.exists() {
        return "default".to_string();
    }

    match read_json(&package_json) {
        Ok(json) => json
            .get("displayName")
            .or_else(|| json.get("name"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| "default".to_string()),
        Err(e) => {
            warn!("{}", e);
            "default".to_string()
        }
    }
}

pub fn ts_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join("tsconfig.json");
    path.exists().then_some(path)
}

/// First `setupFiles` entry, else first `setupFilesAfterEnv` entry, of a
/// JSON Jest config. `<rootDir>` and relative paths resolve against the
/// config's directory.
pub fn setup_file(jest_config: Option<&Path>) -> Option<PathBuf> {
    let config = jest_config?;
    if config.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }

    let json = match read_json(config) {
        Ok(json) => json,
        Err(e) => {
            warn!("Error reading Jest setup file from {}: {}", config.display(), e);
            return None;
        }
    };

    let first = |key: &str| {
        json.get(key)
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
            .map(String::from)
    };
    let entry = first("setupFiles").or_else(|| first("setupFilesAfterEnv"))?;

    let base = config.parent().unwrap_or_else(|| Path::new(""));
    let entry = entry.replace("<rootDir>", &base.to_string_lossy());
    let path = PathBuf::from(&entry);
    Some(if path.is_absolute() { path } else { base.join(path) })
}
