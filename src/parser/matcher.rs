//! Decides which files are tests and how other changed files are treated.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::Serialize;

use crate::error::{Result, TestTreeError};
use crate::workspace::jest_config::{JestSettings, JEST_CONFIG_NAMES};

/// Source extensions whose changes can affect test outcomes.
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Files that configure how tests run rather than what they test.
const CONFIG_FILE_NAMES: &[&str] = &["package.json", ".jest-test-tree.json", "babel.config.js", ".babelrc"];

/// How a changed file relates to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    Test,
    Config,
    App,
    Other,
}

/// Test-file rule of one project. A non-empty `testRegex` wins over
/// `testMatch`; only one is ever consulted.
#[derive(Debug, Clone)]
pub enum TestMatcher {
    Regex(Vec<Regex>),
    Glob { root: PathBuf, patterns: Vec<Pattern> },
}

impl TestMatcher {
    pub fn new(settings: &JestSettings, root: &Path) -> Result<Self> {
        if settings.uses_regex() {
            let regexes = settings
                .test_regex
                .iter()
                .map(|r| Regex::new(r).map_err(|e| TestTreeError::InvalidPattern(format!("{}: {}", r, e))))
                .collect::<Result<Vec<_>>>()?;
            return Ok(TestMatcher::Regex(regexes));
        }

        let root_dir = normalize(root);
        let mut patterns = Vec::new();
        for pattern in &settings.test_match {
            let pattern = pattern.replace("<rootDir>", &root_dir);
            for expanded in expand_extglob(&pattern) {
                let compiled = Pattern::new(&expanded)
                    .map_err(|e| TestTreeError::InvalidPattern(format!("{}: {}", pattern, e)))?;
                patterns.push(compiled);
            }
        }

        Ok(TestMatcher::Glob {
            root: root.to_path_buf(),
            patterns,
        })
    }

    /// Regexes test the absolute path, as Jest does. Globs test the path
    /// relative to the project root, or the absolute path when the pattern
    /// itself is absolute.
    pub fn is_test_file(&self, path: &Path) -> bool {
        match self {
            TestMatcher::Regex(regexes) => {
                let path = normalize(path);
                regexes.iter().any(|r| r.is_match(&path))
            }
            TestMatcher::Glob { root, patterns } => {
                let options = MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                };
                let absolute = normalize(path);
                let relative = path.strip_prefix(root).map(normalize).ok();

                patterns.iter().any(|pattern| {
                    if pattern.as_str().starts_with('/') {
                        pattern.matches_with(&absolute, options)
                    } else {
                        relative.as_deref().is_some_and(|r| pattern.matches_with(r, options))
                    }
                })
            }
        }
    }

    /// Classifies a changed path: tests first, then configuration, then any
    /// other source file inside the project.
    pub fn classify(&self, path: &Path, root: &Path, jest_config: Option<&Path>) -> FileType {
        if !path.starts_with(root) {
            return FileType::Other;
        }
        if path.components().any(|c| c.as_os_str() == "node_modules") {
            return FileType::Other;
        }
        if self.is_test_file(path) {
            return FileType::Test;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let is_ts_config = file_name.starts_with("tsconfig") && file_name.ends_with(".json");
        if jest_config == Some(path)
            || is_ts_config
            || JEST_CONFIG_NAMES.contains(&file_name)
            || CONFIG_FILE_NAMES.contains(&file_name)
        {
            return FileType::Config;
        }

        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if is_source {
            FileType::App
        } else {
            FileType::Other
        }
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Expands micromatch extglobs (`?(x)`, `*(x)`, `+(a|b)`, `@(a|b)`) and
/// brace sets (`{a,b}`) into plain globs. `+(..)` is taken as exactly one
/// occurrence, which covers Jest's own defaults.
pub fn expand_extglob(pattern: &str) -> Vec<String> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (open, optional, separator) = match bytes[i] {
            b'?' | b'*' | b'+' | b'@' if bytes.get(i + 1) == Some(&b'(') => (i + 1, matches!(bytes[i], b'?' | b'*'), '|'),
            b'{' => (i, false, ','),
            _ => {
                i += 1;
                continue;
            }
        };

        let Some(close) = matching_close(pattern, open) else {
            return vec![pattern.to_string()];
        };

        let prefix = &pattern[..i];
        let inner = &pattern[open + 1..close];
        let suffix = &pattern[close + 1..];

        let mut alternatives = split_top_level(inner, separator);
        if optional {
            alternatives.insert(0, String::new());
        }

        return alternatives
            .iter()
            .flat_map(|alt| expand_extglob(&format!("{}{}{}", prefix, alt, suffix)))
            .collect();
    }
    vec![pattern.to_string()]
}

fn matching_close(pattern: &str, open: usize) -> Option<usize> {
    let (open_char, close_char) = match pattern.as_bytes()[open] {
        b'(' => (b'(', b')'),
        _ => (b'{', b'}'),
    };
    let mut depth = 0;
    for (offset, byte) in pattern.as_bytes()[open..].iter().enumerate() {
        if *byte == open_char {
            depth += 1;
        } else if *byte == close_char {
            depth -= 1;
            if depth == 0 {
                return Some(open + offset);
            }
        }
    }
    None
}

fn split_top_level(inner: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            _ => {}
        }
        if c == separator && depth == 0 {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}
