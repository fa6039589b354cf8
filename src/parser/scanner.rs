use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, TestTreeError};
use crate::workspace::{JestSettings, ProjectConfig};

use super::{FileType, TestFileParseResult, TestFileParser, TestMatcher};

/// Finds and parses the test files of one project.
pub struct ProjectScanner {
    root: PathBuf,
    jest_config: Option<PathBuf>,
    matcher: TestMatcher,
    ignore_globs: Vec<String>,
}

impl ProjectScanner {
    pub fn new(project: &ProjectConfig, ignore_globs: &[String]) -> Result<Self> {
        let settings = JestSettings::load(&project.root_path, project.jest_config.as_deref())?;
        Self::with_settings(project, &settings, ignore_globs)
    }

    pub fn with_settings(project: &ProjectConfig, settings: &JestSettings, ignore_globs: &[String]) -> Result<Self> {
        Ok(Self {
            root: project.root_path.clone(),
            jest_config: project.jest_config.clone(),
            matcher: TestMatcher::new(settings, &project.root_path)?,
            ignore_globs: ignore_globs.to_vec(),
        })
    }

    pub fn classify(&self, path: &Path) -> FileType {
        self.matcher.classify(path, &self.root, self.jest_config.as_deref())
    }

    /// Test files under the project root, sorted.
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for glob in &self.ignore_globs {
            overrides
                .add(&format!("!{}", glob))
                .map_err(|e| TestTreeError::InvalidPattern(format!("{}: {}", glob, e)))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| TestTreeError::InvalidPattern(e.to_string()))?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .overrides(overrides)
            .build();

        let mut files: Vec<PathBuf> = walker
            .flatten()
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file() && self.matcher.is_test_file(path))
            .collect();
        files.sort();

        Ok(files)
    }

    /// Parses every test file in parallel. Results keep the walk order.
    pub fn scan<P: TestFileParser + ?Sized>(&self, parser: &P) -> Result<Vec<TestFileParseResult>> {
        let files = self.walk()?;
        debug!("Parsing {} test files under {}", files.len(), self.root.display());

        Ok(files.par_iter().map(|file| parser.parse(file)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    use crate::parser::TreeSitterTestParser;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn scanner(root: &Path) -> ProjectScanner {
        let project = ProjectConfig::new("app", root.to_path_buf());
        ProjectScanner::with_settings(&project, &JestSettings::default(), &["node_modules".to_string()]).unwrap()
    }

    #[test]
    fn test_walk_finds_only_test_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/app.js", "export const a = 1;");
        create_file(temp_dir.path(), "src/app.test.js", "test('a', () => {});");
        create_file(temp_dir.path(), "src/deep/view.spec.tsx", "it('renders', () => {});");
        create_file(temp_dir.path(), "src/__tests__/util.ts", "test('u', () => {});");
        create_file(temp_dir.path(), "README.md", "# app");

        let files = scanner(temp_dir.path()).walk().unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.starts_with(temp_dir.path())));
        assert!(!files.iter().any(|f| f.ends_with("src/app.js")));
    }

    #[test]
    fn test_walk_skips_ignore_globs() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "node_modules/lib/lib.test.js", "test('x', () => {});");
        create_file(temp_dir.path(), "src/a.test.js", "test('a', () => {});");

        let files = scanner(temp_dir.path()).walk().unwrap();

        assert_eq!(files, vec![temp_dir.path().join("src/a.test.js")]);
    }

    #[test]
    fn test_scan_parses_matches() {
        let temp_dir = TempDir::new().unwrap();
        create_file(
            temp_dir.path(),
            "src/sum.test.js",
            "describe('sum', () => {\n  it('adds', () => {});\n});\n",
        );
        create_file(temp_dir.path(), "src/broken.test.js", "describe('x', () => {\n");

        let parser = TreeSitterTestParser::new().unwrap();
        let results = scanner(temp_dir.path()).scan(&parser).unwrap();

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scanner(temp_dir.path()).walk().unwrap().is_empty());
    }
}
