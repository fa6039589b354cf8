//! Integration tests for loading, running and file changes through the
//! adapter, with fake parsers and runners.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use jest_test_tree::parser::{Location, ParsedBlock};
use jest_test_tree::runner::results::{AssertionStatus, FileStatus, JestAssertionResult, JestFileResult};
use jest_test_tree::{
    AdapterSettings, FileEvent, JestResponse, JestTestAdapter, LoadEvent, ProjectConfig, ProjectTestLoader,
    Result, RunEvent, TestFileParseResult, TestFileParser, TestFilter, TestRunner, TestState, TestTreeError,
    TreeSitterTestParser,
};
use jest_test_tree::runner::JestTotalResults;

/// Reports one test per file and counts how often it was asked.
struct CountingParser {
    calls: AtomicUsize,
}

impl CountingParser {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl TestFileParser for CountingParser {
    fn parse(&self, file: &Path) -> TestFileParseResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(25));
        TestFileParseResult::Success {
            file: file.to_path_buf(),
            describe_blocks: Vec::new(),
            it_blocks: vec![ParsedBlock::new("works", Location::new(1, 0), Location::new(1, 20))],
        }
    }
}

enum Outcome {
    Results(JestTotalResults),
    Crash,
}

struct FakeRunner {
    outcome: Outcome,
}

impl TestRunner for FakeRunner {
    async fn run(
        &self,
        _project: &ProjectConfig,
        _filter: Option<&TestFilter>,
        _cancel: CancellationToken,
    ) -> Result<JestResponse> {
        match &self.outcome {
            Outcome::Results(results) => Ok(JestResponse::new(results.clone())),
            Outcome::Crash => Err(TestTreeError::Runner("jest exited without output".to_string())),
        }
    }
}

fn write(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("Failed to create dirs");
    fs::write(&path, content).expect("Failed to write file");
    path
}

fn create_project(root: &Path) -> PathBuf {
    write(root, "package.json", r#"{ "name": "app" }"#);
    write(root, "jest.config.json", "{}");
    write(
        root,
        "src/math.test.js",
        "describe('math', () => {\n  it('adds', () => {});\n});\n",
    )
}

fn drain<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Loading Tests
// ============================================================================

mod loading {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_forced_reloads_share_one_scan() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        create_project(temp_dir.path());
        write(temp_dir.path(), "src/other.test.js", "test('x', () => {});\n");
        let parser = CountingParser::new();
        let loader = ProjectTestLoader::new(
            ProjectConfig::new("app", temp_dir.path().to_path_buf()),
            &["node_modules".to_string()],
            parser.clone(),
        )
        .expect("Failed to create loader");

        let (first, second) = tokio::join!(loader.get_test_state(true), loader.get_test_state(true));

        let first = first.expect("load failed");
        let second = second.expect("load failed");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.file_entries().len(), 2);
    }

    #[tokio::test]
    async fn test_load_reports_workspace_without_projects() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let adapter = JestTestAdapter::new(
            temp_dir.path().to_path_buf(),
            AdapterSettings::default(),
            CountingParser::new(),
            FakeRunner {
                outcome: Outcome::Crash,
            },
        );
        let mut load_events = adapter.subscribe_load();

        let suite = adapter.load().await.expect("discovery misses are not errors");

        assert!(suite.is_none());
        let events = drain(&mut load_events);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished {
                suite: None,
                error_message: None
            })
        ));
    }
}

// ============================================================================
// Running Tests
// ============================================================================

mod running {
    use super::*;

    #[tokio::test]
    async fn test_crashed_run_finishes_without_results() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        create_project(temp_dir.path());
        let adapter = JestTestAdapter::new(
            temp_dir.path().to_path_buf(),
            AdapterSettings::default(),
            Arc::new(TreeSitterTestParser::new().expect("Failed to create parser")),
            FakeRunner {
                outcome: Outcome::Crash,
            },
        );
        adapter.load().await.expect("load failed");
        let mut run_events = adapter.subscribe_run();

        adapter.run(&[]).await.expect("run itself does not fail");

        let events = drain(&mut run_events);
        assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
        assert!(matches!(events.last(), Some(RunEvent::Finished)));
        assert!(!events.iter().any(|e| matches!(e, RunEvent::Test { .. })));
    }

    #[tokio::test]
    async fn test_errored_file_marks_its_tests() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = create_project(temp_dir.path());
        let results = JestTotalResults {
            test_results: vec![JestFileResult {
                name: file.to_string_lossy().into_owned(),
                status: FileStatus::Failed,
                message: "Cannot find module './math'\n    at Resolver.resolveModule".to_string(),
                assertion_results: Vec::new(),
            }],
            ..Default::default()
        };
        let adapter = JestTestAdapter::new(
            temp_dir.path().to_path_buf(),
            AdapterSettings::default(),
            Arc::new(TreeSitterTestParser::new().expect("Failed to create parser")),
            FakeRunner {
                outcome: Outcome::Results(results),
            },
        );
        adapter.load().await.expect("load failed");
        let mut run_events = adapter.subscribe_run();

        adapter.run(&["root".to_string()]).await.expect("run failed");

        let errored: Vec<RunEvent> = drain(&mut run_events)
            .into_iter()
            .filter(|e| matches!(e, RunEvent::Test { state: TestState::Errored, .. }))
            .collect();
        assert_eq!(errored.len(), 1);
        let RunEvent::Test { decorations, .. } = &errored[0] else {
            unreachable!();
        };
        assert_eq!(decorations[0].message, "Cannot find module './math'");
        assert_eq!(decorations[0].line, 1);
    }

    #[tokio::test]
    async fn test_passing_run_updates_tree_with_discovered_tests() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = create_project(temp_dir.path());
        let results = JestTotalResults {
            test_results: vec![JestFileResult {
                name: file.to_string_lossy().into_owned(),
                status: FileStatus::Passed,
                message: String::new(),
                assertion_results: vec![JestAssertionResult {
                    title: "adds 1 + 2".to_string(),
                    ancestor_titles: vec!["math".to_string()],
                    full_name: "math adds 1 + 2".to_string(),
                    status: AssertionStatus::Passed,
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        let adapter = JestTestAdapter::new(
            temp_dir.path().to_path_buf(),
            AdapterSettings::default(),
            Arc::new(TreeSitterTestParser::new().expect("Failed to create parser")),
            FakeRunner {
                outcome: Outcome::Results(results),
            },
        );
        adapter.load().await.expect("load failed");

        adapter.run(&[]).await.expect("run failed");

        let state = adapter.manager().current_state();
        let file = state.projects[0].file_entries()[0].as_file().expect("parsed file").clone();
        let labels: Vec<&str> = file.describe_blocks[0].tests.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["adds", "adds 1 + 2"]);
    }
}

// ============================================================================
// File Change Tests
// ============================================================================

mod file_changes {
    use super::*;

    #[tokio::test]
    async fn test_deleting_last_test_file_empties_project() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file = create_project(temp_dir.path());
        let adapter = JestTestAdapter::new(
            temp_dir.path().to_path_buf(),
            AdapterSettings::default(),
            Arc::new(TreeSitterTestParser::new().expect("Failed to create parser")),
            FakeRunner {
                outcome: Outcome::Crash,
            },
        );
        adapter.load().await.expect("load failed");
        let mut load_events = adapter.subscribe_load();

        fs::remove_file(&file).expect("Failed to delete file");
        let changes = adapter
            .handle_file_changes(&[FileEvent::Deleted(file.clone())])
            .await
            .expect("change failed");

        assert_eq!(changes.len(), 1);
        let project = &changes[0].suite().projects[0];
        assert!(project.folders.is_empty());
        assert!(project.files.is_empty());

        // An empty project is hidden, leaving nothing to show.
        let events = drain(&mut load_events);
        assert!(matches!(events.last(), Some(LoadEvent::Finished { suite: None, .. })));
    }
}
