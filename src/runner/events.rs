//! Maps a finished run onto per-test state events.

use std::path::Path;

use serde::Serialize;

use crate::tree::id::assertion_test_id;
use crate::tree::search::{all_tests, find_file};
use crate::tree::{FileEntry, ProjectRootNode};

use super::results::{AssertionStatus, FileStatus, JestAssertionResult, JestFileResult, TestReconciler};
use super::JestResponse;

const UNKNOWN_MESSAGE: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TestState {
    Running,
    Passed,
    Failed,
    Skipped,
    Errored,
    Completed,
}

impl From<AssertionStatus> for TestState {
    fn from(status: AssertionStatus) -> Self {
        match status {
            AssertionStatus::Passed => TestState::Passed,
            AssertionStatus::Failed => TestState::Failed,
            AssertionStatus::Pending | AssertionStatus::Skipped | AssertionStatus::Todo | AssertionStatus::Disabled => {
                TestState::Skipped
            }
            AssertionStatus::Unknown => TestState::Errored,
        }
    }
}

/// A message pinned to a source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDecoration {
    /// Zero-based.
    pub line: u32,
    pub message: String,
    pub hover: Option<String>,
}

/// Outcome of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEvent {
    pub test: String,
    pub state: TestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<TestDecoration>,
}

/// One event per reported assertion of `tree`'s project.
///
/// Jest reports a file that failed to run (syntax error, failing import) as
/// a non-passed file without assertions; every test the tree knows in that
/// file is then marked errored with the file's message.
pub fn map_results_to_test_events(response: &JestResponse, tree: &ProjectRootNode) -> Vec<TestEvent> {
    response
        .results
        .test_results
        .iter()
        .flat_map(|file| {
            if file.status == FileStatus::Passed || !file.assertion_results.is_empty() {
                file.assertion_results
                    .iter()
                    .map(|assertion| assertion_event(assertion, file, &response.reconciler, &tree.id))
                    .collect()
            } else {
                errored_file_events(file, tree)
            }
        })
        .collect()
}

fn assertion_event(
    assertion: &JestAssertionResult,
    file: &JestFileResult,
    reconciler: &TestReconciler,
    project_id: &str,
) -> TestEvent {
    TestEvent {
        test: assertion_test_id(project_id, &file.name, &assertion.ancestor_titles, &assertion.title),
        state: assertion.status.into(),
        message: assertion.failure_message(),
        decorations: assertion_decorations(assertion, &file.name, reconciler),
    }
}

fn errored_file_events(file: &JestFileResult, tree: &ProjectRootNode) -> Vec<TestEvent> {
    let Some(FileEntry::File(node)) = find_file(tree, Path::new(&file.name)) else {
        return Vec::new();
    };

    let message = (!file.message.is_empty()).then(|| file.message.clone());
    all_tests(node)
        .into_iter()
        .map(|test| TestEvent {
            test: test.id.clone(),
            state: TestState::Errored,
            message: message.clone(),
            decorations: vec![TestDecoration {
                line: test.line.unwrap_or(0),
                message: message.as_deref().map(first_line).unwrap_or(UNKNOWN_MESSAGE).to_string(),
                hover: message.clone(),
            }],
        })
        .collect()
}

/// Decoration for a failed assertion, placed on the line the reconciler
/// found for it.
pub fn assertion_decorations(
    assertion: &JestAssertionResult,
    file: &str,
    reconciler: &TestReconciler,
) -> Vec<TestDecoration> {
    let Some(status) = reconciler
        .assertions_for_test_file(file)
        .and_then(|assertions| assertions.iter().find(|a| a.title == assertion.title))
    else {
        return Vec::new();
    };

    let Some(line) = status.line.filter(|l| *l > 0) else {
        return Vec::new();
    };
    if status.message.is_empty() {
        return Vec::new();
    }

    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());
    let hover = non_empty(&status.short_message)
        .or_else(|| non_empty(&status.terse_message))
        .unwrap_or_else(|| status.message.clone());
    let message = non_empty(&status.terse_message)
        .or_else(|| status.short_message.as_deref().map(|s| first_line(s).to_string()))
        .unwrap_or_else(|| first_line(&status.message).to_string());

    vec![TestDecoration {
        line: line - 1,
        message,
        hover: Some(hover),
    }]
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Location, ParsedBlock, TestFileParseResult};
    use crate::runner::results::JestTotalResults;
    use crate::tree::create_project_tree;
    use crate::tree::test_support::project_config;
    use std::path::PathBuf;

    fn tree() -> ProjectRootNode {
        let results = vec![TestFileParseResult::Success {
            file: PathBuf::from("/r/a.test.js"),
            describe_blocks: vec![ParsedBlock::new("math", Location::new(1, 0), Location::new(10, 2))],
            it_blocks: vec![
                ParsedBlock::new("adds", Location::new(2, 2), Location::new(4, 4)),
                ParsedBlock::new("subtracts", Location::new(5, 2), Location::new(7, 4)),
            ],
        }];
        create_project_tree(project_config("app", "/r"), &results)
    }

    fn response(file: JestFileResult) -> JestResponse {
        JestResponse::new(JestTotalResults {
            test_results: vec![file],
            ..Default::default()
        })
    }

    #[test]
    fn test_assertions_map_to_tree_ids() {
        let response = response(JestFileResult {
            name: "/r/a.test.js".to_string(),
            status: FileStatus::Failed,
            assertion_results: vec![
                JestAssertionResult {
                    title: "adds".to_string(),
                    ancestor_titles: vec!["math".to_string()],
                    status: AssertionStatus::Passed,
                    ..Default::default()
                },
                JestAssertionResult {
                    title: "subtracts".to_string(),
                    ancestor_titles: vec!["math".to_string()],
                    status: AssertionStatus::Failed,
                    failure_messages: vec![
                        "Error: boom\n    at Object.<anonymous> (/r/a.test.js:6:5)".to_string(),
                    ],
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        let events = map_results_to_test_events(&response, &tree());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].test, "app::/r/a.test.js@@math$$adds");
        assert_eq!(events[0].state, TestState::Passed);
        assert!(events[0].decorations.is_empty());

        let failed = &events[1];
        assert_eq!(failed.state, TestState::Failed);
        assert_eq!(failed.message.as_deref(), Some("Error: boom\n    at Object.<anonymous> (/r/a.test.js:6:5)"));
        assert_eq!(
            failed.decorations,
            vec![TestDecoration {
                line: 5,
                message: "Error: boom".to_string(),
                hover: Some("Error: boom".to_string()),
            }]
        );
    }

    #[test]
    fn test_errored_file_marks_every_known_test() {
        let response = response(JestFileResult {
            name: "/r/a.test.js".to_string(),
            status: FileStatus::Failed,
            message: "Cannot find module './sum'\nRequire stack: ...".to_string(),
            assertion_results: Vec::new(),
        });

        let events = map_results_to_test_events(&response, &tree());

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.state == TestState::Errored));
        assert_eq!(events[0].decorations[0].message, "Cannot find module './sum'");
        assert_eq!(events[0].decorations[0].line, 1);
    }

    #[test]
    fn test_errored_file_outside_tree_is_ignored() {
        let response = response(JestFileResult {
            name: "/elsewhere/b.test.js".to_string(),
            status: FileStatus::Failed,
            ..Default::default()
        });
        assert!(map_results_to_test_events(&response, &tree()).is_empty());
    }

    #[test]
    fn test_skipped_states() {
        for status in [
            AssertionStatus::Pending,
            AssertionStatus::Skipped,
            AssertionStatus::Todo,
            AssertionStatus::Disabled,
        ] {
            assert_eq!(TestState::from(status), TestState::Skipped);
        }
    }
}
