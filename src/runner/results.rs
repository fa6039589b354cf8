//! Jest `--json` output and the per-file failure reconciler built from it.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tree::id::lower_case_drive_letter;

/// Top level of `jest --json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JestTotalResults {
    pub success: bool,
    pub num_total_tests: u32,
    pub num_passed_tests: u32,
    pub num_failed_tests: u32,
    pub num_pending_tests: u32,
    pub num_todo_tests: u32,
    pub num_total_test_suites: u32,
    pub num_failed_test_suites: u32,
    pub test_results: Vec<JestFileResult>,
}

/// Results of one test file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JestFileResult {
    /// Absolute path of the test file.
    pub name: String,
    pub status: FileStatus,
    pub message: String,
    pub assertion_results: Vec<JestAssertionResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileStatus {
    Passed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JestAssertionResult {
    pub title: String,
    pub ancestor_titles: Vec<String>,
    pub full_name: String,
    pub status: AssertionStatus,
    pub failure_messages: Vec<String>,
    pub location: Option<AssertionLocation>,
}

impl JestAssertionResult {
    /// Failure messages joined into one block, if any.
    pub fn failure_message(&self) -> Option<String> {
        if self.failure_messages.is_empty() {
            None
        } else {
            Some(self.failure_messages.join("\n"))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionStatus {
    Passed,
    Failed,
    Pending,
    Skipped,
    Todo,
    Disabled,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One-based line and zero-based column, as `--testLocationInResults`
/// reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionLocation {
    pub line: u32,
    pub column: u32,
}

/// Failure details of one assertion, ready for decoration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAssertionStatus {
    pub title: String,
    pub status: AssertionStatus,
    /// One-based line the failure points at.
    pub line: Option<u32>,
    pub message: String,
    pub short_message: Option<String>,
    pub terse_message: Option<String>,
}

static STACK_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*at .*?(?:\(|\s)([^()\s]+):(\d+):(\d+)\)?\s*$").expect("stack frame regex is valid"));

/// Per-file assertion details of a finished run, keyed by drive-normalised
/// file path.
#[derive(Debug, Clone, Default)]
pub struct TestReconciler {
    files: HashMap<String, Vec<TestAssertionStatus>>,
}

impl TestReconciler {
    pub fn new(results: &JestTotalResults) -> Self {
        let files = results
            .test_results
            .iter()
            .map(|file| {
                let statuses = file
                    .assertion_results
                    .iter()
                    .map(|assertion| assertion_status(&file.name, assertion))
                    .collect();
                (lower_case_drive_letter(&file.name), statuses)
            })
            .collect();
        Self { files }
    }

    pub fn assertions_for_test_file(&self, file: &str) -> Option<&[TestAssertionStatus]> {
        self.files.get(&lower_case_drive_letter(file)).map(Vec::as_slice)
    }
}

fn assertion_status(file: &str, assertion: &JestAssertionResult) -> TestAssertionStatus {
    let message = assertion.failure_message().unwrap_or_default();
    let short_message = short_message(&message);
    let terse_message = short_message
        .as_deref()
        .and_then(|s| s.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(str::to_string);

    let line = line_of_failure(file, &message).or_else(|| assertion.location.map(|l| l.line));

    TestAssertionStatus {
        title: assertion.title.clone(),
        status: assertion.status,
        line,
        message,
        short_message,
        terse_message,
    }
}

/// The failure message without its stack frames.
fn short_message(message: &str) -> Option<String> {
    let short = message
        .lines()
        .filter(|line| !line.trim_start().starts_with("at "))
        .collect::<Vec<_>>()
        .join("\n");
    let short = short.trim_end();
    if short.is_empty() {
        None
    } else {
        Some(short.to_string())
    }
}

/// Line of the first stack frame pointing into `file`.
fn line_of_failure(file: &str, message: &str) -> Option<u32> {
    let file = lower_case_drive_letter(file);
    message.lines().find_map(|line| {
        let caps = STACK_FRAME.captures(line)?;
        if lower_case_drive_letter(&caps[1]) != file {
            return None;
        }
        caps[2].parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"{
  "success": false,
  "numTotalTests": 2,
  "numPassedTests": 1,
  "numFailedTests": 1,
  "testResults": [
    {
      "name": "/repo/src/sum.test.js",
      "status": "failed",
      "message": "",
      "assertionResults": [
        {
          "title": "adds",
          "ancestorTitles": ["sum"],
          "fullName": "sum adds",
          "status": "passed",
          "failureMessages": [],
          "location": { "line": 2, "column": 3 }
        },
        {
          "title": "subtracts",
          "ancestorTitles": ["sum"],
          "fullName": "sum subtracts",
          "status": "failed",
          "failureMessages": ["Error: expect(received).toBe(expected)\n\nExpected: 1\nReceived: 2\n    at Object.<anonymous> (/repo/src/sum.test.js:7:19)\n    at processTicksAndRejections (node:internal/process/task_queues:95:5)"],
          "location": { "line": 6, "column": 3 }
        }
      ]
    }
  ]
}"#;

    #[test]
    fn test_deserialize_jest_output() {
        let results: JestTotalResults = serde_json::from_str(RESULTS).unwrap();

        assert!(!results.success);
        assert_eq!(results.num_total_tests, 2);
        let file = &results.test_results[0];
        assert_eq!(file.status, FileStatus::Failed);
        assert_eq!(file.assertion_results[1].status, AssertionStatus::Failed);
        assert_eq!(file.assertion_results[0].location, Some(AssertionLocation { line: 2, column: 3 }));
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let assertion: JestAssertionResult =
            serde_json::from_str(r#"{ "title": "t", "status": "focused" }"#).unwrap();
        assert_eq!(assertion.status, AssertionStatus::Unknown);
        assert!(assertion.ancestor_titles.is_empty());
    }

    #[test]
    fn test_reconciler_messages() {
        let results: JestTotalResults = serde_json::from_str(RESULTS).unwrap();
        let reconciler = TestReconciler::new(&results);

        let assertions = reconciler.assertions_for_test_file("/repo/src/sum.test.js").unwrap();
        assert_eq!(assertions.len(), 2);

        let passed = &assertions[0];
        assert_eq!(passed.line, Some(2));
        assert!(passed.short_message.is_none());

        let failed = &assertions[1];
        assert_eq!(failed.line, Some(7));
        assert_eq!(
            failed.short_message.as_deref(),
            Some("Error: expect(received).toBe(expected)\n\nExpected: 1\nReceived: 2")
        );
        assert_eq!(failed.terse_message.as_deref(), Some("Error: expect(received).toBe(expected)"));
        assert!(failed.message.contains("task_queues"));

        assert!(reconciler.assertions_for_test_file("/repo/src/other.test.js").is_none());
    }

    #[test]
    fn test_reconciler_normalises_drive_letter() {
        let results = JestTotalResults {
            test_results: vec![JestFileResult {
                name: "C:\\repo\\a.test.js".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let reconciler = TestReconciler::new(&results);
        assert!(reconciler.assertions_for_test_file("c:\\repo\\a.test.js").is_some());
    }
}
