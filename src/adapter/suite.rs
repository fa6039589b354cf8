//! Projection of the test tree into the suite/test records a host renders.

use std::path::PathBuf;

use serde::Serialize;

use crate::tree::{DescribeNode, FileEntry, FolderNode, ProjectRootNode, TestNode, WorkspaceRootNode};

const PARSE_ERROR_TOOLTIP: &str =
    "Error parsing test file. This may not be an issue with your code, but check the logs for details.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestItem {
    Suite(TestSuiteInfo),
    Test(TestInfo),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteInfo {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub children: Vec<TestItem>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub errored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub id: String,
    pub label: String,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Projects the workspace for display.
///
/// With `hide_empty_projects` set, projects without a single test file are
/// left out. A lone remaining project is returned directly instead of
/// under the workspace root; no project at all gives `None`.
pub fn map_workspace_to_suite(root: &WorkspaceRootNode, hide_empty_projects: bool) -> Option<TestSuiteInfo> {
    let projects: Vec<&ProjectRootNode> = root
        .projects
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !hide_empty_projects || p.has_files())
        .collect();

    match projects.as_slice() {
        [] => None,
        [project] => Some(map_project_to_suite(project)),
        _ => Some(TestSuiteInfo {
            id: root.id.clone(),
            label: root.label.clone(),
            children: projects.into_iter().map(|p| TestItem::Suite(map_project_to_suite(p))).collect(),
            ..Default::default()
        }),
    }
}

pub fn map_project_to_suite(project: &ProjectRootNode) -> TestSuiteInfo {
    TestSuiteInfo {
        id: project.id.clone(),
        label: project.label.clone(),
        children: folder_children(&project.folders, &project.files),
        ..Default::default()
    }
}

fn map_folder_to_suite(folder: &FolderNode) -> TestSuiteInfo {
    TestSuiteInfo {
        id: folder.id.clone(),
        label: folder.label.clone(),
        children: folder_children(&folder.folders, &folder.files),
        ..Default::default()
    }
}

fn folder_children(folders: &[std::sync::Arc<FolderNode>], files: &[std::sync::Arc<FileEntry>]) -> Vec<TestItem> {
    folders
        .iter()
        .map(|f| TestItem::Suite(map_folder_to_suite(f)))
        .chain(files.iter().map(|f| TestItem::Suite(map_file_to_suite(f))))
        .collect()
}

pub fn map_file_to_suite(entry: &FileEntry) -> TestSuiteInfo {
    match entry {
        FileEntry::File(file) => TestSuiteInfo {
            id: file.id.clone(),
            label: file.label.clone(),
            file: Some(file.file.clone()),
            line: Some(file.line),
            children: file
                .describe_blocks
                .iter()
                .map(|d| TestItem::Suite(map_describe_to_suite(d)))
                .chain(file.tests.iter().map(|t| TestItem::Test(map_test_to_info(t))))
                .collect(),
            ..Default::default()
        },
        FileEntry::FileWithParseError(file) => TestSuiteInfo {
            id: file.id.clone(),
            label: file.label.clone(),
            file: Some(file.file.clone()),
            errored: true,
            message: Some(file.error.clone()),
            tooltip: Some(PARSE_ERROR_TOOLTIP.to_string()),
            ..Default::default()
        },
    }
}

pub fn map_describe_to_suite(describe: &DescribeNode) -> TestSuiteInfo {
    TestSuiteInfo {
        id: describe.id.clone(),
        label: describe.label.clone(),
        file: Some(describe.file.clone()),
        line: describe.line,
        children: describe
            .describe_blocks
            .iter()
            .map(|d| TestItem::Suite(map_describe_to_suite(d)))
            .chain(describe.tests.iter().map(|t| TestItem::Test(map_test_to_info(t))))
            .collect(),
        ..Default::default()
    }
}

pub fn map_test_to_info(test: &TestNode) -> TestInfo {
    TestInfo {
        id: test.id.clone(),
        label: test.label.clone(),
        file: test.file.clone(),
        line: test.line,
    }
}
