//! Events the adapter publishes to its host.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::runner::{TestDecoration, TestEvent, TestState};
use crate::tree::{ProjectRootNode, WorkspaceRootNode};

use super::suite::{TestInfo, TestSuiteInfo};

/// Test discovery progress.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LoadEvent {
    Started,
    #[serde(rename_all = "camelCase")]
    Finished {
        #[serde(skip_serializing_if = "Option::is_none")]
        suite: Option<TestSuiteInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

/// A suite in a run event: its id, or the full info for a suite the host
/// has not seen yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SuiteTarget {
    Id(String),
    Info(TestSuiteInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TestTarget {
    Id(String),
    Info(TestInfo),
}

/// Test execution progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunEvent {
    Started {
        tests: Vec<String>,
    },
    Suite {
        suite: SuiteTarget,
        state: TestState,
    },
    Test {
        test: TestTarget,
        state: TestState,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        decorations: Vec<TestDecoration>,
    },
    Finished,
}

impl RunEvent {
    pub fn running_suite(suite: SuiteTarget) -> Self {
        RunEvent::Suite {
            suite,
            state: TestState::Running,
        }
    }

    pub fn completed_suite(id: &str) -> Self {
        RunEvent::Suite {
            suite: SuiteTarget::Id(id.to_string()),
            state: TestState::Completed,
        }
    }

    pub fn running_test(test: TestTarget) -> Self {
        RunEvent::Test {
            test,
            state: TestState::Running,
            message: None,
            decorations: Vec::new(),
        }
    }
}

impl From<TestEvent> for RunEvent {
    fn from(event: TestEvent) -> Self {
        RunEvent::Test {
            test: TestTarget::Id(event.test),
            state: event.state,
            message: event.message,
            decorations: event.decorations,
        }
    }
}

/// Marks results stale. `None` retires everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetireEvent {
    pub tests: Option<Vec<String>>,
}

/// Test files of one project changed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTestsChangedEvent {
    /// Every test file the project has after the change.
    pub test_files: Vec<PathBuf>,
    pub added_test_files: Vec<PathBuf>,
    pub modified_test_files: Vec<PathBuf>,
    pub removed_test_files: Vec<PathBuf>,
    pub updated_suite: Arc<ProjectRootNode>,
    pub invalidated_test_ids: Vec<String>,
}

/// What a batch of file changes meant for one project.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EnvironmentChangedEvent {
    /// Application code changed; every result may be stale.
    #[serde(rename_all = "camelCase")]
    App { invalidated_test_ids: Vec<String> },
    Test(ProjectTestsChangedEvent),
}

/// Changes to the set of projects or their trees.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProjectsChangedEvent {
    #[serde(rename_all = "camelCase")]
    ProjectAdded {
        suite: Arc<WorkspaceRootNode>,
        added_project: Arc<ProjectRootNode>,
    },
    ProjectRemoved { suite: Arc<WorkspaceRootNode> },
    #[serde(rename_all = "camelCase")]
    ProjectAppUpdated {
        suite: Arc<WorkspaceRootNode>,
        invalidated_test_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ProjectTestsUpdated {
        suite: Arc<WorkspaceRootNode>,
        test_event: ProjectTestsChangedEvent,
    },
}

impl ProjectsChangedEvent {
    pub fn suite(&self) -> &Arc<WorkspaceRootNode> {
        match self {
            ProjectsChangedEvent::ProjectAdded { suite, .. }
            | ProjectsChangedEvent::ProjectRemoved { suite }
            | ProjectsChangedEvent::ProjectAppUpdated { suite, .. }
            | ProjectsChangedEvent::ProjectTestsUpdated { suite, .. } => suite,
        }
    }
}
