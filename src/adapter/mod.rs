//! The adapter a host talks to.
//!
//! It loads the workspace's test tree, runs tests through a [`TestRunner`],
//! keeps the tree current while files change and reports all of it as
//! events on broadcast channels it owns.

pub mod events;
pub mod loader;
pub mod manager;
pub mod suite;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TestTreeError};
use crate::parser::{TestFileParser, TreeSitterTestParser};
use crate::runner::{map_results_to_test_events, map_test_ids_to_filter, JestRunner, TestEvent, TestRunner};
use crate::settings::AdapterSettings;
use crate::tree::filter::requests_everything;
use crate::tree::{
    filter_project, DescribeNode, FileEntry, FolderNode, ProjectRootNode, TestId, TestNode, ROOT_ID,
};
use crate::watcher::{FileEvent, FileWatcher};

pub use events::{
    EnvironmentChangedEvent, LoadEvent, ProjectTestsChangedEvent, ProjectsChangedEvent, RetireEvent, RunEvent,
    SuiteTarget, TestTarget,
};
pub use loader::ProjectTestLoader;
pub use manager::ProjectManager;
pub use suite::{map_workspace_to_suite, TestInfo, TestItem, TestSuiteInfo};

use suite::{map_describe_to_suite, map_test_to_info};

const EVENT_CAPACITY: usize = 1024;

pub struct JestTestAdapter<R: TestRunner> {
    manager: Arc<ProjectManager>,
    runner: Arc<R>,
    load_events: broadcast::Sender<LoadEvent>,
    run_events: broadcast::Sender<RunEvent>,
    retire_events: broadcast::Sender<RetireEvent>,
    cancel: Mutex<CancellationToken>,
    shutdown: CancellationToken,
    watcher: Mutex<Option<FileWatcher>>,
}

impl JestTestAdapter<JestRunner> {
    /// Adapter running the real Jest with the tree-sitter parser.
    pub fn for_workspace(workspace_root: PathBuf, settings: AdapterSettings) -> Result<Self> {
        let parser = Arc::new(TreeSitterTestParser::new()?);
        Ok(Self::new(workspace_root, settings, parser, JestRunner::new()))
    }
}

impl<R: TestRunner> JestTestAdapter<R> {
    pub fn new(
        workspace_root: PathBuf,
        settings: AdapterSettings,
        parser: Arc<dyn TestFileParser>,
        runner: R,
    ) -> Self {
        let (load_events, _) = broadcast::channel(EVENT_CAPACITY);
        let (run_events, _) = broadcast::channel(EVENT_CAPACITY);
        let (retire_events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            manager: Arc::new(ProjectManager::new(workspace_root, settings, parser)),
            runner: Arc::new(runner),
            load_events,
            run_events,
            retire_events,
            cancel: Mutex::new(CancellationToken::new()),
            shutdown: CancellationToken::new(),
            watcher: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> &ProjectManager {
        &self.manager
    }

    pub fn subscribe_load(&self) -> broadcast::Receiver<LoadEvent> {
        self.load_events.subscribe()
    }

    pub fn subscribe_run(&self) -> broadcast::Receiver<RunEvent> {
        self.run_events.subscribe()
    }

    pub fn subscribe_retire(&self) -> broadcast::Receiver<RetireEvent> {
        self.retire_events.subscribe()
    }

    pub fn subscribe_projects(&self) -> broadcast::Receiver<ProjectsChangedEvent> {
        self.manager.subscribe()
    }

    fn hide_empty_projects(&self) -> bool {
        self.manager.settings().hide_empty_projects
    }

    /// Current tree in display shape.
    pub fn suite(&self) -> Option<TestSuiteInfo> {
        map_workspace_to_suite(&self.manager.current_state(), self.hide_empty_projects())
    }

    /// Loads every project from disk.
    pub async fn load(&self) -> Result<Option<TestSuiteInfo>> {
        let _ = self.load_events.send(LoadEvent::Started);

        match self.manager.get_test_state().await {
            Ok(state) => {
                let suite = map_workspace_to_suite(&state, self.hide_empty_projects());
                if suite.is_none() {
                    info!("No tests found in {}", self.manager.workspace_root().display());
                }
                let _ = self.load_events.send(LoadEvent::Finished {
                    suite: suite.clone(),
                    error_message: None,
                });
                Ok(suite)
            }
            Err(e) => {
                error!("Failed to load tests: {}", e);
                let _ = self.load_events.send(LoadEvent::Finished {
                    suite: None,
                    error_message: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    /// Runs the tests named by `ids`; an empty list or `root` runs all.
    ///
    /// Each project runs separately. A project whose run fails reports no
    /// results; the run still finishes.
    pub async fn run(&self, ids: &[String]) -> Result<()> {
        let cancel = self.cancel_token();
        let _ = self.run_events.send(RunEvent::Started { tests: ids.to_vec() });

        let state = self.manager.current_state();
        let everything = requests_everything(ids);
        let show_root = self.suite().is_some_and(|s| s.id == ROOT_ID);
        if show_root {
            self.emit_run(RunEvent::running_suite(SuiteTarget::Id(ROOT_ID.to_string())));
        }

        for project in &state.projects {
            let project_ids: Vec<String> = if everything {
                Vec::new()
            } else {
                ids.iter()
                    .filter(|id| TestId::decode(id).project_id == project.id)
                    .cloned()
                    .collect()
            };
            if !everything && project_ids.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }
            let Some(loader) = self.manager.loader(&project.id) else {
                warn!("No loader for project {}", project.id);
                continue;
            };

            let filter = map_test_ids_to_filter(&project_ids);
            debug!("Running {} with filter {:?}", project.id, filter);
            match self.runner.run(loader.config(), filter.as_ref(), cancel.clone()).await {
                Ok(response) => {
                    let merged = loader.merge_runtime_results(&response.results.test_results);
                    self.manager.sync_project(&loader);

                    let scope = if everything {
                        merged
                    } else {
                        filter_project(&merged, &project_ids)
                    };
                    let events = map_results_to_test_events(&response, &scope);
                    self.emit_project_run(&scope, events);
                }
                Err(TestTreeError::Cancelled) => {
                    info!("Test run cancelled");
                    break;
                }
                Err(e) => warn!("Test run for {} failed: {}", project.id, e),
            }
        }

        if show_root {
            self.emit_run(RunEvent::completed_suite(ROOT_ID));
        }
        self.emit_run(RunEvent::Finished);
        Ok(())
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .map(|token| token.child_token())
            .unwrap_or_else(|_| CancellationToken::new())
    }

    /// Stops every run in progress.
    pub fn cancel(&self) {
        if let Ok(mut token) = self.cancel.lock() {
            token.cancel();
            *token = CancellationToken::new();
        }
    }

    fn emit_run(&self, event: RunEvent) {
        let _ = self.run_events.send(event);
    }

    fn emit_project_run(&self, project: &ProjectRootNode, events: Vec<TestEvent>) {
        let mut results: HashMap<String, TestEvent> = events.into_iter().map(|e| (e.test.clone(), e)).collect();

        self.emit_run(RunEvent::running_suite(SuiteTarget::Id(project.id.clone())));
        self.emit_folder_contents(&project.folders, &project.files, &mut results);
        self.emit_run(RunEvent::completed_suite(&project.id));

        if !results.is_empty() {
            debug!("{} results had no matching test in {}", results.len(), project.id);
        }
    }

    fn emit_folder_contents(
        &self,
        folders: &[Arc<FolderNode>],
        files: &[Arc<FileEntry>],
        results: &mut HashMap<String, TestEvent>,
    ) {
        for folder in folders {
            self.emit_run(RunEvent::running_suite(SuiteTarget::Id(folder.id.clone())));
            self.emit_folder_contents(&folder.folders, &folder.files, results);
            self.emit_run(RunEvent::completed_suite(&folder.id));
        }

        for entry in files {
            let FileEntry::File(file) = entry.as_ref() else {
                continue;
            };
            self.emit_run(RunEvent::running_suite(SuiteTarget::Id(file.id.clone())));
            self.emit_blocks(&file.describe_blocks, &file.tests, results);
            self.emit_run(RunEvent::completed_suite(&file.id));
        }
    }

    fn emit_blocks(
        &self,
        describes: &[Arc<DescribeNode>],
        tests: &[Arc<TestNode>],
        results: &mut HashMap<String, TestEvent>,
    ) {
        for describe in describes {
            let target = if describe.runtime_discovered {
                SuiteTarget::Info(map_describe_to_suite(describe))
            } else {
                SuiteTarget::Id(describe.id.clone())
            };
            self.emit_run(RunEvent::running_suite(target));
            self.emit_blocks(&describe.describe_blocks, &describe.tests, results);
            self.emit_run(RunEvent::completed_suite(&describe.id));
        }

        for test in tests {
            let Some(result) = results.remove(&test.id) else {
                continue;
            };
            let target = if test.runtime_discovered {
                TestTarget::Info(map_test_to_info(test))
            } else {
                TestTarget::Id(test.id.clone())
            };
            self.emit_run(RunEvent::running_test(target));
            self.emit_run(result.into());
        }
    }

    /// Starts watching the workspace. Changes are applied by one task in
    /// arrival order until [`dispose`](Self::dispose).
    pub fn watch(self: &Arc<Self>) -> Result<()> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let debounce = Duration::from_millis(self.manager.settings().debounce_ms);
        let watcher = FileWatcher::new(self.manager.workspace_root(), debounce, sender)?;
        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(watcher);
        }

        let adapter = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    batch = receiver.recv() => match batch {
                        Some(events) => {
                            if let Err(e) = adapter.handle_file_changes(&events).await {
                                error!("Failed to apply file changes: {}", e);
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("File change loop stopped");
        });
        Ok(())
    }

    /// Applies one batch of file changes, retires stale results and
    /// republishes the tree.
    pub async fn handle_file_changes(&self, events: &[FileEvent]) -> Result<Vec<ProjectsChangedEvent>> {
        let changes = self.manager.handle_file_changes(events).await?;
        if changes.is_empty() {
            return Ok(changes);
        }

        for change in &changes {
            let retire = match change {
                ProjectsChangedEvent::ProjectAppUpdated { .. } => RetireEvent { tests: None },
                ProjectsChangedEvent::ProjectTestsUpdated { test_event, .. } => RetireEvent {
                    tests: Some(test_event.invalidated_test_ids.clone()),
                },
                ProjectsChangedEvent::ProjectAdded { .. } | ProjectsChangedEvent::ProjectRemoved { .. } => continue,
            };
            let _ = self.retire_events.send(retire);
        }

        let _ = self.load_events.send(LoadEvent::Started);
        let _ = self.load_events.send(LoadEvent::Finished {
            suite: self.suite(),
            error_message: None,
        });
        Ok(changes)
    }

    /// Stops watching and running and drops every project.
    pub fn dispose(&self) {
        self.shutdown.cancel();
        self.cancel();
        if let Ok(mut slot) = self.watcher.lock() {
            slot.take();
        }
        self.manager.dispose();
    }
}
