//! Loads one project's tests and keeps its tree current as files change.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TestTreeError};
use crate::parser::{FileType, ProjectScanner, TestFileParseResult, TestFileParser};
use crate::runner::results::JestFileResult;
use crate::tree::id::{file_id, ROOT_ID};
use crate::tree::search::find_file;
use crate::tree::{create_project_tree, delete_file, insert_file, merge_runtime_results, ProjectRootNode};
use crate::watcher::FileEvent;
use crate::workspace::ProjectConfig;

use super::events::{EnvironmentChangedEvent, ProjectTestsChangedEvent};

type LoadOutcome = std::result::Result<Arc<ProjectRootNode>, String>;

enum LoadState {
    Unloaded,
    Idle,
    /// A reload is running; late callers wait on its outcome.
    Loading(watch::Receiver<Option<LoadOutcome>>),
}

struct LoaderInner {
    config: Arc<ProjectConfig>,
    scanner: ProjectScanner,
    parser: Arc<dyn TestFileParser>,
    tree: watch::Sender<Arc<ProjectRootNode>>,
    state: Mutex<LoadState>,
}

/// Owner of one project's test tree.
///
/// All edits go through the loader and replace the tree snapshot
/// atomically; readers keep whatever snapshot they already hold.
#[derive(Clone)]
pub struct ProjectTestLoader {
    inner: Arc<LoaderInner>,
}

impl ProjectTestLoader {
    pub fn new(config: ProjectConfig, ignore_globs: &[String], parser: Arc<dyn TestFileParser>) -> Result<Self> {
        let scanner = ProjectScanner::new(&config, ignore_globs)?;
        let config = Arc::new(config);
        let (tree, _) = watch::channel(Arc::new(ProjectRootNode::new(Arc::clone(&config))));

        Ok(Self {
            inner: Arc::new(LoaderInner {
                config,
                scanner,
                parser,
                tree,
                state: Mutex::new(LoadState::Unloaded),
            }),
        })
    }

    pub fn config(&self) -> &Arc<ProjectConfig> {
        &self.inner.config
    }

    /// Latest tree snapshot, empty until the first load completes.
    pub fn tree(&self) -> Arc<ProjectRootNode> {
        self.inner.tree.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ProjectRootNode>> {
        self.inner.tree.subscribe()
    }

    /// Returns the project tree, scanning the project when it was never
    /// loaded or `force_reload` is set.
    ///
    /// Only one scan runs at a time. A caller arriving while a scan is in
    /// flight waits for that scan instead of starting another one.
    pub async fn get_test_state(&self, force_reload: bool) -> Result<Arc<ProjectRootNode>> {
        let mut pending = {
            let mut state = self.inner.state.lock().await;
            let waiting = match &*state {
                LoadState::Loading(rx) => Some(rx.clone()),
                LoadState::Idle if !force_reload => return Ok(self.tree()),
                _ => None,
            };
            match waiting {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = watch::channel(None);
                    *state = LoadState::Loading(rx.clone());
                    tokio::spawn(Self::load(Arc::clone(&self.inner), tx));
                    rx
                }
            }
        };

        let outcome = pending
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TestTreeError::Load("load ended without a result".to_string()))?
            .clone();

        match outcome {
            Some(Ok(tree)) => Ok(tree),
            Some(Err(e)) => Err(TestTreeError::Load(e)),
            None => Err(TestTreeError::Load("load ended without a result".to_string())),
        }
    }

    async fn load(inner: Arc<LoaderInner>, done: watch::Sender<Option<LoadOutcome>>) {
        info!("Loading tests for project {}", inner.config.project_name);

        let worker = Arc::clone(&inner);
        let scanned = tokio::task::spawn_blocking(move || {
            worker
                .scanner
                .scan(worker.parser.as_ref())
                .map(|results| Arc::new(create_project_tree(Arc::clone(&worker.config), &results)))
        })
        .await;

        let outcome: LoadOutcome = match scanned {
            Ok(Ok(tree)) => Ok(tree),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("load task failed: {}", e)),
        };

        let mut state = inner.state.lock().await;
        match &outcome {
            Ok(tree) => {
                info!(
                    "Loaded {} test files for project {}",
                    tree.file_entries().len(),
                    inner.config.project_name
                );
                inner.tree.send_replace(Arc::clone(tree));
                *state = LoadState::Idle;
            }
            Err(e) => {
                error!("Failed to load tests for project {}: {}", inner.config.project_name, e);
                *state = LoadState::Unloaded;
            }
        }
        done.send_replace(Some(outcome));
    }

    /// Applies a batch of file events to the tree.
    ///
    /// Test files are re-parsed and spliced in or removed; application
    /// files invalidate every result of the project. Config files are
    /// only logged.
    pub async fn handle_file_changes(&self, events: &[FileEvent]) -> Result<Vec<EnvironmentChangedEvent>> {
        self.get_test_state(false).await?;

        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        let mut app_changed = false;

        for event in events {
            match (self.inner.scanner.classify(event.path()), event) {
                (FileType::Test, FileEvent::Changed(path)) => changed.push(path.clone()),
                (FileType::Test, FileEvent::Deleted(path)) => deleted.push(path.clone()),
                (FileType::App, _) => app_changed = true,
                (FileType::Config, _) => debug!("Config file {} changed; not reloading", event.path().display()),
                (FileType::Other, _) => {}
            }
        }

        let parsed = self.parse_files(changed).await?;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();
        self.inner.tree.send_if_modified(|tree| {
            let mut current = ProjectRootNode::clone(tree.as_ref());
            for result in &parsed {
                let existed = find_file(&current, result.file()).is_some();
                match insert_file(&current, result) {
                    Ok(updated) => {
                        current = updated;
                        if existed {
                            modified.push(result.file().to_path_buf());
                        } else {
                            added.push(result.file().to_path_buf());
                        }
                    }
                    Err(e) => warn!("Skipping {}: {}", result.file().display(), e),
                }
            }
            for path in &deleted {
                if let Some(updated) = delete_file(&current, path) {
                    current = updated;
                    removed.push(path.clone());
                }
            }

            let changed = !(added.is_empty() && modified.is_empty() && removed.is_empty());
            if changed {
                *tree = Arc::new(current);
            }
            changed
        });

        let mut out = Vec::new();
        if !(added.is_empty() && modified.is_empty() && removed.is_empty()) {
            let project_id = &self.inner.config.project_name;
            let updated_suite = self.tree();
            let invalidated_test_ids = added
                .iter()
                .chain(&modified)
                .chain(&removed)
                .map(|path| file_id(project_id, path))
                .collect();

            out.push(EnvironmentChangedEvent::Test(ProjectTestsChangedEvent {
                test_files: updated_suite.file_entries().iter().map(|f| f.file().to_path_buf()).collect(),
                added_test_files: added,
                modified_test_files: modified,
                removed_test_files: removed,
                updated_suite,
                invalidated_test_ids,
            }));
        }
        if app_changed {
            out.push(EnvironmentChangedEvent::App {
                invalidated_test_ids: vec![ROOT_ID.to_string()],
            });
        }
        Ok(out)
    }

    async fn parse_files(&self, files: Vec<PathBuf>) -> Result<Vec<TestFileParseResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let parser = Arc::clone(&self.inner.parser);
        tokio::task::spawn_blocking(move || files.iter().map(|file| parser.parse(file)).collect())
            .await
            .map_err(|e| TestTreeError::Load(format!("parse task failed: {}", e)))
    }

    /// Adds nodes for run results the tree does not know yet.
    pub fn merge_runtime_results(&self, results: &[JestFileResult]) -> Arc<ProjectRootNode> {
        self.inner.tree.send_if_modified(|tree| {
            let merged = merge_runtime_results(tree.as_ref(), results);
            if &merged == tree.as_ref() {
                return false;
            }
            *tree = Arc::new(merged);
            true
        });
        self.tree()
    }
}
