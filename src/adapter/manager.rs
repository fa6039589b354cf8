//! Owns every project loader of a workspace and the combined tree.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, watch, OnceCell};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, TestTreeError};
use crate::parser::TestFileParser;
use crate::settings::AdapterSettings;
use crate::tree::WorkspaceRootNode;
use crate::watcher::FileEvent;
use crate::workspace::{ProjectConfig, WorkspaceDetector};

use super::events::{EnvironmentChangedEvent, ProjectsChangedEvent};
use super::loader::ProjectTestLoader;

const EVENT_CAPACITY: usize = 256;

pub struct ProjectManager {
    workspace_root: PathBuf,
    settings: AdapterSettings,
    parser: Arc<dyn TestFileParser>,
    loaders: RwLock<Vec<ProjectTestLoader>>,
    initialised: OnceCell<()>,
    state: watch::Sender<Arc<WorkspaceRootNode>>,
    projects_changed: broadcast::Sender<ProjectsChangedEvent>,
}

impl ProjectManager {
    pub fn new(workspace_root: PathBuf, settings: AdapterSettings, parser: Arc<dyn TestFileParser>) -> Self {
        let label = workspace_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| workspace_root.display().to_string());
        let (state, _) = watch::channel(Arc::new(WorkspaceRootNode::new(label)));
        let (projects_changed, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            workspace_root,
            settings,
            parser,
            loaders: RwLock::new(Vec::new()),
            initialised: OnceCell::new(),
            state,
            projects_changed,
        }
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectsChangedEvent> {
        self.projects_changed.subscribe()
    }

    /// Latest combined tree.
    pub fn current_state(&self) -> Arc<WorkspaceRootNode> {
        self.state.borrow().clone()
    }

    pub fn loaders(&self) -> Vec<ProjectTestLoader> {
        self.loaders.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn loader(&self, project_id: &str) -> Option<ProjectTestLoader> {
        self.loaders().into_iter().find(|l| l.config().project_name == project_id)
    }

    /// Discovers the workspace's projects once. A workspace with no
    /// recognised layout ends up with no projects.
    async fn ensure_initialised(&self) -> Result<()> {
        self.initialised
            .get_or_try_init(|| async {
                let root = self.workspace_root.clone();
                let jest_command = self.settings.jest_command(&root);
                let workspace = tokio::task::spawn_blocking(move || WorkspaceDetector::parse(&root, &jest_command))
                    .await
                    .map_err(|e| TestTreeError::Load(format!("discovery task failed: {}", e)))??;

                let projects = workspace.map(|w| w.projects).unwrap_or_default();
                info!("Found {} Jest projects in {}", projects.len(), self.workspace_root.display());
                for config in projects {
                    self.add_loader(config)?;
                }
                Ok::<(), TestTreeError>(())
            })
            .await
            .map(|_| ())
    }

    /// Discovered projects, without loading their tests.
    pub async fn projects(&self) -> Result<Vec<ProjectConfig>> {
        self.ensure_initialised().await?;
        Ok(self.loaders().iter().map(|l| ProjectConfig::clone(l.config())).collect())
    }

    /// Registers a loader for `config`, replacing any loader for the same
    /// root. Project names become tree ids, so a name already taken by
    /// another root gets the root's workspace-relative path appended.
    fn add_loader(&self, mut config: ProjectConfig) -> Result<ProjectTestLoader> {
        let taken = self
            .loaders()
            .iter()
            .any(|l| l.config().project_name == config.project_name && l.config().root_path != config.root_path);
        if taken {
            let relative = config
                .root_path
                .strip_prefix(&self.workspace_root)
                .unwrap_or(&config.root_path)
                .display()
                .to_string();
            let unique = format!("{} ({})", config.project_name, relative);
            warn!(
                "Project name {} is already used; {} is loaded as {}",
                config.project_name,
                config.root_path.display(),
                unique
            );
            config.project_name = unique;
        }

        let loader = ProjectTestLoader::new(config, &self.settings.ignore_globs, Arc::clone(&self.parser))?;
        if let Ok(mut loaders) = self.loaders.write() {
            loaders.retain(|l| l.config().root_path != loader.config().root_path);
            loaders.push(loader.clone());
        }
        Ok(loader)
    }

    /// Reloads every project and returns the combined tree.
    pub async fn get_test_state(&self) -> Result<Arc<WorkspaceRootNode>> {
        self.ensure_initialised().await?;

        let loaders = self.loaders();
        if loaders.is_empty() {
            info!("No Jest projects in {}", self.workspace_root.display());
            return Ok(self.current_state());
        }

        let mut loads = JoinSet::new();
        for loader in loaders {
            loads.spawn(async move { loader.get_test_state(true).await });
        }

        let mut projects = Vec::new();
        while let Some(joined) = loads.join_next().await {
            let project = joined.map_err(|e| TestTreeError::Load(format!("project load task failed: {}", e)))??;
            projects.push(project);
        }

        let state = Arc::new(self.current_state().with_projects(projects));
        self.state.send_replace(Arc::clone(&state));
        Ok(state)
    }

    /// Routes each event to the project with the deepest root containing
    /// it and folds the resulting changes into the combined tree.
    pub async fn handle_file_changes(&self, events: &[FileEvent]) -> Result<Vec<ProjectsChangedEvent>> {
        let loaders = self.loaders();
        let mut routed: Vec<(ProjectTestLoader, Vec<FileEvent>)> = Vec::new();

        for event in events {
            let Some(owner) = loaders
                .iter()
                .filter(|l| l.config().contains(event.path()))
                .max_by_key(|l| l.config().root_path.components().count())
            else {
                debug!("No project owns {}", event.path().display());
                continue;
            };

            match routed.iter_mut().find(|(l, _)| l.config().project_name == owner.config().project_name) {
                Some((_, batch)) => batch.push(event.clone()),
                None => routed.push((owner.clone(), vec![event.clone()])),
            }
        }

        let mut out = Vec::new();
        for (loader, batch) in routed {
            for change in loader.handle_file_changes(&batch).await? {
                out.push(self.apply_change(&loader, change));
            }
        }
        Ok(out)
    }

    fn apply_change(&self, loader: &ProjectTestLoader, change: EnvironmentChangedEvent) -> ProjectsChangedEvent {
        let event = match change {
            EnvironmentChangedEvent::App { invalidated_test_ids } => {
                info!("Application files changed");
                ProjectsChangedEvent::ProjectAppUpdated {
                    suite: self.current_state(),
                    invalidated_test_ids,
                }
            }
            EnvironmentChangedEvent::Test(test_event) => {
                info!(
                    "Test files changed in {}: {} added, {} modified, {} removed",
                    test_event.updated_suite.id,
                    test_event.added_test_files.len(),
                    test_event.modified_test_files.len(),
                    test_event.removed_test_files.len()
                );
                let suite = self.sync_project(loader);
                ProjectsChangedEvent::ProjectTestsUpdated { suite, test_event }
            }
        };
        self.publish(event.clone());
        event
    }

    /// Copies the loader's latest tree into the combined tree. The tree is
    /// read under the state lock, so a slower caller never puts back an
    /// older snapshot than one already stored.
    pub fn sync_project(&self, loader: &ProjectTestLoader) -> Arc<WorkspaceRootNode> {
        let mut updated = None;
        self.state.send_modify(|state| {
            let project = loader.tree();
            let next = Arc::new(state.remove_project(&project.config.root_path).replace_project(project));
            *state = Arc::clone(&next);
            updated = Some(next);
        });
        updated.unwrap_or_else(|| self.current_state())
    }

    /// Adds a project found after start-up and loads it.
    pub async fn add_project(&self, config: ProjectConfig) -> Result<ProjectsChangedEvent> {
        self.ensure_initialised().await?;
        let loader = self.add_loader(config)?;
        let added_project = loader.get_test_state(false).await?;
        let suite = self.sync_project(&loader);
        info!("Project added: {}", added_project.id);

        let event = ProjectsChangedEvent::ProjectAdded { suite, added_project };
        self.publish(event.clone());
        Ok(event)
    }

    /// Drops the project rooted at `root_path`.
    pub fn remove_project(&self, root_path: &Path) -> ProjectsChangedEvent {
        if let Ok(mut loaders) = self.loaders.write() {
            loaders.retain(|l| l.config().root_path != root_path);
        }

        let mut suite = None;
        self.state.send_modify(|state| {
            let next = Arc::new(state.remove_project(root_path));
            *state = Arc::clone(&next);
            suite = Some(next);
        });
        info!("Project removed: {}", root_path.display());

        let event = ProjectsChangedEvent::ProjectRemoved {
            suite: suite.unwrap_or_else(|| self.current_state()),
        };
        self.publish(event.clone());
        event
    }

    fn publish(&self, event: ProjectsChangedEvent) {
        if self.projects_changed.send(event).is_err() {
            debug!("No listeners for project changes");
        }
    }

    pub fn dispose(&self) {
        match self.loaders.write() {
            Ok(mut loaders) => loaders.clear(),
            Err(e) => warn!("Project loaders poisoned during dispose: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::parser::TreeSitterTestParser;
    use crate::runner::results::{AssertionStatus, FileStatus, JestAssertionResult, JestFileResult};

    fn write(root: &Path, name: &str, content: &str) -> PathBuf {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn create_monorepo(root: &Path) {
        write(root, "package.json", r#"{ "name": "mono", "workspaces": ["packages/*"] }"#);
        for name in ["core", "web"] {
            write(
                root,
                &format!("packages/{}/package.json", name),
                &format!(r#"{{ "name": "{}" }}"#, name),
            );
            write(root, &format!("packages/{}/jest.config.json", name), "{}");
            write(
                root,
                &format!("packages/{}/src/{}.test.js", name, name),
                "describe('suite', () => {\n  it('works', () => {});\n});\n",
            );
        }
    }

    fn manager(root: &Path) -> ProjectManager {
        ProjectManager::new(
            root.to_path_buf(),
            AdapterSettings::default(),
            Arc::new(TreeSitterTestParser::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_loads_every_project_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_monorepo(temp_dir.path());

        let state = manager(temp_dir.path()).get_test_state().await.unwrap();

        let ids: Vec<&str> = state.projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["core", "web"]);
        assert!(state.projects.iter().all(|p| p.has_files()));
    }

    #[tokio::test]
    async fn test_unrecognised_workspace_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let state = manager(temp_dir.path()).get_test_state().await.unwrap();
        assert!(state.projects.is_empty());
    }

    #[tokio::test]
    async fn test_file_changes_are_routed_to_owner() {
        let temp_dir = TempDir::new().unwrap();
        create_monorepo(temp_dir.path());
        let manager = manager(temp_dir.path());
        manager.get_test_state().await.unwrap();
        let mut events = manager.subscribe();

        let added = write(temp_dir.path(), "packages/web/src/extra.test.js", "test('extra', () => {});\n");
        let changes = manager.handle_file_changes(&[FileEvent::Changed(added.clone())]).await.unwrap();

        assert_eq!(changes.len(), 1);
        let ProjectsChangedEvent::ProjectTestsUpdated { suite, test_event } = &changes[0] else {
            panic!("expected a test update");
        };
        assert_eq!(test_event.updated_suite.id, "web");
        assert_eq!(test_event.added_test_files, vec![added]);
        assert_eq!(suite.project("web").unwrap().file_entries().len(), 2);
        assert_eq!(suite.project("core").unwrap().file_entries().len(), 1);

        let published = events.recv().await.unwrap();
        assert!(matches!(published, ProjectsChangedEvent::ProjectTestsUpdated { .. }));
    }

    #[tokio::test]
    async fn test_remove_project_keeps_the_others() {
        let temp_dir = TempDir::new().unwrap();
        create_monorepo(temp_dir.path());
        let manager = manager(temp_dir.path());
        manager.get_test_state().await.unwrap();

        let event = manager.remove_project(&temp_dir.path().join("packages/core"));

        let ids: Vec<&str> = event.suite().projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["web"]);
        assert!(manager.loader("core").is_none());
    }

    #[tokio::test]
    async fn test_add_project_loads_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        create_monorepo(temp_dir.path());
        let manager = manager(temp_dir.path());
        manager.get_test_state().await.unwrap();

        let extra = temp_dir.path().join("tools");
        write(&extra, "a.test.js", "test('a', () => {});\n");
        let event = manager
            .add_project(ProjectConfig::new("another", extra.clone()))
            .await
            .unwrap();

        let ProjectsChangedEvent::ProjectAdded { suite, added_project } = event else {
            panic!("expected project added");
        };
        assert_eq!(added_project.id, "another");
        assert!(added_project.has_files());
        let ids: Vec<&str> = suite.projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["another", "core", "web"]);
    }

    #[tokio::test]
    async fn test_same_name_in_another_root_gets_unique_id() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path());
        let first = temp_dir.path().join("a");
        let second = temp_dir.path().join("b");
        write(&first, "a.test.js", "test('a', () => {});\n");
        write(&second, "b.test.js", "test('b', () => {});\n");

        manager.add_project(ProjectConfig::new("default", first)).await.unwrap();
        let event = manager.add_project(ProjectConfig::new("default", second)).await.unwrap();

        let ids: Vec<&str> = event.suite().projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["default", "default (b)"]);
        assert!(event.suite().projects.iter().all(|p| p.has_files()));
        assert_eq!(manager.loaders().len(), 2);
    }

    #[tokio::test]
    async fn test_readding_a_root_replaces_its_project() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path());
        let root = temp_dir.path().join("a");
        write(&root, "a.test.js", "test('a', () => {});\n");

        manager.add_project(ProjectConfig::new("old", root.clone())).await.unwrap();
        let event = manager.add_project(ProjectConfig::new("new", root)).await.unwrap();

        let ids: Vec<&str> = event.suite().projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
        assert_eq!(manager.loaders().len(), 1);
    }

    #[tokio::test]
    async fn test_late_file_change_keeps_merged_results() {
        let temp_dir = TempDir::new().unwrap();
        create_monorepo(temp_dir.path());
        let manager = manager(temp_dir.path());
        manager.get_test_state().await.unwrap();
        let loader = manager.loader("web").unwrap();

        let added = write(temp_dir.path(), "packages/web/src/extra.test.js", "test('extra', () => {});\n");
        let mut changes = loader.handle_file_changes(&[FileEvent::Changed(added)]).await.unwrap();
        let existing = temp_dir.path().join("packages/web/src/web.test.js");
        loader.merge_runtime_results(&[JestFileResult {
            name: existing.to_string_lossy().into_owned(),
            status: FileStatus::Passed,
            message: String::new(),
            assertion_results: vec![JestAssertionResult {
                title: "generated".to_string(),
                ancestor_titles: vec!["suite".to_string()],
                full_name: "suite generated".to_string(),
                status: AssertionStatus::Passed,
                ..Default::default()
            }],
        }]);

        // The change event was produced before the merge but is applied after it.
        let event = manager.apply_change(&loader, changes.remove(0));

        let web = event.suite().project("web").unwrap().clone();
        assert_eq!(web, loader.tree());
        assert_eq!(web.file_entries().len(), 2);
        let file = web
            .file_entries()
            .into_iter()
            .find(|f| f.file() == existing.as_path())
            .unwrap()
            .as_file()
            .unwrap()
            .clone();
        let labels: Vec<&str> = file.describe_blocks[0].tests.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["works", "generated"]);
    }
}
