use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use jest_test_tree::adapter::{JestTestAdapter, ProjectsChangedEvent, RunEvent, TestItem, TestSuiteInfo};
use jest_test_tree::runner::{JestRunner, TestState};
use jest_test_tree::settings::AdapterSettings;

#[derive(Parser)]
#[command(name = "jest-test-tree")]
#[command(about = "Discover, run and watch Jest tests from the command line")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Show the test tree of the current workspace
    jest-test-tree tree

    # Same, as JSON
    jest-test-tree tree --json

    # Run every test
    jest-test-tree run

    # Run one file or one test, by id
    jest-test-tree run 'app::/repo/src/math.test.js'
    jest-test-tree run 'app::/repo/src/math.test.js@@math$$adds'

    # Follow changes to test files
    jest-test-tree watch

    # List discovered Jest projects
    jest-test-tree projects --workspace ../monorepo
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Settings file (defaults to .jest-test-tree.json in the workspace)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Command that starts Jest
    #[arg(long, global = true)]
    pub jest: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the discovered test tree
    Tree {
        /// Print JSON instead of an outline
        #[arg(long)]
        json: bool,
    },

    /// Run tests and print state events as JSON lines
    Run {
        /// Test ids to run; none runs everything
        ids: Vec<String>,
    },

    /// Print changes to the test tree as files change
    Watch,

    /// List discovered Jest projects
    Projects {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

/// Settings from `--settings` or the workspace, with `--jest` applied.
pub fn load_settings(workspace: &Path, settings: Option<&Path>, jest: Option<String>) -> anyhow::Result<AdapterSettings> {
    let mut loaded = match settings {
        Some(path) => AdapterSettings::load(path)?,
        None => AdapterSettings::load_for_workspace(workspace)?,
    };
    if jest.is_some() {
        loaded.path_to_jest = jest;
    }
    Ok(loaded)
}

fn create_adapter(workspace: &Path, settings: AdapterSettings) -> anyhow::Result<JestTestAdapter<JestRunner>> {
    let workspace = workspace.canonicalize()?;
    Ok(JestTestAdapter::for_workspace(workspace, settings)?)
}

pub async fn show_tree(workspace: &Path, settings: AdapterSettings, json: bool) -> anyhow::Result<()> {
    let adapter = create_adapter(workspace, settings)?;
    let suite = adapter.load().await?;

    match suite {
        Some(suite) if json => println!("{}", serde_json::to_string_pretty(&suite)?),
        Some(suite) => print_suite(&suite, 0),
        None if json => println!("null"),
        None => println!("No tests found"),
    }
    Ok(())
}

fn print_suite(suite: &TestSuiteInfo, depth: usize) {
    let indent = "  ".repeat(depth);
    match (&suite.message, suite.errored) {
        (Some(message), true) => println!("{}{} (error: {})", indent, suite.label, message),
        _ => println!("{}{}", indent, suite.label),
    }

    for child in &suite.children {
        match child {
            TestItem::Suite(child) => print_suite(child, depth + 1),
            TestItem::Test(test) => match test.line {
                Some(line) => println!("{}  - {} (line {})", indent, test.label, line + 1),
                None => println!("{}  - {}", indent, test.label),
            },
        }
    }
}

pub async fn run_tests(workspace: &Path, settings: AdapterSettings, ids: Vec<String>) -> anyhow::Result<()> {
    let adapter = create_adapter(workspace, settings)?;
    adapter.load().await?;

    let mut events = adapter.subscribe_run();
    let printer = tokio::spawn(async move {
        let mut failed = 0usize;
        loop {
            match events.recv().await {
                Ok(event) => {
                    if matches!(event, RunEvent::Test { state: TestState::Failed | TestState::Errored, .. }) {
                        failed += 1;
                    }
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("Error serializing event: {}", e),
                    }
                    if matches!(event, RunEvent::Finished) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => eprintln!("Dropped {} run events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
        failed
    });

    let run = adapter.run(&ids);
    tokio::pin!(run);
    loop {
        tokio::select! {
            result = &mut run => {
                result?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Cancelling test run...");
                adapter.cancel();
            }
        }
    }

    let failed = printer.await?;
    if failed > 0 {
        eprintln!("{} tests failed", failed);
    }
    Ok(())
}

pub async fn watch_workspace(workspace: &Path, settings: AdapterSettings) -> anyhow::Result<()> {
    let adapter = Arc::new(create_adapter(workspace, settings)?);
    if adapter.load().await?.is_none() {
        eprintln!("No tests found yet");
    }

    let mut changes = adapter.subscribe_projects();
    adapter.watch()?;
    println!("Watching {} for changes...", adapter.manager().workspace_root().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => print_change(&change),
                Err(RecvError::Lagged(skipped)) => eprintln!("Dropped {} change events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    adapter.dispose();
    Ok(())
}

fn print_change(change: &ProjectsChangedEvent) {
    match change {
        ProjectsChangedEvent::ProjectAdded { added_project, .. } => println!("Project added: {}", added_project.id),
        ProjectsChangedEvent::ProjectRemoved { suite } => {
            println!("Project removed; {} projects remain", suite.projects.len())
        }
        ProjectsChangedEvent::ProjectAppUpdated { .. } => println!("Application files changed; all results are stale"),
        ProjectsChangedEvent::ProjectTestsUpdated { test_event, .. } => {
            for file in &test_event.added_test_files {
                println!("Added {}", file.display());
            }
            for file in &test_event.modified_test_files {
                println!("Updated {}", file.display());
            }
            for file in &test_event.removed_test_files {
                println!("Removed {}", file.display());
            }
        }
    }
}

pub async fn list_projects(workspace: &Path, settings: AdapterSettings, json: bool) -> anyhow::Result<()> {
    let adapter = create_adapter(workspace, settings)?;
    let projects = adapter.manager().projects().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No Jest projects found");
        return Ok(());
    }

    println!("Found {} Jest projects:", projects.len());
    for project in &projects {
        println!("  {} ({})", project.project_name, project.root_path.display());
        if let Some(config) = &project.jest_config {
            println!("    config:  {}", config.display());
        }
        println!("    command: {}", project.jest_command);
    }
    Ok(())
}
