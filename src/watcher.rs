use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::{Result, TestTreeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Created or modified.
    Changed(PathBuf),
    Deleted(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Changed(path) | FileEvent::Deleted(path) => path,
        }
    }
}

/// Watches a directory tree and forwards debounced batches of file events.
/// Watching stops when the watcher is dropped.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(path: &Path, debounce: Duration, sender: UnboundedSender<Vec<FileEvent>>) -> Result<Self> {
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let file_events = to_file_events(events);
                if !file_events.is_empty() && sender.send(file_events).is_err() {
                    debug!("File event receiver dropped");
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        })
        .map_err(|e| TestTreeError::Watcher(e.to_string()))?;

        debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| TestTreeError::Watcher(e.to_string()))?;

        debug!("Watching {}", path.display());
        Ok(Self { _debouncer: debouncer })
    }
}

/// One event per path; directories are dropped.
fn to_file_events(events: Vec<DebouncedEvent>) -> Vec<FileEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.path.clone()))
        .filter_map(|e| {
            let path = e.path;
            if path.is_file() {
                Some(FileEvent::Changed(path))
            } else if !path.exists() {
                Some(FileEvent::Deleted(path))
            } else {
                None
            }
        })
        .collect()
}
