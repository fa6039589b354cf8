//! Projects a requested set of test ids onto a tree.

use std::sync::Arc;

use crate::tree::id::{is_self_or_ancestor, ROOT_ID};
use crate::tree::{BlockContainer, FileEntry, FolderContainer, ProjectRootNode, WorkspaceRootNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    /// Requested directly: keep with every descendant.
    Whole,
    /// Ancestor of a requested node: keep only the matching path.
    Partial,
    Excluded,
}

fn select(id: &str, requested: &[String]) -> Selection {
    if requested.iter().any(|r| r == id) {
        Selection::Whole
    } else if requested.iter().any(|r| is_self_or_ancestor(id, r)) {
        Selection::Partial
    } else {
        Selection::Excluded
    }
}

/// True when the request means "everything".
pub fn requests_everything(requested: &[String]) -> bool {
    requested.is_empty() || requested.iter().any(|r| r == ROOT_ID)
}

/// Filters each project independently. Projects with no match stay in the
/// result with no children.
pub fn filter_workspace(root: &Arc<WorkspaceRootNode>, requested: &[String]) -> Arc<WorkspaceRootNode> {
    if requests_everything(requested) {
        return Arc::clone(root);
    }

    let projects = root.projects.iter().map(|p| filter_project(p, requested)).collect();
    Arc::new(WorkspaceRootNode {
        id: root.id.clone(),
        label: root.label.clone(),
        projects,
    })
}

pub fn filter_project(project: &Arc<ProjectRootNode>, requested: &[String]) -> Arc<ProjectRootNode> {
    if requests_everything(requested) {
        return Arc::clone(project);
    }

    match select(&project.id, requested) {
        Selection::Whole => Arc::clone(project),
        Selection::Partial => Arc::new(filter_folders(project.as_ref(), requested)),
        Selection::Excluded => Arc::new(project.with_children(Vec::new(), Vec::new())),
    }
}

fn filter_folders<T: FolderContainer>(node: &T, requested: &[String]) -> T {
    let folders = node
        .folders()
        .iter()
        .filter_map(|folder| match select(&folder.id, requested) {
            Selection::Whole => Some(Arc::clone(folder)),
            Selection::Partial => {
                let filtered = filter_folders(folder.as_ref(), requested);
                (!filtered.is_empty()).then(|| Arc::new(filtered))
            }
            Selection::Excluded => None,
        })
        .collect();

    let files = node
        .files()
        .iter()
        .filter_map(|entry| match (select(entry.id(), requested), entry.as_ref()) {
            (Selection::Excluded, _) => None,
            (Selection::Whole, _) | (Selection::Partial, FileEntry::FileWithParseError(_)) => Some(Arc::clone(entry)),
            (Selection::Partial, FileEntry::File(file)) => Some(Arc::new(FileEntry::File(filter_blocks(file, requested)))),
        })
        .collect();

    node.with_children(folders, files)
}

fn filter_blocks<T: BlockContainer>(node: &T, requested: &[String]) -> T {
    let describes = node
        .describe_blocks()
        .iter()
        .filter_map(|describe| match select(&describe.id, requested) {
            Selection::Whole => Some(Arc::clone(describe)),
            Selection::Partial => Some(Arc::new(filter_blocks(describe.as_ref(), requested))),
            Selection::Excluded => None,
        })
        .collect();

    let tests = node
        .tests()
        .iter()
        .filter(|test| select(&test.id, requested) != Selection::Excluded)
        .cloned()
        .collect();

    node.with_blocks(describes, tests)
}
