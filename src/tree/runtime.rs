//! Overlays run results onto the statically parsed tree.

use std::sync::Arc;

use crate::runner::results::JestFileResult;
use crate::tree::id::{describe_id, lower_case_drive_letter, test_id};
use crate::tree::{BlockContainer, DescribeNode, FileEntry, FileNode, FolderContainer, ProjectRootNode, TestNode};

/// Adds a node for every reported assertion the tree does not know yet.
///
/// Lookup is by label at each level, so nodes found by the parser are
/// reused and never duplicated; unknown describes and tests are appended
/// with `runtime_discovered` set. Merging the same results twice changes
/// nothing the second time.
pub fn merge_runtime_results(project: &ProjectRootNode, results: &[JestFileResult]) -> ProjectRootNode {
    if results.is_empty() {
        return project.clone();
    }
    merge_folders(project, results).unwrap_or_else(|| project.clone())
}

fn merge_folders<T: FolderContainer>(node: &T, results: &[JestFileResult]) -> Option<T> {
    let mut changed = false;

    let folders = node
        .folders()
        .iter()
        .map(|folder| match merge_folders(folder.as_ref(), results) {
            Some(updated) => {
                changed = true;
                Arc::new(updated)
            }
            None => Arc::clone(folder),
        })
        .collect();

    let files = node
        .files()
        .iter()
        .map(|entry| match merge_file(entry, results) {
            Some(updated) => {
                changed = true;
                Arc::new(FileEntry::File(updated))
            }
            None => Arc::clone(entry),
        })
        .collect();

    changed.then(|| node.with_children(folders, files))
}

fn merge_file(entry: &FileEntry, results: &[JestFileResult]) -> Option<FileNode> {
    let file = entry.as_file()?;
    let path = lower_case_drive_letter(&file.file.to_string_lossy());
    let result = results.iter().find(|r| lower_case_drive_letter(&r.name) == path)?;

    let mut current: Option<FileNode> = None;
    for assertion in &result.assertion_results {
        let base = current.as_ref().unwrap_or(file);
        if let Some(updated) = merge_assertion(base, &assertion.ancestor_titles, &assertion.title) {
            current = Some(updated);
        }
    }
    current
}

/// Returns `None` when the assertion already has a node.
fn merge_assertion<T: BlockContainer>(node: &T, ancestor_titles: &[String], title: &str) -> Option<T> {
    match ancestor_titles.split_first() {
        Some((name, rest)) => {
            let mut describes = node.describe_blocks().to_vec();
            match describes.iter().position(|d| &d.label == name) {
                Some(index) => {
                    let updated = merge_assertion(describes[index].as_ref(), rest, title)?;
                    describes[index] = Arc::new(updated);
                }
                None => {
                    let created = DescribeNode::discovered(describe_id(node.id(), name), name.clone(), node.file());
                    let created = merge_assertion(&created, rest, title).unwrap_or(created);
                    describes.push(Arc::new(created));
                }
            }
            Some(node.with_blocks(describes, node.tests().to_vec()))
        }
        None => {
            if node.tests().iter().any(|t| t.label == title) {
                return None;
            }
            let mut tests = node.tests().to_vec();
            tests.push(Arc::new(TestNode::discovered(test_id(node.id(), title), title, node.file())));
            Some(node.with_blocks(node.describe_blocks().to_vec(), tests))
        }
    }
}
