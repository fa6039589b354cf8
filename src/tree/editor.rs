//! Single-file edits against an existing project tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::parser::TestFileParseResult;
use crate::tree::builder::{build_file_entry, folder_chain};
use crate::tree::id::{file_id, folder_id};
use crate::tree::{FileEntry, FolderContainer, FolderNode, ProjectRootNode};

/// Inserts or replaces the node for one parsed file, creating any missing
/// folders along its path. A file already present under the same id is
/// swapped in place, whichever parse outcome either side carries.
pub fn insert_file(project: &ProjectRootNode, result: &TestFileParseResult) -> Result<ProjectRootNode> {
    let folders = folder_chain(project.root_path(), result.file())?;
    let entry = Arc::new(build_file_entry(&project.id, result));
    Ok(insert_into(project, &project.id, &folders, entry))
}

fn insert_into<T: FolderContainer>(
    node: &T,
    project_id: &str,
    folders: &[(PathBuf, String)],
    entry: Arc<FileEntry>,
) -> T {
    match folders.split_first() {
        None => {
            let mut files = node.files().to_vec();
            match files.iter().position(|f| f.id() == entry.id()) {
                Some(index) => files[index] = entry,
                None => files.push(entry),
            }
            node.with_children(node.folders().to_vec(), files)
        }
        Some(((path, label), rest)) => {
            let id = folder_id(project_id, path);
            let mut child_folders = node.folders().to_vec();
            match child_folders.iter().position(|f| f.id == id) {
                Some(index) => {
                    let updated = insert_into(child_folders[index].as_ref(), project_id, rest, entry);
                    child_folders[index] = Arc::new(updated);
                }
                None => {
                    let created = insert_into(&FolderNode::new(id, label.clone()), project_id, rest, entry);
                    child_folders.push(Arc::new(created));
                }
            }
            node.with_children(child_folders, node.files().to_vec())
        }
    }
}

/// Removes a file and prunes every folder the removal leaves empty. The
/// project root itself is never pruned.
///
/// Returns `None` when the file is not in the tree, so callers can keep
/// their current snapshot.
pub fn delete_file(project: &ProjectRootNode, file: &Path) -> Option<ProjectRootNode> {
    let folders = match folder_chain(project.root_path(), file) {
        Ok(folders) => folders,
        Err(e) => {
            debug!("Ignoring delete of {}: {}", file.display(), e);
            return None;
        }
    };
    let id = file_id(&project.id, file);
    remove_from(project, &project.id, &folders, &id)
}

fn remove_from<T: FolderContainer>(node: &T, project_id: &str, folders: &[(PathBuf, String)], id: &str) -> Option<T> {
    match folders.split_first() {
        None => {
            let index = node.files().iter().position(|f| f.id() == id)?;
            let mut files = node.files().to_vec();
            files.remove(index);
            Some(node.with_children(node.folders().to_vec(), files))
        }
        Some(((path, _), rest)) => {
            let folder = folder_id(project_id, path);
            let index = node.folders().iter().position(|f| f.id == folder)?;
            let updated = remove_from(node.folders()[index].as_ref(), project_id, rest, id)?;

            let mut child_folders = node.folders().to_vec();
            if updated.is_empty() {
                child_folders.remove(index);
            } else {
                child_folders[index] = Arc::new(updated);
            }
            Some(node.with_children(child_folders, node.files().to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Location, ParsedBlock};
    use crate::tree::test_support::empty_project;

    fn success(file: &str, tests: &[&str]) -> TestFileParseResult {
        TestFileParseResult::Success {
            file: PathBuf::from(file),
            describe_blocks: vec![],
            it_blocks: tests
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let line = i as u32 + 1;
                    ParsedBlock::new(*name, Location::new(line, 0), Location::new(line, 20))
                })
                .collect(),
        }
    }

    #[test]
    fn test_insert_creates_folder_path() {
        let project = empty_project("app", "/root");
        let tree = insert_file(&project, &success("/root/a/b/file.test.js", &["t"])).unwrap();

        assert!(tree.files.is_empty());
        let a = &tree.folders[0];
        assert_eq!(a.id, "app::/root/a");
        let b = &a.folders[0];
        assert_eq!(b.id, "app::/root/a/b");
        assert_eq!(b.files[0].id(), "app::/root/a/b/file.test.js");
    }

    #[test]
    fn test_insert_is_idempotent() {
        let project = empty_project("app", "/root");
        let result = success("/root/a/file.test.js", &["one", "two"]);

        let once = insert_file(&project, &result).unwrap();
        let twice = insert_file(&once, &result).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reinsert_replaces_failure_with_success() {
        let project = empty_project("app", "/root");
        let failure = TestFileParseResult::Failure {
            file: PathBuf::from("/root/x.test.js"),
            error: "boom".into(),
        };

        let broken = insert_file(&project, &failure).unwrap();
        assert!(matches!(broken.files[0].as_ref(), FileEntry::FileWithParseError(_)));

        let fixed = insert_file(&broken, &success("/root/x.test.js", &["t"])).unwrap();
        assert_eq!(fixed.files.len(), 1);
        assert_eq!(fixed.files[0].as_file().unwrap().tests.len(), 1);
    }

    #[test]
    fn test_insert_shares_untouched_subtrees() {
        let project = empty_project("app", "/root");
        let tree = insert_file(&project, &success("/root/a/one.test.js", &["t"])).unwrap();
        let tree = insert_file(&tree, &success("/root/b/two.test.js", &["t"])).unwrap();

        let updated = insert_file(&tree, &success("/root/b/two.test.js", &["t", "u"])).unwrap();
        assert!(Arc::ptr_eq(&tree.folders[0], &updated.folders[0]));
        assert!(!Arc::ptr_eq(&tree.folders[1], &updated.folders[1]));
    }

    #[test]
    fn test_delete_prunes_empty_folders() {
        let project = empty_project("app", "/root");
        let tree = insert_file(&project, &success("/root/a/b/file.test.js", &["t"])).unwrap();

        let pruned = delete_file(&tree, Path::new("/root/a/b/file.test.js")).unwrap();
        assert!(pruned.folders.is_empty());
        assert!(pruned.files.is_empty());
    }

    #[test]
    fn test_delete_keeps_folders_with_siblings() {
        let project = empty_project("app", "/root");
        let tree = insert_file(&project, &success("/root/a/b/one.test.js", &["t"])).unwrap();
        let tree = insert_file(&tree, &success("/root/a/two.test.js", &["t"])).unwrap();

        let pruned = delete_file(&tree, Path::new("/root/a/b/one.test.js")).unwrap();
        assert_eq!(pruned.folders.len(), 1);
        let a = &pruned.folders[0];
        assert!(a.folders.is_empty());
        assert_eq!(a.files.len(), 1);
    }

    #[test]
    fn test_delete_unknown_file_is_none() {
        let project = empty_project("app", "/root");
        let tree = insert_file(&project, &success("/root/a/one.test.js", &["t"])).unwrap();

        assert!(delete_file(&tree, Path::new("/root/a/missing.test.js")).is_none());
        assert!(delete_file(&tree, Path::new("/other/one.test.js")).is_none());
    }
}
