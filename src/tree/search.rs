use std::path::Path;

use crate::tree::id::lower_case_drive_letter;
use crate::tree::{
    BlockContainer, DescribeNode, FileEntry, FileNode, FolderContainer, NodeRef, ProjectRootNode, TestNode,
    WorkspaceRootNode,
};

/// Depth-first search for the first node accepted by `matches`.
pub fn search_workspace<'a, F>(root: &'a WorkspaceRootNode, matches: F) -> Option<NodeRef<'a>>
where
    F: Fn(&NodeRef<'a>) -> bool,
{
    let node = NodeRef::WorkspaceRoot(root);
    if matches(&node) {
        return Some(node);
    }
    root.projects.iter().find_map(|p| search_project(p, &matches))
}

pub fn search_project<'a, F>(project: &'a ProjectRootNode, matches: F) -> Option<NodeRef<'a>>
where
    F: Fn(&NodeRef<'a>) -> bool,
{
    let node = NodeRef::ProjectRoot(project);
    if matches(&node) {
        return Some(node);
    }
    search_folder(project, &matches)
}

fn search_folder<'a, T, F>(container: &'a T, matches: &F) -> Option<NodeRef<'a>>
where
    T: FolderContainer,
    F: Fn(&NodeRef<'a>) -> bool,
{
    container
        .folders()
        .iter()
        .find_map(|folder| {
            let node = NodeRef::Folder(folder);
            if matches(&node) {
                Some(node)
            } else {
                search_folder(folder.as_ref(), matches)
            }
        })
        .or_else(|| container.files().iter().find_map(|entry| search_file(entry, matches)))
}

fn search_file<'a, F>(entry: &'a FileEntry, matches: &F) -> Option<NodeRef<'a>>
where
    F: Fn(&NodeRef<'a>) -> bool,
{
    let node = NodeRef::from(entry);
    if matches(&node) {
        return Some(node);
    }
    match entry {
        FileEntry::File(file) => search_blocks(file, matches),
        FileEntry::FileWithParseError(_) => None,
    }
}

fn search_blocks<'a, T, F>(container: &'a T, matches: &F) -> Option<NodeRef<'a>>
where
    T: BlockContainer,
    F: Fn(&NodeRef<'a>) -> bool,
{
    container
        .describe_blocks()
        .iter()
        .find_map(|describe| {
            let node = NodeRef::Describe(describe);
            if matches(&node) {
                Some(node)
            } else {
                search_blocks(describe.as_ref(), matches)
            }
        })
        .or_else(|| {
            container
                .tests()
                .iter()
                .map(|t| NodeRef::Test(t))
                .find(|node| matches(node))
        })
}

pub fn find_node_by_id<'a>(root: &'a WorkspaceRootNode, id: &str) -> Option<NodeRef<'a>> {
    search_workspace(root, |node| node.id() == id)
}

/// Finds the file node for `file`, comparing paths with the drive letter
/// lowercased.
pub fn find_file<'a>(project: &'a ProjectRootNode, file: &Path) -> Option<&'a FileEntry> {
    let wanted = lower_case_drive_letter(&file.to_string_lossy());
    project
        .file_entries()
        .into_iter()
        .find(|entry| lower_case_drive_letter(&entry.file().to_string_lossy()) == wanted)
}

/// Every test under a file or describe, innermost describes first.
pub fn all_tests<T: BlockContainer>(container: &T) -> Vec<&TestNode> {
    let mut out = Vec::new();
    collect_tests(container, &mut out);
    out
}

fn collect_tests<'a, T: BlockContainer>(container: &'a T, out: &mut Vec<&'a TestNode>) {
    for describe in container.describe_blocks() {
        collect_tests::<DescribeNode>(describe, out);
    }
    out.extend(container.tests().iter().map(|t| t.as_ref()));
}

/// Count of tests in a parsed file, used for summaries.
pub fn count_tests(file: &FileNode) -> usize {
    all_tests(file).len()
}
