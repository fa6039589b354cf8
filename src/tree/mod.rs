//! Immutable test tree.
//!
//! Nodes are plain values shared through `Arc`. Every edit builds new
//! parents along the changed path and reuses the `Arc`s of untouched
//! subtrees, so a snapshot held by a consumer never changes underneath it.

pub mod builder;
pub mod editor;
pub mod filter;
pub mod id;
pub mod runtime;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::workspace::ProjectConfig;

pub use builder::{build_file_entry, create_project_tree, merge_tree, nest_blocks, NestedBlocks};
pub use editor::{delete_file, insert_file};
pub use filter::{filter_project, filter_workspace};
pub use id::{TestId, ROOT_ID};
pub use runtime::merge_runtime_results;
pub use search::{all_tests, find_file, find_node_by_id, search_project, search_workspace};

/// Discriminant of every node kind in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    WorkspaceRootNode,
    ProjectRootNode,
    Folder,
    File,
    FileWithParseError,
    Describe,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRootNode {
    pub id: String,
    pub label: String,
    pub projects: Vec<Arc<ProjectRootNode>>,
}

impl WorkspaceRootNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: ROOT_ID.to_string(),
            label: label.into(),
            projects: Vec::new(),
        }
    }

    pub fn with_projects(&self, mut projects: Vec<Arc<ProjectRootNode>>) -> Self {
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            projects,
        }
    }

    /// Swaps in `project` for the project with the same id, appending it if
    /// none matches.
    pub fn replace_project(&self, project: Arc<ProjectRootNode>) -> Self {
        let mut projects: Vec<Arc<ProjectRootNode>> = self
            .projects
            .iter()
            .filter(|p| p.id != project.id)
            .cloned()
            .collect();
        projects.push(project);
        self.with_projects(projects)
    }

    pub fn remove_project(&self, root_path: &Path) -> Self {
        let projects = self
            .projects
            .iter()
            .filter(|p| p.config.root_path != root_path)
            .cloned()
            .collect();
        self.with_projects(projects)
    }

    pub fn project(&self, project_id: &str) -> Option<&Arc<ProjectRootNode>> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRootNode {
    pub id: String,
    pub label: String,
    pub config: Arc<ProjectConfig>,
    pub folders: Vec<Arc<FolderNode>>,
    pub files: Vec<Arc<FileEntry>>,
}

impl ProjectRootNode {
    pub fn new(config: Arc<ProjectConfig>) -> Self {
        Self {
            id: config.project_name.clone(),
            label: config.project_name.clone(),
            config,
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.config.root_path
    }

    /// True if any file exists anywhere in the folder tree.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty() || self.folders.iter().any(|f| f.has_files())
    }

    /// Every file entry, folders first, in tree order.
    pub fn file_entries(&self) -> Vec<&FileEntry> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub label: String,
    pub folders: Vec<Arc<FolderNode>>,
    pub files: Vec<Arc<FileEntry>>,
}

impl FolderNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            folders: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty() || self.folders.iter().any(|f| f.has_files())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

/// Anything that owns folders and files: a project root or a folder.
pub trait FolderContainer: Clone {
    fn id(&self) -> &str;
    fn folders(&self) -> &[Arc<FolderNode>];
    fn files(&self) -> &[Arc<FileEntry>];
    fn with_children(&self, folders: Vec<Arc<FolderNode>>, files: Vec<Arc<FileEntry>>) -> Self;
}

impl FolderContainer for ProjectRootNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn folders(&self) -> &[Arc<FolderNode>] {
        &self.folders
    }

    fn files(&self) -> &[Arc<FileEntry>] {
        &self.files
    }

    fn with_children(&self, folders: Vec<Arc<FolderNode>>, files: Vec<Arc<FileEntry>>) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            config: Arc::clone(&self.config),
            folders,
            files,
        }
    }
}

impl FolderContainer for FolderNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn folders(&self) -> &[Arc<FolderNode>] {
        &self.folders
    }

    fn files(&self) -> &[Arc<FileEntry>] {
        &self.files
    }

    fn with_children(&self, folders: Vec<Arc<FolderNode>>, files: Vec<Arc<FileEntry>>) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            folders,
            files,
        }
    }
}

fn collect_files<'a, T: FolderContainer>(node: &'a T, out: &mut Vec<&'a FileEntry>) {
    for folder in node.folders() {
        collect_files(folder.as_ref(), out);
    }
    out.extend(node.files().iter().map(|f| f.as_ref()));
}

/// A test source file, either parsed or carrying its parse error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileEntry {
    File(FileNode),
    FileWithParseError(FileWithParseErrorNode),
}

impl FileEntry {
    pub fn id(&self) -> &str {
        match self {
            FileEntry::File(f) => &f.id,
            FileEntry::FileWithParseError(f) => &f.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FileEntry::File(f) => &f.label,
            FileEntry::FileWithParseError(f) => &f.label,
        }
    }

    pub fn file(&self) -> &Path {
        match self {
            FileEntry::File(f) => &f.file,
            FileEntry::FileWithParseError(f) => &f.file,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            FileEntry::File(f) => Some(f),
            FileEntry::FileWithParseError(_) => None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FileEntry::File(_) => NodeKind::File,
            FileEntry::FileWithParseError(_) => NodeKind::FileWithParseError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub label: String,
    pub file: PathBuf,
    pub line: u32,
    pub describe_blocks: Vec<Arc<DescribeNode>>,
    pub tests: Vec<Arc<TestNode>>,
}

impl FileNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            file: file.into(),
            line: 0,
            describe_blocks: Vec::new(),
            tests: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWithParseErrorNode {
    pub id: String,
    pub label: String,
    pub file: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeNode {
    pub id: String,
    pub label: String,
    pub file: PathBuf,
    /// Zero-based source line; `None` for runtime-discovered blocks.
    pub line: Option<u32>,
    pub describe_blocks: Vec<Arc<DescribeNode>>,
    pub tests: Vec<Arc<TestNode>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub runtime_discovered: bool,
}

impl DescribeNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            file: file.into(),
            line: Some(line),
            describe_blocks: Vec::new(),
            tests: Vec::new(),
            runtime_discovered: false,
        }
    }

    /// A describe block known only from run results.
    pub fn discovered(id: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            line: None,
            runtime_discovered: true,
            ..Self::new(id, label, file, 0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNode {
    pub id: String,
    pub label: String,
    pub file: PathBuf,
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub runtime_discovered: bool,
}

impl TestNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            file: file.into(),
            line: Some(line),
            runtime_discovered: false,
        }
    }

    pub fn discovered(id: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            file: file.into(),
            line: None,
            runtime_discovered: true,
        }
    }
}

/// Anything that owns describe blocks and tests: a parsed file or a describe.
pub trait BlockContainer: Clone {
    fn id(&self) -> &str;
    fn file(&self) -> &Path;
    fn describe_blocks(&self) -> &[Arc<DescribeNode>];
    fn tests(&self) -> &[Arc<TestNode>];
    fn with_blocks(&self, describe_blocks: Vec<Arc<DescribeNode>>, tests: Vec<Arc<TestNode>>) -> Self;
}

impl BlockContainer for FileNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn file(&self) -> &Path {
        &self.file
    }

    fn describe_blocks(&self) -> &[Arc<DescribeNode>] {
        &self.describe_blocks
    }

    fn tests(&self) -> &[Arc<TestNode>] {
        &self.tests
    }

    fn with_blocks(&self, describe_blocks: Vec<Arc<DescribeNode>>, tests: Vec<Arc<TestNode>>) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            file: self.file.clone(),
            line: self.line,
            describe_blocks,
            tests,
        }
    }
}

impl BlockContainer for DescribeNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn file(&self) -> &Path {
        &self.file
    }

    fn describe_blocks(&self) -> &[Arc<DescribeNode>] {
        &self.describe_blocks
    }

    fn tests(&self) -> &[Arc<TestNode>] {
        &self.tests
    }

    fn with_blocks(&self, describe_blocks: Vec<Arc<DescribeNode>>, tests: Vec<Arc<TestNode>>) -> Self {
        Self {
            id: self.id.clone(),
            label: self.label.clone(),
            file: self.file.clone(),
            line: self.line,
            describe_blocks,
            tests,
            runtime_discovered: self.runtime_discovered,
        }
    }
}

/// Borrowed view over any node, used where code has to handle every kind.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    WorkspaceRoot(&'a WorkspaceRootNode),
    ProjectRoot(&'a ProjectRootNode),
    Folder(&'a FolderNode),
    File(&'a FileNode),
    FileWithParseError(&'a FileWithParseErrorNode),
    Describe(&'a DescribeNode),
    Test(&'a TestNode),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            NodeRef::WorkspaceRoot(n) => &n.id,
            NodeRef::ProjectRoot(n) => &n.id,
            NodeRef::Folder(n) => &n.id,
            NodeRef::File(n) => &n.id,
            NodeRef::FileWithParseError(n) => &n.id,
            NodeRef::Describe(n) => &n.id,
            NodeRef::Test(n) => &n.id,
        }
    }

    pub fn label(&self) -> &'a str {
        match self {
            NodeRef::WorkspaceRoot(n) => &n.label,
            NodeRef::ProjectRoot(n) => &n.label,
            NodeRef::Folder(n) => &n.label,
            NodeRef::File(n) => &n.label,
            NodeRef::FileWithParseError(n) => &n.label,
            NodeRef::Describe(n) => &n.label,
            NodeRef::Test(n) => &n.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::WorkspaceRoot(_) => NodeKind::WorkspaceRootNode,
            NodeRef::ProjectRoot(_) => NodeKind::ProjectRootNode,
            NodeRef::Folder(_) => NodeKind::Folder,
            NodeRef::File(_) => NodeKind::File,
            NodeRef::FileWithParseError(_) => NodeKind::FileWithParseError,
            NodeRef::Describe(_) => NodeKind::Describe,
            NodeRef::Test(_) => NodeKind::Test,
        }
    }
}

impl<'a> From<&'a FileEntry> for NodeRef<'a> {
    fn from(entry: &'a FileEntry) -> Self {
        match entry {
            FileEntry::File(f) => NodeRef::File(f),
            FileEntry::FileWithParseError(f) => NodeRef::FileWithParseError(f),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn project_config(name: &str, root: &str) -> Arc<ProjectConfig> {
        Arc::new(ProjectConfig::new(name, PathBuf::from(root)))
    }

    pub fn empty_project(name: &str, root: &str) -> ProjectRootNode {
        ProjectRootNode::new(project_config(name, root))
    }
}
