use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{error, warn};

use crate::error::{Result, TestTreeError};
use crate::parser::{ParsedBlock, TestFileParseResult};
use crate::tree::editor::insert_file;
use crate::tree::id::{contains_separator, describe_id, file_id, test_id};
use crate::tree::{DescribeNode, FileEntry, FileNode, FileWithParseErrorNode, ProjectRootNode, TestNode};
use crate::workspace::ProjectConfig;

/// Describe/test blocks of one file after nesting by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedBlocks {
    pub describe_blocks: Vec<NestedDescribe>,
    pub tests: Vec<ParsedBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedDescribe {
    pub block: ParsedBlock,
    pub children: NestedBlocks,
}

impl NestedBlocks {
    fn insert_describe(&mut self, block: ParsedBlock) {
        match self.describe_blocks.iter_mut().find(|d| d.block.contains(&block)) {
            Some(parent) => parent.children.insert_describe(block),
            None => self.describe_blocks.push(NestedDescribe {
                block,
                children: NestedBlocks::default(),
            }),
        }
    }

    fn insert_test(&mut self, test: ParsedBlock) {
        match self.describe_blocks.iter_mut().find(|d| d.block.contains(&test)) {
            Some(parent) => parent.children.insert_test(test),
            None => self.tests.push(test),
        }
    }
}

/// Nests flat describe and test blocks by span containment.
///
/// Describes are placed outermost first, so the result does not depend on
/// the order the parser reported them in. Each test lands in its innermost
/// containing describe, or at file level when none contains it.
pub fn nest_blocks(describe_blocks: &[ParsedBlock], it_blocks: &[ParsedBlock]) -> NestedBlocks {
    let mut describes = describe_blocks.to_vec();
    describes.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.end.cmp(&a.end))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut tests = it_blocks.to_vec();
    tests.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));

    let mut nested = NestedBlocks::default();
    for describe in describes {
        nested.insert_describe(describe);
    }
    for test in tests {
        nested.insert_test(test);
    }
    nested
}

/// Builds the node for one file's parse outcome.
pub fn build_file_entry(project_id: &str, result: &TestFileParseResult) -> FileEntry {
    match result {
        TestFileParseResult::Success {
            file,
            describe_blocks,
            it_blocks,
        } => {
            let id = file_id(project_id, file);
            let nested = nest_blocks(describe_blocks, it_blocks);
            let (describe_blocks, tests) = to_nodes(&id, file, &nested);
            FileEntry::File(FileNode {
                describe_blocks,
                tests,
                ..FileNode::new(id, file_label(file), file.clone())
            })
        }
        TestFileParseResult::Failure { file, error: message } => {
            error!("Failed to parse test file {}: {}", file.display(), message);
            FileEntry::FileWithParseError(FileWithParseErrorNode {
                id: file_id(project_id, file),
                label: file_label(file),
                file: file.clone(),
                error: message.clone(),
            })
        }
    }
}

fn to_nodes(parent_id: &str, file: &Path, nested: &NestedBlocks) -> (Vec<Arc<DescribeNode>>, Vec<Arc<TestNode>>) {
    let describes = nested
        .describe_blocks
        .iter()
        .map(|d| {
            warn_on_separator(file, &d.block.name);
            let id = describe_id(parent_id, &d.block.name);
            let (describe_blocks, tests) = to_nodes(&id, file, &d.children);
            Arc::new(DescribeNode {
                describe_blocks,
                tests,
                ..DescribeNode::new(id, d.block.name.clone(), file, zero_based(&d.block))
            })
        })
        .collect();

    let tests = nested
        .tests
        .iter()
        .map(|t| {
            warn_on_separator(file, &t.name);
            Arc::new(TestNode::new(test_id(parent_id, &t.name), t.name.clone(), file, zero_based(t)))
        })
        .collect();

    (describes, tests)
}

fn zero_based(block: &ParsedBlock) -> u32 {
    block.start.line.saturating_sub(1)
}

fn warn_on_separator(file: &Path, name: &str) {
    if contains_separator(name) {
        warn!(
            "Block name {:?} in {} contains an id separator; its id may not decode cleanly",
            name,
            file.display()
        );
    }
}

pub(crate) fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

/// Absolute paths of every folder between `root` (exclusive) and the
/// directory holding `file`, outermost first, each with its label.
pub(crate) fn folder_chain(root: &Path, file: &Path) -> Result<Vec<(PathBuf, String)>> {
    let relative = file
        .strip_prefix(root)
        .map_err(|_| TestTreeError::FileOutsideRoot {
            file: file.to_path_buf(),
            root: root.to_path_buf(),
        })?;

    let mut current = root.to_path_buf();
    let mut chain = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            if let Component::Normal(segment) = component {
                current.push(segment);
                chain.push((current.clone(), segment.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(chain)
}

/// Builds a fresh project tree from a batch of parse outcomes.
pub fn create_project_tree(config: Arc<ProjectConfig>, results: &[TestFileParseResult]) -> ProjectRootNode {
    merge_tree(&ProjectRootNode::new(config), results)
}

/// Folds parse outcomes into an existing project tree. Files outside the
/// project root are logged and skipped; the rest still merge.
pub fn merge_tree(tree: &ProjectRootNode, results: &[TestFileParseResult]) -> ProjectRootNode {
    results.iter().fold(tree.clone(), |acc, result| match insert_file(&acc, result) {
        Ok(updated) => updated,
        Err(e) => {
            error!("Skipping {}: {}", result.file().display(), e);
            acc
        }
    })
}
