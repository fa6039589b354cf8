//! Static discovery of describe/test blocks in test source files.

pub mod matcher;
pub mod scanner;
pub mod typescript;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use matcher::{FileType, TestMatcher};
pub use scanner::ProjectScanner;
pub use typescript::TreeSitterTestParser;

/// One-based line, zero-based column, as editors and Jest report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A `describe` or `it` call with the span of the whole call expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBlock {
    pub name: String,
    pub start: Location,
    pub end: Location,
}

impl ParsedBlock {
    pub fn new(name: impl Into<String>, start: Location, end: Location) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Position containment with inclusive bounds, so a block spanning
    /// exactly the same range counts as contained.
    pub fn contains(&self, other: &ParsedBlock) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

/// Outcome of statically parsing one test file. Blocks are flat and in
/// source order; nesting is recovered from their spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TestFileParseResult {
    #[serde(rename_all = "camelCase")]
    Success {
        file: PathBuf,
        describe_blocks: Vec<ParsedBlock>,
        it_blocks: Vec<ParsedBlock>,
    },
    Failure { file: PathBuf, error: String },
}

impl TestFileParseResult {
    pub fn file(&self) -> &Path {
        match self {
            TestFileParseResult::Success { file, .. } => file,
            TestFileParseResult::Failure { file, .. } => file,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestFileParseResult::Success { .. })
    }
}

/// Turns a test file into its flat describe/test blocks.
///
/// Implementations never fail outright: unreadable or unparsable files
/// come back as [`TestFileParseResult::Failure`].
pub trait TestFileParser: Send + Sync {
    fn parse(&self, file: &Path) -> TestFileParseResult;
}
