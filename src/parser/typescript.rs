use std::path::Path;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator};

use crate::error::{Result, TestTreeError};
use crate::parser::{Location, ParsedBlock, TestFileParseResult, TestFileParser};

const DESCRIBE_NAMES: &[&str] = &["describe", "fdescribe", "xdescribe"];
const TEST_NAMES: &[&str] = &["it", "test", "fit", "xit", "xtest"];
const MODIFIERS: &[&str] = &["only", "skip", "concurrent", "each", "todo", "failing"];

/// Every call whose first argument could be a block title.
const BLOCK_QUERY: &str = r#"
(call_expression
    function: (_) @callee
    arguments: (arguments . (_) @name)
) @call
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Describe,
    Test,
}

/// Finds Jest blocks with tree-sitter.
///
/// `.ts` files use the TypeScript grammar; everything else (`.js`, `.jsx`,
/// `.tsx`, `.mjs`, `.cjs`) uses TSX, which also accepts plain JavaScript.
pub struct TreeSitterTestParser {
    typescript: Query,
    tsx: Query,
}

impl TreeSitterTestParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            typescript: Self::compile(&typescript_language())?,
            tsx: Self::compile(&tsx_language())?,
        })
    }

    fn compile(language: &Language) -> Result<Query> {
        Query::new(language, BLOCK_QUERY).map_err(|e| TestTreeError::Parse(format!("Invalid block query: {}", e)))
    }

    /// Parses in-memory source as if it were the file at `path`.
    pub fn parse_source(&self, path: &Path, source: &str) -> TestFileParseResult {
        match self.extract(path, source) {
            Ok((describe_blocks, it_blocks)) => TestFileParseResult::Success {
                file: path.to_path_buf(),
                describe_blocks,
                it_blocks,
            },
            Err(e) => TestFileParseResult::Failure {
                file: path.to_path_buf(),
                error: e.to_string(),
            },
        }
    }

    fn extract(&self, path: &Path, source: &str) -> Result<(Vec<ParsedBlock>, Vec<ParsedBlock>)> {
        let is_typescript = path.extension().and_then(|ext| ext.to_str()) == Some("ts");
        let (language, query) = if is_typescript {
            (typescript_language(), &self.typescript)
        } else {
            (tsx_language(), &self.tsx)
        };

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| TestTreeError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| TestTreeError::Parse("Failed to parse source".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, column) = first_error(root)
                .map(|n| (n.start_position().row + 1, n.start_position().column))
                .unwrap_or((1, 0));
            return Err(TestTreeError::Parse(format!("Syntax error at {}:{}", line, column)));
        }

        let bytes = source.as_bytes();
        let mut describes = Vec::new();
        let mut tests = Vec::new();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, bytes);

        while let Some(m) = matches.next() {
            let mut call: Option<Node> = None;
            let mut callee: Option<Node> = None;
            let mut name: Option<Node> = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "call" => call = Some(capture.node),
                    "callee" => callee = Some(capture.node),
                    "name" => name = Some(capture.node),
                    _ => {}
                }
            }

            let (Some(call), Some(callee), Some(name)) = (call, callee, name) else {
                continue;
            };

            let block = ParsedBlock::new(
                block_name(&name, bytes),
                location(call.start_position()),
                location(call.end_position()),
            );
            match block_kind(&callee, bytes) {
                Some(BlockKind::Describe) => describes.push(block),
                Some(BlockKind::Test) => tests.push(block),
                None => {}
            }
        }

        Ok((describes, tests))
    }
}

impl TestFileParser for TreeSitterTestParser {
    fn parse(&self, file: &Path) -> TestFileParseResult {
        match std::fs::read_to_string(file) {
            Ok(source) => self.parse_source(file, &source),
            Err(e) => TestFileParseResult::Failure {
                file: file.to_path_buf(),
                error: e.to_string(),
            },
        }
    }
}

fn typescript_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn location(point: tree_sitter::Point) -> Location {
    Location::new(point.row as u32 + 1, point.column as u32)
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Resolves `describe`, `it.only`, `test.concurrent.skip`, `describe.each(table)`
/// and the like to the block they declare. The bare `x.each(table)` call is
/// not itself a block; only the call it returns is.
fn block_kind(callee: &Node, source: &[u8]) -> Option<BlockKind> {
    match callee.kind() {
        "identifier" => {
            let name = node_text(callee, source);
            if DESCRIBE_NAMES.contains(&name) {
                Some(BlockKind::Describe)
            } else if TEST_NAMES.contains(&name) {
                Some(BlockKind::Test)
            } else {
                None
            }
        }
        "member_expression" => {
            let property = node_text(&callee.child_by_field_name("property")?, source);
            if property == "each" || !MODIFIERS.contains(&property) {
                return None;
            }
            block_kind(&callee.child_by_field_name("object")?, source)
        }
        "call_expression" => {
            let function = callee.child_by_field_name("function")?;
            if function.kind() != "member_expression" {
                return None;
            }
            let property = node_text(&function.child_by_field_name("property")?, source);
            if property != "each" {
                return None;
            }
            block_kind(&function.child_by_field_name("object")?, source)
        }
        _ => None,
    }
}

fn block_name(node: &Node, source: &[u8]) -> String {
    let text = node_text(node, source);
    match node.kind() {
        "string" | "template_string" if text.len() >= 2 => text[1..text.len() - 1].to_string(),
        _ => text.to_string(),
    }
}

fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().filter(|c| c.has_error()).find_map(first_error)
}
