//! Integration tests for the test tree: ids, nesting, edits, filtering and
//! runtime merges, through the public API only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jest_test_tree::parser::{Location, ParsedBlock};
use jest_test_tree::runner::results::{AssertionStatus, FileStatus, JestAssertionResult, JestFileResult};
use jest_test_tree::tree::id::{describe_id, file_id, test_id};
use jest_test_tree::tree::search::all_tests;
use jest_test_tree::tree::{
    create_project_tree, delete_file, filter_project, filter_workspace, insert_file, merge_runtime_results,
    FileEntry, ProjectRootNode, WorkspaceRootNode,
};
use jest_test_tree::{ProjectConfig, TestFileParseResult, TestId, ROOT_ID};

fn block(name: &str, start: (u32, u32), end: (u32, u32)) -> ParsedBlock {
    ParsedBlock::new(name, Location::new(start.0, start.1), Location::new(end.0, end.1))
}

fn config(root: &str) -> Arc<ProjectConfig> {
    Arc::new(ProjectConfig::new("app", PathBuf::from(root)))
}

fn parsed(file: &str, describes: Vec<ParsedBlock>, tests: Vec<ParsedBlock>) -> TestFileParseResult {
    TestFileParseResult::Success {
        file: PathBuf::from(file),
        describe_blocks: describes,
        it_blocks: tests,
    }
}

fn file_node<'a>(project: &'a ProjectRootNode, file: &str) -> &'a FileEntry {
    project
        .file_entries()
        .into_iter()
        .find(|f| f.file() == Path::new(file))
        .expect("file should be in the tree")
}

// ============================================================================
// Identifier Tests
// ============================================================================

mod identifiers {
    use super::*;

    #[test]
    fn test_round_trip_keeps_every_field() {
        let id = TestId::project("app")
            .with_file("/repo/src/math.test.js")
            .with_describes(["math", "adding"])
            .with_test("handles negatives");

        assert_eq!(TestId::decode(&id.encode()), id);
    }

    #[test]
    fn test_decode_without_file_means_whole_project() {
        let decoded = TestId::decode("app");
        assert_eq!(decoded.project_id, "app");
        assert!(decoded.file_name.is_none());
        assert!(decoded.test_id.is_none());
    }

    #[test]
    fn test_built_ids_match_encoded_ids() {
        let file = file_id("app", Path::new("/repo/a.test.js"));
        let id = test_id(&describe_id(&file, "suite"), "works");

        let expected = TestId::project("app")
            .with_file("/repo/a.test.js")
            .with_describes(["suite"])
            .with_test("works");
        assert_eq!(id, expected.encode());
    }
}

// ============================================================================
// Tree Construction Tests
// ============================================================================

mod construction {
    use super::*;

    #[test]
    fn test_contained_test_nests_under_describe() {
        let results = vec![parsed(
            "/repo/a.test.js",
            vec![block("D", (10, 0), (20, 0))],
            vec![block("T", (12, 4), (12, 30))],
        )];
        let project = create_project_tree(config("/repo"), &results);

        let file = file_node(&project, "/repo/a.test.js").as_file().expect("parsed file");
        assert!(file.tests.is_empty());
        assert_eq!(file.describe_blocks[0].tests[0].label, "T");
    }

    #[test]
    fn test_disjoint_test_stays_at_file_level() {
        let results = vec![parsed(
            "/repo/a.test.js",
            vec![block("D", (1, 0), (5, 0))],
            vec![block("T", (6, 0), (6, 10))],
        )];
        let project = create_project_tree(config("/repo"), &results);

        let file = file_node(&project, "/repo/a.test.js").as_file().expect("parsed file");
        assert!(file.describe_blocks[0].tests.is_empty());
        assert_eq!(file.tests[0].label, "T");
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let results = vec![
            parsed("/repo/a.test.js", vec![], vec![block("ok", (1, 0), (1, 20))]),
            TestFileParseResult::Failure {
                file: PathBuf::from("/repo/b.test.js"),
                error: "Unexpected token (3:4)".to_string(),
            },
        ];
        let project = create_project_tree(config("/repo"), &results);

        assert!(file_node(&project, "/repo/a.test.js").as_file().is_some());
        let FileEntry::FileWithParseError(failed) = file_node(&project, "/repo/b.test.js") else {
            panic!("expected a parse error node");
        };
        assert_eq!(failed.error, "Unexpected token (3:4)");
    }
}

// ============================================================================
// Tree Editing Tests
// ============================================================================

mod editing {
    use super::*;

    #[test]
    fn test_deleting_only_file_prunes_every_folder() {
        let project = create_project_tree(
            config("/root"),
            &[parsed("/root/a/b/file.test.js", vec![], vec![block("t", (1, 0), (1, 10))])],
        );
        assert_eq!(project.folders.len(), 1);

        let pruned = delete_file(&project, Path::new("/root/a/b/file.test.js")).expect("file was in the tree");

        assert!(pruned.folders.is_empty());
        assert!(pruned.files.is_empty());
    }

    #[test]
    fn test_inserting_same_result_twice_is_idempotent() {
        let project = ProjectRootNode::new(config("/repo"));
        let result = parsed(
            "/repo/src/a.test.js",
            vec![block("suite", (1, 0), (4, 2))],
            vec![block("works", (2, 2), (3, 4))],
        );

        let once = insert_file(&project, &result).expect("file is inside the root");
        let twice = insert_file(&once, &result).expect("file is inside the root");

        assert_eq!(once, twice);
    }

    #[test]
    fn test_insert_outside_root_fails() {
        let project = ProjectRootNode::new(config("/repo"));
        let result = parsed("/elsewhere/a.test.js", vec![], vec![]);

        assert!(insert_file(&project, &result).is_err());
    }
}

// ============================================================================
// Filtering Tests
// ============================================================================

mod filtering {
    use super::*;

    fn two_files() -> Arc<ProjectRootNode> {
        Arc::new(create_project_tree(
            config("/repo"),
            &[
                parsed(
                    "/repo/f1.test.js",
                    vec![],
                    vec![block("first", (1, 0), (1, 20)), block("second", (2, 0), (2, 20))],
                ),
                parsed("/repo/f2.test.js", vec![], vec![block("other", (1, 0), (1, 20))]),
            ],
        ))
    }

    #[test]
    fn test_single_test_request_keeps_only_its_file() {
        let project = two_files();
        let wanted = test_id(&file_id("app", Path::new("/repo/f1.test.js")), "first");

        let filtered = filter_project(&project, &[wanted.clone()]);

        let files = filtered.file_entries();
        assert_eq!(files.len(), 1);
        let tests = all_tests(files[0].as_file().expect("parsed file"));
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].id, wanted);
    }

    #[test]
    fn test_root_request_returns_tree_unchanged() {
        let root = Arc::new(WorkspaceRootNode::new("ws").with_projects(vec![two_files()]));

        let filtered = filter_workspace(&root, &[ROOT_ID.to_string()]);

        assert!(Arc::ptr_eq(&root, &filtered));
    }
}

// ============================================================================
// Runtime Merge Tests
// ============================================================================

mod runtime_merge {
    use super::*;

    fn run_result(file: &str) -> JestFileResult {
        JestFileResult {
            name: file.to_string(),
            status: FileStatus::Passed,
            message: String::new(),
            assertion_results: vec![JestAssertionResult {
                title: "generated".to_string(),
                ancestor_titles: vec!["A".to_string(), "B".to_string()],
                full_name: "A B generated".to_string(),
                status: AssertionStatus::Passed,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_merge_synthesises_missing_nodes_once() {
        let project = create_project_tree(config("/repo"), &[parsed("/repo/x.test.js", vec![], vec![])]);
        let results = vec![run_result("/repo/x.test.js")];

        let merged = merge_runtime_results(&project, &results);
        let file = file_node(&merged, "/repo/x.test.js").as_file().expect("parsed file").clone();

        assert_eq!(file.describe_blocks.len(), 1);
        let a = &file.describe_blocks[0];
        assert_eq!(a.label, "A");
        assert!(a.runtime_discovered);
        assert_eq!(a.describe_blocks.len(), 1);
        let b = &a.describe_blocks[0];
        assert_eq!(b.label, "B");
        assert_eq!(b.tests.len(), 1);
        assert!(b.tests[0].runtime_discovered);
        assert!(b.tests[0].line.is_none());

        let merged_again = merge_runtime_results(&merged, &results);
        assert_eq!(merged_again, merged);
    }

    #[test]
    fn test_merge_reuses_parsed_nodes() {
        let project = create_project_tree(
            config("/repo"),
            &[parsed(
                "/repo/x.test.js",
                vec![block("A", (1, 0), (10, 0)), block("B", (2, 2), (9, 2))],
                vec![block("generated", (3, 4), (5, 6))],
            )],
        );

        let merged = merge_runtime_results(&project, &[run_result("/repo/x.test.js")]);

        assert_eq!(merged, project);
    }
}
