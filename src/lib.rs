pub mod adapter;
pub mod error;
pub mod parser;
pub mod runner;
pub mod settings;
pub mod tree;
pub mod watcher;
pub mod workspace;

pub use adapter::{
    JestTestAdapter, LoadEvent, ProjectManager, ProjectTestLoader, ProjectsChangedEvent, RetireEvent, RunEvent,
    TestSuiteInfo,
};
pub use error::{Result, TestTreeError};
pub use parser::{ProjectScanner, TestFileParseResult, TestFileParser, TestMatcher, TreeSitterTestParser};
pub use runner::{JestResponse, JestRunner, TestEvent, TestFilter, TestRunner, TestState};
pub use settings::AdapterSettings;
pub use tree::{ProjectRootNode, TestId, WorkspaceRootNode, ROOT_ID};
pub use watcher::{FileEvent, FileWatcher};
pub use workspace::{ProjectConfig, RepoKind, WorkspaceDetector, WorkspaceInfo};
