//! Running Jest and turning its results into test events.

pub mod events;
pub mod filter;
pub mod jest;
pub mod results;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::workspace::ProjectConfig;

pub use events::{map_results_to_test_events, TestDecoration, TestEvent, TestState};
pub use filter::{escape_reg_exp, map_test_ids_to_filter, TestFilter};
pub use jest::JestRunner;
pub use results::{JestTotalResults, TestReconciler};

/// A finished run.
#[derive(Debug, Clone, Default)]
pub struct JestResponse {
    pub results: JestTotalResults,
    pub reconciler: TestReconciler,
}

impl JestResponse {
    pub fn new(results: JestTotalResults) -> Self {
        let reconciler = TestReconciler::new(&results);
        Self { results, reconciler }
    }
}

/// Executes the tests of one project.
///
/// A cancelled or crashed run resolves to an error and carries no partial
/// results.
pub trait TestRunner: Send + Sync + 'static {
    fn run(
        &self,
        project: &ProjectConfig,
        filter: Option<&TestFilter>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<JestResponse>> + Send;
}
