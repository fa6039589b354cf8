use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TestTreeError};
use crate::workspace::ProjectConfig;

use super::results::JestTotalResults;
use super::{JestResponse, TestFilter, TestRunner};

/// Runs the project's Jest command as a child process and reads its
/// `--json` report from stdout.
#[derive(Debug, Clone, Default)]
pub struct JestRunner;

impl JestRunner {
    pub fn new() -> Self {
        Self
    }

    /// Program and arguments for one run of `project`.
    pub fn command_line(project: &ProjectConfig, filter: Option<&TestFilter>) -> (String, Vec<String>) {
        let mut parts = project.jest_command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "jest".to_string());
        let mut args: Vec<String> = parts.collect();

        args.push("--json".to_string());
        args.push("--testLocationInResults".to_string());

        if let Some(config) = &project.jest_config {
            args.push("--config".to_string());
            args.push(config.to_string_lossy().into_owned());
        }

        if let Some(filter) = filter {
            if let Some(pattern) = &filter.test_file_name_pattern {
                args.push("--testPathPattern".to_string());
                args.push(pattern.clone());
            }
            if let Some(pattern) = &filter.test_name_pattern {
                args.push("--testNamePattern".to_string());
                args.push(pattern.clone());
            }
        }

        (program, args)
    }
}

impl TestRunner for JestRunner {
    async fn run(
        &self,
        project: &ProjectConfig,
        filter: Option<&TestFilter>,
        cancel: CancellationToken,
    ) -> Result<JestResponse> {
        let (program, args) = Self::command_line(project, filter);
        info!("Running {} {} in {}", program, args.join(" "), project.jest_execution_directory.display());

        let mut command = if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&program);
            command
        } else {
            Command::new(&program)
        };

        let child = command
            .args(&args)
            .current_dir(&project.jest_execution_directory)
            // Keeps react-scripts out of watch mode.
            .env("CI", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TestTreeError::Runner(format!("failed to start {}: {}", program, e)))?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Jest run for {} cancelled", project.project_name);
                return Err(TestTreeError::Cancelled);
            }
            output = child.wait_with_output() => output?,
        };

        debug!("Jest exited with {}", output.status);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let json = stdout.find('{').map(|start| &stdout[start..]).unwrap_or("");

        match serde_json::from_str::<JestTotalResults>(json) {
            Ok(results) => Ok(JestResponse::new(results)),
            Err(e) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("Jest produced no readable results ({}): {}", e, stderr.trim());
                Err(TestTreeError::Runner(format!(
                    "jest exited with {} without JSON results: {}",
                    output.status,
                    last_line(&stderr)
                )))
            }
        }
    }
}

fn last_line(text: &str) -> &str {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}
