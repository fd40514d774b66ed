//! Measurement execution engine.
//!
//! Runs one invocation at a time as a blocking child process, owns output
//! file placement, and isolates per-invocation failure: a failed probe is
//! logged and counted, never escalated. Successful results are handed to
//! the archival fan-out when endpoints are configured; otherwise the
//! on-disk artifact is the final product.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, error, info};
use serde_json::Value;

use crate::archive::ArchiveClient;
use crate::catalog::{TestCategory, ToolCatalog};
use crate::command::{build_task_args, DirectTool, SCHEDULER_PROGRAM};
use crate::hostspec::NodeRef;
use crate::matrix::{Direction, InvocationPlan, Matrix};
use crate::normalize::normalize_direct_output;
use crate::record::MeasurementRecord;

/// Lifecycle of one invocation. `Succeeded` may move on to `Archived` or
/// `ArchivalFailed` in the downstream stage; those never revert the
/// underlying execution success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Archived,
    ArchivalFailed,
}

/// Why an invocation failed to execute.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("exited with {status}")]
    NonZeroExit { status: ExitStatus },

    #[error("killed after exceeding {timeout_secs}s timeout")]
    Timeout { timeout_secs: u64 },
}

/// Per-invocation result handed back to the run loop.
#[derive(Debug)]
pub struct ExecutionResult {
    pub state: InvocationState,
    pub output_path: PathBuf,
    pub error: Option<ExecError>,
}

/// Counts for the whole run. The run-level outcome is these counts, not a
/// single pass/fail signal; callers needing a hard failure signal derive
/// it themselves.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub invocations: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub archived: usize,
    pub archive_failures: usize,
    pub output_read_failures: usize,
    pub skipped_categories: usize,
}

impl RunSummary {
    pub fn log_totals(&self) {
        info!(
            "Run complete: {} invocations, {} succeeded, {} failed, {} archived, \
             {} archive failures, {} unreadable outputs, {} categories skipped",
            self.invocations,
            self.succeeded,
            self.failed,
            self.archived,
            self.archive_failures,
            self.output_read_failures,
            self.skipped_categories,
        );
    }
}

/// Execution settings shared by every invocation of a run.
pub struct ExecutionEngine {
    output_dir: PathBuf,
    scheduler_program: String,
    probe_timeout: Duration,
    run_id: String,
    src: NodeRef,
}

impl ExecutionEngine {
    pub fn new(output_dir: PathBuf, probe_timeout: Duration, src: NodeRef) -> Result<Self> {
        fs::create_dir_all(&output_dir).wrap_err_with(|| {
            format!("Failed to create output directory '{}'", output_dir.display())
        })?;
        let run_id = format!("run-{}", Utc::now().format("%Y%m%d-%H%M%SZ"));
        Ok(Self {
            output_dir,
            scheduler_program: SCHEDULER_PROGRAM.to_string(),
            probe_timeout,
            run_id,
            src,
        })
    }

    /// Override the scheduler binary (tests point this at a stub script).
    pub fn with_scheduler_program(mut self, program: impl Into<String>) -> Self {
        self.scheduler_program = program.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Unique artifact path for one invocation:
    /// `<outputDir>/<category>/<identity>_<toolOrAuto>_<UTCts>_<direction>.json`.
    fn output_path(&self, plan: &InvocationPlan, node: &NodeRef) -> Result<PathBuf> {
        let category_dir = self.output_dir.join(plan.category.as_str());
        fs::create_dir_all(&category_dir).wrap_err_with(|| {
            format!("Failed to create category directory '{}'", category_dir.display())
        })?;
        let timestamp = Utc::now().format("%Y%m%d-%H%M%SZ");
        Ok(category_dir.join(format!(
            "{}_{}_{}_{}.json",
            node.sanitized(),
            plan.tool_tag(),
            timestamp,
            plan.direction,
        )))
    }

    /// Run every invocation of the matrix against one target, sequentially.
    pub fn run_matrix(
        &self,
        catalog: &ToolCatalog,
        matrix: &Matrix,
        target: &str,
        node: &NodeRef,
        archive: &ArchiveClient,
        summary: &mut RunSummary,
    ) {
        summary.skipped_categories += matrix.skips.len();

        for plan in &matrix.plans {
            summary.invocations += 1;
            match self.run_scheduled(catalog, plan, target, node, archive, summary) {
                Ok(()) => {}
                Err(e) => {
                    // Only output-path/bookkeeping errors land here; probe
                    // failures are already folded into the summary.
                    error!(
                        "Error preparing {} ({}) on {}: {}",
                        plan.category,
                        plan.tool_tag(),
                        target,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    /// One scheduler-profile invocation: synthesize the command, run it to
    /// completion, then normalize and archive the output file.
    fn run_scheduled(
        &self,
        catalog: &ToolCatalog,
        plan: &InvocationPlan,
        target: &str,
        node: &NodeRef,
        archive: &ArchiveClient,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let output_path = self.output_path(plan, node)?;
        let args = build_task_args(catalog, plan, target, &output_path);

        info!(
            "Running {} ({}) -> {} direction={}",
            plan.category,
            plan.tool_tag(),
            target,
            plan.direction
        );
        debug!("Command: {} {}", self.scheduler_program, args.join(" "));

        let mut result = self.run_to_completion(&self.scheduler_program, &args, &output_path);
        if let Some(error) = &result.error {
            error!(
                "Error running {} ({}) on {}: {}",
                plan.category,
                plan.tool_tag(),
                target,
                error
            );
            summary.failed += 1;
            return Ok(());
        }
        summary.succeeded += 1;
        info!(
            "Completed {} ({}) to {}, output: {}",
            plan.category,
            plan.tool_tag(),
            target,
            output_path.display()
        );

        if !archive.has_endpoints() {
            return Ok(());
        }

        let raw = match read_output_json(&output_path) {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    "Could not read output JSON ({}): {}",
                    output_path.display(),
                    e
                );
                summary.output_read_failures += 1;
                return Ok(());
            }
        };

        result.state = self.archive_raw(plan.category, plan.direction, node, raw, archive, summary);
        debug!("Invocation finished in state {:?}", result.state);
        Ok(())
    }

    /// One direct-profile invocation: run the probe binary, capture stdout,
    /// normalize it, write the artifact, then archive. Always forward.
    /// Every failure is folded into the summary; nothing escalates out of
    /// the caller's (host, tool) loop.
    pub fn run_direct(
        &self,
        tool: DirectTool,
        target: &str,
        node: &NodeRef,
        archive: &ArchiveClient,
        summary: &mut RunSummary,
    ) {
        summary.invocations += 1;
        if let Err(e) = self.run_direct_inner(tool, target, node, archive, summary) {
            // Only output-path errors land here; probe, normalization and
            // artifact-write failures are already folded into the summary.
            error!("Error preparing {} on {}: {}", tool.as_str(), target, e);
            summary.failed += 1;
        }
    }

    fn run_direct_inner(
        &self,
        tool: DirectTool,
        target: &str,
        node: &NodeRef,
        archive: &ArchiveClient,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let plan = InvocationPlan {
            category: tool.category(),
            tool: Some(tool.as_str().to_string()),
            direction: Direction::Forward,
        };
        let output_path = self.output_path(&plan, node)?;
        let (program, args) = tool.command(target);

        info!("Running {} to {}", tool.as_str(), target);
        debug!("Command: {} {}", program, args.join(" "));

        let (stdout, error) = self.run_capturing(program, &args);
        if let Some(error) = error {
            error!("Error running {} on {}: {}", tool.as_str(), target, error);
            summary.failed += 1;
            return Ok(());
        }
        summary.succeeded += 1;

        let raw = match normalize_direct_output(tool, &stdout) {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    "Could not normalize {} output for {}: {}",
                    tool.as_str(),
                    target,
                    e
                );
                summary.output_read_failures += 1;
                return Ok(());
            }
        };

        // Execution already succeeded; an artifact that cannot be written
        // is bookkeeping failure, like an unreadable scheduler output.
        let pretty = serde_json::to_string_pretty(&raw).unwrap_or_else(|_| raw.to_string());
        if let Err(e) = fs::write(&output_path, pretty) {
            error!(
                "Failed to write output file '{}': {}",
                output_path.display(),
                e
            );
            summary.output_read_failures += 1;
            return Ok(());
        }
        info!(
            "Completed {} to {}, output saved to {}",
            tool.as_str(),
            target,
            output_path.display()
        );

        if archive.has_endpoints() {
            self.archive_raw(tool.category(), Direction::Forward, node, raw, archive, summary);
        }
        Ok(())
    }

    /// Ship one normalized payload to every endpoint and fold the outcomes
    /// into the summary. Returns the post-archival invocation state.
    fn archive_raw(
        &self,
        category: TestCategory,
        direction: Direction,
        dst: &NodeRef,
        raw: Value,
        archive: &ArchiveClient,
        summary: &mut RunSummary,
    ) -> InvocationState {
        let record = MeasurementRecord::new(category, self.src.clone(), dst.clone(), direction, raw)
            .with_ts(Utc::now())
            .with_run_id(self.run_id.clone());

        let outcomes = archive.deliver(&record);
        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        summary.archived += outcomes.len() - failures;
        summary.archive_failures += failures;

        if failures > 0 {
            InvocationState::ArchivalFailed
        } else {
            InvocationState::Archived
        }
    }

    /// Run a command to completion with inherited stdio, bounded by the
    /// probe timeout. Used for the scheduler profile, which writes its
    /// output to a file itself.
    fn run_to_completion(&self, program: &str, args: &[String], output_path: &Path) -> ExecutionResult {
        let mut result = ExecutionResult {
            state: InvocationState::Pending,
            output_path: output_path.to_path_buf(),
            error: None,
        };

        let mut child = match Command::new(program).args(args).spawn() {
            Ok(child) => child,
            Err(source) => {
                result.state = InvocationState::Failed;
                result.error = Some(ExecError::Spawn {
                    program: program.to_string(),
                    source,
                });
                return result;
            }
        };
        result.state = InvocationState::Running;

        match wait_with_timeout(&mut child, self.probe_timeout) {
            Ok(Some(status)) if status.success() => {
                result.state = InvocationState::Succeeded;
            }
            Ok(Some(status)) => {
                result.state = InvocationState::Failed;
                result.error = Some(ExecError::NonZeroExit { status });
            }
            Ok(None) => {
                result.state = InvocationState::Failed;
                result.error = Some(ExecError::Timeout {
                    timeout_secs: self.probe_timeout.as_secs(),
                });
            }
            Err(source) => {
                result.state = InvocationState::Failed;
                result.error = Some(ExecError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
        result
    }

    /// Run a command with captured stdout (stderr folded in is not needed;
    /// probe diagnostics stay on the console), bounded by the probe timeout.
    fn run_capturing(&self, program: &str, args: &[String]) -> (String, Option<ExecError>) {
        let mut child = match Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                return (
                    String::new(),
                    Some(ExecError::Spawn {
                        program: program.to_string(),
                        source,
                    }),
                )
            }
        };

        // Drain stdout on a separate thread so a chatty probe cannot fill
        // the pipe and deadlock against the timeout poll below.
        let mut stdout_pipe = child.stdout.take();
        let reader = thread::spawn(move || {
            let mut buf = String::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let wait = wait_with_timeout(&mut child, self.probe_timeout);
        let stdout = reader.join().unwrap_or_default();

        let error = match wait {
            Ok(Some(status)) if status.success() => None,
            Ok(Some(status)) => Some(ExecError::NonZeroExit { status }),
            Ok(None) => Some(ExecError::Timeout {
                timeout_secs: self.probe_timeout.as_secs(),
            }),
            Err(source) => Some(ExecError::Spawn {
                program: program.to_string(),
                source,
            }),
        };
        (stdout, error)
    }
}

/// Poll the child until it exits or the deadline passes; on expiry the
/// child is killed and reaped. `Ok(None)` means timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(100));
    }
}

fn read_output_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&text)
        .wrap_err_with(|| format!("Invalid JSON in '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCategory;
    use std::time::Duration;
    use tempfile::tempdir;

    fn engine(dir: &Path) -> ExecutionEngine {
        ExecutionEngine::new(
            dir.to_path_buf(),
            Duration::from_secs(5),
            NodeRef::new("10.0.0.1", "src-node"),
        )
        .unwrap()
    }

    #[test]
    fn test_output_path_scheme() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let plan = InvocationPlan {
            category: TestCategory::Throughput,
            tool: Some("iperf3".to_string()),
            direction: Direction::Reverse,
        };
        let node = NodeRef::new("fd00::2", "nodeB");
        let path = engine.output_path(&plan, &node).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("fd00__2_iperf3_"));
        assert!(name.ends_with("_reverse.json"));
        assert_eq!(
            path.parent().unwrap(),
            dir.path().join("throughput").as_path()
        );
    }

    #[test]
    fn test_output_path_auto_tag_forward() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let plan = InvocationPlan {
            category: TestCategory::Rtt,
            tool: None,
            direction: Direction::Forward,
        };
        let path = engine
            .output_path(&plan, &NodeRef::new("10.0.0.2", "b"))
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("10.0.0.2_auto_"));
        assert!(name.ends_with("_forward.json"));
    }

    #[test]
    fn test_spawn_failure_is_recoverable() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let result = engine.run_to_completion(
            "/nonexistent/probemesh-test-binary",
            &[],
            &dir.path().join("out.json"),
        );
        assert_eq!(result.state, InvocationState::Failed);
        assert!(matches!(result.error, Some(ExecError::Spawn { .. })));
    }

    #[test]
    fn test_nonzero_exit_marks_failed() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let result = engine.run_to_completion(
            "sh",
            &["-c".to_string(), "exit 3".to_string()],
            &dir.path().join("out.json"),
        );
        assert_eq!(result.state, InvocationState::Failed);
        assert!(matches!(result.error, Some(ExecError::NonZeroExit { .. })));
    }

    #[test]
    fn test_successful_exit() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let result =
            engine.run_to_completion("true", &[], &dir.path().join("out.json"));
        assert_eq!(result.state, InvocationState::Succeeded);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempdir().unwrap();
        let engine = ExecutionEngine::new(
            dir.path().to_path_buf(),
            Duration::from_millis(200),
            NodeRef::new("10.0.0.1", "src"),
        )
        .unwrap();
        let start = Instant::now();
        let result = engine.run_to_completion(
            "sleep",
            &["30".to_string()],
            &dir.path().join("out.json"),
        );
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(result.state, InvocationState::Failed);
        assert!(matches!(result.error, Some(ExecError::Timeout { .. })));
    }

    #[test]
    fn test_capture_stdout() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        let (stdout, error) = engine.run_capturing(
            "sh",
            &["-c".to_string(), "printf 'a=1 b=2.5'".to_string()],
        );
        assert!(error.is_none());
        assert_eq!(stdout, "a=1 b=2.5");
    }

    #[test]
    fn test_direct_output_path_failure_is_counted_not_escalated() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path());
        // A regular file where the category directory must go makes the
        // invocation's output-path setup fail before anything is spawned.
        fs::write(dir.path().join("rtt"), "in the way").unwrap();

        let client = ArchiveClient::new(Vec::new(), Duration::from_secs(1)).unwrap();
        let mut summary = RunSummary::default();
        engine.run_direct(
            DirectTool::Ping,
            "10.0.0.2",
            &NodeRef::new("10.0.0.2", "b"),
            &client,
            &mut summary,
        );

        assert_eq!(summary.invocations, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 0);
    }

    #[test]
    fn test_read_output_json_failures_observable() {
        let dir = tempdir().unwrap();
        assert!(read_output_json(&dir.path().join("missing.json")).is_err());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "not json").unwrap();
        assert!(read_output_json(&bad).is_err());
    }
}
