//! External-process command synthesis.
//!
//! Builds the full argument vector for one invocation. Two profiles exist:
//! the scheduler profile hands the whole task to `pscheduler`, which writes
//! JSON to the output path itself; the direct profile runs a probe binary
//! and the caller captures stdout.

use std::path::Path;

use crate::catalog::{TestCategory, ToolCatalog};
use crate::matrix::InvocationPlan;

/// Scheduler binary invoked for the scheduler profile.
pub const SCHEDULER_PROGRAM: &str = "pscheduler";

/// Build the `pscheduler task` argument list for one invocation.
///
/// The tool-selection flag is included only when a tool is pinned; in auto
/// mode it is omitted entirely so the scheduler performs its own selection.
/// Category-level extras are always appended, tool-specific extras only for
/// the selected tool, and `--reverse` only for reverse invocations (the
/// resolver guarantees those exist solely for reverse-capable categories).
pub fn build_task_args(
    catalog: &ToolCatalog,
    plan: &InvocationPlan,
    target: &str,
    output_path: &Path,
) -> Vec<String> {
    let mut args = vec!["task".to_string()];

    if let Some(tool) = &plan.tool {
        args.push("--tool".to_string());
        args.push(tool.clone());
    }

    args.push("--format".to_string());
    args.push("json".to_string());
    args.push("--output".to_string());
    args.push(output_path.to_string_lossy().into_owned());
    args.push(plan.category.as_str().to_string());
    args.push("--dest".to_string());
    args.push(target.to_string());

    for arg in catalog.entry(plan.category).extra_args {
        args.push(arg.to_string());
    }

    if let Some(tool) = &plan.tool {
        for arg in catalog.tool_extra_args(plan.category, tool) {
            args.push(arg.to_string());
        }
    }

    if plan.direction.is_reverse() {
        args.push("--reverse".to_string());
    }

    args
}

/// Probe tools runnable without the scheduler, with their base commands
/// and the category their results are archived under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DirectTool {
    Ping,
    Traceroute,
    Nuttcp,
    Iperf3,
}

impl DirectTool {
    pub const ALL: [DirectTool; 4] = [
        DirectTool::Ping,
        DirectTool::Traceroute,
        DirectTool::Nuttcp,
        DirectTool::Iperf3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectTool::Ping => "ping",
            DirectTool::Traceroute => "traceroute",
            DirectTool::Nuttcp => "nuttcp",
            DirectTool::Iperf3 => "iperf3",
        }
    }

    /// Category used for output placement and archival routing.
    pub fn category(&self) -> TestCategory {
        match self {
            DirectTool::Ping => TestCategory::Rtt,
            DirectTool::Traceroute => TestCategory::Trace,
            DirectTool::Nuttcp | DirectTool::Iperf3 => TestCategory::Throughput,
        }
    }

    /// Full `(program, args)` for one run against `target`.
    pub fn command(&self, target: &str) -> (&'static str, Vec<String>) {
        let args: Vec<String> = match self {
            DirectTool::Ping => vec!["-c".into(), "5".into(), target.into()],
            DirectTool::Traceroute => vec![target.into()],
            DirectTool::Nuttcp => vec![
                "-fparse".into(),
                "-fxmitstats".into(),
                "-frunningtotal".into(),
                "-j".into(),
                "-T5".into(),
                target.into(),
            ],
            DirectTool::Iperf3 => vec![
                "-c".into(),
                target.into(),
                "-P".into(),
                "4".into(),
                "-t".into(),
                "30".into(),
                "-i".into(),
                "10".into(),
                "-O".into(),
                "10".into(),
                "-J".into(),
            ],
        };
        (self.as_str(), args)
    }
}
