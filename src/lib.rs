//! # Probemesh - Measurement orchestration and archival pipeline
//!
//! This library drives network-measurement probes (latency, rtt,
//! throughput, trace, mtu, clock) across a fleet of hosts, captures their
//! raw output, and ships normalized records to one or more remote archival
//! endpoints.
//!
//! ## Overview
//!
//! A run resolves a tool-selection policy into a deterministic matrix of
//! probe invocations per target, executes each invocation as a blocking
//! child process with recoverable per-step failure handling, normalizes the
//! heterogeneous raw output into structured records, and fans those records
//! out to every configured archival endpoint independently. Partial failure
//! never aborts the batch: a failed probe, an unreadable output file, or an
//! unreachable archiver is logged and counted, and the run moves on.
//!
//! ## Architecture
//!
//! - `hostspec`: flexible host descriptor parsing into probe targets and
//!   stable node identities
//! - `catalog`: test categories, the immutable category-to-tools and
//!   extra-args tables, and archival routing
//! - `matrix`: expansion of a tool-selection policy into invocation plans,
//!   including reverse-direction twins
//! - `command`: argument-list synthesis for the external scheduler and for
//!   directly-run probe binaries
//! - `engine`: sequential execution, output file placement, per-invocation
//!   state machine, run summary
//! - `normalize`: pure parsers for the three raw output families
//!   (round-trip summaries, hop-by-hop traces, key=value instrumentation)
//! - `record`: the measurement record shipped to archivers
//! - `archive`: endpoint list construction, auth resolution, and the
//!   parallel HTTP fan-out client
//! - `push`: re-shipping previously saved artifacts from a results tree
//! - `logging`: per-run log files teed with the console
//!
//! ## Error Handling
//!
//! Failures inside the run loop are values, not early returns: typed
//! `thiserror` enums per stage, folded into a `RunSummary` of counts. Only
//! setup errors (unwritable output directory, unopenable log file) escape
//! as `color_eyre::Result` from the binary.

pub mod archive;
pub mod catalog;
pub mod command;
pub mod engine;
pub mod hostspec;
pub mod logging;
pub mod matrix;
pub mod normalize;
pub mod push;
pub mod record;
