//! Raw probe output normalization.
//!
//! Each tool family has one small, explicitly-typed parser turning raw
//! text into a structured JSON value. All parsers are pure functions with
//! no I/O; malformed lines are skipped per the rules documented on each
//! parser rather than failing the whole document.

mod hops;
mod keyvalue;
mod rtt_summary;

pub use hops::parse_hops;
pub use keyvalue::parse_key_values;
pub use rtt_summary::parse_rtt_summary;

use serde_json::Value;

use crate::command::DirectTool;

/// Normalize captured stdout of a direct-profile tool into the JSON value
/// that gets written to disk and archived. iperf3 already emits JSON; a
/// parse failure there surfaces to the caller instead of being swallowed.
pub fn normalize_direct_output(tool: DirectTool, text: &str) -> Result<Value, serde_json::Error> {
    match tool {
        DirectTool::Ping => Ok(serde_json::to_value(parse_rtt_summary(text))?),
        DirectTool::Traceroute => Ok(serde_json::to_value(parse_hops(text))?),
        DirectTool::Nuttcp => Ok(serde_json::to_value(parse_key_values(text))?),
        DirectTool::Iperf3 => serde_json::from_str(text),
    }
}
