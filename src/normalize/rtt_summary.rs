//! Round-trip summary parsing (ping-style output).
//!
//! Splits multi-destination output into sections on the `PING ` marker and
//! extracts per-destination round-trip statistics and packet loss. A
//! section lacking the statistics line is dropped silently: no partial
//! record is emitted for it.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Compiled patterns for round-trip summary parsing
struct RttPatterns {
    /// Match: first parenthesized token, e.g. "(10.0.0.2)" on the header line
    dest: Regex,
    /// Match: the four floats on the "rtt min/avg/max/mdev = ..." line
    float: Regex,
    /// Match: "N% packet loss"
    loss: Regex,
}

static PATTERNS: LazyLock<RttPatterns> = LazyLock::new(|| RttPatterns {
    dest: Regex::new(r"\((.*?)\)").expect("Invalid dest regex"),
    float: Regex::new(r"[0-9]+\.[0-9]+").expect("Invalid float regex"),
    loss: Regex::new(r"([0-9]+)% packet loss").expect("Invalid loss regex"),
});

/// Round-trip statistics for one destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RttStats {
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub mdev_rtt: f64,
    pub packet_loss: u32,
}

/// Parse ping-style output into a map keyed by destination address.
///
/// For each `PING ` section: the destination is the first parenthesized
/// token on the header line; the statistics line must carry exactly four
/// floats (min/avg/max/mdev); packet loss defaults to 0 when the loss line
/// is absent. Sections missing the header address or the statistics line
/// produce no entry.
pub fn parse_rtt_summary(text: &str) -> BTreeMap<String, RttStats> {
    let mut results = BTreeMap::new();

    // First split is the text before any "PING " marker; skip it.
    for section in text.trim().split("PING ").skip(1) {
        let lines: Vec<&str> = section.lines().collect();

        let header = match lines.first() {
            Some(h) => *h,
            None => continue,
        };
        let dest = match PATTERNS.dest.captures(header) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };

        let stats_line = match lines.iter().find(|l| l.contains("rtt min/avg/max/mdev")) {
            Some(l) => *l,
            None => continue, // No statistics: section dropped silently.
        };
        let values: Vec<f64> = PATTERNS
            .float
            .find_iter(stats_line)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let [min_rtt, avg_rtt, max_rtt, mdev_rtt] = match values.as_slice() {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => continue,
        };

        let packet_loss = lines
            .iter()
            .find(|l| l.contains("packet loss"))
            .and_then(|l| PATTERNS.loss.captures(l))
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);

        results.insert(
            dest,
            RttStats {
                min_rtt,
                avg_rtt,
                max_rtt,
                mdev_rtt,
                packet_loss,
            },
        );
    }

    results
}
