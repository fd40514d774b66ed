//! Hop-by-hop path trace parsing (traceroute-style output).

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

struct HopPatterns {
    /// Match: "<hop index><rest>" with leading whitespace tolerated
    hop: Regex,
    /// Match: first parenthesized dotted-quad, e.g. "(192.0.2.1)"
    ip: Regex,
    /// Match: a float immediately followed by a millisecond unit
    rtt: Regex,
}

static PATTERNS: LazyLock<HopPatterns> = LazyLock::new(|| HopPatterns {
    hop: Regex::new(r"^\s*(\d+)\s+(.+)").expect("Invalid hop regex"),
    ip: Regex::new(r"\(([\d\.]+)\)").expect("Invalid ip regex"),
    rtt: Regex::new(r"(\d+\.\d+)\s+ms").expect("Invalid rtt regex"),
});

/// One hop along the traced path. `ip` is absent when the hop did not
/// resolve (e.g. a `* * *` line that still carries an index).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub hop: u32,
    pub ip: Option<String>,
    pub rtt_ms: Vec<f64>,
}

/// Parse traceroute-style output into an ordered hop list.
///
/// The header line (starting with "traceroute") and any line without a
/// leading hop index are skipped. Round-trip samples are collected in
/// line order.
pub fn parse_hops(text: &str) -> Vec<Hop> {
    let mut hops = Vec::new();

    for line in text.trim().lines() {
        if line.to_lowercase().starts_with("traceroute") {
            continue;
        }
        let caps = match PATTERNS.hop.captures(line) {
            Some(c) => c,
            None => continue,
        };
        let hop: u32 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let rest = &caps[2];

        let ip = PATTERNS.ip.captures(rest).map(|c| c[1].to_string());
        let rtt_ms = PATTERNS
            .rtt
            .captures_iter(rest)
            .filter_map(|c| c[1].parse().ok())
            .collect();

        hops.push(Hop { hop, ip, rtt_ms });
    }

    hops
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
traceroute to 10.0.0.2 (10.0.0.2), 30 hops max, 60 byte packets
 1  gateway (192.168.1.1)  0.321 ms  0.298 ms  0.276 ms
 2  * * *
 3  core1.example.net (203.0.113.9)  4.112 ms  4.876 ms
";

    #[test]
    fn test_basic_trace() {
        let hops = parse_hops(SAMPLE);
        assert_eq!(hops.len(), 3);

        assert_eq!(hops[0].hop, 1);
        assert_eq!(hops[0].ip.as_deref(), Some("192.168.1.1"));
        assert_eq!(hops[0].rtt_ms, vec![0.321, 0.298, 0.276]);

        // Unresolved hop keeps its index, no address, no samples.
        assert_eq!(hops[1].hop, 2);
        assert_eq!(hops[1].ip, None);
        assert!(hops[1].rtt_ms.is_empty());

        assert_eq!(hops[2].rtt_ms, vec![4.112, 4.876]);
    }

    #[test]
    fn test_header_skipped() {
        let hops = parse_hops("traceroute to 10.0.0.2 (10.0.0.2), 30 hops max\n");
        assert!(hops.is_empty());
    }

    #[test]
    fn test_non_matching_lines_skipped() {
        let hops = parse_hops("garbage line\n 7  host (10.1.1.1)  12.000 ms\nmore garbage\n");
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].hop, 7);
    }

    #[test]
    fn test_sample_order_preserved() {
        let hops = parse_hops(" 1  a (10.0.0.1)  3.200 ms  1.100 ms  2.500 ms\n");
        assert_eq!(hops[0].rtt_ms, vec![3.2, 1.1, 2.5]);
    }
}
