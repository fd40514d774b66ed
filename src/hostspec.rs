//! Host descriptor parsing.
//!
//! A host spec is a flexible descriptor string naming one measurement
//! endpoint: `"10.0.0.1@shore-STAR"`, `"shore-STAR,10.0.0.1"`,
//! `"10.0.0.1|shore-STAR"` or a bare token. Parsing is total: every string
//! resolves to a probe target plus a stable node identity.

use std::env;

use serde::{Deserialize, Serialize};

/// Identity of a measurement endpoint. Both fields are always populated;
/// when only one half is known it is used for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub ip: String,
    pub name: String,
}

impl NodeRef {
    pub fn new(ip: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            name: name.into(),
        }
    }

    /// Render back into the canonical `ip@name` spec form.
    pub fn to_spec(&self) -> String {
        format!("{}@{}", self.ip, self.name)
    }

    /// Identity string safe for use in file names. The probe target may be
    /// an IPv6 literal or carry a path-ish name, so `:` and `/` become `_`.
    pub fn sanitized(&self) -> String {
        self.ip.replace([':', '/'], "_")
    }
}

/// Heuristic for telling addresses from names inside a two-part spec.
/// A token "looks like an address" if it contains `.` or `:` and is at
/// least three characters long. IPv4, IPv6 and dotted hostnames all pass;
/// short aliases like "b2" do not.
fn looks_like_address(token: &str) -> bool {
    token.len() >= 3 && (token.contains('.') || token.contains(':'))
}

/// Parse a host spec into `(probe_target, identity)`.
///
/// Separators are tried in order: `@`, `,`, `|`. For a two-part form, if
/// exactly one side looks like an address that side is the ip; otherwise
/// the left side is taken as the ip by convention. A bare token is used
/// for both fields. The probe target is always the resolved ip value.
pub fn parse_host_spec(spec: &str) -> (String, NodeRef) {
    let spec = spec.trim();

    for sep in ['@', ',', '|'] {
        if let Some((left, right)) = spec.split_once(sep) {
            let left = left.trim();
            let right = right.trim();
            let node = match (looks_like_address(left), looks_like_address(right)) {
                (true, false) => NodeRef::new(left, right),
                (false, true) => NodeRef::new(right, left),
                // Ambiguous either way: left is the ip by convention.
                _ => NodeRef::new(left, right),
            };
            return (node.ip.clone(), node);
        }
    }

    let node = NodeRef::new(spec, spec);
    (node.ip.clone(), node)
}

/// Best-effort identity of the local measurement source.
///
/// The ip comes from `$HOST_IP` and the name from `$HOST_NAME`; either
/// falls back to `$HOSTNAME`, then to `"localhost"`. Archival servers
/// tolerate non-IP strings in the ip field.
pub fn local_node() -> NodeRef {
    let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let ip = env::var("HOST_IP").unwrap_or_else(|_| hostname.clone());
    let name = env::var("HOST_NAME").unwrap_or_else(|_| hostname.clone());
    NodeRef::new(ip, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_at_name() {
        let (target, node) = parse_host_spec("10.0.0.1@nodeA");
        assert_eq!(target, "10.0.0.1");
        assert_eq!(node, NodeRef::new("10.0.0.1", "nodeA"));
    }

    #[test]
    fn test_name_at_ip_order_invariant() {
        let (target, node) = parse_host_spec("nodeA@10.0.0.1");
        assert_eq!(target, "10.0.0.1");
        assert_eq!(node, NodeRef::new("10.0.0.1", "nodeA"));
    }

    #[test]
    fn test_bare_token() {
        let (target, node) = parse_host_spec("plainhost");
        assert_eq!(target, "plainhost");
        assert_eq!(node, NodeRef::new("plainhost", "plainhost"));
    }

    #[test]
    fn test_comma_and_pipe_separators() {
        let (_, node) = parse_host_spec("shore-STAR,23.134.232.50");
        assert_eq!(node, NodeRef::new("23.134.232.50", "shore-STAR"));

        let (_, node) = parse_host_spec("23.134.232.50|shore-STAR");
        assert_eq!(node, NodeRef::new("23.134.232.50", "shore-STAR"));
    }

    #[test]
    fn test_both_look_like_addresses_left_wins() {
        let (target, node) = parse_host_spec("10.0.0.1@192.168.1.1");
        assert_eq!(target, "10.0.0.1");
        assert_eq!(node.name, "192.168.1.1");
    }

    #[test]
    fn test_neither_looks_like_address_left_wins() {
        let (target, node) = parse_host_spec("alpha@beta");
        assert_eq!(target, "alpha");
        assert_eq!(node.name, "beta");
    }

    #[test]
    fn test_ipv6_literal() {
        let (target, node) = parse_host_spec("fd00::1@nodeB");
        assert_eq!(target, "fd00::1");
        assert_eq!(node.sanitized(), "fd00__1");
    }

    #[test]
    fn test_idempotent_on_own_rendering() {
        let (_, node) = parse_host_spec("nodeA@10.0.0.1");
        let (target2, node2) = parse_host_spec(&node.to_spec());
        assert_eq!(node, node2);
        assert_eq!(target2, node.ip);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let (_, node) = parse_host_spec("  10.0.0.1 @ nodeA ");
        assert_eq!(node, NodeRef::new("10.0.0.1", "nodeA"));
    }
}
