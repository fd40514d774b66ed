//! Archival fan-out client.
//!
//! Delivers a measurement record to every configured archival endpoint
//! independently. A failure at one endpoint never aborts or rolls back
//! delivery to any other endpoint, and never aborts the surrounding
//! invocation loop: every attempt produces an outcome, outcomes are
//! logged, and the caller only ever counts them.

use std::env;
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use rayon::prelude::*;

use crate::record::MeasurementRecord;

/// Environment variables consulted for endpoint lists, newest name first.
const ENDPOINT_ENV_VARS: [&str; 2] = ["ARCHIVER_URLS", "ARCHIVE_URLS"];

/// Environment variables consulted for auth tokens, in precedence order.
const AUTH_ENV_VARS: [&str; 2] = ["ARCHIVER_BEARER", "ARCHIVER_API_KEY"];

/// One archival destination with its resolved auth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiverEndpoint {
    pub base_url: String,
    pub auth_token: Option<String>,
}

/// Typed per-attempt failure classes.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Connection refused, DNS failure, timeout: nothing reached the server
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    /// The record could not be serialized client-side
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for ArchiveError {
    fn from(e: reqwest::Error) -> Self {
        ArchiveError::Transport(e.to_string())
    }
}

/// Result of one (record, endpoint) delivery attempt.
#[derive(Debug)]
pub struct ArchivalOutcome {
    pub endpoint: String,
    pub result: Result<(), ArchiveError>,
}

impl ArchivalOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Merge CLI-supplied and environment-supplied endpoint lists into a
/// de-duplicated, order-preserving list of base URLs.
///
/// Both sources accept comma- and semicolon-separated values; entries are
/// trimmed and stripped of trailing slashes before de-duplication. CLI
/// values come first, so they win the first-seen ordering.
pub fn merge_endpoint_urls(cli_values: &[String], env_value: Option<&str>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let mut push = |value: &str| {
        for part in value.split([',', ';']) {
            let url = part.trim().trim_end_matches('/').to_string();
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
    };

    for value in cli_values {
        push(value);
    }
    if let Some(value) = env_value {
        push(value);
    }

    urls
}

/// Read the first set endpoint environment variable. `ARCHIVER_URLS` is
/// the current name; `ARCHIVE_URLS` is kept for older deployments.
pub fn endpoint_urls_from_env() -> Option<String> {
    ENDPOINT_ENV_VARS
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

/// Resolve the auth token by precedence: explicit per-run value, then
/// `ARCHIVER_BEARER`, then `ARCHIVER_API_KEY`, else unauthenticated.
pub fn resolve_auth_token(explicit: Option<&str>) -> Option<String> {
    if let Some(token) = explicit {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    AUTH_ENV_VARS
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|v| !v.is_empty())
}

/// Build the endpoint list for a run from CLI values, the environment,
/// and an optional explicit auth token.
pub fn collect_endpoints(cli_values: &[String], explicit_token: Option<&str>) -> Vec<ArchiverEndpoint> {
    let env_value = endpoint_urls_from_env();
    let token = resolve_auth_token(explicit_token);
    merge_endpoint_urls(cli_values, env_value.as_deref())
        .into_iter()
        .map(|base_url| ArchiverEndpoint {
            base_url,
            auth_token: token.clone(),
        })
        .collect()
}

/// Blocking HTTP client fanning records out to all configured endpoints.
pub struct ArchiveClient {
    http: reqwest::blocking::Client,
    endpoints: Vec<ArchiverEndpoint>,
}

impl ArchiveClient {
    /// `timeout` bounds every delivery attempt independently, so one slow
    /// or unreachable endpoint cannot stall delivery to the others. A
    /// client that cannot be built with that bound is a run-setup failure.
    pub fn new(endpoints: Vec<ArchiverEndpoint>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build archiver HTTP client")?;
        Ok(Self { http, endpoints })
    }

    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ArchiverEndpoint] {
        &self.endpoints
    }

    /// Deliver one record to every endpoint, in parallel, with upsert
    /// semantics. Always returns one outcome per endpoint.
    pub fn deliver(&self, record: &MeasurementRecord) -> Vec<ArchivalOutcome> {
        let body = match serde_json::to_value(record) {
            Ok(body) => body,
            Err(e) => {
                // Nothing can be sent anywhere; fail every endpoint the same way.
                return self
                    .endpoints
                    .iter()
                    .map(|ep| {
                        log::error!("Archiver validation error ({}): {}", ep.base_url, e);
                        ArchivalOutcome {
                            endpoint: ep.base_url.clone(),
                            result: Err(ArchiveError::Validation(e.to_string())),
                        }
                    })
                    .collect();
            }
        };

        let route = record.category.route();

        self.endpoints
            .par_iter()
            .map(|endpoint| {
                let result = self.deliver_to(endpoint, route, &body);
                match &result {
                    Ok(()) => log::info!(
                        "Archived to {} [{}] OK",
                        endpoint.base_url,
                        record.category
                    ),
                    Err(ArchiveError::Http { status, body }) => log::error!(
                        "Archiver HTTP error ({}): {} {}",
                        endpoint.base_url,
                        status,
                        body
                    ),
                    Err(e) => {
                        log::error!("Archiver error ({}): {}", endpoint.base_url, e)
                    }
                }
                ArchivalOutcome {
                    endpoint: endpoint.base_url.clone(),
                    result,
                }
            })
            .collect()
    }

    fn deliver_to(
        &self,
        endpoint: &ArchiverEndpoint,
        route: &str,
        body: &serde_json::Value,
    ) -> Result<(), ArchiveError> {
        let url = format!("{}{}", endpoint.base_url, route);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &endpoint.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            Err(ArchiveError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCategory;
    use crate::hostspec::NodeRef;
    use crate::matrix::Direction;
    use serde_json::json;
    use std::thread;

    /// Spawn a local endpoint answering every request with `status`.
    fn spawn_endpoint(status: u16) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let _ = request.respond(tiny_http::Response::empty(status));
            }
        });
        format!("http://{addr}")
    }

    fn record() -> MeasurementRecord {
        MeasurementRecord::new(
            TestCategory::Rtt,
            NodeRef::new("10.0.0.1", "src"),
            NodeRef::new("10.0.0.2", "dst"),
            Direction::Forward,
            json!({"min_rtt": 0.4}),
        )
    }

    #[test]
    fn test_fanout_partial_failure_never_propagates() {
        let endpoints = vec![
            ArchiverEndpoint {
                base_url: spawn_endpoint(500),
                auth_token: None,
            },
            ArchiverEndpoint {
                base_url: spawn_endpoint(200),
                auth_token: Some("token".to_string()),
            },
        ];
        let client = ArchiveClient::new(endpoints, Duration::from_secs(5)).unwrap();

        let outcomes = client.deliver(&record());
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(ArchiveError::Http { status: 500, .. })
        ));
        assert!(outcomes[1].is_success());
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_failure() {
        // Port 9 is discard; nothing listens there in the test environment.
        let endpoints = vec![ArchiverEndpoint {
            base_url: "http://127.0.0.1:9".to_string(),
            auth_token: None,
        }];
        let client = ArchiveClient::new(endpoints, Duration::from_secs(2)).unwrap();

        let outcomes = client.deliver(&record());
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0].result,
            Err(ArchiveError::Transport(_))
        ));
    }

    #[test]
    fn test_merge_dedup_preserves_order() {
        let cli = vec![
            "https://a/".to_string(),
            "https://a".to_string(),
            "https://b/".to_string(),
        ];
        assert_eq!(
            merge_endpoint_urls(&cli, None),
            vec!["https://a".to_string(), "https://b".to_string()]
        );
    }

    #[test]
    fn test_merge_comma_and_semicolon_separated() {
        let cli = vec!["https://a,https://b;https://c".to_string()];
        assert_eq!(
            merge_endpoint_urls(&cli, None),
            vec!["https://a", "https://b", "https://c"]
        );
    }

    #[test]
    fn test_merge_env_after_cli() {
        let cli = vec!["https://a".to_string()];
        let merged = merge_endpoint_urls(&cli, Some(" https://b/ , https://a "));
        assert_eq!(merged, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_merge_skips_blank_entries() {
        let merged = merge_endpoint_urls(&["https://a,, ;".to_string()], Some(""));
        assert_eq!(merged, vec!["https://a"]);
    }

    #[test]
    fn test_explicit_token_wins() {
        // The explicit value short-circuits before any env lookup.
        assert_eq!(
            resolve_auth_token(Some("cli-token")),
            Some("cli-token".to_string())
        );
    }

    #[test]
    fn test_empty_explicit_token_falls_through() {
        // An empty CLI value must not shadow the env lookup chain; with no
        // env vars set in the test environment this resolves to None.
        if env::var("ARCHIVER_BEARER").is_err() && env::var("ARCHIVER_API_KEY").is_err() {
            assert_eq!(resolve_auth_token(Some("")), None);
        }
    }

    #[test]
    fn test_client_without_endpoints() {
        let client = ArchiveClient::new(Vec::new(), Duration::from_secs(5)).unwrap();
        assert!(!client.has_endpoints());
    }
}
