//! Subdomain discovery through Certificate Transparency logs.
//!
//! Candidates come from crt.sh; each one is then confirmed by a DNS lookup.
//! Only confirmed names count as exposed.

use crate::collab::http::classify;
use crate::error::{AttemptResult, ProbeError};
use crate::probe::{AddressResolver, Outcome, Probe};
use crate::types::Domain;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default Certificate Transparency search endpoint.
pub const DEFAULT_CT_ENDPOINT: &str = "https://crt.sh";

#[derive(Debug, Deserialize)]
struct CtEntry {
    name_value: String,
}

/// Discovered and confirmed subdomains, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainReport {
    pub discovered: Vec<String>,
    pub confirmed: Vec<String>,
}

impl SubdomainReport {
    /// Number of confirmed subdomains.
    pub fn count(&self) -> usize {
        self.confirmed.len()
    }
}

/// Settings for subdomain discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainSettings {
    /// Base URL of the CT search service.
    pub endpoint: String,
    /// Lookup timeout for each confirmation.
    pub dns_timeout: Duration,
    /// Confirmations in flight at once.
    pub concurrency: usize,
    /// Upper bound on candidates confirmed per scan.
    pub max_candidates: usize,
}

impl Default for SubdomainSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CT_ENDPOINT.to_string(),
            dns_timeout: Duration::from_secs(3),
            concurrency: 10,
            max_candidates: 100,
        }
    }
}

/// Certificate Transparency subdomain collaborator.
#[derive(Debug, Clone)]
pub struct SubdomainProbe {
    client: reqwest::Client,
    resolver: AddressResolver,
    settings: SubdomainSettings,
    name_regex: Regex,
}

impl SubdomainProbe {
    pub fn new(client: reqwest::Client, settings: SubdomainSettings) -> AttemptResult<Self> {
        let name_regex = Regex::new(
            r"^[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?)+$",
        )
        .map_err(|e| ProbeError::MalformedResponse(format!("hostname pattern: {e}")))?;

        Ok(Self {
            client,
            resolver: AddressResolver::new(settings.dns_timeout),
            settings: SubdomainSettings {
                concurrency: settings.concurrency.max(1),
                ..settings
            },
            name_regex,
        })
    }

    /// Query the CT endpoint for certificate names under `domain`.
    pub async fn fetch_candidates(&self, domain: &Domain) -> AttemptResult<BTreeSet<String>> {
        let url = format!(
            "{}/?q=%25.{}&output=json",
            self.settings.endpoint.trim_end_matches('/'),
            domain
        );
        debug!(%url, "querying certificate transparency");

        let response = self.client.get(&url).send().await.map_err(|e| classify(&e))?;
        if !response.status().is_success() {
            return Err(ProbeError::UpstreamUnreachable(format!(
                "CT search returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response.text().await.map_err(|e| classify(&e))?;
        if body.trim().is_empty() {
            return Ok(BTreeSet::new());
        }

        let entries: Vec<CtEntry> = serde_json::from_str(&body)
            .map_err(|e| ProbeError::MalformedResponse(format!("CT search response: {e}")))?;

        Ok(self.extract(entries.iter().map(|e| e.name_value.as_str()), domain))
    }

    /// Split, clean and filter raw certificate names.
    ///
    /// Drops wildcards, email addresses, the base domain itself and anything
    /// outside it.
    fn extract<'a>(
        &self,
        name_values: impl Iterator<Item = &'a str>,
        domain: &Domain,
    ) -> BTreeSet<String> {
        name_values
            .flat_map(|v| v.split('\n'))
            .map(|name| name.trim().trim_end_matches('.').to_lowercase())
            .filter(|name| !name.contains('*') && !name.contains('@'))
            .filter(|name| name != domain.as_str() && domain.covers(name))
            .filter(|name| self.name_regex.is_match(name))
            .collect()
    }

    async fn confirm(&self, candidates: &[String]) -> Vec<String> {
        let resolver = &self.resolver;
        let mut confirmed: Vec<String> = stream::iter(candidates.iter().cloned())
            .map(|name| async move {
                let exists = resolver.exists(&name).await;
                (name, exists)
            })
            .buffer_unordered(self.settings.concurrency)
            .filter_map(|(name, exists)| async move { exists.then_some(name) })
            .collect()
            .await;
        confirmed.sort();
        confirmed
    }

    /// Discover and confirm subdomains of `domain`.
    pub async fn discover(&self, domain: &Domain) -> Outcome<SubdomainReport> {
        let candidates = match self.fetch_candidates(domain).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(domain = %domain, error = %e, "subdomain discovery unavailable");
                return Outcome::unavailable(e.to_string());
            }
        };

        let discovered: Vec<String> = candidates.into_iter().collect();
        let bounded = &discovered[..discovered.len().min(self.settings.max_candidates)];
        let confirmed = self.confirm(bounded).await;

        info!(
            domain = %domain,
            discovered = discovered.len(),
            confirmed = confirmed.len(),
            "subdomain discovery finished"
        );

        let truncated = bounded.len() < discovered.len();
        let reason = format!(
            "confirmed {} of {} candidates",
            bounded.len(),
            discovered.len()
        );
        let report = SubdomainReport {
            discovered,
            confirmed,
        };
        if truncated {
            Outcome::degraded(report, reason)
        } else {
            Outcome::ok(report)
        }
    }
}

#[async_trait]
impl Probe for SubdomainProbe {
    type Output = Outcome<SubdomainReport>;

    fn name(&self) -> &'static str {
        "subdomains"
    }

    async fn probe(&self, domain: &Domain) -> Outcome<SubdomainReport> {
        self.discover(domain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::http::{build_client, DEFAULT_USER_AGENT};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn probe_for(endpoint: String) -> SubdomainProbe {
        let client = build_client(DEFAULT_USER_AGENT, Duration::from_secs(2)).unwrap();
        SubdomainProbe::new(
            client,
            SubdomainSettings {
                endpoint,
                ..SubdomainSettings::default()
            },
        )
        .unwrap()
    }

    /// Serve one canned HTTP response and return the endpoint URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    fn domain() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    #[tokio::test]
    async fn test_extract_filters_and_dedups() {
        let probe = probe_for(DEFAULT_CT_ENDPOINT.to_string());
        let names = [
            "api.example.com\nwww.example.com",
            "*.example.com",
            "admin@example.com",
            "API.Example.com",
            "example.com",
            "notexample.com",
            "other.org",
            "dev.example.com.",
            "bad_name.example.com",
        ];
        let extracted = probe.extract(names.into_iter(), &domain());
        let extracted: Vec<&str> = extracted.iter().map(String::as_str).collect();
        assert_eq!(
            extracted,
            vec!["api.example.com", "dev.example.com", "www.example.com"]
        );
    }

    #[tokio::test]
    async fn test_fetch_candidates_parses_ct_json() {
        let endpoint = serve_once(
            "200 OK",
            r#"[{"name_value":"mail.example.com\nvpn.example.com"},{"name_value":"*.example.com"}]"#,
        )
        .await;
        let candidates = probe_for(endpoint).fetch_candidates(&domain()).await.unwrap();
        assert_eq!(
            candidates.into_iter().collect::<Vec<_>>(),
            vec!["mail.example.com", "vpn.example.com"]
        );
    }

    #[tokio::test]
    async fn test_fetch_candidates_rejects_malformed_json() {
        let endpoint = serve_once("200 OK", "<html>busy</html>").await;
        let err = probe_for(endpoint).fetch_candidates(&domain()).await.unwrap_err();
        assert!(matches!(err, ProbeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_candidates_non_success_status() {
        let endpoint = serve_once("503 Service Unavailable", "").await;
        let err = probe_for(endpoint).fetch_candidates(&domain()).await.unwrap_err();
        assert!(matches!(err, ProbeError::UpstreamUnreachable(_)));
    }

    #[tokio::test]
    async fn test_empty_body_means_no_candidates() {
        let endpoint = serve_once("200 OK", "").await;
        let candidates = probe_for(endpoint).fetch_candidates(&domain()).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_discover_with_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = probe_for(format!("http://{addr}")).discover(&domain()).await;
        assert!(outcome.value().is_none());
        assert!(outcome.reason().is_some());
    }

    #[test]
    fn test_report_count_is_confirmed() {
        let report = SubdomainReport {
            discovered: vec!["a.example.com".into(), "b.example.com".into()],
            confirmed: vec!["a.example.com".into()],
        };
        assert_eq!(report.count(), 1);
    }
}
