//! Security header hygiene.
//!
//! Fetches `https://<domain>` and grades six response headers as strong,
//! permissive or missing.

use crate::collab::http::classify;
use crate::probe::{Outcome, Probe};
use crate::types::Domain;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Graded headers, as `(header name, short key)`.
pub const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("strict-transport-security", "hsts"),
    ("content-security-policy", "csp"),
    ("x-frame-options", "xfo"),
    ("x-content-type-options", "xcto"),
    ("referrer-policy", "referrer"),
    ("permissions-policy", "permissions"),
];

/// Grade of one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderGrade {
    /// Configured restrictively.
    Strong,
    /// Present but weaker than recommended.
    Permissive,
    /// Present; no further grading applies. Counted as strong.
    Present,
    /// Absent or empty.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDetail {
    pub grade: HeaderGrade,
    pub value: Option<String>,
}

/// Graded header tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSummary {
    pub strong: u32,
    pub missing: u32,
    pub permissive: u32,
    pub details: BTreeMap<String, HeaderDetail>,
}

impl HeaderSummary {
    /// Summary for a site that could not be fetched: every header missing.
    pub fn unreachable() -> Self {
        Self {
            missing: SECURITY_HEADERS.len() as u32,
            ..Self::default()
        }
    }
}

/// Grade a single header value.
pub fn grade(header: &str, value: Option<&str>) -> HeaderGrade {
    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return HeaderGrade::Missing,
    };
    let lower = value.to_ascii_lowercase();

    let strong = match header {
        "strict-transport-security" => {
            lower.contains("max-age=") && lower.contains("includesubdomains")
        }
        "content-security-policy" => lower.contains("default-src"),
        "x-frame-options" => lower == "deny" || lower == "sameorigin",
        "x-content-type-options" => lower == "nosniff",
        _ => return HeaderGrade::Present,
    };

    if strong {
        HeaderGrade::Strong
    } else {
        HeaderGrade::Permissive
    }
}

/// Grade every security header in a response.
pub fn summarize(headers: &HeaderMap) -> HeaderSummary {
    let mut summary = HeaderSummary::default();

    for (name, key) in SECURITY_HEADERS {
        let value = headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let grade = grade(name, value.as_deref());

        match grade {
            HeaderGrade::Strong | HeaderGrade::Present => summary.strong += 1,
            HeaderGrade::Permissive => summary.permissive += 1,
            HeaderGrade::Missing => summary.missing += 1,
        }

        let value = match grade {
            HeaderGrade::Missing => None,
            _ => value,
        };
        summary
            .details
            .insert(key.to_string(), HeaderDetail { grade, value });
    }

    summary
}

/// Header hygiene collaborator.
#[derive(Debug, Clone)]
pub struct HeaderProbe {
    client: reqwest::Client,
}

impl HeaderProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` and grade its headers.
    ///
    /// An unreachable site yields a degraded summary with every header
    /// counted missing.
    pub async fn inspect(&self, url: &str) -> Outcome<HeaderSummary> {
        match self.client.get(url).send().await {
            Ok(response) => {
                let summary = summarize(response.headers());
                debug!(
                    url,
                    strong = summary.strong,
                    permissive = summary.permissive,
                    missing = summary.missing,
                    "headers graded"
                );
                Outcome::ok(summary)
            }
            Err(e) => {
                let err = classify(&e);
                warn!(url, error = %err, "header check degraded");
                Outcome::degraded(HeaderSummary::unreachable(), err.to_string())
            }
        }
    }
}

#[async_trait]
impl Probe for HeaderProbe {
    type Output = Outcome<HeaderSummary>;

    fn name(&self) -> &'static str {
        "headers"
    }

    async fn probe(&self, domain: &Domain) -> Outcome<HeaderSummary> {
        self.inspect(&format!("https://{domain}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::http::{build_client, DEFAULT_USER_AGENT};
    use reqwest::header::HeaderValue;
    use std::time::Duration;

    #[test]
    fn test_grade_hsts() {
        let hsts = "strict-transport-security";
        assert_eq!(
            grade(hsts, Some("max-age=31536000; includeSubDomains")),
            HeaderGrade::Strong
        );
        assert_eq!(grade(hsts, Some("max-age=300")), HeaderGrade::Permissive);
        assert_eq!(grade(hsts, Some("  ")), HeaderGrade::Missing);
        assert_eq!(grade(hsts, None), HeaderGrade::Missing);
    }

    #[test]
    fn test_grade_frame_and_content_type() {
        assert_eq!(grade("x-frame-options", Some("DENY")), HeaderGrade::Strong);
        assert_eq!(grade("x-frame-options", Some("SAMEORIGIN")), HeaderGrade::Strong);
        assert_eq!(
            grade("x-frame-options", Some("ALLOW-FROM https://a.example")),
            HeaderGrade::Permissive
        );
        assert_eq!(grade("x-content-type-options", Some("nosniff")), HeaderGrade::Strong);
        assert_eq!(grade("content-security-policy", Some("img-src *")), HeaderGrade::Permissive);
        assert_eq!(grade("referrer-policy", Some("unsafe-url")), HeaderGrade::Present);
    }

    #[test]
    fn test_summarize_counts() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        );
        headers.insert("x-frame-options", HeaderValue::from_static("ALLOWALL"));
        headers.insert("permissions-policy", HeaderValue::from_static("camera=()"));

        let summary = summarize(&headers);
        assert_eq!(summary.strong, 2);
        assert_eq!(summary.permissive, 1);
        assert_eq!(summary.missing, 3);
        assert_eq!(summary.details.len(), 6);
        assert_eq!(summary.details["csp"].grade, HeaderGrade::Missing);
        assert_eq!(summary.details["csp"].value, None);
        assert_eq!(summary.details["xfo"].value.as_deref(), Some("ALLOWALL"));
    }

    #[test]
    fn test_unreachable_summary() {
        let summary = HeaderSummary::unreachable();
        assert_eq!(summary.missing, 6);
        assert_eq!(summary.strong + summary.permissive, 0);
    }

    #[tokio::test]
    async fn test_unreachable_site_is_degraded() {
        let client = build_client(DEFAULT_USER_AGENT, Duration::from_secs(2)).unwrap();
        let outcome = HeaderProbe::new(client)
            .inspect("https://does-not-exist.invalid")
            .await;
        assert!(!outcome.is_ok());
        assert_eq!(outcome.value().map(|s| s.missing), Some(6));
        assert!(outcome.reason().is_some());
    }
}
