//! Passive technology fingerprinting from HTTP response headers.

use crate::collab::http::classify;
use crate::probe::{Outcome, Probe};
use crate::types::{Confidence, Domain};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What gives a CDN away.
#[derive(Debug, Clone, Copy)]
enum Signal {
    /// A provider-specific header is present.
    Header(&'static str),
    /// A header value contains a marker (case-insensitive).
    Contains(&'static str, &'static str),
}

struct CdnRule {
    provider: &'static str,
    signal: Signal,
    confidence: Confidence,
}

const fn rule(provider: &'static str, signal: Signal, confidence: Confidence) -> CdnRule {
    CdnRule {
        provider,
        signal,
        confidence,
    }
}

/// Checked in order; the first match wins.
const CDN_RULES: &[CdnRule] = &[
    rule("Cloudflare", Signal::Header("cf-ray"), Confidence::High),
    rule("Cloudflare", Signal::Header("cf-cache-status"), Confidence::High),
    rule("Cloudflare", Signal::Contains("server", "cloudflare"), Confidence::Medium),
    rule("AWS CloudFront", Signal::Header("x-amz-cf-id"), Confidence::High),
    rule("AWS CloudFront", Signal::Header("x-amz-cf-pop"), Confidence::High),
    rule("AWS CloudFront", Signal::Contains("via", "cloudfront"), Confidence::Medium),
    rule("Akamai", Signal::Header("x-akamai-request-id"), Confidence::High),
    rule("Akamai", Signal::Header("akamai-grn"), Confidence::High),
    rule("Akamai", Signal::Contains("server", "akamaighost"), Confidence::Medium),
    rule("Fastly", Signal::Header("x-fastly-request-id"), Confidence::High),
    rule("Fastly", Signal::Header("fastly-io-info"), Confidence::High),
    rule("Fastly", Signal::Contains("x-served-by", "cache"), Confidence::Medium),
    rule("Azure Front Door", Signal::Header("x-azure-ref"), Confidence::High),
    rule("Google Cloud CDN", Signal::Contains("via", "1.1 google"), Confidence::Medium),
    rule("Incapsula", Signal::Header("x-iinfo"), Confidence::High),
    rule("Incapsula", Signal::Contains("x-cdn", "incapsula"), Confidence::Medium),
    rule("Sucuri", Signal::Header("x-sucuri-id"), Confidence::High),
    rule("StackPath", Signal::Header("x-sp-cache-status"), Confidence::High),
    rule("KeyCDN", Signal::Header("x-keycdn-cache-status"), Confidence::High),
    rule("Bunny CDN", Signal::Header("cdn-pullzone"), Confidence::High),
    rule("Bunny CDN", Signal::Contains("server", "bunnycdn"), Confidence::Medium),
    rule("Generic CDN", Signal::Header("x-cache"), Confidence::Low),
    rule("Generic CDN", Signal::Header("cdn-cache-control"), Confidence::Low),
];

/// CDN inference from response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnInference {
    pub detected: bool,
    pub provider: Option<String>,
    pub confidence: Confidence,
}

impl CdnInference {
    fn none() -> Self {
        Self {
            detected: false,
            provider: None,
            confidence: Confidence::Medium,
        }
    }
}

/// Technology exposed by an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyObservation {
    pub server: Option<String>,
    pub powered_by: Option<String>,
    pub via: Option<String>,
    /// Response header names, lowercased and sorted.
    pub headers_exposed: Vec<String>,
    pub cdn: CdnInference,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Infer a CDN from response headers.
pub fn infer_cdn(headers: &HeaderMap) -> CdnInference {
    for rule in CDN_RULES {
        let hit = match rule.signal {
            Signal::Header(name) => headers.contains_key(name),
            Signal::Contains(name, marker) => header_text(headers, name)
                .map(|v| v.to_ascii_lowercase().contains(marker))
                .unwrap_or(false),
        };
        if hit {
            return CdnInference {
                detected: true,
                provider: Some(rule.provider.to_string()),
                confidence: rule.confidence,
            };
        }
    }
    CdnInference::none()
}

/// Extract the technology observation from response headers.
pub fn observe(headers: &HeaderMap) -> TechnologyObservation {
    let mut headers_exposed: Vec<String> = headers.keys().map(|k| k.as_str().to_string()).collect();
    headers_exposed.sort();
    headers_exposed.dedup();

    TechnologyObservation {
        server: header_text(headers, "server"),
        powered_by: header_text(headers, "x-powered-by"),
        via: header_text(headers, "via"),
        headers_exposed,
        cdn: infer_cdn(headers),
    }
}

/// Technology fingerprint collaborator.
#[derive(Debug, Clone)]
pub struct TechnologyProbe {
    client: reqwest::Client,
}

impl TechnologyProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` and record what its headers expose.
    pub async fn inspect(&self, url: &str) -> Outcome<TechnologyObservation> {
        match self.client.get(url).send().await {
            Ok(response) => {
                let observation = observe(response.headers());
                debug!(
                    url,
                    server = ?observation.server,
                    cdn = ?observation.cdn.provider,
                    "technology observed"
                );
                Outcome::ok(observation)
            }
            Err(e) => {
                let err = classify(&e);
                warn!(url, error = %err, "technology fingerprint unavailable");
                Outcome::unavailable(err.to_string())
            }
        }
    }
}

#[async_trait]
impl Probe for TechnologyProbe {
    type Output = Outcome<TechnologyObservation>;

    fn name(&self) -> &'static str {
        "technology"
    }

    async fn probe(&self, domain: &Domain) -> Outcome<TechnologyObservation> {
        self.inspect(&format!("http://{domain}")).await
    }
}
