//! Risk aggregation.
//!
//! [`score`] folds every available probe section into a numeric score, a
//! severity level and a sorted set of human-readable reasons. Sections that
//! were not measured contribute nothing. Weights and thresholds come from a
//! [`RiskPolicy`], which the settings file can override.

use crate::collab::{HeaderSummary, ServiceRecord, SubdomainReport, TechnologyObservation};
use crate::error::{ConfigError, ConfigResult};
use crate::probe::{PortProbeResult, PortStatus, TlsProbeResult};
use crate::types::Confidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Severity derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Weights and thresholds used by [`score`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Port 80 open.
    pub http_open: i32,
    /// Port 80 open while a probed port 443 is not.
    pub https_unreachable: i32,
    pub tls_disabled: i32,
    /// TLS enabled with less than high confidence.
    pub tls_low_confidence: i32,
    pub missing_header_each: i32,
    pub missing_header_cap: i32,
    pub permissive_headers: i32,
    /// Applied per strong header; zero or negative.
    pub strong_header_each: i32,
    pub server_exposed: i32,
    pub no_cdn: i32,
    pub many_subdomains: i32,
    pub many_subdomains_at: usize,
    pub some_subdomains: i32,
    pub some_subdomains_at: usize,
    pub sensitive_ports: Vec<u16>,
    pub sensitive_port_each: i32,
    pub versioned_product_each: i32,
    /// Scores at or above this are at least medium.
    pub medium_at: u8,
    /// Scores at or above this are high.
    pub high_at: u8,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            http_open: 10,
            https_unreachable: 5,
            tls_disabled: 20,
            tls_low_confidence: 10,
            missing_header_each: 2,
            missing_header_cap: 10,
            permissive_headers: 5,
            strong_header_each: 0,
            server_exposed: 5,
            no_cdn: 5,
            many_subdomains: 15,
            many_subdomains_at: 20,
            some_subdomains: 5,
            some_subdomains_at: 5,
            sensitive_ports: vec![21, 22, 23, 25, 3306, 5432, 6379, 3389],
            sensitive_port_each: 10,
            versioned_product_each: 5,
            medium_at: 30,
            high_at: 70,
        }
    }
}

impl RiskPolicy {
    /// Check that the thresholds are ordered and within the score range.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.medium_at > self.high_at || self.high_at > 100 {
            return Err(ConfigError::InvalidValue {
                key: "risk.medium_at/high_at".to_string(),
                value: format!("{}/{}", self.medium_at, self.high_at),
            });
        }
        if self.some_subdomains_at > self.many_subdomains_at {
            return Err(ConfigError::InvalidValue {
                key: "risk.some_subdomains_at".to_string(),
                value: self.some_subdomains_at.to_string(),
            });
        }
        Ok(())
    }

    /// Map a clamped score to its level.
    pub fn level(&self, score: u8) -> RiskLevel {
        if score < self.medium_at {
            RiskLevel::Low
        } else if score < self.high_at {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Everything the aggregator may look at. Every section is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatorInput<'a> {
    pub port_80: Option<&'a PortProbeResult>,
    pub port_443: Option<&'a PortProbeResult>,
    pub tls: Option<&'a TlsProbeResult>,
    pub headers: Option<&'a HeaderSummary>,
    pub technology: Option<&'a TechnologyObservation>,
    pub subdomains: Option<&'a SubdomainReport>,
    pub services: &'a [ServiceRecord],
}

/// Aggregated risk of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Always within `0..=100`.
    pub score: u8,
    pub level: RiskLevel,
    /// Deduplicated and sorted.
    pub reasons: Vec<String>,
}

#[derive(Default)]
struct Tally {
    score: i64,
    reasons: BTreeSet<String>,
}

impl Tally {
    fn add(&mut self, weight: i32, reason: impl Into<String>) {
        self.score += i64::from(weight);
        self.reasons.insert(reason.into());
    }
}

/// Score a scan under `policy`.
pub fn score(input: &AggregatorInput<'_>, policy: &RiskPolicy) -> RiskAssessment {
    let mut tally = Tally::default();

    let http_open = input.port_80.is_some_and(|p| p.status == PortStatus::Open);
    if http_open {
        tally.add(policy.http_open, "HTTP (port 80) is open");
        if input.port_443.is_some_and(|p| p.status != PortStatus::Open) {
            tally.add(
                policy.https_unreachable,
                "HTTPS (port 443) is not reachable while HTTP is served",
            );
        }
    }

    if let Some(tls) = input.tls {
        if !tls.is_enabled() {
            tally.add(policy.tls_disabled, "TLS is not enabled");
        } else if tls.confidence != Confidence::High {
            tally.add(
                policy.tls_low_confidence,
                "TLS negotiated with limited verification confidence",
            );
        }
    }

    if let Some(headers) = input.headers {
        if headers.missing > 0 {
            let weight = i64::from(headers.missing) * i64::from(policy.missing_header_each);
            let weight = weight.min(i64::from(policy.missing_header_cap));
            tally.add(weight as i32, "Missing security headers");
        }
        if headers.permissive > 0 {
            tally.add(
                policy.permissive_headers,
                "Permissive security header configuration",
            );
        }
        if headers.strong > 0 && policy.strong_header_each != 0 {
            let weight = i64::from(headers.strong) * i64::from(policy.strong_header_each);
            tally.add(
                weight.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
                "Strong security headers present",
            );
        }
    }

    if let Some(tech) = input.technology {
        if tech.server.is_some() {
            tally.add(policy.server_exposed, "Server version is exposed");
        }
        if !tech.cdn.detected {
            tally.add(policy.no_cdn, "No CDN detected");
        }
    }

    if let Some(subdomains) = input.subdomains {
        let count = subdomains.count();
        if count >= policy.many_subdomains_at {
            tally.add(policy.many_subdomains, "Large number of exposed subdomains");
        } else if count >= policy.some_subdomains_at {
            tally.add(policy.some_subdomains, "Exposed subdomains detected");
        }
    }

    let sensitive: BTreeSet<u16> = input
        .services
        .iter()
        .map(|s| s.port)
        .filter(|p| policy.sensitive_ports.contains(p))
        .collect();
    for port in sensitive {
        tally.add(
            policy.sensitive_port_each,
            format!("Sensitive service exposed on port {port}"),
        );
    }

    let versioned: BTreeSet<(&str, &str)> = input
        .services
        .iter()
        .filter_map(|s| Some((s.product.as_deref()?, s.version.as_deref()?)))
        .filter(|(product, version)| !product.is_empty() && !version.is_empty())
        .collect();
    for (product, version) in versioned {
        tally.add(
            policy.versioned_product_each,
            format!("Service version detected: {product} {version}"),
        );
    }

    let score = tally.score.clamp(0, 100) as u8;
    RiskAssessment {
        score,
        level: policy.level(score),
        reasons: tally.reasons.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CdnInference;
    use crate::probe::{AttemptCounts, TlsStatus};
    use crate::types::Port;

    fn port(number: u16, status: PortStatus) -> PortProbeResult {
        let counts = match status {
            PortStatus::Open => AttemptCounts { open: 3, closed: 0, filtered: 0 },
            PortStatus::Closed => AttemptCounts { open: 0, closed: 3, filtered: 0 },
            _ => AttemptCounts { open: 0, closed: 0, filtered: 3 },
        };
        PortProbeResult::from_counts(Port::new(number).unwrap(), counts)
    }

    fn tls(status: TlsStatus, confidence: Confidence) -> TlsProbeResult {
        let mut result = TlsProbeResult::error("fixture");
        result.status = status;
        result.confidence = confidence;
        result
    }

    fn service(port: u16, product: Option<&str>, version: Option<&str>) -> ServiceRecord {
        ServiceRecord {
            port,
            protocol: "tcp".into(),
            service_name: None,
            product: product.map(String::from),
            version: version.map(String::from),
        }
    }

    fn subdomains(count: usize) -> SubdomainReport {
        let names: Vec<String> = (0..count).map(|i| format!("s{i}.example.com")).collect();
        SubdomainReport {
            discovered: names.clone(),
            confirmed: names,
        }
    }

    #[test]
    fn test_level_boundaries() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.level(0), RiskLevel::Low);
        assert_eq!(policy.level(29), RiskLevel::Low);
        assert_eq!(policy.level(30), RiskLevel::Medium);
        assert_eq!(policy.level(69), RiskLevel::Medium);
        assert_eq!(policy.level(70), RiskLevel::High);
        assert_eq!(policy.level(100), RiskLevel::High);
    }

    #[test]
    fn test_empty_input_scores_zero() {
        let risk = score(&AggregatorInput::default(), &RiskPolicy::default());
        assert_eq!(risk.score, 0);
        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.reasons.is_empty());
    }

    #[test]
    fn test_closed_ports_tls_disabled() {
        let p80 = port(80, PortStatus::Closed);
        let p443 = port(443, PortStatus::Closed);
        let tls = tls(TlsStatus::Disabled, Confidence::High);
        let input = AggregatorInput {
            port_80: Some(&p80),
            port_443: Some(&p443),
            tls: Some(&tls),
            ..Default::default()
        };

        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 20);
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(risk.reasons, vec!["TLS is not enabled"]);
    }

    #[test]
    fn test_http_and_https_open_with_strict_tls() {
        let p80 = port(80, PortStatus::Open);
        let p443 = port(443, PortStatus::Open);
        let tls = tls(TlsStatus::Enabled, Confidence::High);
        let input = AggregatorInput {
            port_80: Some(&p80),
            port_443: Some(&p443),
            tls: Some(&tls),
            ..Default::default()
        };

        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 10);
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(risk.reasons, vec!["HTTP (port 80) is open"]);
    }

    #[test]
    fn test_many_subdomains_and_duplicate_sensitive_port() {
        let p80 = port(80, PortStatus::Open);
        let tls = tls(TlsStatus::Disabled, Confidence::High);
        let subs = subdomains(25);
        let services = vec![service(22, None, None), service(22, None, None)];
        let input = AggregatorInput {
            port_80: Some(&p80),
            tls: Some(&tls),
            subdomains: Some(&subs),
            services: &services,
            ..Default::default()
        };

        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 55);
        assert_eq!(risk.level, RiskLevel::Medium);
        assert_eq!(
            risk.reasons,
            vec![
                "HTTP (port 80) is open",
                "Large number of exposed subdomains",
                "Sensitive service exposed on port 22",
                "TLS is not enabled",
            ]
        );
    }

    #[test]
    fn test_https_unreachable_needs_probed_443() {
        let p80 = port(80, PortStatus::Open);
        let p443 = port(443, PortStatus::Filtered);
        let input = AggregatorInput {
            port_80: Some(&p80),
            port_443: Some(&p443),
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 15);
        assert!(risk
            .reasons
            .contains(&"HTTPS (port 443) is not reachable while HTTP is served".to_string()));
    }

    #[test]
    fn test_tls_low_confidence() {
        let tls = tls(TlsStatus::Enabled, Confidence::Medium);
        let input = AggregatorInput {
            tls: Some(&tls),
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 10);
        assert_eq!(
            risk.reasons,
            vec!["TLS negotiated with limited verification confidence"]
        );
    }

    #[test]
    fn test_missing_headers_capped() {
        let headers = HeaderSummary::unreachable();
        let input = AggregatorInput {
            headers: Some(&headers),
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        // 6 missing * 2 = 12, capped at 10
        assert_eq!(risk.score, 10);

        let few = HeaderSummary {
            missing: 2,
            permissive: 1,
            ..HeaderSummary::default()
        };
        let input = AggregatorInput {
            headers: Some(&few),
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 9);
        assert_eq!(
            risk.reasons,
            vec![
                "Missing security headers",
                "Permissive security header configuration"
            ]
        );
    }

    #[test]
    fn test_technology_signals() {
        let tech = TechnologyObservation {
            server: Some("nginx/1.24.0".into()),
            powered_by: None,
            via: None,
            headers_exposed: vec!["server".into()],
            cdn: CdnInference {
                detected: false,
                provider: None,
                confidence: Confidence::Medium,
            },
        };
        let input = AggregatorInput {
            technology: Some(&tech),
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 10);
        assert_eq!(risk.reasons, vec!["No CDN detected", "Server version is exposed"]);
    }

    #[test]
    fn test_subdomain_thresholds() {
        let policy = RiskPolicy::default();
        for (count, expected) in [(0, 0), (4, 0), (5, 5), (19, 5), (20, 15)] {
            let subs = subdomains(count);
            let input = AggregatorInput {
                subdomains: Some(&subs),
                ..Default::default()
            };
            assert_eq!(score(&input, &policy).score, expected, "count {count}");
        }
    }

    #[test]
    fn test_versioned_products_are_distinct() {
        let services = vec![
            service(22, Some("OpenSSH"), Some("8.9p1")),
            service(2222, Some("OpenSSH"), Some("8.9p1")),
            service(80, Some("nginx"), None),
            service(443, Some("nginx"), Some("1.24.0")),
        ];
        let input = AggregatorInput {
            services: &services,
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        // port 22 (+10) and two distinct product/version pairs (+5 each)
        assert_eq!(risk.score, 20);
        assert_eq!(risk.reasons.len(), 3);
    }

    #[test]
    fn test_score_clamped_high() {
        let services: Vec<ServiceRecord> = RiskPolicy::default()
            .sensitive_ports
            .iter()
            .map(|p| service(*p, None, None))
            .collect();
        let p80 = port(80, PortStatus::Open);
        let tls = tls(TlsStatus::Disabled, Confidence::High);
        let input = AggregatorInput {
            port_80: Some(&p80),
            tls: Some(&tls),
            services: &services,
            ..Default::default()
        };
        let risk = score(&input, &RiskPolicy::default());
        assert_eq!(risk.score, 100);
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn test_strong_header_reward_clamped_at_zero() {
        let policy = RiskPolicy {
            strong_header_each: -5,
            ..RiskPolicy::default()
        };
        let headers = HeaderSummary {
            strong: 6,
            ..HeaderSummary::default()
        };
        let input = AggregatorInput {
            headers: Some(&headers),
            ..Default::default()
        };
        let risk = score(&input, &policy);
        assert_eq!(risk.score, 0);
        assert_eq!(risk.reasons, vec!["Strong security headers present"]);
    }

    #[test]
    fn test_policy_validation() {
        assert!(RiskPolicy::default().validate().is_ok());
        let inverted = RiskPolicy {
            medium_at: 80,
            high_at: 70,
            ..RiskPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_policy_partial_json() {
        let policy: RiskPolicy = serde_json::from_str(r#"{"http_open": 25}"#).unwrap();
        assert_eq!(policy.http_open, 25);
        assert_eq!(policy.tls_disabled, 20);
    }
}
