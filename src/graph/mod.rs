//! Asset graph normalization.
//!
//! Turns one finished scan into assets, relationships and findings with
//! deterministic identity, ready for an external inventory store. Asset ids
//! depend only on kind and case-folded value, so re-scanning the same
//! surface produces the same ids.

use crate::collab::SubdomainReport;
use crate::probe::{PortProbeResult, TlsProbeResult};
use crate::risk::{RiskAssessment, RiskLevel};
use crate::types::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Domain,
    Subdomain,
    Service,
    Certificate,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Subdomain => "subdomain",
            Self::Service => "service",
            Self::Certificate => "certificate",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an edge between two assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Owns,
    Exposes,
    Uses,
}

/// A discovered asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
}

/// One risk reason attached to the scanned domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub description: String,
    pub severity: RiskLevel,
    pub observed_at: DateTime<Utc>,
}

/// Normalized scan output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetGraph {
    pub assets: Vec<Asset>,
    pub relationships: Vec<Relationship>,
    pub findings: Vec<Finding>,
}

/// Finding type for risk reasons.
pub const RISK_REASON: &str = "risk_reason";

/// Deterministic asset id: `lower(kind) + ":" + lower(value)`.
pub fn asset_id(kind: &str, value: &str) -> String {
    format!("{}:{}", kind.to_lowercase(), value.to_lowercase())
}

/// The scan sections the normalizer reads.
#[derive(Debug, Clone, Copy)]
pub struct ScanSections<'a> {
    pub domain: &'a Domain,
    pub ports: &'a BTreeMap<u16, PortProbeResult>,
    pub tls: Option<&'a TlsProbeResult>,
    pub subdomains: Option<&'a SubdomainReport>,
}

struct Builder {
    graph: AssetGraph,
    seen: HashSet<String>,
    observed_at: DateTime<Utc>,
}

impl Builder {
    fn asset(
        &mut self,
        kind: AssetKind,
        value: String,
        attributes: BTreeMap<String, Value>,
    ) -> String {
        let id = asset_id(kind.as_str(), &value);
        if self.seen.insert(id.clone()) {
            self.graph.assets.push(Asset {
                id: id.clone(),
                kind,
                value,
                attributes,
                first_seen: self.observed_at,
                last_seen: self.observed_at,
            });
        }
        id
    }

    fn relate(&mut self, from: &str, to: String, kind: RelationKind) {
        let edge = Relationship {
            from: from.to_string(),
            to,
            kind,
        };
        if !self.graph.relationships.contains(&edge) {
            self.graph.relationships.push(edge);
        }
    }
}

/// Build the asset graph of a scan.
pub fn normalize(
    sections: &ScanSections<'_>,
    risk: &RiskAssessment,
    observed_at: DateTime<Utc>,
) -> AssetGraph {
    let mut b = Builder {
        graph: AssetGraph::default(),
        seen: HashSet::new(),
        observed_at,
    };
    let domain = sections.domain.as_str();
    let domain_id = b.asset(AssetKind::Domain, domain.to_string(), BTreeMap::new());

    if let Some(subdomains) = sections.subdomains {
        for name in &subdomains.confirmed {
            let id = b.asset(AssetKind::Subdomain, name.clone(), BTreeMap::new());
            b.relate(&domain_id, id, RelationKind::Owns);
        }
    }

    for (port, result) in sections.ports {
        if !result.is_open() {
            continue;
        }
        let attributes = BTreeMap::from([
            ("port".to_string(), json!(port)),
            ("protocol".to_string(), json!("tcp")),
            ("confidence".to_string(), json!(result.confidence)),
        ]);
        let id = b.asset(AssetKind::Service, format!("{domain}:{port}/tcp"), attributes);
        b.relate(&domain_id, id, RelationKind::Exposes);
    }

    if let Some(tls) = sections.tls.filter(|t| t.is_enabled()) {
        let expiry = tls
            .expires_on
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let attributes = BTreeMap::from([
            ("expires_on".to_string(), json!(tls.expires_on)),
            ("days_left".to_string(), json!(tls.days_left)),
            ("confidence".to_string(), json!(tls.confidence)),
        ]);
        let id = b.asset(
            AssetKind::Certificate,
            format!("{domain}:{expiry}"),
            attributes,
        );
        b.relate(&domain_id, id, RelationKind::Uses);
    }

    for reason in &risk.reasons {
        b.graph.findings.push(Finding {
            kind: RISK_REASON.to_string(),
            target: domain_id.clone(),
            description: reason.clone(),
            severity: risk.level,
            observed_at,
        });
    }

    b.graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{AttemptCounts, TlsStatus};
    use crate::types::{Confidence, Port};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn open(port: u16) -> PortProbeResult {
        PortProbeResult::from_counts(
            Port::new(port).unwrap(),
            AttemptCounts {
                open: 3,
                closed: 0,
                filtered: 0,
            },
        )
    }

    fn closed(port: u16) -> PortProbeResult {
        PortProbeResult::from_counts(
            Port::new(port).unwrap(),
            AttemptCounts {
                open: 0,
                closed: 3,
                filtered: 0,
            },
        )
    }

    fn low_risk() -> RiskAssessment {
        RiskAssessment {
            score: 0,
            level: RiskLevel::Low,
            reasons: Vec::new(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_asset_id_case_folds() {
        assert_eq!(asset_id("domain", "Example.com"), asset_id("domain", "example.com"));
        assert_eq!(asset_id("Service", "A.example.com:443/tcp"), "service:a.example.com:443/tcp");
    }

    #[test]
    fn test_subdomain_and_service() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::from([(80, closed(80)), (443, open(443))]);
        let subdomains = SubdomainReport {
            discovered: vec!["api.example.com".into(), "old.example.com".into()],
            confirmed: vec!["api.example.com".into()],
        };
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: None,
            subdomains: Some(&subdomains),
        };

        let graph = normalize(&sections, &low_risk(), at(12));
        let kinds: Vec<AssetKind> = graph.assets.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AssetKind::Domain, AssetKind::Subdomain, AssetKind::Service]
        );
        assert_eq!(graph.assets[2].id, "service:example.com:443/tcp");
        assert_eq!(
            graph.relationships,
            vec![
                Relationship {
                    from: "domain:example.com".into(),
                    to: "subdomain:api.example.com".into(),
                    kind: RelationKind::Owns,
                },
                Relationship {
                    from: "domain:example.com".into(),
                    to: "service:example.com:443/tcp".into(),
                    kind: RelationKind::Exposes,
                },
            ]
        );
        assert!(graph.findings.is_empty());
    }

    #[test]
    fn test_certificate_asset() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::new();
        let mut tls = TlsProbeResult::error("fixture");
        tls.status = TlsStatus::Enabled;
        tls.confidence = Confidence::High;
        tls.expires_on = NaiveDate::from_ymd_opt(2026, 6, 30);
        tls.days_left = Some(121);

        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: Some(&tls),
            subdomains: None,
        };
        let graph = normalize(&sections, &low_risk(), at(0));
        let cert = &graph.assets[1];
        assert_eq!(cert.id, "certificate:example.com:2026-06-30");
        assert_eq!(cert.attributes["expires_on"], json!("2026-06-30"));
        assert_eq!(cert.attributes["confidence"], json!("high"));
        assert_eq!(graph.relationships[0].kind, RelationKind::Uses);

        tls.expires_on = None;
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: Some(&tls),
            subdomains: None,
        };
        let graph = normalize(&sections, &low_risk(), at(0));
        assert_eq!(graph.assets[1].id, "certificate:example.com:unknown");
    }

    #[test]
    fn test_disabled_tls_has_no_certificate() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::new();
        let tls = TlsProbeResult::error("fixture");
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: Some(&tls),
            subdomains: None,
        };
        let graph = normalize(&sections, &low_risk(), at(0));
        assert_eq!(graph.assets.len(), 1);
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn test_findings_per_reason() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::new();
        let risk = RiskAssessment {
            score: 30,
            level: RiskLevel::Medium,
            reasons: vec!["HTTP (port 80) is open".into(), "TLS is not enabled".into()],
        };
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: None,
            subdomains: None,
        };
        let graph = normalize(&sections, &risk, at(9));
        assert_eq!(graph.findings.len(), 2);
        for finding in &graph.findings {
            assert_eq!(finding.kind, RISK_REASON);
            assert_eq!(finding.target, "domain:example.com");
            assert_eq!(finding.severity, RiskLevel::Medium);
            assert_eq!(finding.observed_at, at(9));
        }
    }

    #[test]
    fn test_idempotent_apart_from_timestamps() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::from([(80, open(80)), (443, open(443))]);
        let subdomains = SubdomainReport {
            discovered: vec![],
            confirmed: vec!["a.example.com".into(), "b.example.com".into()],
        };
        let risk = RiskAssessment {
            score: 10,
            level: RiskLevel::Low,
            reasons: vec!["HTTP (port 80) is open".into()],
        };
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: None,
            subdomains: Some(&subdomains),
        };

        let first = normalize(&sections, &risk, at(1));
        let mut second = normalize(&sections, &risk, at(1) + Duration::hours(5));
        for asset in &mut second.assets {
            asset.first_seen = at(1);
            asset.last_seen = at(1);
        }
        for finding in &mut second.findings {
            finding.observed_at = at(1);
        }
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_subdomains_collapse() {
        let domain = Domain::parse("example.com").unwrap();
        let ports = BTreeMap::new();
        let subdomains = SubdomainReport {
            discovered: vec![],
            confirmed: vec!["api.example.com".into(), "API.example.com".into()],
        };
        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: None,
            subdomains: Some(&subdomains),
        };
        let graph = normalize(&sections, &low_risk(), at(0));
        assert_eq!(graph.assets.len(), 2);
        assert_eq!(graph.relationships.len(), 1);
    }
}
