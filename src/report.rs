//! Scan report: everything one scan produced, in one serializable value.

use crate::collab::{
    HeaderSummary, ServiceRecord, SubdomainReport, SynScanReport, TechnologyObservation,
};
use crate::graph::AssetGraph;
use crate::probe::{Outcome, PortProbeResult, TlsProbeResult};
use crate::risk::RiskAssessment;
use crate::types::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    /// Generate a new random scan ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of the service fingerprint section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceScanStatus {
    /// The tool ran and its report was read.
    Enabled,
    /// Turned off by configuration.
    Disabled,
    /// The tool was missing, failed, timed out or produced an unreadable report.
    Error,
}

/// Service fingerprint section of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceScan {
    pub status: ServiceScanStatus,
    pub services: Vec<ServiceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ServiceScan {
    pub fn disabled() -> Self {
        Self {
            status: ServiceScanStatus::Disabled,
            services: Vec::new(),
            reason: None,
        }
    }

    /// Fold a collaborator outcome; `None` means the collaborator was off.
    pub fn from_outcome(outcome: Option<Outcome<Vec<ServiceRecord>>>) -> Self {
        match outcome {
            None => Self::disabled(),
            Some(Outcome::Ok { value }) => Self {
                status: ServiceScanStatus::Enabled,
                services: value,
                reason: None,
            },
            Some(Outcome::Degraded { value, reason }) => Self {
                status: ServiceScanStatus::Error,
                services: value,
                reason: Some(reason),
            },
            Some(Outcome::Unavailable { reason }) => Self {
                status: ServiceScanStatus::Error,
                services: Vec::new(),
                reason: Some(reason),
            },
        }
    }
}

/// Complete result of one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: ScanId,
    pub domain: Domain,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Port probe results keyed by port number.
    pub ports: BTreeMap<u16, PortProbeResult>,
    pub tls: TlsProbeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_headers: Option<Outcome<HeaderSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<Outcome<TechnologyObservation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomains: Option<Outcome<SubdomainReport>>,
    pub services: ServiceScan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syn_scan: Option<Outcome<SynScanReport>>,
    pub risk: RiskAssessment,
    pub graph: AssetGraph,
}

impl ScanReport {
    /// Number of ports found open.
    pub fn open_ports(&self) -> usize {
        self.ports.values().filter(|p| p.is_open()).count()
    }
}
