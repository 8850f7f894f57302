//! Half-open TCP SYN scan through an external nmap binary.
//!
//! SYN scanning needs raw sockets, so nmap usually has to run with elevated
//! privileges. The collaborator is off unless explicitly enabled.

use crate::collab::nmap_xml;
use crate::collab::tool::{self, ToolFailure};
use crate::error::ProbeError;
use crate::probe::{Outcome, Probe};
use crate::types::{Domain, Port};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Scan method recorded in every report.
pub const SYN_METHOD: &str = "tcp_syn";

const SYN_NOTES: [&str; 3] = [
    "syn_scan_via_nmap",
    "network_level_visibility",
    "requires_elevated_privileges",
];

/// Open ports seen by a SYN scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynScanReport {
    pub method: String,
    /// Sorted, without duplicates.
    pub open_ports: Vec<u16>,
    pub notes: Vec<String>,
}

impl SynScanReport {
    fn from_ports(mut open_ports: Vec<u16>) -> Self {
        open_ports.sort_unstable();
        open_ports.dedup();
        Self {
            method: SYN_METHOD.to_string(),
            open_ports,
            notes: SYN_NOTES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// SYN scan settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynScanSettings {
    /// Path or name of the nmap binary.
    pub program: PathBuf,
    pub ports: Vec<Port>,
    /// Wall-clock limit for the whole tool run.
    pub timeout: Duration,
}

impl Default for SynScanSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("nmap"),
            ports: vec![Port::HTTP, Port::HTTPS],
            timeout: Duration::from_secs(120),
        }
    }
}

/// nmap-backed SYN scan collaborator.
#[derive(Debug, Clone)]
pub struct SynScan {
    settings: SynScanSettings,
}

impl SynScan {
    pub fn new(settings: SynScanSettings) -> Self {
        Self { settings }
    }

    fn command(&self, target: &str) -> Command {
        let ports = self
            .settings
            .ports
            .iter()
            .map(Port::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(["-sS", "-Pn", "-n", "--open", "-p"])
            .arg(ports)
            .arg(target)
            .args(["-oX", "-"]);
        cmd
    }

    /// Run the scan against `target`.
    pub async fn run(&self, target: &str) -> Outcome<SynScanReport> {
        let program = self.settings.program.display().to_string();
        debug!(program, target, ports = self.settings.ports.len(), "starting SYN scan");

        let stdout = match tool::run(self.command(target), self.settings.timeout).await {
            Ok(stdout) => stdout,
            Err(ToolFailure::TimedOut) => {
                warn!(target, timeout = ?self.settings.timeout, "SYN scan timed out");
                return Outcome::unavailable(format!(
                    "SYN scan timed out after {}s",
                    self.settings.timeout.as_secs()
                ));
            }
            Err(ToolFailure::NotFound) => {
                warn!(program, "SYN scan tool not found");
                return Outcome::unavailable(
                    ProbeError::ToolUnavailable(format!("{program} not found")).to_string(),
                );
            }
            Err(ToolFailure::Spawn(e)) => {
                warn!(program, error = %e, "SYN scan tool failed to start");
                return Outcome::unavailable(ProbeError::ToolUnavailable(e.to_string()).to_string());
            }
            Err(ToolFailure::Exit { status, stderr }) => {
                warn!(target, %status, stderr = %stderr, "SYN scan failed");
                return Outcome::unavailable(format!(
                    "Nmap execution failed ({status}){}",
                    tool::stderr_suffix(&stderr)
                ));
            }
        };

        if stdout.trim().is_empty() {
            warn!(target, "SYN scan produced no report");
            return Outcome::degraded(
                SynScanReport::from_ports(Vec::new()),
                ProbeError::MalformedResponse("empty report".to_string()).to_string(),
            );
        }

        match nmap_xml::parse(&stdout) {
            Ok(records) => {
                let report = SynScanReport::from_ports(records.iter().map(|r| r.port).collect());
                info!(target, open = report.open_ports.len(), "SYN scan finished");
                Outcome::ok(report)
            }
            Err(e) => {
                warn!(target, error = %e, "SYN scan report unreadable");
                Outcome::degraded(SynScanReport::from_ports(Vec::new()), e.to_string())
            }
        }
    }
}

#[async_trait]
impl Probe for SynScan {
    type Output = Outcome<SynScanReport>;

    fn name(&self) -> &'static str {
        "syn_scan"
    }

    async fn probe(&self, domain: &Domain) -> Outcome<SynScanReport> {
        self.run(domain.as_str()).await
    }
}
