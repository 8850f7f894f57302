//! Active service fingerprinting through an external nmap binary.
//!
//! nmap runs as a child process with a TCP connect scan of the top 20 ports
//! and version detection; its XML report is parsed into [`ServiceRecord`]s.

use crate::collab::nmap_xml;
use crate::collab::tool::{self, ToolFailure};
use crate::error::ProbeError;
use crate::probe::{Outcome, Probe};
use crate::types::Domain;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One exposed service reported by the fingerprinting tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub port: u16,
    pub protocol: String,
    pub service_name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
}

/// Fingerprint tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSettings {
    /// Path or name of the nmap binary.
    pub program: PathBuf,
    /// Wall-clock limit for the whole tool run.
    pub timeout: Duration,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("nmap"),
            timeout: Duration::from_secs(120),
        }
    }
}

/// nmap-backed service fingerprint collaborator.
#[derive(Debug, Clone)]
pub struct ServiceFingerprint {
    settings: FingerprintSettings,
}

impl ServiceFingerprint {
    pub fn new(settings: FingerprintSettings) -> Self {
        Self { settings }
    }

    fn command(&self, target: &str) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(["-sT", "-sV", "--top-ports", "20", "-T3", "--open", "-oX", "-"])
            .arg(target);
        cmd
    }

    /// Run the tool against `target` and parse its report.
    pub async fn run(&self, target: &str) -> Outcome<Vec<ServiceRecord>> {
        let program = self.settings.program.display().to_string();
        debug!(program, target, "starting service fingerprint");

        let stdout = match tool::run(self.command(target), self.settings.timeout).await {
            Ok(stdout) => stdout,
            Err(ToolFailure::TimedOut) => {
                warn!(target, timeout = ?self.settings.timeout, "service fingerprint timed out");
                return Outcome::unavailable(format!(
                    "{} after {}s",
                    ProbeError::NetworkTimeout,
                    self.settings.timeout.as_secs()
                ));
            }
            Err(ToolFailure::NotFound) => {
                warn!(program, "service fingerprint tool not found");
                return Outcome::unavailable(
                    ProbeError::ToolUnavailable(format!("{program} not found")).to_string(),
                );
            }
            Err(ToolFailure::Spawn(e)) => {
                warn!(program, error = %e, "service fingerprint tool failed to start");
                return Outcome::unavailable(ProbeError::ToolUnavailable(e.to_string()).to_string());
            }
            Err(ToolFailure::Exit { status, stderr }) => {
                warn!(target, %status, stderr = %stderr, "service fingerprint failed");
                return Outcome::unavailable(format!(
                    "{program} exited with {status}{}",
                    tool::stderr_suffix(&stderr)
                ));
            }
        };

        if stdout.trim().is_empty() {
            warn!(target, "service fingerprint produced no report");
            return Outcome::degraded(
                Vec::new(),
                ProbeError::MalformedResponse("empty report".to_string()).to_string(),
            );
        }

        match nmap_xml::parse(&stdout) {
            Ok(records) => {
                info!(target, services = records.len(), "service fingerprint finished");
                Outcome::ok(records)
            }
            Err(e) => {
                warn!(target, error = %e, "service fingerprint report unreadable");
                Outcome::degraded(Vec::new(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl Probe for ServiceFingerprint {
    type Output = Outcome<Vec<ServiceRecord>>;

    fn name(&self) -> &'static str {
        "services"
    }

    async fn probe(&self, domain: &Domain) -> Outcome<Vec<ServiceRecord>> {
        self.run(domain.as_str()).await
    }
}
