//! Multi-attempt TCP reachability probe.
//!
//! Performs several independent TCP connects to `(domain, port)` and decides
//! once, after all attempts, from the tally of outcomes.

use crate::error::{AttemptResult, ProbeError};
use crate::probe::{AttemptPacer, Probe};
use crate::types::{Confidence, Domain, Port};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Caveats attached to every port probe result.
const PORT_NOTES: [&str; 3] = [
    "Reachability is measured from the scanner's network perspective",
    "Filtered means no definitive response and does not confirm a firewall",
    "Status is decided from the majority of repeated attempts",
];

/// Status of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    /// At least one connect succeeded.
    Open,
    /// Every attempt was refused.
    Closed,
    /// No definitive answer (timeouts, unreachable, resolution failures).
    Filtered,
    /// The probe itself could not run to completion.
    Error,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Per-outcome attempt tally. Always sums to the attempt count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCounts {
    pub open: u32,
    pub closed: u32,
    pub filtered: u32,
}

impl AttemptCounts {
    /// Total number of classified attempts.
    pub fn total(&self) -> u32 {
        self.open + self.closed + self.filtered
    }

    fn record(&mut self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Open => self.open += 1,
            AttemptOutcome::Closed => self.closed += 1,
            AttemptOutcome::Filtered => self.filtered += 1,
        }
    }
}

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortProbeResult {
    pub port: Port,
    pub status: PortStatus,
    pub confidence: Confidence,
    pub attempts: u32,
    pub counts: AttemptCounts,
    pub reason: String,
    pub notes: Vec<String>,
}

impl PortProbeResult {
    /// Build a result from a completed tally.
    pub fn from_counts(port: Port, counts: AttemptCounts) -> Self {
        let attempts = counts.total();
        let (status, confidence, reason) = classify(counts);
        Self {
            port,
            status,
            confidence,
            attempts,
            counts,
            reason: reason.to_string(),
            notes: PORT_NOTES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// A result for a probe that never produced a tally.
    pub fn error(port: Port, reason: impl Into<String>) -> Self {
        Self {
            port,
            status: PortStatus::Error,
            confidence: Confidence::Low,
            attempts: 0,
            counts: AttemptCounts::default(),
            reason: reason.into(),
            notes: PORT_NOTES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Decide status, confidence and reason from a finished tally.
pub fn classify(counts: AttemptCounts) -> (PortStatus, Confidence, &'static str) {
    let attempts = counts.total();
    if counts.open > 0 {
        (
            PortStatus::Open,
            Confidence::from_majority(counts.open, attempts),
            "TCP connection successful",
        )
    } else if attempts > 0 && counts.closed == attempts {
        (
            PortStatus::Closed,
            Confidence::High,
            "Connection refused consistently",
        )
    } else {
        (
            PortStatus::Filtered,
            Confidence::Medium,
            "No definitive TCP response (possible firewall)",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Open,
    Closed,
    Filtered,
}

/// Port probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortProbeSettings {
    /// Number of connect attempts (at least 1).
    pub attempts: u32,
    /// Timeout per connect attempt.
    pub timeout: Duration,
    /// Base pause between attempts; a random jitter of up to a quarter is added.
    pub spacing: Duration,
}

impl Default for PortProbeSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(3),
            spacing: Duration::from_millis(100),
        }
    }
}

/// Multi-attempt TCP connect probe for one port.
///
/// Does not require elevated privileges.
#[derive(Debug, Clone)]
pub struct PortProbe {
    port: Port,
    settings: PortProbeSettings,
    pacer: Option<AttemptPacer>,
}

impl PortProbe {
    /// Create a probe for `port`.
    pub fn new(port: Port, settings: PortProbeSettings) -> Self {
        let settings = PortProbeSettings {
            attempts: settings.attempts.max(1),
            ..settings
        };
        Self {
            port,
            settings,
            pacer: None,
        }
    }

    /// Share an attempt pacer with other probes.
    pub fn with_pacer(mut self, pacer: Option<AttemptPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// The port this probe targets.
    pub fn port(&self) -> Port {
        self.port
    }

    /// Run every attempt against `host` and classify the tally.
    pub async fn run(&self, host: &str) -> PortProbeResult {
        let mut counts = AttemptCounts::default();

        for attempt in 1..=self.settings.attempts {
            if attempt > 1 {
                self.pause().await;
            }
            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }

            let outcome = match self.attempt_connect(host).await {
                Ok(stream) => {
                    drop(stream);
                    AttemptOutcome::Open
                }
                Err(ProbeError::ConnectionRefused) => AttemptOutcome::Closed,
                Err(e) => {
                    trace!(host, port = %self.port, error = %e, "connect attempt failed");
                    AttemptOutcome::Filtered
                }
            };
            counts.record(outcome);
        }

        let result = PortProbeResult::from_counts(self.port, counts);
        debug!(
            host,
            port = %self.port,
            status = %result.status,
            confidence = %result.confidence,
            open = counts.open,
            closed = counts.closed,
            filtered = counts.filtered,
            "port probe finished"
        );
        result
    }

    /// Attempt to connect to the target.
    async fn attempt_connect(&self, host: &str) -> AttemptResult<TcpStream> {
        match timeout(
            self.settings.timeout,
            TcpStream::connect((host, self.port.as_u16())),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ProbeError::from_connect(&e)),
            Err(_) => Err(ProbeError::NetworkTimeout),
        }
    }

    async fn pause(&self) {
        let base = self.settings.spacing.as_millis() as u64;
        if base == 0 {
            return;
        }
        let jitter = rand::thread_rng().gen_range(0..=base / 4);
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }
}

#[async_trait]
impl Probe for PortProbe {
    type Output = PortProbeResult;

    fn name(&self) -> &'static str {
        match self.port {
            Port::HTTP => "port-80",
            Port::HTTPS => "port-443",
            _ => "port",
        }
    }

    async fn probe(&self, domain: &Domain) -> PortProbeResult {
        self.run(domain.as_str()).await
    }
}

/// Probe one port of `domain` with the given attempt count and timeout.
pub async fn probe_port(
    domain: &Domain,
    port: Port,
    attempts: u32,
    timeout: Duration,
) -> PortProbeResult {
    let settings = PortProbeSettings {
        attempts,
        timeout,
        ..PortProbeSettings::default()
    };
    PortProbe::new(port, settings).run(domain.as_str()).await
}
