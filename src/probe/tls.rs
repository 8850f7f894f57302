//! Multi-phase TLS capability probe.
//!
//! Each attempt escalates through up to three phases and stops at the first
//! success:
//!
//! 1. strict handshakes over every candidate host and address
//! 2. relaxed handshakes over the same candidates
//! 3. a single relaxed handshake without SNI to the first address
//!
//! Candidate hosts are the domain and its `www.` sibling. Addresses are
//! resolved fresh on each attempt, IPv6 first.

use crate::probe::resolve::family;
use crate::probe::transport::{RustlsTransport, TlsTransport, TrustMode};
use crate::probe::{AttemptPacer, Probe};
use crate::types::{Confidence, Domain};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, trace};

/// Trust store the strict context validates against.
pub const TRUST_CONTEXT: &str = "system_ca_store";

const ADVISORY_NOTES: [&str; 2] = [
    "Trust is evaluated against the system CA store, which may differ from browser trust stores",
    "Relaxed handshakes prove TLS capability, not certificate validity",
];

/// Whether TLS could be negotiated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsStatus {
    Enabled,
    Disabled,
}

impl fmt::Display for TlsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Outcome of the TLS probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsProbeResult {
    pub status: TlsStatus,
    pub confidence: Confidence,
    pub attempts: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub expires_on: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub reason: String,
    pub trust_context: String,
    pub notes: BTreeSet<String>,
}

impl TlsProbeResult {
    /// Result for a probe that could not run, e.g. a TLS stack that failed
    /// to initialize or a task that never finished.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: TlsStatus::Disabled,
            confidence: Confidence::Low,
            attempts: 0,
            success_count: 0,
            failure_count: 0,
            expires_on: None,
            days_left: None,
            reason: reason.into(),
            trust_context: TRUST_CONTEXT.to_string(),
            notes: advisory_notes(),
        }
    }

    /// Check if TLS was negotiated.
    pub fn is_enabled(&self) -> bool {
        self.status == TlsStatus::Enabled
    }
}

fn advisory_notes() -> BTreeSet<String> {
    ADVISORY_NOTES.iter().map(|n| n.to_string()).collect()
}

/// Decide status, confidence and reason from the phase flags and tally.
pub fn decide(
    strict_used: bool,
    relaxed_used: bool,
    success_count: u32,
    attempts: u32,
) -> (TlsStatus, Confidence, &'static str) {
    if strict_used {
        (
            TlsStatus::Enabled,
            Confidence::from_majority(success_count, attempts),
            "Strict TLS negotiation successful",
        )
    } else if relaxed_used {
        (
            TlsStatus::Enabled,
            Confidence::Medium,
            "TLS negotiated with relaxed verification",
        )
    } else {
        (
            TlsStatus::Disabled,
            Confidence::High,
            "All TLS handshake attempts failed",
        )
    }
}

/// Read the "not after" date of a DER certificate.
pub fn certificate_expiry(der: &[u8]) -> Option<NaiveDate> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let not_after = cert.validity().not_after.timestamp();
    DateTime::<Utc>::from_timestamp(not_after, 0).map(|dt| dt.date_naive())
}

/// TLS probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsProbeSettings {
    /// Number of attempts (at least 1).
    pub attempts: u32,
    /// Timeout for each connect and each handshake.
    pub timeout: Duration,
    /// Port to negotiate on.
    pub port: u16,
}

impl Default for TlsProbeSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            timeout: Duration::from_secs(5),
            port: 443,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    success: u32,
    failure: u32,
    strict_used: bool,
    relaxed_used: bool,
    certificate: Option<Vec<u8>>,
    notes: BTreeSet<String>,
}

impl Tally {
    fn record_alpn(&mut self, protocol: Option<&str>) {
        if let Some(protocol) = protocol {
            self.notes.insert(format!("alpn:{protocol}"));
        }
    }
}

/// TLS probe over a pluggable transport.
pub struct TlsProbe<T> {
    transport: T,
    settings: TlsProbeSettings,
    pacer: Option<AttemptPacer>,
}

impl TlsProbe<RustlsTransport> {
    /// Probe backed by rustls with the system trust store.
    pub fn rustls(settings: TlsProbeSettings) -> crate::error::AttemptResult<Self> {
        Ok(Self::new(RustlsTransport::new(settings.timeout)?, settings))
    }
}

impl<T: TlsTransport> TlsProbe<T> {
    /// Create a probe over `transport`.
    pub fn new(transport: T, settings: TlsProbeSettings) -> Self {
        let settings = TlsProbeSettings {
            attempts: settings.attempts.max(1),
            ..settings
        };
        Self {
            transport,
            settings,
            pacer: None,
        }
    }

    /// Share an attempt pacer with other probes.
    pub fn with_pacer(mut self, pacer: Option<AttemptPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Run every attempt against `domain` and classify the tally.
    pub async fn run(&self, domain: &Domain) -> TlsProbeResult {
        self.run_at(domain, Utc::now().date_naive()).await
    }

    async fn run_at(&self, domain: &Domain, today: NaiveDate) -> TlsProbeResult {
        let hosts = [domain.as_str().to_string(), domain.www()];
        let mut tally = Tally::default();

        for attempt in 1..=self.settings.attempts {
            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }

            let mut candidates: Vec<(&str, Vec<SocketAddr>)> = Vec::with_capacity(hosts.len());
            for host in &hosts {
                let addrs = self.transport.resolve(host, self.settings.port).await;
                candidates.push((host.as_str(), addrs));
            }

            let succeeded = self.strict_phase(&candidates, &mut tally).await
                || self.relaxed_phase(&candidates, &mut tally).await
                || self.no_sni_phase(&candidates, &mut tally).await;

            if succeeded {
                tally.success += 1;
            } else {
                tally.failure += 1;
            }
            trace!(domain = %domain, attempt, succeeded, "TLS attempt finished");
        }

        let result = self.conclude(tally, today);
        debug!(
            domain = %domain,
            status = %result.status,
            confidence = %result.confidence,
            success = result.success_count,
            failure = result.failure_count,
            "TLS probe finished"
        );
        result
    }

    async fn strict_phase(&self, candidates: &[(&str, Vec<SocketAddr>)], tally: &mut Tally) -> bool {
        for (host, addrs) in candidates {
            for addr in addrs {
                match self
                    .transport
                    .handshake(*addr, Some(*host), TrustMode::Strict)
                    .await
                {
                    Ok(handshake) => {
                        tally.record_alpn(handshake.alpn.as_deref());
                        if tally.certificate.is_none() {
                            tally.certificate = handshake.peer_certificate;
                        }
                        tally.strict_used = true;
                        tally.notes.insert(format!("strict_tls:{}", family(addr)));
                        return true;
                    }
                    Err(e) => trace!(host, %addr, error = %e, "strict handshake failed"),
                }
            }
        }
        false
    }

    async fn relaxed_phase(&self, candidates: &[(&str, Vec<SocketAddr>)], tally: &mut Tally) -> bool {
        for (host, addrs) in candidates {
            for addr in addrs {
                match self
                    .transport
                    .handshake(*addr, Some(*host), TrustMode::Relaxed)
                    .await
                {
                    Ok(handshake) => {
                        debug!(host, %addr, "TLS negotiated only with relaxed verification");
                        tally.record_alpn(handshake.alpn.as_deref());
                        tally.relaxed_used = true;
                        tally.notes.insert("relaxed_tls".to_string());
                        return true;
                    }
                    Err(e) => trace!(host, %addr, error = %e, "relaxed handshake failed"),
                }
            }
        }
        false
    }

    async fn no_sni_phase(&self, candidates: &[(&str, Vec<SocketAddr>)], tally: &mut Tally) -> bool {
        let Some(addr) = candidates.iter().flat_map(|(_, addrs)| addrs).next() else {
            return false;
        };
        match self
            .transport
            .handshake(*addr, None, TrustMode::Relaxed)
            .await
        {
            Ok(_) => {
                debug!(%addr, "TLS negotiated without SNI");
                tally.relaxed_used = true;
                tally.notes.insert("no_sni_fallback".to_string());
                true
            }
            Err(e) => {
                trace!(%addr, error = %e, "no-SNI handshake failed");
                false
            }
        }
    }

    fn conclude(&self, tally: Tally, today: NaiveDate) -> TlsProbeResult {
        let attempts = tally.success + tally.failure;
        let (status, confidence, reason) =
            decide(tally.strict_used, tally.relaxed_used, tally.success, attempts);

        let expires_on = tally.certificate.as_deref().and_then(certificate_expiry);
        let days_left = expires_on.map(|expiry| (expiry - today).num_days());

        let mut notes = advisory_notes();
        notes.extend(tally.notes);

        TlsProbeResult {
            status,
            confidence,
            attempts,
            success_count: tally.success,
            failure_count: tally.failure,
            expires_on,
            days_left,
            reason: reason.to_string(),
            trust_context: TRUST_CONTEXT.to_string(),
            notes,
        }
    }
}

#[async_trait]
impl<T: TlsTransport + 'static> Probe for TlsProbe<T> {
    type Output = TlsProbeResult;

    fn name(&self) -> &'static str {
        "tls"
    }

    async fn probe(&self, domain: &Domain) -> TlsProbeResult {
        self.run(domain).await
    }
}

/// Probe TLS on port 443 of `domain` with the given attempt count and timeout.
pub async fn probe_tls(domain: &Domain, attempts: u32, timeout: Duration) -> TlsProbeResult {
    let settings = TlsProbeSettings {
        attempts,
        timeout,
        ..TlsProbeSettings::default()
    };
    match TlsProbe::rustls(settings) {
        Ok(probe) => probe.run(domain).await,
        Err(e) => TlsProbeResult::error(format!("TLS stack unavailable: {e}")),
    }
}
