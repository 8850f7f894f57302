//! Scan orchestration.
//!
//! A scan validates the domain, spawns every enabled probe as its own tokio
//! task, waits for all of them, and only then runs the risk aggregator and
//! the asset normalizer. A task that panics, is cancelled or misses the scan
//! deadline is replaced by that probe's error result; the scan itself still
//! completes.

use crate::collab::{
    build_client, FingerprintSettings, HeaderProbe, HeaderSummary, ServiceFingerprint,
    ServiceRecord, SubdomainProbe, SubdomainReport, SubdomainSettings, SynScan, SynScanReport,
    SynScanSettings, TechnologyObservation, TechnologyProbe, DEFAULT_USER_AGENT,
};
use crate::error::ScanError;
use crate::graph::{self, ScanSections};
use crate::probe::{
    AttemptPacer, Outcome, PortProbe, PortProbeResult, PortProbeSettings, Probe, TlsProbe,
    TlsProbeResult, TlsProbeSettings,
};
use crate::report::{ScanId, ScanReport, ServiceScan};
use crate::risk::{self, AggregatorInput, RiskPolicy};
use crate::types::{Domain, Port};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Inclusive bounds on the worker pool size.
pub const WORKER_RANGE: (usize, usize) = (1, 32);

/// Reason recorded for probes cut off by the scan deadline.
pub const DEADLINE_EXCEEDED: &str = "Scan deadline exceeded";

/// Immutable configuration of a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Probe tasks allowed to run at once.
    pub max_workers: usize,
    pub port: PortProbeSettings,
    pub tls: TlsProbeSettings,
    /// Connection attempts per second across port and TLS probes; 0 is unlimited.
    pub attempt_rate: u32,
    /// Service fingerprinting; `None` disables it.
    pub services: Option<FingerprintSettings>,
    /// Privileged SYN scan; `None` disables it.
    pub syn_scan: Option<SynScanSettings>,
    /// Header hygiene and technology fingerprinting.
    pub passive: bool,
    /// Subdomain discovery; `None` disables it.
    pub subdomains: Option<SubdomainSettings>,
    pub user_agent: String,
    pub http_timeout: Duration,
    /// Upper bound on the whole scan, if any.
    pub scan_deadline: Option<Duration>,
    pub risk: RiskPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_workers: 6,
            port: PortProbeSettings::default(),
            tls: TlsProbeSettings::default(),
            attempt_rate: 0,
            services: Some(FingerprintSettings::default()),
            syn_scan: None,
            passive: true,
            subdomains: Some(SubdomainSettings::default()),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout: Duration::from_secs(6),
            scan_deadline: None,
            risk: RiskPolicy::default(),
        }
    }
}

/// A probe shared between scans.
pub type SharedProbe<T> = Arc<dyn Probe<Output = T>>;

/// The probes one orchestrator runs. Optional probes are skipped when `None`.
#[derive(Clone)]
pub struct ProbeSet {
    pub http_port: SharedProbe<PortProbeResult>,
    pub https_port: SharedProbe<PortProbeResult>,
    pub tls: SharedProbe<TlsProbeResult>,
    pub services: Option<SharedProbe<Outcome<Vec<ServiceRecord>>>>,
    pub syn_scan: Option<SharedProbe<Outcome<SynScanReport>>>,
    pub headers: Option<SharedProbe<Outcome<HeaderSummary>>>,
    pub technology: Option<SharedProbe<Outcome<TechnologyObservation>>>,
    pub subdomains: Option<SharedProbe<Outcome<SubdomainReport>>>,
}

impl ProbeSet {
    /// Build the production probes for `config`.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let pacer = AttemptPacer::new(config.attempt_rate);

        let tls = TlsProbe::rustls(config.tls)
            .map_err(|e| ScanError::InvalidConfig(format!("TLS setup failed: {e}")))?
            .with_pacer(pacer.clone());
        let client = build_client(&config.user_agent, config.http_timeout)
            .map_err(|e| ScanError::InvalidConfig(e.to_string()))?;

        let subdomains: Option<SharedProbe<Outcome<SubdomainReport>>> = match &config.subdomains {
            Some(settings) => Some(Arc::new(
                SubdomainProbe::new(client.clone(), settings.clone())
                    .map_err(|e| ScanError::InvalidConfig(e.to_string()))?,
            )),
            None => None,
        };

        Ok(Self {
            http_port: Arc::new(PortProbe::new(Port::HTTP, config.port).with_pacer(pacer.clone())),
            https_port: Arc::new(PortProbe::new(Port::HTTPS, config.port).with_pacer(pacer)),
            tls: Arc::new(tls),
            services: config
                .services
                .clone()
                .map(|s| Arc::new(ServiceFingerprint::new(s)) as SharedProbe<_>),
            syn_scan: config
                .syn_scan
                .clone()
                .map(|s| Arc::new(SynScan::new(s)) as SharedProbe<_>),
            headers: config
                .passive
                .then(|| Arc::new(HeaderProbe::new(client.clone())) as SharedProbe<_>),
            technology: config
                .passive
                .then(|| Arc::new(TechnologyProbe::new(client)) as SharedProbe<_>),
            subdomains,
        })
    }
}

/// Runs scans with a bounded worker pool.
pub struct Orchestrator {
    config: Arc<ScanConfig>,
    probes: ProbeSet,
    workers: Arc<Semaphore>,
}

impl Orchestrator {
    /// Create an orchestrator with the production probes.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let probes = ProbeSet::from_config(&config)?;
        Ok(Self::with_probes(config, probes))
    }

    /// Create an orchestrator over an explicit probe set.
    pub fn with_probes(config: ScanConfig, probes: ProbeSet) -> Self {
        let workers = config.max_workers.clamp(WORKER_RANGE.0, WORKER_RANGE.1);
        Self {
            config: Arc::new(config),
            probes,
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `target`.
    ///
    /// Fails only when `target` is not a valid domain name.
    pub async fn scan(&self, target: &str) -> Result<ScanReport, ScanError> {
        let domain = Domain::parse(target)?;
        let scan_id = ScanId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline = self.config.scan_deadline.map(|d| clock + d);

        info!(%scan_id, domain = %domain, "scan started");

        let http = self.spawn(&self.probes.http_port, &domain);
        let https = self.spawn(&self.probes.https_port, &domain);
        let tls = self.spawn(&self.probes.tls, &domain);
        let services = self.probes.services.as_ref().map(|p| self.spawn(p, &domain));
        let syn_scan = self.probes.syn_scan.as_ref().map(|p| self.spawn(p, &domain));
        let headers = self.probes.headers.as_ref().map(|p| self.spawn(p, &domain));
        let technology = self.probes.technology.as_ref().map(|p| self.spawn(p, &domain));
        let subdomains = self.probes.subdomains.as_ref().map(|p| self.spawn(p, &domain));

        let port_80 = settle("port-80", http, deadline, |r| {
            PortProbeResult::error(Port::HTTP, r)
        })
        .await;
        let port_443 = settle("port-443", https, deadline, |r| {
            PortProbeResult::error(Port::HTTPS, r)
        })
        .await;
        let tls = settle("tls", tls, deadline, TlsProbeResult::error).await;
        let services = settle_optional("services", services, deadline).await;
        let syn_scan = settle_optional("syn_scan", syn_scan, deadline).await;
        let headers = settle_optional("headers", headers, deadline).await;
        let technology = settle_optional("technology", technology, deadline).await;
        let subdomains = settle_optional("subdomains", subdomains, deadline).await;

        debug!(%scan_id, "all probes joined");

        let services = ServiceScan::from_outcome(services);
        let ports = BTreeMap::from([
            (Port::HTTP.as_u16(), port_80),
            (Port::HTTPS.as_u16(), port_443),
        ]);

        let input = AggregatorInput {
            port_80: ports.get(&Port::HTTP.as_u16()),
            port_443: ports.get(&Port::HTTPS.as_u16()),
            tls: Some(&tls),
            headers: headers.as_ref().and_then(Outcome::value),
            technology: technology.as_ref().and_then(Outcome::value),
            subdomains: subdomains.as_ref().and_then(Outcome::value),
            services: &services.services,
        };
        let risk = risk::score(&input, &self.config.risk);

        let sections = ScanSections {
            domain: &domain,
            ports: &ports,
            tls: Some(&tls),
            subdomains: subdomains.as_ref().and_then(Outcome::value),
        };
        let graph = graph::normalize(&sections, &risk, started_at);

        let completed_at = Utc::now();
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            %scan_id,
            domain = %domain,
            score = risk.score,
            level = %risk.level,
            duration_ms,
            "scan finished"
        );

        Ok(ScanReport {
            scan_id,
            domain,
            started_at,
            completed_at,
            duration_ms,
            ports,
            tls,
            https_headers: headers,
            technology,
            subdomains,
            services,
            syn_scan,
            risk,
            graph,
        })
    }

    fn spawn<T: Send + 'static>(&self, probe: &SharedProbe<T>, domain: &Domain) -> JoinHandle<T> {
        let probe = Arc::clone(probe);
        let domain = domain.clone();
        let workers = Arc::clone(&self.workers);
        tokio::spawn(async move {
            let _permit = workers.acquire_owned().await.ok();
            debug!(probe = probe.name(), "probe started");
            probe.probe(&domain).await
        })
    }
}

/// Await a probe task, substituting `fallback` when it does not produce a
/// value.
async fn settle<T>(
    name: &'static str,
    handle: JoinHandle<T>,
    deadline: Option<Instant>,
    fallback: impl FnOnce(String) -> T,
) -> T {
    let abort = handle.abort_handle();
    let joined = match deadline {
        Some(at) => match timeout_at(at, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                warn!(probe = name, "probe cut off by scan deadline");
                return fallback(DEADLINE_EXCEEDED.to_string());
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(value) => value,
        Err(e) => {
            let reason = if e.is_panic() {
                "Probe task panicked"
            } else {
                "Probe task was cancelled"
            };
            warn!(probe = name, "{reason}");
            fallback(reason.to_string())
        }
    }
}

async fn settle_optional<T>(
    name: &'static str,
    handle: Option<JoinHandle<Outcome<T>>>,
    deadline: Option<Instant>,
) -> Option<Outcome<T>> {
    match handle {
        Some(handle) => Some(settle(name, handle, deadline, Outcome::unavailable).await),
        None => None,
    }
}
