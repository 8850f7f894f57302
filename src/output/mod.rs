//! Output formatting module.
//!
//! Renders a [`ScanReport`] as plain text, JSON, or a findings CSV, to any
//! writer. The CLI passes either locked stdout or a file.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_findings_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_success, print_warning, write_plain};

use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::report::ScanReport;
use std::io::Write;

/// Render a report in the requested format.
///
/// `graph_only` restricts JSON output to the asset graph. Plain and CSV
/// output ignore it: CSV always carries the findings only.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &ScanReport,
    format: OutputFormat,
    graph_only: bool,
) -> CliResult<()> {
    match format {
        OutputFormat::Plain => write_plain(out, report)?,
        OutputFormat::Json => write_json(out, report, graph_only)?,
        OutputFormat::Csv => write_findings_csv(out, report)?,
    }
    Ok(())
}

/// Truncate a string to a maximum display length, adding "..." if truncated.
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::collab::{
        CdnInference, HeaderSummary, SubdomainReport, SynScanReport, TechnologyObservation,
    };
    use crate::graph::{self, ScanSections};
    use crate::probe::{AttemptCounts, Outcome, PortProbeResult, TlsProbeResult};
    use crate::report::{ScanId, ScanReport, ServiceScan};
    use crate::risk::{self, AggregatorInput, RiskPolicy};
    use crate::types::{Confidence, Domain, Port};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    /// A small report: port 80 open, 443 closed, TLS disabled, one subdomain.
    pub fn report() -> ScanReport {
        let domain = Domain::parse("example.com").unwrap();
        let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut ports = BTreeMap::new();
        ports.insert(
            80,
            PortProbeResult::from_counts(
                Port::HTTP,
                AttemptCounts { open: 3, closed: 0, filtered: 0 },
            ),
        );
        ports.insert(
            443,
            PortProbeResult::from_counts(
                Port::HTTPS,
                AttemptCounts { open: 0, closed: 3, filtered: 0 },
            ),
        );
        let tls = TlsProbeResult::error("All TLS attempts failed");
        let headers = Outcome::degraded(HeaderSummary::unreachable(), "connection refused");
        let technology = Outcome::ok(TechnologyObservation {
            server: Some("nginx/1.18.0".into()),
            powered_by: None,
            via: None,
            headers_exposed: vec!["server".into()],
            cdn: CdnInference {
                detected: false,
                provider: None,
                confidence: Confidence::Medium,
            },
        });
        let subdomains = Outcome::ok(SubdomainReport {
            discovered: vec!["www.example.com".into(), "dev.example.com".into()],
            confirmed: vec!["www.example.com".into()],
        });

        let input = AggregatorInput {
            port_80: ports.get(&80),
            port_443: ports.get(&443),
            tls: Some(&tls),
            headers: headers.value(),
            technology: technology.value(),
            subdomains: subdomains.value(),
            services: &[],
        };
        let risk = risk::score(&input, &RiskPolicy::default());
        let graph = graph::normalize(
            &ScanSections {
                domain: &domain,
                ports: &ports,
                tls: Some(&tls),
                subdomains: subdomains.value(),
            },
            &risk,
            started_at,
        );

        ScanReport {
            scan_id: ScanId::new(),
            domain,
            started_at,
            completed_at: started_at + chrono::Duration::milliseconds(4200),
            duration_ms: 4200,
            ports,
            tls,
            https_headers: Some(headers),
            technology: Some(technology),
            subdomains: Some(subdomains),
            services: ServiceScan::disabled(),
            syn_scan: Some(Outcome::ok(SynScanReport {
                method: "tcp_syn".to_string(),
                open_ports: vec![80],
                notes: vec!["requires_elevated_privileges".to_string()],
            })),
            risk,
            graph,
        }
    }
}
