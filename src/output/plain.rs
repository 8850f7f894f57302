//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::truncate_string;
use crate::collab::HeaderGrade;
use crate::probe::{Outcome, PortStatus, TlsStatus};
use crate::report::{ScanReport, ServiceScanStatus};
use crate::risk::RiskLevel;
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write a report in human-readable plain text format.
pub fn write_plain<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    // Header
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                 {} Surface Report",
        style("Perimeter").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Domain:").bold(), report.domain)?;
    writeln!(
        out,
        "  {} {}",
        style("Scan ID:").bold(),
        style(report.scan_id).dim()
    )?;
    writeln!(
        out,
        "  {} {} ({:.2}s)",
        style("Started:").bold(),
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms as f64 / 1000.0
    )?;
    writeln!(out)?;

    write_ports(out, report)?;
    write_tls(out, report)?;
    write_headers(out, report)?;
    write_technology(out, report)?;
    write_subdomains(out, report)?;
    write_services(out, report)?;
    write_syn_scan(out, report)?;
    write_risk(out, report)?;

    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;
    Ok(())
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "  {}", style(title).cyan().bold())?;
    Ok(())
}

fn write_unavailable<W: Write>(out: &mut W, reason: &str) -> io::Result<()> {
    writeln!(
        out,
        "    {} {}",
        style("unavailable:").yellow(),
        style(reason).dim()
    )?;
    writeln!(out)?;
    Ok(())
}

fn write_ports<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    section(out, "Ports")?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:>6}  {:^10}  {:<10}  {:>8}  {}",
        style("PORT").bold(),
        style("STATE").bold(),
        style("CONFIDENCE").bold(),
        style("O/C/F").bold(),
        style("REASON").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for (port, result) in &report.ports {
        let status_style = match result.status {
            PortStatus::Open => Style::new().green().bold(),
            PortStatus::Closed => Style::new().red(),
            PortStatus::Filtered => Style::new().yellow(),
            PortStatus::Error => Style::new().red().dim(),
        };
        let counts = format!(
            "{}/{}/{}",
            result.counts.open, result.counts.closed, result.counts.filtered
        );
        writeln!(
            out,
            "  {:>6}  {:^10}  {:<10}  {:>8}  {}",
            port,
            status_style.apply_to(result.status.to_string()),
            result.confidence,
            counts,
            style(truncate_string(&result.reason, 30)).dim()
        )?;
    }
    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(out)?;
    Ok(())
}

fn write_tls<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let tls = &report.tls;
    section(out, "TLS")?;
    let status = match tls.status {
        TlsStatus::Enabled => style(tls.status.to_string()).green().bold(),
        TlsStatus::Disabled => style(tls.status.to_string()).red().bold(),
    };
    writeln!(
        out,
        "    {} ({} confidence, {}/{} attempts succeeded)",
        status, tls.confidence, tls.success_count, tls.attempts
    )?;
    match (tls.expires_on, tls.days_left) {
        (Some(expires), Some(days)) => {
            let days_style = if days < 0 {
                Style::new().red().bold()
            } else if days < 30 {
                Style::new().yellow()
            } else {
                Style::new().green()
            };
            writeln!(
                out,
                "    Certificate expires {} ({} days left)",
                expires,
                days_style.apply_to(days)
            )?;
        }
        _ => writeln!(out, "    {}", style("Certificate expiry unknown").dim())?,
    }
    if !tls.notes.is_empty() {
        let notes: Vec<&str> = tls.notes.iter().map(String::as_str).collect();
        writeln!(out, "    {} {}", style("Notes:").dim(), notes.join(", "))?;
    }
    writeln!(out)?;
    Ok(())
}

fn grade_label(grade: HeaderGrade) -> console::StyledObject<&'static str> {
    match grade {
        HeaderGrade::Strong => style("strong").green(),
        HeaderGrade::Present => style("present").green(),
        HeaderGrade::Permissive => style("permissive").yellow(),
        HeaderGrade::Missing => style("missing").red(),
    }
}

fn write_headers<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let Some(outcome) = &report.https_headers else {
        return Ok(());
    };
    section(out, "Security headers")?;
    let Some(summary) = outcome.value() else {
        return write_unavailable(out, outcome.reason().unwrap_or("no response"));
    };
    if let Outcome::Degraded { reason, .. } = outcome {
        writeln!(out, "    {} {}", style("degraded:").yellow(), style(reason).dim())?;
    }
    writeln!(
        out,
        "    {} strong, {} permissive, {} missing",
        style(summary.strong).green(),
        style(summary.permissive).yellow(),
        style(summary.missing).red()
    )?;
    for (name, detail) in &summary.details {
        let value = detail
            .value
            .as_deref()
            .map(|v| truncate_string(v, 40))
            .unwrap_or_default();
        writeln!(
            out,
            "    {:<28} {:<11} {}",
            name,
            grade_label(detail.grade),
            style(value).dim()
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_technology<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let Some(outcome) = &report.technology else {
        return Ok(());
    };
    section(out, "Technology")?;
    let Some(tech) = outcome.value() else {
        return write_unavailable(out, outcome.reason().unwrap_or("no response"));
    };
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    writeln!(out, "    {:<12} {}", "Server", field(&tech.server))?;
    writeln!(out, "    {:<12} {}", "Powered by", field(&tech.powered_by))?;
    writeln!(out, "    {:<12} {}", "Via", field(&tech.via))?;
    let cdn = if tech.cdn.detected {
        style(
            tech.cdn
                .provider
                .clone()
                .unwrap_or_else(|| "detected".to_string()),
        )
        .green()
    } else {
        style("none".to_string()).yellow()
    };
    writeln!(
        out,
        "    {:<12} {} ({} confidence)",
        "CDN", cdn, tech.cdn.confidence
    )?;
    writeln!(out)?;
    Ok(())
}

fn write_subdomains<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let Some(outcome) = &report.subdomains else {
        return Ok(());
    };
    section(out, "Subdomains")?;
    let Some(subs) = outcome.value() else {
        return write_unavailable(out, outcome.reason().unwrap_or("no response"));
    };
    writeln!(
        out,
        "    {} discovered, {} resolving",
        subs.discovered.len(),
        style(subs.count()).bold()
    )?;
    if let Outcome::Degraded { reason, .. } = outcome {
        writeln!(out, "    {} {}", style("partial:").yellow(), style(reason).dim())?;
    }
    for name in &subs.confirmed {
        writeln!(out, "    {} {}", style("•").dim(), name)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_services<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let services = &report.services;
    section(out, "Services")?;
    match services.status {
        ServiceScanStatus::Disabled => {
            writeln!(out, "    {}", style("fingerprinting disabled").dim())?;
        }
        ServiceScanStatus::Error => {
            writeln!(
                out,
                "    {} {}",
                style("error:").red(),
                style(services.reason.as_deref().unwrap_or("unknown")).dim()
            )?;
        }
        ServiceScanStatus::Enabled if services.services.is_empty() => {
            writeln!(out, "    {}", style("No open services reported.").dim())?;
        }
        ServiceScanStatus::Enabled => {}
    }
    for svc in &services.services {
        let detail = [svc.product.as_deref(), svc.version.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            out,
            "    {:>6}/{:<4} {:<15} {}",
            svc.port,
            svc.protocol,
            svc.service_name.as_deref().unwrap_or("unknown"),
            style(detail).dim()
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_syn_scan<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let Some(outcome) = &report.syn_scan else {
        return Ok(());
    };
    section(out, "SYN scan")?;
    let Some(syn) = outcome.value() else {
        return write_unavailable(out, outcome.reason().unwrap_or("no response"));
    };
    if let Outcome::Degraded { reason, .. } = outcome {
        writeln!(out, "    {} {}", style("degraded:").yellow(), style(reason).dim())?;
    }
    if syn.open_ports.is_empty() {
        writeln!(out, "    {}", style("No open ports reported.").dim())?;
    } else {
        let ports: Vec<String> = syn.open_ports.iter().map(u16::to_string).collect();
        writeln!(out, "    {} {}", style("Open:").bold(), style(ports.join(", ")).green())?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_risk<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let risk = &report.risk;
    let level_style = match risk.level {
        RiskLevel::Low => Style::new().green().bold(),
        RiskLevel::Medium => Style::new().yellow().bold(),
        RiskLevel::High => Style::new().red().bold(),
    };
    section(out, "Risk")?;
    writeln!(
        out,
        "    Score {} / 100, level {}",
        level_style.apply_to(risk.score),
        level_style.apply_to(risk.level.to_string().to_uppercase())
    )?;
    for reason in &risk.reasons {
        writeln!(out, "    {} {}", style("•").dim(), reason)?;
    }
    writeln!(
        out,
        "    {}",
        style(format!(
            "{} assets, {} relationships, {} findings in graph",
            report.graph.assets.len(),
            report.graph.relationships.len(),
            report.graph.findings.len()
        ))
        .dim()
    )?;
    writeln!(out)?;
    Ok(())
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}
