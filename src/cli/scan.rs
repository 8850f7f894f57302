//! Scan subcommand implementation.
//!
//! Handles the `perimeter scan <domain>` command.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::{CliResult, ConfigError};
use crate::orchestrator::Orchestrator;
use crate::output;
use crate::types::Port;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Assess the external attack surface of a domain.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Domain to assess (e.g. example.com)
    #[arg(value_name = "DOMAIN")]
    pub domain: String,

    /// Output format for results [default: from settings, else plain]
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Emit only the asset graph (JSON output)
    #[arg(long)]
    pub graph_only: bool,

    /// Write the report to a file instead of stdout
    #[arg(long = "out", value_name = "FILE")]
    pub out_file: Option<PathBuf>,

    /// Maximum number of probes running at once (1-32)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Connection attempts per port
    #[arg(long)]
    pub port_attempts: Option<u32>,

    /// TLS handshake attempts
    #[arg(long)]
    pub tls_attempts: Option<u32>,

    /// Per-attempt timeout in milliseconds for port and TLS probes
    #[arg(short = 't', long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Attempt rate limit per second across probes (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Abandon unfinished probes after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Skip the nmap service fingerprint
    #[arg(long)]
    pub no_services: bool,

    /// Skip header and technology collection
    #[arg(long = "passive-off", alias = "no-passive")]
    pub no_passive: bool,

    /// Skip certificate-transparency subdomain discovery
    #[arg(long)]
    pub no_subdomains: bool,

    /// Run an nmap SYN scan (requires root or CAP_NET_RAW)
    #[arg(long)]
    pub syn: bool,

    /// Ports for the SYN scan, comma-separated (implies --syn)
    #[arg(long, value_name = "PORTS", value_delimiter = ',')]
    pub syn_ports: Option<Vec<Port>>,
}

impl ScanCommand {
    /// Layer command-line overrides on top of loaded settings.
    pub fn apply(&self, settings: &mut AppSettings) {
        if let Some(workers) = self.workers {
            settings.max_workers = workers;
        }
        if let Some(attempts) = self.port_attempts {
            settings.port_attempts = attempts;
        }
        if let Some(attempts) = self.tls_attempts {
            settings.tls_attempts = attempts;
        }
        if let Some(timeout) = self.timeout {
            settings.port_timeout_ms = timeout;
            settings.tls_timeout_ms = timeout;
        }
        if let Some(rate) = self.rate_limit {
            settings.attempt_rate = rate;
        }
        if let Some(deadline) = self.deadline {
            settings.scan_deadline_secs = (deadline > 0).then_some(deadline);
        }
        if self.no_services {
            settings.enable_nmap = false;
        }
        if self.no_passive {
            settings.enable_passive = false;
        }
        if self.no_subdomains {
            settings.enable_subdomains = false;
        }
        if self.syn {
            settings.enable_syn_scan = true;
        }
        if let Some(ports) = &self.syn_ports {
            settings.enable_syn_scan = true;
            settings.syn_ports = ports.clone();
        }
    }

    /// Resolve the output format: flag first, then the settings file.
    pub fn format(&self, settings: &AppSettings) -> CliResult<OutputFormat> {
        if let Some(format) = self.output {
            return Ok(format);
        }
        OutputFormat::from_setting(&settings.default_output_format).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "default_output_format".to_string(),
                value: settings.default_output_format.clone(),
            }
            .into()
        })
    }

    /// Execute the scan command.
    pub async fn execute(&self, mut settings: AppSettings, quiet: bool) -> CliResult<()> {
        self.apply(&mut settings);
        let format = self.format(&settings)?;
        if !quiet && self.graph_only && format != OutputFormat::Json {
            output::print_warning(&format!("--graph-only has no effect on {format} output"));
        }
        let orchestrator = Orchestrator::new(settings.to_scan_config()?)?;

        let show_progress = !quiet && format == OutputFormat::Plain && self.out_file.is_none();
        let spinner = show_progress.then(|| spinner(&self.domain));

        let result = orchestrator.scan(&self.domain).await;
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }
        let report = result?;

        match &self.out_file {
            Some(path) => {
                console::set_colors_enabled(false);
                let mut out = BufWriter::new(File::create(path)?);
                output::write_report(&mut out, &report, format, self.graph_only)?;
                out.flush()?;
                if !quiet {
                    output::print_success(&format!("Report written to {}", path.display()));
                }
            }
            None => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                output::write_report(&mut out, &report, format, self.graph_only)?;
            }
        }

        Ok(())
    }
}

fn spinner(domain: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Scanning {domain}..."));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
