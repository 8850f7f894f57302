//! # Perimeter - Confidence-Scored Attack-Surface Reconnaissance
//!
//! Perimeter assesses the external attack surface of a single domain. Every
//! network observation is repeated and reported with a confidence tier, so
//! one dropped packet never flips a verdict.
//!
//! ## Features
//!
//! - **Port probes**: repeated TCP connects to ports 80 and 443, classified by majority
//! - **TLS probe**: strict, relaxed and no-SNI handshake phases with certificate expiry
//! - **Collaborators**: security headers, technology and CDN hints, crt.sh subdomains, nmap fingerprints, opt-in nmap SYN scan
//! - **Risk aggregation**: a configurable weight table producing a 0-100 score and level
//! - **Asset graph**: normalized assets, relationships and findings
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use perimeter::config::AppSettings;
//! use perimeter::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppSettings::default().to_scan_config()?;
//!     let report = Orchestrator::new(config)?.scan("example.com").await?;
//!
//!     println!("{} scored {} ({})", report.domain, report.risk.score, report.risk.level);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Validated domain, port and confidence types
//! - [`probe`] - The `Probe` trait, port and TLS probes, attempt pacing
//! - [`collab`] - HTTP, certificate-transparency and nmap collaborators
//! - [`risk`] - Weight table and score aggregation
//! - [`graph`] - Asset graph normalization
//! - [`orchestrator`] - Concurrent fan-out and join barrier for one scan
//! - [`report`] - The serializable scan report
//! - [`config`] - Settings file, environment overrides
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod cli;
pub mod collab;
pub mod config;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod output;
pub mod probe;
pub mod report;
pub mod risk;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ConfigError, DomainError, ProbeError, ScanError};
pub use orchestrator::{Orchestrator, ScanConfig};
pub use probe::{Outcome, Probe};
pub use report::{ScanId, ScanReport};
pub use risk::{RiskAssessment, RiskLevel, RiskPolicy};
pub use types::{Confidence, Domain, Port};
