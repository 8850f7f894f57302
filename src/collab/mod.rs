//! Collaborators - optional measurements that depend on outside services.
//!
//! Unlike the core probes, collaborators talk to third parties (the target's
//! web server, a Certificate Transparency log, an external nmap binary) and
//! report through [`Outcome`](crate::probe::Outcome) so a degraded or
//! missing answer is explicit.

pub mod fingerprint;
pub mod headers;
pub mod http;
pub mod nmap_xml;
pub mod subdomains;
pub mod syn_scan;
pub mod technology;
mod tool;

pub use fingerprint::{FingerprintSettings, ServiceFingerprint, ServiceRecord};
pub use headers::{HeaderDetail, HeaderGrade, HeaderProbe, HeaderSummary};
pub use http::{build_client, DEFAULT_USER_AGENT};
pub use subdomains::{SubdomainProbe, SubdomainReport, SubdomainSettings, DEFAULT_CT_ENDPOINT};
pub use syn_scan::{SynScan, SynScanReport, SynScanSettings};
pub use technology::{CdnInference, TechnologyObservation, TechnologyProbe};
