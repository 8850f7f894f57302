//! Configuration management for perimeter.
//!
//! Provides XDG-compliant settings storage, environment overrides, and the
//! conversion into the immutable [`ScanConfig`](crate::orchestrator::ScanConfig)
//! a scan runs with.

mod settings;

pub use settings::{
    AppSettings, Paths, ENV_ENABLE_NMAP, ENV_MAX_WORKERS, ENV_NMAP_PATH, ENV_NMAP_TIMEOUT,
    ENV_SCAN_DEADLINE,
};
