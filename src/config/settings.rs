//! Application settings and paths.
//!
//! Settings live in a JSON file in the XDG config directory. Missing keys
//! take their defaults, and a handful of `PERIMETER_*` environment variables
//! override the file.

use crate::collab::{
    FingerprintSettings, SubdomainSettings, SynScanSettings, DEFAULT_CT_ENDPOINT,
    DEFAULT_USER_AGENT,
};
use crate::error::{ConfigError, ConfigResult};
use crate::orchestrator::{ScanConfig, WORKER_RANGE};
use crate::probe::{PortProbeSettings, TlsProbeSettings};
use crate::risk::RiskPolicy;
use crate::types::Port;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Global paths singleton.
static PATHS: OnceLock<Paths> = OnceLock::new();

pub const ENV_MAX_WORKERS: &str = "PERIMETER_MAX_WORKERS";
pub const ENV_ENABLE_NMAP: &str = "PERIMETER_ENABLE_NMAP";
pub const ENV_NMAP_TIMEOUT: &str = "PERIMETER_NMAP_TIMEOUT";
pub const ENV_NMAP_PATH: &str = "PERIMETER_NMAP_PATH";
pub const ENV_SCAN_DEADLINE: &str = "PERIMETER_SCAN_DEADLINE";
pub const ENV_ENABLE_SYN_SCAN: &str = "PERIMETER_ENABLE_SYN_SCAN";
pub const ENV_SYN_PORTS: &str = "PERIMETER_SYN_PORTS";

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/perimeter)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Get the global paths instance.
    pub fn get() -> ConfigResult<&'static Paths> {
        if let Some(paths) = PATHS.get() {
            return Ok(paths);
        }
        let paths = Self::discover()?;
        Ok(PATHS.get_or_init(|| paths))
    }

    fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "perimeter", "perimeter")
            .ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Probe tasks allowed to run at once (1-32).
    pub max_workers: usize,
    pub port_attempts: u32,
    pub port_timeout_ms: u64,
    /// Base pause between port attempts.
    pub attempt_spacing_ms: u64,
    pub tls_attempts: u32,
    pub tls_timeout_ms: u64,
    /// Connection attempts per second, 0 for unlimited.
    pub attempt_rate: u32,
    pub enable_nmap: bool,
    pub nmap_path: PathBuf,
    pub nmap_timeout_secs: u64,
    /// SYN scan through nmap; needs raw-socket privileges.
    pub enable_syn_scan: bool,
    pub syn_ports: Vec<Port>,
    /// Header hygiene and technology fingerprinting.
    pub enable_passive: bool,
    pub enable_subdomains: bool,
    pub ct_endpoint: String,
    pub max_subdomain_candidates: usize,
    pub dns_concurrency: usize,
    pub dns_timeout_ms: u64,
    pub http_timeout_ms: u64,
    pub user_agent: String,
    /// Whole-scan deadline in seconds; absent or 0 means none.
    pub scan_deadline_secs: Option<u64>,
    /// Default output format.
    pub default_output_format: String,
    pub risk: RiskPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_workers: 6,
            port_attempts: 3,
            port_timeout_ms: 3000,
            attempt_spacing_ms: 100,
            tls_attempts: 5,
            tls_timeout_ms: 5000,
            attempt_rate: 0,
            enable_nmap: true,
            nmap_path: PathBuf::from("nmap"),
            nmap_timeout_secs: 120,
            enable_syn_scan: false,
            syn_ports: vec![Port::HTTP, Port::HTTPS],
            enable_passive: true,
            enable_subdomains: true,
            ct_endpoint: DEFAULT_CT_ENDPOINT.to_string(),
            max_subdomain_candidates: 100,
            dns_concurrency: 10,
            dns_timeout_ms: 3000,
            http_timeout_ms: 6000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scan_deadline_secs: None,
            default_output_format: "plain".to_string(),
            risk: RiskPolicy::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, then apply environment
    /// overrides.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::get()?.settings_file();
        let mut settings = if file.exists() {
            Self::load_from(&file)?
        } else {
            Self::default()
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Load settings from `path` if given, otherwise from the default location.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let mut settings = Self::load_from(path)?;
                settings.apply_env(|key| std::env::var(key).ok())?;
                Ok(settings)
            }
            None => Self::load(),
        }
    }

    /// Load settings from a specific file, without environment overrides.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded settings");
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let file = Paths::get()?.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to `path`, creating its parent directory.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `PERIMETER_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MAX_WORKERS) {
            self.max_workers = parse_env(ENV_MAX_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_ENABLE_NMAP) {
            self.enable_nmap = parse_flag(ENV_ENABLE_NMAP, &v)?;
        }
        if let Some(v) = lookup(ENV_NMAP_TIMEOUT) {
            self.nmap_timeout_secs = parse_env(ENV_NMAP_TIMEOUT, &v)?;
        }
        if let Some(v) = lookup(ENV_NMAP_PATH) {
            if !v.trim().is_empty() {
                self.nmap_path = PathBuf::from(v.trim());
            }
        }
        if let Some(v) = lookup(ENV_SCAN_DEADLINE) {
            let secs: u64 = parse_env(ENV_SCAN_DEADLINE, &v)?;
            self.scan_deadline_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup(ENV_ENABLE_SYN_SCAN) {
            self.enable_syn_scan = parse_flag(ENV_ENABLE_SYN_SCAN, &v)?;
        }
        if let Some(v) = lookup(ENV_SYN_PORTS) {
            self.syn_ports = parse_ports(ENV_SYN_PORTS, &v)?;
        }
        Ok(())
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = WORKER_RANGE;
        if !(min..=max).contains(&self.max_workers) {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                value: self.max_workers.to_string(),
            });
        }
        for (key, value) in [
            ("port_attempts", self.port_attempts),
            ("tls_attempts", self.tls_attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.enable_syn_scan && self.syn_ports.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "syn_ports".to_string(),
                value: "[]".to_string(),
            });
        }
        self.risk.validate()
    }

    /// Freeze these settings into the configuration of a scan.
    pub fn to_scan_config(&self) -> ConfigResult<ScanConfig> {
        self.validate()?;
        Ok(ScanConfig {
            max_workers: self.max_workers,
            port: PortProbeSettings {
                attempts: self.port_attempts,
                timeout: Duration::from_millis(self.port_timeout_ms),
                spacing: Duration::from_millis(self.attempt_spacing_ms),
            },
            tls: TlsProbeSettings {
                attempts: self.tls_attempts,
                timeout: Duration::from_millis(self.tls_timeout_ms),
                ..TlsProbeSettings::default()
            },
            attempt_rate: self.attempt_rate,
            services: self.enable_nmap.then(|| FingerprintSettings {
                program: self.nmap_path.clone(),
                timeout: Duration::from_secs(self.nmap_timeout_secs),
            }),
            syn_scan: self.enable_syn_scan.then(|| SynScanSettings {
                program: self.nmap_path.clone(),
                ports: self.syn_ports.clone(),
                timeout: Duration::from_secs(self.nmap_timeout_secs),
            }),
            passive: self.enable_passive,
            subdomains: self.enable_subdomains.then(|| SubdomainSettings {
                endpoint: self.ct_endpoint.clone(),
                dns_timeout: Duration::from_millis(self.dns_timeout_ms),
                concurrency: self.dns_concurrency,
                max_candidates: self.max_subdomain_candidates,
            }),
            user_agent: self.user_agent.clone(),
            http_timeout: Duration::from_millis(self.http_timeout_ms),
            scan_deadline: self
                .scan_deadline_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            risk: self.risk.clone(),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse a comma-separated port list such as `80,443,8443`.
fn parse_ports(key: &str, value: &str) -> ConfigResult<Vec<Port>> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.parse::<Port>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: e.to_string(),
            })
        })
        .collect()
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
