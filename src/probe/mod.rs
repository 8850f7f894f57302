//! Probe module - independent measurements of a domain's exposed surface.
//!
//! Every probe is a total function: whatever happens on the network, it
//! returns its own structured result and never an error. The orchestrator
//! runs probes concurrently through the [`Probe`] trait.

pub mod pacer;
pub mod port;
pub mod resolve;
pub mod tls;
pub mod transport;

use crate::types::Domain;
use async_trait::async_trait;
use serde::Serialize;

pub use pacer::AttemptPacer;
pub use port::{probe_port, AttemptCounts, PortProbe, PortProbeResult, PortProbeSettings, PortStatus};
pub use resolve::AddressResolver;
pub use tls::{probe_tls, TlsProbe, TlsProbeResult, TlsProbeSettings, TlsStatus};
pub use transport::{Handshake, RustlsTransport, TlsTransport, TrustMode};

/// A single independent measurement against a domain.
///
/// Implementations own their settings; nothing is shared between probes
/// except immutable configuration.
///
/// # Example
///
/// ```ignore
/// use perimeter::probe::{PortProbe, PortProbeSettings, Probe};
/// use perimeter::types::{Domain, Port};
///
/// async fn http_status(domain: &Domain) -> String {
///     let probe = PortProbe::new(Port::HTTP, PortProbeSettings::default());
///     probe.probe(domain).await.status.to_string()
/// }
/// ```
#[async_trait]
pub trait Probe: Send + Sync {
    /// What the probe produces.
    type Output: Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run the probe. Must not panic on network conditions.
    async fn probe(&self, domain: &Domain) -> Self::Output;
}

/// Result kind returned by collaborators.
///
/// `Degraded` carries a usable value that is known to be incomplete, for
/// example an empty service list after a malformed tool response.
/// `Unavailable` means nothing could be measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok { value: T },
    Degraded { value: T, reason: String },
    Unavailable { reason: String },
}

impl<T> Outcome<T> {
    /// A complete result.
    pub fn ok(value: T) -> Self {
        Self::Ok { value }
    }

    /// A partial result with the reason it is partial.
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    /// No result at all.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// The carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok { value } | Self::Degraded { value, .. } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Why the result is degraded or unavailable.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Degraded { reason, .. } | Self::Unavailable { reason } => Some(reason),
        }
    }

    /// Check if the result is complete.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Transform the carried value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Ok { value } => Outcome::Ok { value: f(value) },
            Self::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
            Self::Unavailable { reason } => Outcome::Unavailable { reason },
        }
    }
}
