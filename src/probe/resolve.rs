//! DNS resolution for probes.
//!
//! Addresses come back IPv6 first, then IPv4, each family in resolver order.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::trace;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Async resolver shared by the TLS probe and subdomain confirmation.
#[derive(Clone)]
pub struct AddressResolver {
    inner: TokioAsyncResolver,
}

impl AddressResolver {
    /// Create a resolver with the default upstream configuration.
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;
        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }

    /// Resolve `host` to socket addresses on `port`, IPv6 first.
    ///
    /// Resolution failures yield an empty list.
    pub async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![SocketAddr::new(ip, port)];
        }

        match self.inner.lookup_ip(host).await {
            Ok(lookup) => order_v6_first(lookup.iter().collect())
                .into_iter()
                .map(|ip| SocketAddr::new(ip, port))
                .collect(),
            Err(e) => {
                trace!(host, error = %e, "resolution failed");
                Vec::new()
            }
        }
    }

    /// Whether `host` has at least one address record.
    pub async fn exists(&self, host: &str) -> bool {
        self.inner
            .lookup_ip(host)
            .await
            .map(|lookup| lookup.iter().next().is_some())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressResolver").finish_non_exhaustive()
    }
}

/// Stable reorder putting IPv6 addresses before IPv4 ones.
pub fn order_v6_first(mut ips: Vec<IpAddr>) -> Vec<IpAddr> {
    ips.sort_by_key(|ip| ip.is_ipv4());
    ips
}

/// Address family label used in probe notes.
pub fn family(addr: &SocketAddr) -> &'static str {
    if addr.is_ipv6() {
        "ipv6"
    } else {
        "ipv4"
    }
}
