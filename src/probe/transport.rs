//! TLS handshake transport.
//!
//! Two trust contexts are built once per probe:
//!
//! - **strict**: hostname verification and chain validation against the
//!   system trust store, ALPN `h2` / `http/1.1` offered
//! - **relaxed**: any certificate accepted; handshake signatures are still
//!   checked so a completed handshake proves a real TLS endpoint
//!
//! The relaxed context also exists in a no-SNI variant for servers that
//! reject unknown names.

use crate::error::{AttemptResult, ProbeError};
use crate::probe::resolve::AddressResolver;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Which trust context a handshake runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustMode {
    Strict,
    Relaxed,
}

/// What a completed handshake yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// DER of the leaf certificate, when the server sent one.
    pub peer_certificate: Option<Vec<u8>>,
    /// Negotiated application protocol.
    pub alpn: Option<String>,
}

/// Network side of the TLS probe.
///
/// Split out so the escalation logic can be exercised without a network.
#[async_trait]
pub trait TlsTransport: Send + Sync {
    /// Resolve `host` to candidate addresses, IPv6 first.
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr>;

    /// Run one handshake. `server_name` of `None` sends no SNI.
    async fn handshake(
        &self,
        addr: SocketAddr,
        server_name: Option<&str>,
        mode: TrustMode,
    ) -> AttemptResult<Handshake>;
}

/// Production transport built on rustls.
pub struct RustlsTransport {
    strict: TlsConnector,
    relaxed: TlsConnector,
    relaxed_no_sni: TlsConnector,
    resolver: AddressResolver,
    timeout: Duration,
}

impl RustlsTransport {
    /// Build both trust contexts. `timeout` bounds connect and handshake
    /// separately.
    pub fn new(timeout: Duration) -> AttemptResult<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut strict = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::TlsNegotiation(e.to_string()))?
            .with_root_certificates(system_roots())
            .with_no_client_auth();
        strict.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        let relaxed = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::TlsNegotiation(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth();

        let mut relaxed_no_sni = relaxed.clone();
        relaxed_no_sni.enable_sni = false;

        Ok(Self {
            strict: TlsConnector::from(Arc::new(strict)),
            relaxed: TlsConnector::from(Arc::new(relaxed)),
            relaxed_no_sni: TlsConnector::from(Arc::new(relaxed_no_sni)),
            resolver: AddressResolver::new(timeout),
            timeout,
        })
    }

    fn connector(&self, mode: TrustMode, sni: bool) -> &TlsConnector {
        match (mode, sni) {
            (TrustMode::Strict, _) => &self.strict,
            (TrustMode::Relaxed, true) => &self.relaxed,
            (TrustMode::Relaxed, false) => &self.relaxed_no_sni,
        }
    }
}

#[async_trait]
impl TlsTransport for RustlsTransport {
    async fn resolve(&self, host: &str, port: u16) -> Vec<SocketAddr> {
        self.resolver.resolve(host, port).await
    }

    async fn handshake(
        &self,
        addr: SocketAddr,
        server_name: Option<&str>,
        mode: TrustMode,
    ) -> AttemptResult<Handshake> {
        let name = match server_name {
            Some(host) => ServerName::try_from(host.to_string())
                .map_err(|e| ProbeError::TlsNegotiation(e.to_string()))?,
            None => ServerName::IpAddress(addr.ip().into()),
        };

        let stream = timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProbeError::NetworkTimeout)?
            .map_err(|e| ProbeError::from_connect(&e))?;

        let tls = timeout(
            self.timeout,
            self.connector(mode, server_name.is_some()).connect(name, stream),
        )
        .await
        .map_err(|_| ProbeError::NetworkTimeout)?
        .map_err(|e| ProbeError::TlsNegotiation(e.to_string()))?;

        let (_, conn) = tls.get_ref();
        Ok(Handshake {
            peer_certificate: conn
                .peer_certificates()
                .and_then(|chain| chain.first())
                .map(|leaf| leaf.as_ref().to_vec()),
            alpn: conn
                .alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
        })
    }
}

/// Load the operating system trust store.
///
/// Falls back to the bundled Mozilla roots when the platform store is
/// empty or unreadable.
fn system_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        debug!(error = %err, "skipping unreadable system certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "loaded system trust store");

    if roots.is_empty() {
        warn!("system trust store is empty, using bundled roots");
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    roots
}

/// Certificate verifier for the relaxed context.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
