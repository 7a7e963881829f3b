//! Direct TLS handshake inspection
//!
//! Used when no grading service answers. The handshake is first attempted
//! against the bundled web PKI roots; if the certificate is rejected, it is
//! repeated without verification so the certificate can still be described.

use crate::intelligence::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::public_key::PublicKey;

/// What a handshake revealed about the leaf certificate
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInfo {
    /// Chain verified against the web PKI roots for this host name
    pub verified: bool,
    pub verification_error: Option<String>,
    pub subject: Option<String>,
    pub issuer: Option<String>,
    pub not_after: DateTime<Utc>,
    pub key_algorithm: Option<String>,
    pub key_size: Option<u32>,
    pub protocol: Option<String>,
}

/// Performs a TLS handshake and reports the peer certificate
#[async_trait]
pub trait TlsProbe: Send + Sync {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<CertificateInfo, ProviderError>;
}

/// [`TlsProbe`] backed by rustls and the Mozilla root program
#[derive(Debug, Clone, Default)]
pub struct RustlsProbe;

impl RustlsProbe {
    pub fn new() -> Self {
        Self
    }

    fn verifying_config(provider: Arc<CryptoProvider>) -> Result<ClientConfig, rustls::Error> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Ok(ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth())
    }

    fn inspecting_config(provider: Arc<CryptoProvider>) -> Result<ClientConfig, rustls::Error> {
        Ok(ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth())
    }

    async fn handshake(
        config: ClientConfig,
        host: &str,
        port: u16,
    ) -> Result<(Vec<u8>, Option<String>), std::io::Error> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let tcp = TcpStream::connect((host, port)).await?;
        let stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await?;

        let (_, connection) = stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|cert| cert.as_ref().to_vec())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "no peer certificate")
            })?;
        let protocol = connection.protocol_version().map(describe_protocol);
        Ok((leaf, protocol))
    }
}

#[async_trait]
impl TlsProbe for RustlsProbe {
    async fn probe(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<CertificateInfo, ProviderError> {
        let tls_error = |message: String| ProviderError::Tls {
            host: host.to_string(),
            message,
        };
        let provider = Arc::new(crypto::ring::default_provider());

        let verifying = Self::verifying_config(provider.clone()).map_err(|e| tls_error(e.to_string()))?;
        let first = tokio::time::timeout(timeout, Self::handshake(verifying, host, port))
            .await
            .map_err(|_| tls_error("handshake timed out".to_string()))?;

        let (der, protocol, verification_error) = match first {
            Ok((der, protocol)) => (der, protocol, None),
            Err(e) => {
                let Some(reason) = certificate_rejection(&e) else {
                    return Err(tls_error(e.to_string()));
                };
                tracing::debug!("Certificate for {} rejected: {}", host, reason);

                let inspecting =
                    Self::inspecting_config(provider).map_err(|e| tls_error(e.to_string()))?;
                let (der, protocol) =
                    tokio::time::timeout(timeout, Self::handshake(inspecting, host, port))
                        .await
                        .map_err(|_| tls_error("handshake timed out".to_string()))?
                        .map_err(|e| tls_error(e.to_string()))?;
                (der, protocol, Some(reason))
            }
        };

        let mut info = parse_certificate(&der).map_err(tls_error)?;
        info.verified = verification_error.is_none();
        info.verification_error = verification_error;
        info.protocol = protocol;
        Ok(info)
    }
}

/// Extracts the rustls certificate error wrapped in a handshake failure
fn certificate_rejection(error: &std::io::Error) -> Option<String> {
    match error.get_ref()?.downcast_ref::<rustls::Error>()? {
        rustls::Error::InvalidCertificate(reason) => Some(format!("{:?}", reason)),
        _ => None,
    }
}

fn describe_protocol(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{:?}", other),
    }
}

/// Reads the leaf certificate fields used for scoring
pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;

    let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| "certificate expiry out of range".to_string())?;

    let spki = cert.public_key();
    let (key_algorithm, key_size) = match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => (Some("RSA".to_string()), Some(rsa.key_size() as u32)),
        Ok(PublicKey::EC(point)) => (Some("EC".to_string()), Some(point.key_size() as u32)),
        _ => (Some(spki.algorithm.algorithm.to_id_string()), None),
    };

    Ok(CertificateInfo {
        verified: false,
        verification_error: None,
        subject: Some(cert.subject().to_string()).filter(|s| !s.is_empty()),
        issuer: Some(cert.issuer().to_string()).filter(|s| !s.is_empty()),
        not_after,
        key_algorithm,
        key_size,
        protocol: None,
    })
}

/// Accepts every certificate; only used to read certificates that failed verification
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

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
        crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
