//! Server trust challenge interception for rustls.
//!
//! The session's HTTP client is built with [`TrustVerifier`] as its certificate
//! verifier. Every server-trust challenge is handed to the session's current
//! [`TrustEvaluator`](super::TrustEvaluator); a rejection fails the handshake
//! with `CertificateError::ApplicationVerificationFailure`, which the error
//! classifier reports as a non-retryable `TlsTrustRejected` transport error.

use std::sync::Arc;

use log::{trace, warn};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};

use super::extract::summarize_certificate;
use super::{crypto_provider, SessionTrust};

pub(crate) struct TrustVerifier {
    trust: SessionTrust,
    provider: Arc<CryptoProvider>,
}

impl TrustVerifier {
    pub(crate) fn new(trust: SessionTrust, provider: Arc<CryptoProvider>) -> Self {
        Self { trust, provider }
    }
}

impl std::fmt::Debug for TrustVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustVerifier")
            .field("trust", &self.trust)
            .finish_non_exhaustive()
    }
}

impl ServerCertVerifier for TrustVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let hostname = server_name.to_str();
        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        if self.trust.evaluate(&chain, &hostname) {
            trace!("Server trust accepted for {hostname}");
            return Ok(ServerCertVerified::assertion());
        }

        match summarize_certificate(end_entity.as_ref()) {
            Some(summary) => warn!("Server trust rejected for {hostname}: {summary}"),
            None => warn!("Server trust rejected for {hostname}"),
        }
        Err(rustls::Error::InvalidCertificate(
            CertificateError::ApplicationVerificationFailure,
        ))
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

/// Builds the rustls client configuration used by a session's HTTP client.
///
/// # Errors
///
/// Returns a `rustls::Error` if the crypto provider supports none of the
/// default protocol versions.
pub(crate) fn build_tls_config(trust: SessionTrust) -> Result<ClientConfig, rustls::Error> {
    let provider = crypto_provider();
    let verifier = Arc::new(TrustVerifier::new(trust, Arc::clone(&provider)));
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}
