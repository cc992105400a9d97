//! Built-in trust evaluators.

use std::sync::{Arc, OnceLock};

use log::debug;
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::RootCertStore;

use super::{crypto_provider, TrustEvaluator};

/// Accepts every certificate chain for every host.
///
/// Meant for development against self-signed servers; never ship it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllEvaluator;

impl TrustEvaluator for AcceptAllEvaluator {
    fn evaluate(&self, _chain: &[CertificateDer<'_>], _hostname: &str) -> bool {
        true
    }
}

/// Standard web PKI validation: the chain must lead to a trusted root, be
/// currently valid, and name `hostname`.
pub struct StandardEvaluator {
    roots: Arc<RootCertStore>,
    verifier: OnceLock<Option<Arc<WebPkiServerVerifier>>>,
}

impl StandardEvaluator {
    /// Validates against the Mozilla root program bundled by `webpki-roots`.
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots)
    }

    /// Validates against a caller-supplied root store.
    pub fn with_roots(roots: RootCertStore) -> Self {
        Self {
            roots: Arc::new(roots),
            verifier: OnceLock::new(),
        }
    }

    // Built on first use; a store without anchors cannot build and rejects everything.
    fn verifier(&self) -> Option<&Arc<WebPkiServerVerifier>> {
        self.verifier
            .get_or_init(|| {
                match WebPkiServerVerifier::builder_with_provider(
                    Arc::clone(&self.roots),
                    crypto_provider(),
                )
                .build()
                {
                    Ok(verifier) => Some(verifier),
                    Err(e) => {
                        log::error!("Failed to build web PKI verifier: {e}");
                        None
                    }
                }
            })
            .as_ref()
    }
}

impl Default for StandardEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StandardEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardEvaluator")
            .field("roots", &self.roots.len())
            .finish()
    }
}

impl TrustEvaluator for StandardEvaluator {
    fn evaluate(&self, chain: &[CertificateDer<'_>], hostname: &str) -> bool {
        let Some((end_entity, intermediates)) = chain.split_first() else {
            debug!("Empty certificate chain presented for {hostname}");
            return false;
        };
        let Ok(server_name) = ServerName::try_from(hostname.to_string()) else {
            debug!("Cannot validate certificate for invalid server name '{hostname}'");
            return false;
        };
        let Some(verifier) = self.verifier() else {
            return false;
        };

        match verifier.verify_server_cert(
            end_entity,
            intermediates,
            &server_name,
            &[],
            UnixTime::now(),
        ) {
            Ok(_) => true,
            Err(e) => {
                debug!("Certificate validation failed for {hostname}: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garbage_chain() -> Vec<CertificateDer<'static>> {
        vec![CertificateDer::from(b"not a certificate".to_vec())]
    }

    #[test]
    fn test_accept_all() {
        assert!(AcceptAllEvaluator.evaluate(&garbage_chain(), "example.com"));
        assert!(AcceptAllEvaluator.evaluate(&[], ""));
    }

    #[test]
    fn test_standard_rejects_empty_chain() {
        assert!(!StandardEvaluator::new().evaluate(&[], "example.com"));
    }

    #[test]
    fn test_standard_rejects_malformed_certificate() {
        assert!(!StandardEvaluator::new().evaluate(&garbage_chain(), "example.com"));
    }

    #[test]
    fn test_standard_rejects_invalid_hostname() {
        assert!(!StandardEvaluator::new().evaluate(&garbage_chain(), "not a host name!"));
    }

    #[test]
    fn test_standard_without_roots_rejects_everything() {
        let evaluator = StandardEvaluator::with_roots(RootCertStore::empty());
        assert!(!evaluator.evaluate(&garbage_chain(), "example.com"));
    }

    #[test]
    fn test_standard_bundles_roots() {
        let evaluator = StandardEvaluator::new();
        assert!(!evaluator.roots.is_empty());
    }
}
