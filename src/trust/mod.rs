//! TLS server trust evaluation.
//!
//! A [`TrustEvaluator`] decides whether the certificate chain a server presents
//! is acceptable for the hostname being contacted. Sessions carry a
//! [`TrustPolicy`]: either their own evaluator or the process-wide default.
//! The policy is resolved on every handshake, so replacing the process default
//! (or a session's evaluator) takes effect for the next connection without
//! rebuilding anything.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use avenue::trust::{set_default_evaluator, AcceptAllEvaluator};
//!
//! // Development builds talking to a self-signed staging server.
//! set_default_evaluator(Arc::new(AcceptAllEvaluator));
//! ```

mod evaluators;
mod extract;
mod verifier;

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;

pub use evaluators::{AcceptAllEvaluator, StandardEvaluator};
pub(crate) use verifier::build_tls_config;

/// Policy deciding whether a server certificate chain is trusted for a host.
///
/// `chain` holds the end-entity certificate first, followed by any
/// intermediates the server sent. Implementations must be pure: the same
/// inputs give the same answer and nothing else is observable.
pub trait TrustEvaluator: Send + Sync {
    fn evaluate(&self, chain: &[CertificateDer<'_>], hostname: &str) -> bool;
}

impl<F> TrustEvaluator for F
where
    F: Fn(&[CertificateDer<'_>], &str) -> bool + Send + Sync,
{
    fn evaluate(&self, chain: &[CertificateDer<'_>], hostname: &str) -> bool {
        self(chain, hostname)
    }
}

/// Which evaluator a session consults.
#[derive(Clone, Default)]
pub enum TrustPolicy {
    /// Use whatever [`default_evaluator`] returns at handshake time.
    #[default]
    ProcessDefault,
    /// Use this evaluator regardless of the process default.
    Evaluator(Arc<dyn TrustEvaluator>),
}

impl TrustPolicy {
    /// Standard chain and hostname validation against the bundled web PKI roots.
    pub fn standard() -> Self {
        TrustPolicy::Evaluator(Arc::new(StandardEvaluator::new()))
    }

    /// Accept every certificate. Development only.
    pub fn accept_all() -> Self {
        TrustPolicy::Evaluator(Arc::new(AcceptAllEvaluator))
    }

    pub fn custom(evaluator: impl TrustEvaluator + 'static) -> Self {
        TrustPolicy::Evaluator(Arc::new(evaluator))
    }
}

impl std::fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustPolicy::ProcessDefault => f.write_str("ProcessDefault"),
            TrustPolicy::Evaluator(_) => f.write_str("Evaluator(..)"),
        }
    }
}

static DEFAULT_EVALUATOR: LazyLock<RwLock<Arc<dyn TrustEvaluator>>> =
    LazyLock::new(|| RwLock::new(Arc::new(StandardEvaluator::new())));

/// Returns the process-wide default evaluator.
///
/// Starts out as [`StandardEvaluator`].
pub fn default_evaluator() -> Arc<dyn TrustEvaluator> {
    DEFAULT_EVALUATOR
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the process-wide default evaluator.
///
/// Sessions using [`TrustPolicy::ProcessDefault`] pick the new evaluator up on
/// their next TLS handshake.
pub fn set_default_evaluator(evaluator: Arc<dyn TrustEvaluator>) {
    *DEFAULT_EVALUATOR
        .write()
        .unwrap_or_else(PoisonError::into_inner) = evaluator;
}

/// Crypto provider used for TLS configuration and signature checks.
///
/// Prefers a process-installed provider and falls back to `ring`.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()))
}

/// A session's trust policy, shared with the TLS verifier of its client.
#[derive(Clone)]
pub(crate) struct SessionTrust {
    policy: Arc<RwLock<TrustPolicy>>,
}

impl SessionTrust {
    pub(crate) fn new(policy: TrustPolicy) -> Self {
        Self {
            policy: Arc::new(RwLock::new(policy)),
        }
    }

    pub(crate) fn set(&self, policy: TrustPolicy) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    pub(crate) fn policy(&self) -> TrustPolicy {
        self.policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves the evaluator to consult right now.
    pub(crate) fn resolve(&self) -> Arc<dyn TrustEvaluator> {
        match self.policy() {
            TrustPolicy::ProcessDefault => default_evaluator(),
            TrustPolicy::Evaluator(evaluator) => evaluator,
        }
    }

    pub(crate) fn evaluate(&self, chain: &[CertificateDer<'_>], hostname: &str) -> bool {
        self.resolve().evaluate(chain, hostname)
    }
}

impl std::fmt::Debug for SessionTrust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTrust")
            .field("policy", &self.policy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn leaf() -> Vec<CertificateDer<'static>> {
        vec![CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x01])]
    }

    #[test]
    fn test_closure_evaluator_receives_hostname() {
        let evaluator = |_: &[CertificateDer<'_>], host: &str| host == "api.example.com";
        assert!(evaluator.evaluate(&leaf(), "api.example.com"));
        assert!(!evaluator.evaluate(&leaf(), "evil.example.net"));
    }

    #[test]
    fn test_session_evaluator_overrides_process_default() {
        let trust = SessionTrust::new(TrustPolicy::custom(
            |_: &[CertificateDer<'_>], _: &str| false,
        ));
        assert!(!trust.evaluate(&leaf(), "example.com"));

        trust.set(TrustPolicy::accept_all());
        assert!(trust.evaluate(&leaf(), "example.com"));
    }

    #[test]
    fn test_process_default_is_read_at_evaluation_time() {
        let previous = default_evaluator();
        let calls = Arc::new(AtomicUsize::new(0));
        let trust = SessionTrust::new(TrustPolicy::ProcessDefault);

        let counter = Arc::clone(&calls);
        set_default_evaluator(Arc::new(move |_: &[CertificateDer<'_>], _: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));
        let accepted = trust.evaluate(&leaf(), "example.com");
        set_default_evaluator(previous);

        assert!(accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_debug() {
        assert_eq!(format!("{:?}", TrustPolicy::ProcessDefault), "ProcessDefault");
        assert_eq!(format!("{:?}", TrustPolicy::accept_all()), "Evaluator(..)");
    }
}
