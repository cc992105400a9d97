//! HTTP client construction.
//!
//! Builds the `reqwest::Client` behind a session's [`HttpTransport`](super::HttpTransport)
//! from its [`SessionConfig`].

use std::sync::Arc;

use log::info;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::ClientBuilder;

use super::cookies::OriginOnlyJar;
use crate::config::{CachePolicy, CookiePolicy, SessionConfig, MAX_REDIRECT_HOPS};
use crate::error_handling::InitializationError;
use crate::trust::{build_tls_config, SessionTrust};

/// Initializes the HTTP client for a session.
///
/// Creates a `reqwest::Client` configured with:
/// - request and connect timeouts
/// - User-Agent and the session's additional headers as defaults
/// - cache-bypass headers when the cache policy says so
/// - redirect following (up to 10 hops)
/// - a cookie store matching the cookie policy
/// - a rustls configuration whose certificate verifier defers to `trust`
///
/// # Errors
///
/// Returns `InitializationError::TlsConfigError` if the TLS configuration
/// cannot be built and `InitializationError::HttpClientError` if client
/// creation fails.
pub(crate) fn build_client(
    config: &SessionConfig,
    trust: SessionTrust,
) -> Result<reqwest::Client, InitializationError> {
    let mut headers = config.additional_headers.clone();
    if config.cache_policy == CachePolicy::Bypass {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
        .use_preconfigured_tls(build_tls_config(trust)?);

    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    builder = match config.cookie_policy {
        CookiePolicy::Never => builder,
        CookiePolicy::Always => builder.cookie_provider(Arc::new(Jar::default())),
        CookiePolicy::OriginOnly => builder.cookie_provider(Arc::new(OriginOnlyJar::default())),
    };

    if !config.allow_cellular {
        info!("Cellular access disabled for this session (advisory on this platform)");
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustPolicy;
    use std::time::Duration;

    fn trust() -> SessionTrust {
        SessionTrust::new(TrustPolicy::ProcessDefault)
    }

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_client(&SessionConfig::default(), trust()).is_ok());
    }

    #[test]
    fn test_build_client_with_every_option() {
        let mut config = SessionConfig {
            request_timeout: None,
            connect_timeout: Duration::from_secs(1),
            user_agent: "avenue-test/1.0".into(),
            allow_cellular: false,
            cookie_policy: CookiePolicy::OriginOnly,
            cache_policy: CachePolicy::Bypass,
            ..Default::default()
        };
        config
            .additional_headers
            .insert("x-api-key", HeaderValue::from_static("secret"));
        assert!(build_client(&config, trust()).is_ok());

        config.cookie_policy = CookiePolicy::Always;
        assert!(build_client(&config, trust()).is_ok());
    }
}
