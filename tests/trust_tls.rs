//! Trust evaluation over a real TLS handshake.
//!
//! A local server presents a freshly generated self-signed certificate; the
//! session's trust policy decides whether the handshake succeeds.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rcgen::CertifiedKey;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::crypto::ring::default_provider;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use avenue::{
    EmptyBodyPolicy, HttpRequest, NetworkError, NetworkOperation, NetworkPayload, NetworkSession,
    SessionConfig, TransportErrorKind, TrustPolicy,
};

/// Serves `ok` over TLS and counts accepted TCP connections.
async fn spawn_tls_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // Rejected handshakes end here.
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                    )
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (addr, connections)
}

async fn fetch(trust: TrustPolicy, addr: SocketAddr) -> NetworkPayload {
    let session = NetworkSession::new(SessionConfig {
        trust,
        ..Default::default()
    })
    .unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    NetworkOperation::new(
        HttpRequest::get(&format!("https://{addr}/")).unwrap(),
        &session,
        3,
        EmptyBodyPolicy::default(),
        move |payload| {
            let _ = tx.send(payload);
        },
    )
    .unwrap()
    .start()
    .await;
    rx.await.unwrap()
}

#[tokio::test]
async fn test_rejected_certificate_fails_on_first_attempt() {
    let (addr, connections) = spawn_tls_server().await;
    let reject = TrustPolicy::custom(|_chain: &[CertificateDer<'_>], _host: &str| false);

    let payload = fetch(reject, addr).await;
    assert_eq!(
        payload.error().and_then(NetworkError::transport_kind),
        Some(TransportErrorKind::TlsTrustRejected),
        "unexpected error: {:?}",
        payload.error()
    );
    assert!(!payload.error().unwrap().is_retryable());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert!(payload.response().is_none());
}

#[tokio::test]
async fn test_accepted_certificate_completes_request() {
    let (addr, connections) = spawn_tls_server().await;

    let payload = fetch(TrustPolicy::accept_all(), addr).await;
    assert!(payload.is_success(), "unexpected error: {:?}", payload.error());
    assert_eq!(payload.body(), Some(&b"ok"[..]));
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_evaluator_sees_server_hostname() {
    let (addr, _) = spawn_tls_server().await;
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let policy = TrustPolicy::custom(move |chain: &[CertificateDer<'_>], host: &str| {
        record.lock().unwrap().push((chain.len(), host.to_string()));
        true
    });

    let payload = fetch(policy, addr).await;
    assert!(payload.is_success(), "unexpected error: {:?}", payload.error());
    assert_eq!(*seen.lock().unwrap(), vec![(1, "127.0.0.1".to_string())]);
}
