//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `avenue` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Building one session and one work queue for all URLs
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use log::{info, warn};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::Serialize;
use tokio::sync::mpsc;

use avenue::config::{Opt, MAX_BODY_PREVIEW_CHARS};
use avenue::initialization::{init_crypto_provider, init_logger_with};
use avenue::{
    default_retry_strategy, CachePolicy, EmptyBodyPolicy, HttpRequest, NetworkError,
    NetworkOperation, NetworkPayload, NetworkSession, SessionConfig, TrustPolicy, WorkQueue,
};

/// One line of output per fetched URL.
#[derive(Debug, Serialize)]
struct Summary {
    url: String,
    method: String,
    status: Option<u16>,
    bytes: Option<usize>,
    elapsed_ms: Option<i64>,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_preview: Option<String>,
}

impl Summary {
    fn from_payload(payload: &NetworkPayload) -> Self {
        let request = payload.original_request();
        let body_preview = match payload.error() {
            Some(NetworkError::EndpointError { body, .. }) if !body.is_empty() => {
                Some(preview(body))
            }
            _ => None,
        };
        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            status: payload.status().map(|status| status.as_u16()),
            bytes: payload.body().map(<[u8]>::len),
            elapsed_ms: payload.elapsed().map(|elapsed| elapsed.num_milliseconds()),
            error: payload.error().map(ToString::to_string),
            body_preview,
        }
    }

    fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn render(&self) -> String {
        let status = self
            .status
            .map_or_else(|| "---".to_string(), |status| status.to_string());
        match &self.error {
            None => format!(
                "{} {} {} {} ({} bytes in {}ms)",
                "✅".green(),
                status.green(),
                self.method,
                self.url,
                self.bytes.unwrap_or_default(),
                self.elapsed_ms.unwrap_or_default()
            ),
            Some(error) => {
                let mut line = format!(
                    "{} {} {} {}: {}",
                    "❌".red(),
                    status.red(),
                    self.method,
                    self.url,
                    error
                );
                if let Some(preview) = &self.body_preview {
                    line.push_str(&format!("\n    {}", preview.dimmed()));
                }
                line
            }
        }
    }
}

/// First characters of a response body, for diagnostics.
fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut preview: String = text.chars().take(MAX_BODY_PREVIEW_CHARS).collect();
    if text.chars().count() > MAX_BODY_PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

/// Adds an https:// prefix if the scheme is missing and checks the scheme.
fn normalize_url(raw: &str) -> Result<Url> {
    let normalized = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&normalized).with_context(|| format!("Invalid URL: {raw}"))?;
    if url.host_str().is_none() {
        bail!("URL has no host: {raw}");
    }
    Ok(url)
}

/// Parses a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("Header must look like 'Name: value': {raw}");
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in '{raw}'"))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in '{raw}'"))?;
    Ok((name, value))
}

fn session_config(opt: &Opt) -> Result<SessionConfig> {
    let mut config = SessionConfig {
        request_timeout: Some(std::time::Duration::from_secs(opt.timeout_seconds)),
        user_agent: opt.user_agent.clone(),
        cookie_policy: opt.cookies,
        cache_policy: if opt.no_cache {
            CachePolicy::Bypass
        } else {
            CachePolicy::UseLocal
        },
        ..Default::default()
    };
    for raw in &opt.headers {
        let (name, value) = parse_header(raw)?;
        config.additional_headers.append(name, value);
    }
    if opt.insecure {
        warn!("Certificate validation disabled (--insecure)");
        config.trust = TrustPolicy::accept_all();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    // Initialize crypto provider for TLS operations
    init_crypto_provider();

    let session = NetworkSession::new(session_config(&opt)?)
        .context("Failed to create network session")?;
    let queue = WorkQueue::new(opt.concurrency);
    let empty_body = if opt.allow_empty {
        EmptyBodyPolicy::allow_all()
    } else {
        EmptyBodyPolicy::default()
    };

    let (results, mut completed) = mpsc::unbounded_channel::<NetworkPayload>();
    let mut failed = 0usize;
    for raw in &opt.urls {
        let url = match normalize_url(raw) {
            Ok(url) => url,
            Err(e) => {
                eprintln!("{} {e:#}", "❌".red());
                failed += 1;
                continue;
            }
        };
        let results = results.clone();
        let mut operation = NetworkOperation::new(
            HttpRequest::new(opt.method.clone(), url),
            &session,
            opt.max_retries,
            empty_body.clone(),
            move |payload| {
                let _ = results.send(payload);
            },
        )
        .context("Invalid --max-retries")?;
        if opt.backoff {
            operation = operation.with_backoff(default_retry_strategy());
        }
        queue.submit(operation);
    }
    drop(results);

    let interrupt = {
        let queue = queue.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling outstanding requests");
                queue.cancel_all();
            }
        })
    };

    while let Some(payload) = completed.recv().await {
        let summary = Summary::from_payload(&payload);
        if !summary.succeeded() {
            failed += 1;
        }
        if opt.json {
            println!(
                "{}",
                serde_json::to_string(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("{}", summary.render());
        }
    }

    interrupt.abort();
    queue.shutdown().await;
    session.finish_tasks_and_invalidate().await;
    info!("{} URL(s) processed, {failed} failed", opt.urls.len());

    if failed > 0 {
        process::exit(1);
    }
    Ok(())
}
