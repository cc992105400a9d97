//! Configuration types and CLI options.
//!
//! This module defines the session configuration surface plus the enums and
//! structs used for command-line argument parsing.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::config::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_QUEUE_CONCURRENCY,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
};
use crate::trust::TrustPolicy;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Which cookies a session stores and sends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CookiePolicy {
    /// No cookie store; `Set-Cookie` is ignored and no `Cookie` header is sent.
    #[default]
    Never,
    /// Store every cookie the cookie rules allow.
    Always,
    /// Store a cookie only if it is scoped to the exact host that set it.
    OriginOnly,
}

/// Whether requests may be answered from intermediary caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CachePolicy {
    /// Leave caching to the protocol defaults.
    #[default]
    UseLocal,
    /// Send `Cache-Control: no-cache` and `Pragma: no-cache` on every request.
    Bypass,
}

/// Transport session configuration.
///
/// # Examples
///
/// ```no_run
/// use avenue::{CachePolicy, SessionConfig};
///
/// let config = SessionConfig {
///     cache_policy: CachePolicy::Bypass,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whole-request timeout; `None` disables it.
    pub request_timeout: Option<Duration>,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// HTTP User-Agent header value.
    pub user_agent: String,

    /// Whether metered (cellular) interfaces may be used.
    ///
    /// Recorded and logged; platforms without metered-interface detection
    /// treat it as advisory.
    pub allow_cellular: bool,

    /// Cookie acceptance policy.
    pub cookie_policy: CookiePolicy,

    /// Local cache policy.
    pub cache_policy: CachePolicy,

    /// Headers added to every request unless the request sets them itself.
    pub additional_headers: HeaderMap,

    /// Server trust policy, resolved on every TLS handshake.
    pub trust: TrustPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_cellular: true,
            cookie_policy: CookiePolicy::default(),
            cache_policy: CachePolicy::default(),
            additional_headers: HeaderMap::new(),
            trust: TrustPolicy::default(),
        }
    }
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid HTTP method '{value}': {e}"))
}

/// Command-line options for the `avenue` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "avenue",
    version,
    about = "Fetch URLs through retrying, cancelable network operations"
)]
pub struct Opt {
    /// URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// HTTP method
    #[arg(long, short = 'X', default_value = "GET", value_parser = parse_method)]
    pub method: Method,

    /// Extra request header, as `Name: value` (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Retries allowed for transient transport failures (at least 1)
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Maximum concurrent requests
    #[arg(long, default_value_t = DEFAULT_QUEUE_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub timeout_seconds: u64,

    /// Wait with exponential backoff between retries
    #[arg(long)]
    pub backoff: bool,

    /// Accept any server certificate (development only)
    #[arg(long)]
    pub insecure: bool,

    /// Treat an empty response body as success for every method
    #[arg(long)]
    pub allow_empty: bool,

    /// Bypass intermediary caches
    #[arg(long)]
    pub no_cache: bool,

    /// Cookie policy
    #[arg(long, value_enum, default_value = "never")]
    pub cookies: CookiePolicy,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Print one JSON summary line per URL instead of plain text
    #[arg(long)]
    pub json: bool,
}
