//! Request and response descriptors shared by sessions, transports and payloads.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url, Version};

/// Description of one logical HTTP request.
///
/// Unlike `reqwest::Request` this is a plain value that can be cloned for every
/// attempt and rewritten between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Builds a GET request, parsing `url`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `url` is not an absolute URL.
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    /// Adds a header, replacing any existing value for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Host portion of the URL, used in log lines.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("<no host>")
    }
}

/// Status line and headers of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    /// Final URL after redirects.
    pub url: Url,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn from_response(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            version: response.version(),
            url: response.url().clone(),
            headers: response.headers().clone(),
        }
    }

    /// Whether the status is one HTTP defines (100..=599).
    pub fn has_valid_status(&self) -> bool {
        (100..=599).contains(&self.status.as_u16())
    }

    /// Convenience accessor returning a header as UTF-8 text.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
