//! The byte-level seam between generated stubs and the network.
//!
//! Stubs turn a call into a [`WireRequest`] and hand it to a [`Transport`].
//! [`HttpTransport`] sends it over HTTP with `reqwest`; tests plug in an
//! in-process transport instead.

use std::time::Duration;

use async_trait::async_trait;
use keel::Method;
use serde_json::Value;

/// One request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    /// Absolute path, e.g. `/meta/status`.
    pub path: String,
    /// Query tokens as `(name, JSON text)`, not yet URL-escaped.
    pub query: Vec<(String, String)>,
    /// The body parameter's value, sent as JSON.
    pub body: Option<Value>,
}

impl WireRequest {
    /// The path plus the URL-escaped query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(name, token)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(token)
                )
            })
            .collect();
        format!("{}?{}", self.path, pairs.join("&"))
    }
}

/// A raw response: status code and body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors raised below the API layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("could not build HTTP client: {0}")]
    Build(String),
}

/// Sends [`WireRequest`]s somewhere and returns what came back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

/// HTTP transport over a shared `reqwest::Client`.
///
/// Long-poll calls can block for as long as the server needs, so no timeout
/// is set unless one is asked for.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Like [`new`](Self::new), but every request fails with
    /// [`TransportError::Timeout`] after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        tracing::debug!(method = %request.method, %url, "sending request");

        let mut builder = self.client.request(http_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_tokens_are_escaped() {
        let request = WireRequest {
            method: Method::Get,
            path: "/keyboard/needs_toggle".into(),
            query: vec![
                ("layout_code".into(), "\"us\"".into()),
                ("variant_code".into(), "\"alt intl\"".into()),
            ],
            body: None,
        };
        assert_eq!(
            request.path_and_query(),
            "/keyboard/needs_toggle?layout_code=%22us%22&variant_code=%22alt%20intl%22"
        );
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let transport = HttpTransport::new("http://127.0.0.1:7777/").unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:7777");
    }
}
