//! The terminal HTTP transport interface and its default `reqwest` implementation.
//!
//! The pipeline treats the transport as an opaque async sender: it receives a finished
//! [`HttpRequest`] and produces an [`HttpResponse`] whose body is a lazy chunk stream.
//! Failures are structured as [`TransportError`] so the retry policy can classify them.

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};

use crate::body::{Body, BodyHandle};
use crate::headers::HttpHeaders;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// The transport's asynchronous failure modes.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TransportError {
    /// The connection could not be established (DNS, TCP, TLS).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The exchange failed at the protocol level (malformed response, broken body stream).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Connection failures and timeouts are transient; protocol errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::ConnectionFailed(_) | TransportError::Timeout)
    }
}

/// An asynchronous HTTP sender terminating the pipeline.
///
/// Implementations never panic on bad input; every failure is an async [`TransportError`].
/// The returned response's body is a lazy stream owned by the caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and resolves to its response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// The default transport, backed by a shared [`reqwest::Client`] connection pool.
///
/// # Examples
///
/// ```
/// use declarest::{Pipeline, ReqwestTransport};
///
/// let pipeline = Pipeline::builder()
///     .transport(ReqwestTransport::new())
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport over a preconfigured client (proxies, TLS settings, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::ConnectionFailed(error.to_string())
    } else {
        TransportError::Protocol(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (method, url, headers, body) = request.into_parts();

        // Back-reference for the response; the body has been handed to the wire.
        let mut sent = HttpRequest::new(method.clone(), url.clone());
        *sent.headers_mut() = headers.clone();

        let header_map = headers
            .to_header_map()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let mut builder = self.client.request(method, url).headers(header_map);
        builder = match body {
            Body::Empty => builder,
            Body::Bytes(b) => builder.body(b),
            Body::Text(s) => builder.body(s),
            Body::Stream(s) => builder.body(reqwest::Body::wrap_stream(s)),
        };

        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        let response_headers = HttpHeaders::from_header_map(response.headers());
        let stream = response.bytes_stream().map_err(classify).boxed();

        let mut out = HttpResponse::new(status, response_headers, BodyHandle::from_stream(stream));
        out.set_request(sent);
        Ok(out)
    }
}
