//! Error types for declarative REST invocations.
//!
//! This module provides comprehensive error types that preserve maximum debugging information
//! while remaining ergonomic to use. Errors carry the HTTP status code, a bounded rendering of
//! the response body, and the decoded error body when one could be produced.

use http::StatusCode;

use crate::transport::TransportError;

/// Maximum number of characters of a response body quoted inside an error message.
///
/// Bodies longer than this are truncated; octet-stream bodies are never quoted at all and
/// are reported only as a byte count.
pub const MAX_BODY_PREVIEW: usize = 1024;

/// The main error type for declarative REST invocations.
///
/// This error type preserves all relevant debugging information including the originating
/// operation, HTTP status codes, and decoded error bodies when available.
///
/// # Examples
///
/// ```no_run
/// use declarest::{Error, RestClient};
///
/// # async fn example(client: RestClient) {
/// match client.invoke::<serde_json::Value>("getItem", vec![]).await {
///     Ok(item) => println!("Success: {item:?}"),
///     Err(Error::UnexpectedStatus { status, message, decoded_body, .. }) => {
///         eprintln!("Service returned {status}: {message}");
///         if let Some(body) = decoded_body {
///             eprintln!("Decoded error body: {body}");
///         }
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The declarative API description is inconsistent.
    ///
    /// This is fatal at client construction time: no plans are published when any
    /// operation in the description fails to validate.
    #[error("Bad operation description: {0}")]
    BadDescription(String),

    /// The request body could not be encoded.
    #[error("Failed to serialize request body: {0}")]
    Serialization(String),

    /// The transport failed before a response was produced.
    ///
    /// Connection failures and timeouts are retriable by the retry policy;
    /// protocol errors are not.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response status code was not in the operation's expected set.
    ///
    /// The message follows the form `Status code S, "BODY"`, with `(empty body)` when the
    /// response had no body and `(N-byte body)` for octet-stream content.
    #[error("{message}")]
    UnexpectedStatus {
        /// Fully qualified name of the operation.
        operation: String,
        /// The error type identifier declared by the operation's plan.
        error_type: String,
        /// The HTTP status code.
        status: StatusCode,
        /// Summary including the status code and a bounded body representation.
        message: String,
        /// The decoded error body, if the codec could produce one.
        decoded_body: Option<serde_json::Value>,
    },

    /// The response body could not be decoded into the expected shape.
    ///
    /// Only surfaced for responses whose status was expected; a bad-status response with an
    /// undecodable body becomes [`Error::UnexpectedStatus`] with a `None` decoded body instead.
    #[error("Failed to decode response (status {status}): {reason}")]
    Decoding {
        /// The HTTP status code of the response being decoded.
        status: StatusCode,
        /// Why decoding failed.
        reason: String,
    },

    /// The `Content-Type` selected an encoding the codec does not support.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// No operation with this name exists in the client's description.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// An invalid URL was provided or assembled.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An invalid header name or value was provided.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A response body was read a second time without buffering.
    ///
    /// Bodies are consumed at most once; call [`HttpResponse::buffer`](crate::HttpResponse::buffer)
    /// first to make a body replayable.
    #[error("Response body already consumed")]
    BodyAlreadyConsumed,

    /// Resuming in-flight operations is not supported by this client.
    ///
    /// This is the default behavior of [`ResumeHook`](crate::resume::ResumeHook); long-running
    /// operation support installs an implementation that overrides it.
    #[error("Resuming operations is not supported by this client")]
    NotSupported,

    /// The credential provider failed to sign or refresh.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::Decoding { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the decoded error body if this error carries one.
    pub fn decoded_body(&self) -> Option<&serde_json::Value> {
        match self {
            Error::UnexpectedStatus { decoded_body, .. } => decoded_body.as_ref(),
            _ => None,
        }
    }

    /// Returns the error type identifier declared by the operation, if any.
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Error::UnexpectedStatus { error_type, .. } => Some(error_type),
            _ => None,
        }
    }
}

/// Renders a response body for inclusion in an error message.
///
/// Octet-stream bodies are reported as a byte count only; other bodies are quoted and
/// truncated to [`MAX_BODY_PREVIEW`] characters.
pub(crate) fn body_representation(
    content_type: Option<&str>,
    body_text: &str,
    byte_len: usize,
) -> String {
    let is_octet_stream = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/octet-stream")
        })
        .unwrap_or(false);

    if is_octet_stream {
        format!("({byte_len}-byte body)")
    } else if body_text.is_empty() {
        "(empty body)".to_string()
    } else if body_text.len() > MAX_BODY_PREVIEW {
        let mut end = MAX_BODY_PREVIEW;
        while !body_text.is_char_boundary(end) {
            end -= 1;
        }
        format!("\"{}…\"", &body_text[..end])
    } else {
        format!("\"{body_text}\"")
    }
}

/// A specialized `Result` type for declarative REST invocations.
pub type Result<T> = std::result::Result<T, Error>;
