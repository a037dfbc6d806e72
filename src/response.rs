//! The incoming response value type.
//!
//! A response owns its lazy body stream plus two optional side-channels installed by the
//! decoding machinery: memoized cells for the deserialized headers and the deserialized
//! body. The cells are shared (`Arc`) so every observer of the response sees one
//! materialization.

use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::body::BodyHandle;
use crate::error::{Error, Result};
use crate::headers::HttpHeaders;
use crate::request::HttpRequest;

/// A memoized decode result: `None` for an empty/undecodable body, `Some` for a decoded value.
pub(crate) type DecodeCell = Arc<OnceCell<Option<Value>>>;

/// A single HTTP response.
///
/// The body may be read at most once; call [`HttpResponse::buffer`] to drain it into
/// memory and make it replayable.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HttpHeaders,
    body: BodyHandle,
    request: Option<HttpRequest>,
    deserialized_headers: Option<DecodeCell>,
    deserialized_body: Option<DecodeCell>,
}

impl HttpResponse {
    /// Creates a response. The transport attaches the originating request separately via
    /// [`HttpResponse::set_request`].
    pub fn new(status: StatusCode, headers: HttpHeaders, body: BodyHandle) -> Self {
        Self {
            status,
            headers,
            body,
            request: None,
            deserialized_headers: None,
            deserialized_body: None,
        }
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// The first value of the named header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The response body handle.
    pub fn body(&self) -> &BodyHandle {
        &self.body
    }

    /// Mutable access to the response body handle.
    pub fn body_mut(&mut self) -> &mut BodyHandle {
        &mut self.body
    }

    /// The request that produced this response, if the transport recorded it.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// Records the originating request (with its body already dispatched).
    pub fn set_request(&mut self, request: HttpRequest) {
        self.request = Some(request);
    }

    /// Takes the originating request out of the response.
    pub fn take_request(&mut self) -> Option<HttpRequest> {
        self.request.take()
    }

    /// Drains the body into memory so it can be read repeatedly.
    pub async fn buffer(&mut self) -> Result<()> {
        self.body.buffer().await
    }

    /// Collects the body as text.
    ///
    /// The body is decoded as UTF-8; a `charset` parameter naming anything else falls back
    /// to lossy UTF-8 conversion.
    pub async fn body_text(&mut self) -> Result<String> {
        let bytes = self.body.bytes().await?;
        let charset_is_utf8 = self
            .headers
            .get("content-type")
            .and_then(|ct| {
                ct.split(';').skip(1).find_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    name.trim()
                        .eq_ignore_ascii_case("charset")
                        .then(|| value.trim().trim_matches('"').eq_ignore_ascii_case("utf-8"))
                })
            })
            .unwrap_or(true);

        if charset_is_utf8 {
            String::from_utf8(bytes.to_vec()).map_err(|e| Error::Decoding {
                status: self.status,
                reason: format!("body is not valid UTF-8: {e}"),
            })
        } else {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    /// Ensures the deserialized-headers and deserialized-body cells are attached.
    ///
    /// Installed by the decoding policy (or lazily by the response decoder); idempotent.
    pub(crate) fn attach_decode_cells(&mut self) {
        if self.deserialized_headers.is_none() {
            self.deserialized_headers = Some(Arc::new(OnceCell::new()));
        }
        if self.deserialized_body.is_none() {
            self.deserialized_body = Some(Arc::new(OnceCell::new()));
        }
    }

    /// Whether decode cells have been attached.
    pub fn is_decoded(&self) -> bool {
        self.deserialized_body.is_some()
    }

    pub(crate) fn deserialized_headers_cell(&self) -> Option<DecodeCell> {
        self.deserialized_headers.clone()
    }

    pub(crate) fn deserialized_body_cell(&self) -> Option<DecodeCell> {
        self.deserialized_body.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response_with(ct: Option<&str>, body: &[u8]) -> HttpResponse {
        let mut headers = HttpHeaders::new();
        if let Some(ct) = ct {
            headers.set("Content-Type", ct);
        }
        HttpResponse::new(StatusCode::OK, headers, BodyHandle::from_bytes(Bytes::copy_from_slice(body)))
    }

    #[tokio::test]
    async fn body_text_defaults_to_utf8() {
        let mut response = response_with(Some("application/json"), br#"{"a":1}"#);
        assert_eq!(response.body_text().await.unwrap(), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn body_text_rejects_invalid_utf8() {
        let mut response = response_with(None, &[0xff, 0xfe]);
        assert!(matches!(response.body_text().await, Err(Error::Decoding { .. })));
    }

    #[tokio::test]
    async fn body_text_with_foreign_charset_is_lossy() {
        let mut response = response_with(Some("text/plain; charset=latin1"), &[b'a', 0xff]);
        let text = response.body_text().await.unwrap();
        assert!(text.starts_with('a'));
    }

    #[test]
    fn decode_cells_attach_idempotently() {
        let mut response = response_with(None, b"");
        assert!(!response.is_decoded());
        response.attach_decode_cells();
        let first = response.deserialized_body_cell().unwrap();
        response.attach_decode_cells();
        let second = response.deserialized_body_cell().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(response.is_decoded());
    }
}
