//! Lazy, memoized decoding of responses against a method plan.
//!
//! Nothing is parsed until an observer asks; the first observation materializes the body
//! and stores the decode result in the response's shared cells, so later observers (and
//! holders of the raw response) see the same values without re-reading the wire.

use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::plan::MethodPlan;
use crate::response::HttpResponse;

/// Wraps raw responses into [`DecodedResponse`]s using a shared codec.
pub struct ResponseDecoder {
    codec: Arc<dyn Codec>,
}

impl ResponseDecoder {
    /// Creates a decoder over the given codec.
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Pairs a response with its plan for lazy decoding.
    pub fn decode(&self, plan: Arc<MethodPlan>, mut response: HttpResponse) -> DecodedResponse {
        response.attach_decode_cells();
        DecodedResponse { plan, codec: self.codec.clone(), response, text: None }
    }
}

/// A response plus lazy handles for its deserialized headers and body.
pub struct DecodedResponse {
    plan: Arc<MethodPlan>,
    codec: Arc<dyn Codec>,
    response: HttpResponse,
    text: Option<String>,
}

impl DecodedResponse {
    /// The underlying response.
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// Mutable access to the underlying response.
    pub fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    /// Unwraps back into the raw response.
    pub fn into_response(self) -> HttpResponse {
        self.response
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// The plan this response is decoded against.
    pub fn plan(&self) -> &MethodPlan {
        &self.plan
    }

    /// The raw body as text, materialized once.
    ///
    /// A body the caller already consumed reads as empty rather than failing: decoding
    /// side-channels never compete with direct stream consumption.
    pub async fn body_text(&mut self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let text = match self.response.body_text().await {
            Ok(text) => text,
            Err(Error::BodyAlreadyConsumed) => String::new(),
            Err(e) => return Err(e),
        };
        self.text = Some(text.clone());
        Ok(text)
    }

    /// The deserialized body: `None` for an empty (or already-consumed) body, the decoded
    /// value otherwise. Memoized in the response's shared cell.
    pub async fn decoded_body(&mut self) -> Result<Option<Value>> {
        let cell = match self.response.deserialized_body_cell() {
            Some(cell) => cell,
            None => return Ok(None),
        };
        if let Some(cached) = cell.get() {
            return Ok(cached.clone());
        }

        let text = self.body_text().await?;
        let value = if text.is_empty() {
            None
        } else {
            let encoding = self.codec.encoding_from_headers(self.response.headers())?;
            match self.codec.deserialize(text.as_bytes(), encoding) {
                Ok(value) => Some(value),
                Err(Error::Decoding { reason, .. }) => {
                    return Err(Error::Decoding { status: self.response.status(), reason })
                }
                Err(e) => return Err(e),
            }
        };
        let _ = cell.set(value.clone());
        Ok(value)
    }

    /// The response headers mapped into a decodable object (first value per name).
    /// Memoized in the response's shared cell.
    pub async fn decoded_headers(&mut self) -> Option<Value> {
        let cell = self.response.deserialized_headers_cell()?;
        if let Some(cached) = cell.get() {
            return cached.clone();
        }

        let mut map = serde_json::Map::new();
        for (name, value) in self.response.headers().iter() {
            map.entry(name.to_ascii_lowercase())
                .or_insert_with(|| Value::String(value.to_string()));
        }
        let value = Some(Value::Object(map));
        let _ = cell.set(value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use crate::codec::JsonCodec;
    use crate::describe::{ApiDescription, Operation};
    use crate::headers::HttpHeaders;
    use crate::parser::parse;
    use bytes::Bytes;
    use serde_json::json;

    fn plan() -> Arc<MethodPlan> {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::get("op", "/x").expect_status([200]));
        parse(&api).unwrap().remove("op").unwrap()
    }

    fn decoder() -> ResponseDecoder {
        ResponseDecoder::new(Arc::new(JsonCodec))
    }

    fn json_response(body: &str) -> HttpResponse {
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "application/json");
        HttpResponse::new(
            StatusCode::OK,
            headers,
            BodyHandle::from_bytes(Bytes::copy_from_slice(body.as_bytes())),
        )
    }

    #[tokio::test]
    async fn decodes_a_json_body() {
        let mut decoded = decoder().decode(plan(), json_response(r#"{"id":7}"#));
        assert_eq!(decoded.decoded_body().await.unwrap(), Some(json!({"id": 7})));
    }

    #[tokio::test]
    async fn empty_body_decodes_to_none() {
        let mut decoded = decoder().decode(plan(), json_response(""));
        assert_eq!(decoded.decoded_body().await.unwrap(), None);
    }

    #[tokio::test]
    async fn consumed_body_decodes_to_none() {
        use crate::transport::TransportError;
        use futures::stream::{self, StreamExt};

        let chunks: Vec<std::result::Result<Bytes, TransportError>> =
            vec![Ok(Bytes::from_static(br#"{"id":7}"#))];
        let mut response = HttpResponse::new(
            StatusCode::OK,
            HttpHeaders::new(),
            BodyHandle::from_stream(stream::iter(chunks).boxed()),
        );
        // the caller takes the stream before decoding gets a look
        let _ = response.body_mut().take_stream().unwrap();

        let mut decoded = decoder().decode(plan(), response);
        assert_eq!(decoded.decoded_body().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decoding_error_with_the_real_status() {
        let mut decoded = decoder().decode(plan(), json_response("not json"));
        match decoded.decoded_body().await {
            Err(Error::Decoding { status, .. }) => assert_eq!(status, StatusCode::OK),
            other => panic!("expected a decoding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn decoding_is_memoized_in_the_shared_cell() {
        let mut decoded = decoder().decode(plan(), json_response(r#"{"id":7}"#));
        let first = decoded.decoded_body().await.unwrap();
        // the body is gone from the wire now; a second observation must hit the cell
        let second = decoded.decoded_body().await.unwrap();
        assert_eq!(first, second);

        let cell = decoded.response().deserialized_body_cell().unwrap();
        assert_eq!(cell.get().cloned().flatten(), Some(json!({"id": 7})));
    }

    #[tokio::test]
    async fn headers_decode_to_an_object() {
        let mut headers = HttpHeaders::new();
        headers.set("ETag", "\"v1\"");
        headers.set("x-ms-request-id", "abc");
        let response = HttpResponse::new(StatusCode::OK, headers, BodyHandle::empty());
        let mut decoded = decoder().decode(plan(), response);

        let value = decoded.decoded_headers().await.unwrap();
        assert_eq!(value["etag"], json!("\"v1\""));
        assert_eq!(value["x-ms-request-id"], json!("abc"));
    }
}
