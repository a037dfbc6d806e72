//! Stamps each request with a unique client request id.

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::PolicyContext;
use crate::error::Result;
use crate::pipeline::{Next, Policy};
use crate::response::HttpResponse;

/// The header carrying the per-request client id.
pub const REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Sets [`REQUEST_ID_HEADER`] to a fresh v4 UUID unless the request already carries one.
///
/// Services use the id to correlate a request across their own logs; keeping a
/// caller-supplied id intact preserves end-to-end correlation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdPolicy;

impl RequestIdPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Policy for RequestIdPolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        if !ctx.request().headers().contains(REQUEST_ID_HEADER) {
            ctx.request_mut()
                .headers_mut()
                .set(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        }
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use crate::headers::HttpHeaders;
    use crate::pipeline::Pipeline;
    use crate::request::HttpRequest;
    use crate::transport::{Transport, TransportError};
    use http::{Method, StatusCode};
    use url::Url;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let mut response = HttpResponse::new(StatusCode::OK, HttpHeaders::new(), BodyHandle::empty());
            response.set_request(request);
            Ok(response)
        }
    }

    #[tokio::test]
    async fn generates_an_id_when_absent() {
        let pipeline = Pipeline::builder().policy(RequestIdPolicy::new()).transport(Echo).build();
        let request = HttpRequest::new(Method::GET, Url::parse("https://h/x").unwrap());
        let response = pipeline.send_request(request).await.unwrap();
        let id = response.request().unwrap().headers().get(REQUEST_ID_HEADER).unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn keeps_a_caller_supplied_id() {
        let pipeline = Pipeline::builder().policy(RequestIdPolicy::new()).transport(Echo).build();
        let request = HttpRequest::new(Method::GET, Url::parse("https://h/x").unwrap())
            .with_header(REQUEST_ID_HEADER, "caller-chosen");
        let response = pipeline.send_request(request).await.unwrap();
        assert_eq!(
            response.request().unwrap().headers().get(REQUEST_ID_HEADER),
            Some("caller-chosen")
        );
    }
}
