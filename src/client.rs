//! The invocation engine: plans + arguments → pipeline → decoded, typed results.
//!
//! [`RestClient`] is the executable form of an [`ApiDescription`]: construction parses the
//! description once into method plans, and each invocation is a table lookup plus typed
//! dispatch. Status validation and error mapping happen here, between the pipeline and the
//! caller.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::body::ChunkStream;
use crate::builder::{build_request, resolve_body};
use crate::codec::{Codec, JsonCodec};
use crate::context::PolicyContext;
use crate::decoder::{DecodedResponse, ResponseDecoder};
use crate::describe::{ApiDescription, Arg, BindingKind, ReturnShape, WireType};
use crate::error::{body_representation, Error, Result};
use crate::headers::HttpHeaders;
use crate::parser;
use crate::pipeline::Pipeline;
use crate::plan::MethodPlan;
use crate::request::HttpRequest;
use crate::resume::{NoResume, OperationState, ResumeHook};

/// A typed response envelope: status, raw headers, decoded headers, and the typed body.
///
/// The body is `None` for void-bodied responses (e.g. a `201` with no content).
#[derive(Debug)]
pub struct Envelope<T> {
    /// The response status code.
    pub status: StatusCode,
    /// The raw response headers.
    pub headers: HttpHeaders,
    /// The response headers decoded into an object, when decoding ran.
    pub deserialized_headers: Option<Value>,
    /// The typed response body.
    pub body: Option<T>,
    /// The request that produced the response, when the transport recorded it.
    pub request: Option<HttpRequest>,
}

impl<T> Envelope<T> {
    /// Deserializes the decoded headers into a caller-declared header model.
    pub fn headers_as<H: DeserializeOwned>(&self) -> Result<Option<H>> {
        match &self.deserialized_headers {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::Decoding { status: self.status, reason: e.to_string() }),
        }
    }
}

/// Everything an error constructor needs to build an operation-specific error value.
#[derive(Debug)]
pub struct ErrorContext<'a> {
    /// Fully qualified operation name.
    pub operation: &'a str,
    /// The error type identifier the plan declares.
    pub error_type: &'a str,
    /// The error body type identifier the plan declares.
    pub error_body_type: &'a str,
    /// The unexpected status.
    pub status: StatusCode,
    /// The formatted `Status code S, "BODY"` message.
    pub message: &'a str,
    /// The decoded error body, when one could be produced.
    pub decoded_body: Option<&'a Value>,
}

/// A registered constructor for an operation's declared error type.
///
/// Returning `None` means the constructor could not build the error value; the engine
/// then falls back to the generic [`Error::UnexpectedStatus`] carrying the same fields.
pub type ErrorConstructor = Arc<dyn Fn(&ErrorContext<'_>) -> Option<Error> + Send + Sync>;

struct ClientInner {
    plans: HashMap<String, Arc<MethodPlan>>,
    pipeline: Pipeline,
    codec: Arc<dyn Codec>,
    decoder: ResponseDecoder,
    error_constructors: HashMap<String, ErrorConstructor>,
    resume_hook: Arc<dyn ResumeHook>,
}

/// An executable client over a parsed API description.
///
/// Cheap to clone; plans, pipeline, and codec are shared.
///
/// # Examples
///
/// ```no_run
/// use declarest::{ApiDescription, Operation, Pipeline, RestClient, Arg};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Item { id: String }
///
/// # async fn example() -> declarest::Result<()> {
/// let api = ApiDescription::new("ItemService")
///     .host("https://api.example.com")
///     .operation(
///         Operation::get("getItem", "/items/{id}")
///             .path_param("id")
///             .expect_status([200]),
///     );
///
/// let client = RestClient::builder()
///     .description(api)
///     .pipeline(Pipeline::builder().build())
///     .build()?;
///
/// let item: Item = client.invoke("getItem", vec![Arg::text("abc")]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

impl RestClient {
    /// Creates a builder.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// Creates a client with the default JSON codec and no error constructors.
    pub fn new(description: ApiDescription, pipeline: Pipeline) -> Result<Self> {
        Self::builder().description(description).pipeline(pipeline).build()
    }

    /// The plan for an operation, if it exists.
    pub fn plan(&self, operation: &str) -> Option<Arc<MethodPlan>> {
        self.inner.plans.get(operation).cloned()
    }

    /// Invokes an operation whose return shape is a typed body.
    pub async fn invoke<T: DeserializeOwned>(&self, operation: &str, args: Vec<Arg>) -> Result<T> {
        let mut decoded = self.dispatch(operation, args, ReturnShape::Body).await?;
        let value = decoded.decoded_body().await?.unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| Error::Decoding { status: decoded.status(), reason: e.to_string() })
    }

    /// Invokes a void operation, draining the response body.
    pub async fn invoke_unit(&self, operation: &str, args: Vec<Arg>) -> Result<()> {
        let mut decoded = self.dispatch(operation, args, ReturnShape::Void).await?;
        decoded.response_mut().body_mut().drain().await;
        Ok(())
    }

    /// Invokes an operation returning raw bytes, applying the declared response wire
    /// transformation (base64url) when present.
    pub async fn invoke_bytes(&self, operation: &str, args: Vec<Arg>) -> Result<Bytes> {
        let mut decoded = self.dispatch(operation, args, ReturnShape::Bytes).await?;
        let status = decoded.status();
        let wire = decoded.plan().response_wire();
        let bytes = decoded.response_mut().body_mut().bytes().await?;
        match wire {
            Some(WireType::Base64Url) => {
                let text = String::from_utf8_lossy(&bytes);
                let trimmed = text.trim().trim_matches('"');
                URL_SAFE_NO_PAD
                    .decode(trimmed.trim_end_matches('='))
                    .map(Bytes::from)
                    .map_err(|e| Error::Decoding {
                        status,
                        reason: format!("body is not valid base64url: {e}"),
                    })
            }
            None => Ok(bytes),
        }
    }

    /// Invokes an operation returning the raw body stream, transferring ownership of the
    /// stream to the caller.
    pub async fn invoke_stream(&self, operation: &str, args: Vec<Arg>) -> Result<ChunkStream> {
        let decoded = self.dispatch(operation, args, ReturnShape::Stream).await?;
        let mut response = decoded.into_response();
        response.body_mut().take_stream()
    }

    /// Invokes a HEAD operation returning existence as a boolean: `true` for 2xx.
    ///
    /// Probe operations list the "absent" status (typically 404) in their expected set so
    /// it validates and maps to `false`.
    pub async fn invoke_bool(&self, operation: &str, args: Vec<Arg>) -> Result<bool> {
        let mut decoded = self.dispatch(operation, args, ReturnShape::Boolean).await?;
        let success = decoded.status().is_success();
        decoded.response_mut().body_mut().drain().await;
        Ok(success)
    }

    /// Invokes an operation returning a full [`Envelope`].
    pub async fn invoke_envelope<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: Vec<Arg>,
    ) -> Result<Envelope<T>> {
        let mut decoded = self.dispatch(operation, args, ReturnShape::Envelope).await?;
        let status = decoded.status();
        let deserialized_headers = decoded.decoded_headers().await;
        let body = match decoded.decoded_body().await? {
            None => None,
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| Error::Decoding { status, reason: e.to_string() })?,
            ),
        };
        let mut response = decoded.into_response();
        Ok(Envelope {
            status,
            headers: response.headers().clone(),
            deserialized_headers,
            body,
            request: response.take_request(),
        })
    }

    /// Resumes a long-running operation through the installed [`ResumeHook`].
    pub async fn resume(&self, state: OperationState) -> Result<Envelope<Value>> {
        self.inner.resume_hook.resume(state).await
    }

    /// Rebuilds a request from a frozen operation state: verb from the plan, URL and
    /// headers from the state, body from fresh arguments. Frozen headers are applied
    /// last and override anything inferred.
    pub fn rebuild_request(&self, state: &OperationState, mut args: Vec<Arg>) -> Result<HttpRequest> {
        let plan = self
            .inner
            .plans
            .get(&state.operation)
            .ok_or_else(|| Error::UnknownOperation(state.operation.clone()))?;
        let url = Url::parse(&state.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut request = HttpRequest::new(plan.method().clone(), url);
        resolve_body(plan, &mut args, self.inner.codec.as_ref(), &mut request)?;
        for (name, value) in &state.headers {
            request.headers_mut().set(name.clone(), value.clone());
        }
        Ok(request)
    }

    /// Steps 1-5 of every call: plan lookup, request build, context augmentation,
    /// pipeline send, decode, status validation.
    async fn dispatch(
        &self,
        operation: &str,
        mut args: Vec<Arg>,
        shape: ReturnShape,
    ) -> Result<DecodedResponse> {
        let plan = self
            .inner
            .plans
            .get(operation)
            .cloned()
            .ok_or_else(|| Error::UnknownOperation(operation.to_string()))?;
        if plan.return_shape() != shape {
            return Err(Error::BadDescription(format!(
                "operation {operation:?} returns {:?}, not {shape:?}",
                plan.return_shape()
            )));
        }

        let request = build_request(&plan, &mut args, self.inner.codec.as_ref())?;

        let mut ctx = PolicyContext::new(request);
        ctx.set_data("caller-method", plan.fully_qualified_name());
        for binding in plan.bindings() {
            if let BindingKind::Context { key } = binding.kind() {
                if let Some(value) =
                    args.get(binding.index()).and_then(|a| a.substitution().ok()).flatten()
                {
                    ctx.set_data(key.clone(), value);
                }
            }
        }

        tracing::debug!(
            operation = plan.fully_qualified_name(),
            method = %plan.method(),
            url = %ctx.request().url(),
            "Invoking operation"
        );

        let response = self.inner.pipeline.send(&mut ctx).await?;

        tracing::info!(
            operation = plan.fully_qualified_name(),
            status = response.status().as_u16(),
            "Received HTTP response"
        );

        let mut decoded = self.inner.decoder.decode(plan.clone(), response);
        if !plan.is_expected(decoded.status().as_u16(), &[]) {
            return Err(self.unexpected_status(&plan, &mut decoded).await);
        }
        Ok(decoded)
    }

    /// Builds the typed failure for an unexpected status.
    async fn unexpected_status(&self, plan: &MethodPlan, decoded: &mut DecodedResponse) -> Error {
        let status = decoded.status();
        let text = decoded.body_text().await.unwrap_or_default();
        let decoded_body = decoded.decoded_body().await.ok().flatten();

        let content_type = decoded.response().header("content-type").map(str::to_string);
        let byte_len = decoded
            .response()
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(text.len());
        let message = format!(
            "Status code {}, {}",
            status.as_u16(),
            body_representation(content_type.as_deref(), &text, byte_len)
        );

        tracing::warn!(
            operation = plan.fully_qualified_name(),
            status = status.as_u16(),
            "Unexpected response status"
        );

        if let Some(constructor) = self.inner.error_constructors.get(plan.error_type()) {
            let error_ctx = ErrorContext {
                operation: plan.fully_qualified_name(),
                error_type: plan.error_type(),
                error_body_type: plan.error_body_type(),
                status,
                message: &message,
                decoded_body: decoded_body.as_ref(),
            };
            match constructor(&error_ctx) {
                Some(error) => return error,
                None => tracing::warn!(
                    error_type = plan.error_type(),
                    "Error constructor could not build the declared error type; \
                     surfacing a generic unexpected-status failure"
                ),
            }
        }

        Error::UnexpectedStatus {
            operation: plan.fully_qualified_name().to_string(),
            error_type: plan.error_type().to_string(),
            status,
            message,
            decoded_body,
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient").field("operations", &self.inner.plans.len()).finish()
    }
}

/// Builder for [`RestClient`].
pub struct RestClientBuilder {
    description: Option<ApiDescription>,
    pipeline: Option<Pipeline>,
    codec: Arc<dyn Codec>,
    error_constructors: HashMap<String, ErrorConstructor>,
    resume_hook: Arc<dyn ResumeHook>,
}

impl RestClientBuilder {
    fn new() -> Self {
        Self {
            description: None,
            pipeline: None,
            codec: Arc::new(JsonCodec),
            error_constructors: HashMap::new(),
            resume_hook: Arc::new(NoResume),
        }
    }

    /// Sets the API description (required).
    pub fn description(mut self, description: ApiDescription) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the pipeline. Defaults to a bare pipeline over the default transport.
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Replaces the codec. Defaults to [`JsonCodec`].
    pub fn codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Registers a constructor for a declared error type identifier.
    pub fn register_error(
        mut self,
        error_type: impl Into<String>,
        constructor: impl Fn(&ErrorContext<'_>) -> Option<Error> + Send + Sync + 'static,
    ) -> Self {
        self.error_constructors.insert(error_type.into(), Arc::new(constructor));
        self
    }

    /// Installs a resume hook. Defaults to [`NoResume`].
    pub fn resume_hook(mut self, hook: impl ResumeHook) -> Self {
        self.resume_hook = Arc::new(hook);
        self
    }

    /// Parses the description and builds the client.
    ///
    /// Any inconsistency in the description fails here with [`Error::BadDescription`];
    /// no partially usable client is produced.
    pub fn build(self) -> Result<RestClient> {
        let description = self
            .description
            .ok_or_else(|| Error::BadDescription("no API description provided".to_string()))?;
        let plans = parser::parse(&description)?;
        let pipeline = self.pipeline.unwrap_or_else(|| Pipeline::builder().build());

        Ok(RestClient {
            inner: Arc::new(ClientInner {
                plans,
                pipeline,
                codec: self.codec.clone(),
                decoder: ResponseDecoder::new(self.codec),
                error_constructors: self.error_constructors,
                resume_hook: self.resume_hook,
            }),
        })
    }
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::Operation;

    #[test]
    fn build_without_description_fails() {
        assert!(matches!(RestClient::builder().build(), Err(Error::BadDescription(_))));
    }

    #[tokio::test]
    async fn unknown_operation_is_reported() {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::get("known", "/x").expect_status([200]));
        let client = RestClient::builder().description(api).build().unwrap();

        let result = client.invoke::<Value>("missing", vec![]).await;
        assert!(matches!(result, Err(Error::UnknownOperation(_))));
    }

    #[tokio::test]
    async fn shape_mismatch_is_reported() {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::get("streamy", "/x").returns(ReturnShape::Stream).expect_status([200]));
        let client = RestClient::builder().description(api).build().unwrap();

        let result = client.invoke::<Value>("streamy", vec![]).await;
        assert!(matches!(result, Err(Error::BadDescription(_))));
    }

    #[tokio::test]
    async fn resume_defaults_to_not_supported() {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::get("op", "/x").expect_status([200]));
        let client = RestClient::builder().description(api).build().unwrap();

        let result = client.resume(OperationState::new("op", "https://h/x")).await;
        assert!(matches!(result, Err(Error::NotSupported)));
    }

    #[test]
    fn rebuild_request_uses_frozen_url_and_headers() {
        let api = ApiDescription::new("Svc")
            .host("https://h")
            .operation(Operation::post("op", "/items").body_serialized().expect_status([201]));
        let client = RestClient::builder().description(api).build().unwrap();

        let mut state = OperationState::new("op", "https://h/operations/42");
        state.headers.insert("x-ms-client-request-id".to_string(), "frozen".to_string());

        let request = client.rebuild_request(&state, vec![Arg::None]).unwrap();
        assert_eq!(request.url().as_str(), "https://h/operations/42");
        assert_eq!(request.headers().get("x-ms-client-request-id"), Some("frozen"));
        assert_eq!(request.headers().get("content-length"), Some("0"));
    }
}
