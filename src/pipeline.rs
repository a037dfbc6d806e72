//! The policy pipeline: an ordered middleware chain terminated by the transport.
//!
//! Each call walks the chain strictly in declaration order. A policy receives the per-call
//! [`PolicyContext`] and a [`Next`] token addressing the remainder of the chain; the token
//! is consumed by value, so it can be used at most once. Policies short-circuit by
//! returning without running `next`, transform responses by awaiting `next` first, and
//! model retries by re-entering a fresh chain head via [`Next::restart`].
//!
//! Dropping the future returned by [`Pipeline::send`] cancels the call: pending backoff
//! sleeps and the in-flight transport exchange are dropped with it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{PipelineOptions, PolicyContext};
use crate::error::{Error, Result};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// A unit of pipeline middleware.
///
/// Policies are immutable values shared across concurrent calls; per-call state belongs in
/// the context's extensions, never in the policy itself.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use declarest::{Next, Policy, PolicyContext, HttpResponse, Result};
///
/// struct Stamp;
///
/// #[async_trait]
/// impl Policy for Stamp {
///     async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
///         ctx.request_mut().headers_mut().set("X-Stamp", "1");
///         next.run(ctx).await
///     }
/// }
/// ```
#[async_trait]
pub trait Policy: Send + Sync + 'static {
    /// Processes the call, delegating to `next` zero or one times.
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse>;
}

struct Inner {
    policies: Vec<Arc<dyn Policy>>,
    transport: Arc<dyn Transport>,
    options: Arc<PipelineOptions>,
}

/// An immutable, freely shareable chain of policies around a terminal transport.
///
/// # Examples
///
/// ```
/// use declarest::policies::{RequestIdPolicy, RetryPolicy, UserAgentPolicy};
/// use declarest::{Pipeline, ReqwestTransport};
///
/// let pipeline = Pipeline::builder()
///     .policy(UserAgentPolicy::new("my-app/1.0"))
///     .policy(RetryPolicy::new())
///     .policy(RequestIdPolicy::new())
///     .transport(ReqwestTransport::new())
///     .build();
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Pipeline {
    /// Creates a builder for assembling a pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Sends the context through the chain, policies first, transport last.
    pub async fn send(&self, ctx: &mut PolicyContext) -> Result<HttpResponse> {
        ctx.set_options(self.inner.options.clone());
        Next { inner: &self.inner, index: 0 }.run(ctx).await
    }

    /// Convenience wrapper: puts the request in a fresh context and sends it.
    pub async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut ctx = PolicyContext::new(request);
        self.send(&mut ctx).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("policies", &self.inner.policies.len())
            .finish()
    }
}

/// Marker inserted into the context when a request's stream body has been handed to the
/// transport and cannot be sent again. The retry policy refuses re-entry when present.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NonReplayableBody;

/// A single-use token addressing the remainder of the chain.
///
/// `run` consumes the token; invoking the rest of the chain twice from one policy
/// activation is unrepresentable. A retrying policy calls [`Next::restart`] to mint a
/// fresh head token instead.
pub struct Next<'a> {
    inner: &'a Inner,
    index: usize,
}

impl<'a> Next<'a> {
    /// Mints a fresh token at the head of the chain.
    ///
    /// Used by the retry policy: every retry attempt restarts from the first policy, with
    /// per-call state carried in the context.
    pub fn restart(&self) -> Next<'a> {
        Next { inner: self.inner, index: 0 }
    }

    /// Runs the remainder of the chain.
    pub async fn run(self, ctx: &mut PolicyContext) -> Result<HttpResponse> {
        match self.inner.policies.get(self.index) {
            Some(policy) => {
                let next = Next { inner: self.inner, index: self.index + 1 };
                policy.process(ctx, next).await
            }
            None => self.dispatch(ctx).await,
        }
    }

    /// Terminal sender: hands the request to the transport, applying the per-attempt
    /// timeout from the pipeline options.
    async fn dispatch(self, ctx: &mut PolicyContext) -> Result<HttpResponse> {
        // Retry re-entries need the request intact, so dispatch a clone when the body
        // permits it. A stream body can only be sent once; the context keeps a bodyless
        // shell in that case.
        let request = match ctx.request().try_clone() {
            Some(clone) => clone,
            None => {
                let mut shell =
                    HttpRequest::new(ctx.request().method().clone(), ctx.request().url().clone());
                *shell.headers_mut() = ctx.request().headers().clone();
                ctx.extensions_mut().insert(NonReplayableBody);
                ctx.replace_request(shell)
            }
        };

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            "Dispatching HTTP request"
        );

        let send = self.inner.transport.send(request);
        let result = match ctx.options().timeout {
            Some(timeout) => match tokio::time::timeout(timeout, send).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            },
            None => send.await,
        };
        result.map_err(Error::from)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    policies: Vec<Arc<dyn Policy>>,
    transport: Option<Arc<dyn Transport>>,
    options: PipelineOptions,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self { policies: Vec::new(), transport: None, options: PipelineOptions::default() }
    }

    /// Appends a policy; policies run in the order they are added.
    pub fn policy(mut self, policy: impl Policy) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Appends an already-shared policy.
    pub fn policy_arc(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Sets the terminal transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the per-attempt timeout applied around the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> Pipeline {
        Pipeline {
            inner: Arc::new(Inner {
                policies: self.policies,
                transport: self.transport.unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
                options: Arc::new(self.options),
            }),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
