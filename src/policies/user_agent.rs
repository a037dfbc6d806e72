//! Fills in a `User-Agent` header when the caller has not set one.

use async_trait::async_trait;

use crate::context::PolicyContext;
use crate::error::Result;
use crate::pipeline::{Next, Policy};
use crate::response::HttpResponse;

/// Sets `User-Agent` to a configured string unless the request already carries one.
///
/// Caller-supplied values always win; this policy never overwrites.
pub struct UserAgentPolicy {
    user_agent: String,
}

impl UserAgentPolicy {
    /// Creates the policy with the given product string, e.g. `"my-app/1.0"`.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into() }
    }
}

#[async_trait]
impl Policy for UserAgentPolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        if !ctx.request().headers().contains("user-agent") {
            ctx.request_mut().headers_mut().set("User-Agent", self.user_agent.clone());
        }
        next.run(ctx).await
    }
}
