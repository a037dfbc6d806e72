//! Attaches the shared decode cells to every response passing through.

use async_trait::async_trait;

use crate::context::PolicyContext;
use crate::error::Result;
use crate::pipeline::{Next, Policy};
use crate::response::HttpResponse;

/// Marks responses as decodable by installing the memoized deserialized-headers and
/// deserialized-body cells.
///
/// The cells are shared handles: the response decoder fills them on first observation, and
/// every later observer (including ones holding the response after the pipeline returns)
/// sees the same materialization without re-reading the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodingPolicy;

impl DecodingPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Policy for DecodingPolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        let mut response = next.run(ctx).await?;
        response.attach_decode_cells();
        Ok(response)
    }
}
