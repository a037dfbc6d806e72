//! The per-call scratchpad flowing through the pipeline.

use http::Extensions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::request::HttpRequest;

/// Options shared by every call on a pipeline.
///
/// Held behind an `Arc` inside the pipeline and exposed to policies through the context.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Overall per-attempt timeout applied around the transport. `None` disables it.
    pub timeout: Option<Duration>,
}

/// Per-call mutable state: the request under construction/dispatch, caller-supplied
/// string data, typed policy state, and the pipeline's shared options.
///
/// Policies are immutable shared values; anything a policy needs to remember across a
/// retry re-entry (attempt counters, credential handles) lives here, keyed by type in
/// [`PolicyContext::extensions`].
#[derive(Debug)]
pub struct PolicyContext {
    request: HttpRequest,
    data: HashMap<String, String>,
    extensions: Extensions,
    options: Arc<PipelineOptions>,
}

impl PolicyContext {
    /// Creates a context owning the given request.
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            data: HashMap::new(),
            extensions: Extensions::new(),
            options: Arc::new(PipelineOptions::default()),
        }
    }

    pub(crate) fn set_options(&mut self, options: Arc<PipelineOptions>) {
        self.options = options;
    }

    /// The request this call will dispatch.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Mutable access to the request; policies edit headers and URL here.
    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    /// Replaces the request, returning the previous one. Used by the terminal sender when
    /// the body cannot be cloned for dispatch.
    pub(crate) fn replace_request(&mut self, request: HttpRequest) -> HttpRequest {
        std::mem::replace(&mut self.request, request)
    }

    /// Adds a caller-supplied key/value entry.
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// Looks up a caller-supplied entry.
    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Typed per-call state shared between policies.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the typed per-call state.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The pipeline's shared options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }
}
