//! The immutable, parsed form of one operation description.
//!
//! A [`MethodPlan`] is built once by the interface parser and consumed on every
//! invocation; nothing on the hot path re-interprets the declarative description.

use http::Method;
use std::collections::HashSet;

use crate::describe::{Binding, ReturnShape, WireType};

/// The per-operation plan: pure data plus pure accessors.
#[derive(Debug, Clone)]
pub struct MethodPlan {
    pub(crate) name: String,
    pub(crate) fully_qualified_name: String,
    pub(crate) method: Method,
    pub(crate) host_template: String,
    pub(crate) path_template: String,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) expected: HashSet<u16>,
    pub(crate) error_type: String,
    pub(crate) error_body_type: String,
    pub(crate) return_shape: ReturnShape,
    pub(crate) content_type: Option<String>,
    pub(crate) response_wire: Option<WireType>,
}

impl MethodPlan {
    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `Service.operation` name used for telemetry and the `caller-method`
    /// context entry.
    pub fn fully_qualified_name(&self) -> &str {
        &self.fully_qualified_name
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The host template, possibly carrying `{placeholder}`s and a scheme prefix.
    pub fn host_template(&self) -> &str {
        &self.host_template
    }

    /// The path template with `{placeholder}`s.
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// The parameter bindings in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The expected success status codes.
    pub fn expected_statuses(&self) -> impl Iterator<Item = u16> + '_ {
        self.expected.iter().copied()
    }

    /// Whether `status` counts as success, given caller-supplied extra allowances.
    ///
    /// Success iff the status is in the plan's expected set or in `extra_allowed`.
    /// Informational statuses (1xx) are never granted by `extra_allowed`; a plan must
    /// list them explicitly.
    pub fn is_expected(&self, status: u16, extra_allowed: &[u16]) -> bool {
        if (100..200).contains(&status) {
            return self.expected.contains(&status);
        }
        self.expected.contains(&status) || extra_allowed.contains(&status)
    }

    /// The declared error type identifier.
    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    /// The declared error body type identifier.
    pub fn error_body_type(&self) -> &str {
        &self.error_body_type
    }

    /// How the response is reshaped for the caller.
    pub fn return_shape(&self) -> ReturnShape {
        self.return_shape
    }

    /// The explicit request content type, when the description declared one.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The response body wire transformation, when declared.
    pub fn response_wire(&self) -> Option<WireType> {
        self.response_wire
    }
}

/// Extracts `{name}` placeholders from a template, in order of appearance.
pub(crate) fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else { break };
        names.push(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + 1 + len + 1..];
    }
    names
}
