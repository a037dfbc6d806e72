//! The declarative description of a REST API surface.
//!
//! A developer describes each operation once — verb, URL template, parameter roles,
//! expected statuses, error mapping — and the interface parser compiles the description
//! into immutable method plans at client construction time. Nothing here touches the
//! network.
//!
//! # Examples
//!
//! ```
//! use declarest::{ApiDescription, Operation, ReturnShape};
//!
//! let api = ApiDescription::new("ItemService")
//!     .host("https://api.example.com")
//!     .operation(
//!         Operation::get("getItem", "/items/{id}")
//!             .path_param("id")
//!             .expect_status([200])
//!             .error("ItemError", "ItemErrorBody"),
//!     )
//!     .operation(
//!         Operation::post("createItem", "/items")
//!             .body_serialized()
//!             .expect_status([201])
//!             .returns(ReturnShape::Envelope),
//!     );
//! ```

use bytes::Bytes;
use http::Method;
use serde_json::Value;
use std::fmt;

use crate::body::ChunkStream;
use crate::error::{Error, Result};

/// A positional call-site argument.
///
/// Arguments are matched to parameter bindings by declaration order: the first declared
/// parameter consumes the first argument, and so on.
pub enum Arg {
    /// An absent value: an omitted optional parameter or a null body.
    None,
    /// A text value.
    Text(String),
    /// A binary value.
    Bytes(Bytes),
    /// A structured value, serialized through the codec when bound to a body.
    Json(Value),
    /// A lazy chunk stream, attached to the request body unchanged.
    Stream(ChunkStream),
    /// A mapping, expanded by a header-map binding into one header per entry.
    Map(Vec<(String, String)>),
}

impl Arg {
    /// A text argument.
    pub fn text(value: impl Into<String>) -> Self {
        Arg::Text(value.into())
    }

    /// A structured argument built from any serializable value.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Arg::Json(
            serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?,
        ))
    }

    /// A binary argument.
    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Arg::Bytes(value.into())
    }

    /// A streaming argument.
    pub fn stream(stream: ChunkStream) -> Self {
        Arg::Stream(stream)
    }

    /// A mapping argument for header-map expansion.
    pub fn map<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Arg::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Returns `true` for [`Arg::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Arg::None)
    }

    /// Renders the argument for substitution into a path, query, header, or context slot.
    ///
    /// `Ok(None)` for an absent argument; an error for arguments with no textual form.
    pub(crate) fn substitution(&self) -> Result<Option<String>> {
        match self {
            Arg::None => Ok(None),
            Arg::Text(s) => Ok(Some(s.clone())),
            Arg::Json(Value::String(s)) => Ok(Some(s.clone())),
            Arg::Json(v) => Ok(Some(v.to_string())),
            Arg::Bytes(_) => Err(Error::Serialization(
                "binary argument cannot substitute into a text position".to_string(),
            )),
            Arg::Stream(_) => Err(Error::Serialization(
                "stream argument cannot substitute into a text position".to_string(),
            )),
            Arg::Map(_) => Err(Error::Serialization(
                "mapping argument cannot substitute into a text position".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::None => f.write_str("None"),
            Arg::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Arg::Bytes(b) => f.debug_tuple("Bytes").field(&format!("{} bytes", b.len())).finish(),
            Arg::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Arg::Stream(_) => f.write_str("Stream(..)"),
            Arg::Map(m) => f.debug_tuple("Map").field(m).finish(),
        }
    }
}

/// The declared wire type of a body binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Serialize the argument through the codec per the effective content type.
    Serialized,
    /// Attach the argument as raw text.
    Text,
    /// Attach the argument as raw bytes.
    Bytes,
    /// Attach the argument as a lazy chunk stream; the caller supplies framing headers.
    Stream,
}

/// How an operation's result is reshaped for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnShape {
    /// Drain the body, yield nothing.
    Void,
    /// Hand the raw body stream to the caller.
    Stream,
    /// Collect the body to bytes (decoding the response wire type if declared).
    Bytes,
    /// `true` for a 2xx status; HEAD operations only.
    Boolean,
    /// Status + headers + decoded headers + typed body.
    Envelope,
    /// The typed, deserialized body.
    #[default]
    Body,
}

/// A wire-level transformation applied to the response body before it reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// The body is a base64url-encoded string that must be decoded to bytes.
    Base64Url,
}

/// The role a positional parameter plays in request construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Substitutes a path placeholder. `encoded: true` percent-encodes the value.
    Path { name: String, encoded: bool },
    /// Sets a query parameter. `encoded: true` percent-encodes the value.
    Query { name: String, encoded: bool },
    /// Sets a header.
    Header { name: String },
    /// Expands a mapping argument into one `prefix`+key header per entry.
    HeaderMap { prefix: String },
    /// Supplies the request body.
    Body { kind: BodyKind },
    /// Substitutes a host template placeholder.
    HostParam { name: String },
    /// Contributes an entry to the per-call context.
    Context { key: String },
}

/// A parameter binding: a role plus the position of the argument it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub(crate) index: usize,
    pub(crate) kind: BindingKind,
}

impl Binding {
    /// The position of the call-site argument this binding consumes.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The binding's role.
    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }
}

/// The declarative description of one REST operation.
///
/// Parameter declarations double as the positional argument layout: each `*_param` or
/// `body_*` call consumes the next argument position.
#[derive(Debug, Clone)]
pub struct Operation {
    pub(crate) name: String,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) expected: Vec<u16>,
    pub(crate) error_type: String,
    pub(crate) error_body_type: String,
    pub(crate) return_shape: ReturnShape,
    pub(crate) content_type: Option<String>,
    pub(crate) response_wire: Option<WireType>,
}

impl Operation {
    fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            bindings: Vec::new(),
            expected: Vec::new(),
            error_type: "UnexpectedStatus".to_string(),
            error_body_type: "Value".to_string(),
            return_shape: ReturnShape::default(),
            content_type: None,
            response_wire: None,
        }
    }

    /// A `GET` operation.
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::GET, path)
    }

    /// A `POST` operation.
    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::POST, path)
    }

    /// A `PUT` operation.
    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::PUT, path)
    }

    /// A `PATCH` operation.
    pub fn patch(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::PATCH, path)
    }

    /// A `DELETE` operation.
    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::DELETE, path)
    }

    /// A `HEAD` operation.
    pub fn head(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::HEAD, path)
    }

    /// An `OPTIONS` operation.
    pub fn options(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, Method::OPTIONS, path)
    }

    fn bind(mut self, kind: BindingKind) -> Self {
        let index = self.bindings.len();
        self.bindings.push(Binding { index, kind });
        self
    }

    /// Declares a path parameter whose value is percent-encoded.
    pub fn path_param(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::Path { name: name.into(), encoded: true })
    }

    /// Declares a path parameter substituted verbatim (already encoded by the caller).
    pub fn path_param_raw(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::Path { name: name.into(), encoded: false })
    }

    /// Declares a query parameter whose value is percent-encoded.
    pub fn query_param(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::Query { name: name.into(), encoded: true })
    }

    /// Declares a query parameter substituted verbatim.
    pub fn query_param_raw(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::Query { name: name.into(), encoded: false })
    }

    /// Declares a header parameter.
    pub fn header_param(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::Header { name: name.into() })
    }

    /// Declares a mapping parameter whose entries each become a `prefix`+key header.
    pub fn header_map_param(self, prefix: impl Into<String>) -> Self {
        self.bind(BindingKind::HeaderMap { prefix: prefix.into() })
    }

    /// Declares a host template parameter.
    pub fn host_param(self, name: impl Into<String>) -> Self {
        self.bind(BindingKind::HostParam { name: name.into() })
    }

    /// Declares a parameter contributing an entry to the per-call context.
    pub fn context_param(self, key: impl Into<String>) -> Self {
        self.bind(BindingKind::Context { key: key.into() })
    }

    /// Declares a body parameter serialized through the codec.
    pub fn body_serialized(self) -> Self {
        self.bind(BindingKind::Body { kind: BodyKind::Serialized })
    }

    /// Declares a raw text body parameter.
    pub fn body_text(self) -> Self {
        self.bind(BindingKind::Body { kind: BodyKind::Text })
    }

    /// Declares a raw binary body parameter.
    pub fn body_bytes(self) -> Self {
        self.bind(BindingKind::Body { kind: BodyKind::Bytes })
    }

    /// Declares a streaming body parameter. The caller is responsible for
    /// `Content-Length` or `Transfer-Encoding`.
    pub fn body_stream(self) -> Self {
        self.bind(BindingKind::Body { kind: BodyKind::Stream })
    }

    /// Sets the expected success status codes.
    pub fn expect_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.expected = statuses.into_iter().collect();
        self
    }

    /// Sets the request body content type explicitly, overriding inference.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Names the error type and error body type produced for unexpected statuses.
    pub fn error(mut self, error_type: impl Into<String>, error_body_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self.error_body_type = error_body_type.into();
        self
    }

    /// Sets the return shape.
    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.return_shape = shape;
        self
    }

    /// Declares a wire transformation for the response body.
    pub fn response_wire(mut self, wire: WireType) -> Self {
        self.response_wire = Some(wire);
        self
    }
}

/// A named collection of operations sharing a host template.
#[derive(Debug, Clone, Default)]
pub struct ApiDescription {
    pub(crate) name: String,
    pub(crate) host: String,
    pub(crate) operations: Vec<Operation>,
}

impl ApiDescription {
    /// Creates a description with the given service name (used in telemetry and error
    /// messages as the `Service.operation` prefix).
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), host: String::new(), operations: Vec::new() }
    }

    /// Sets the host template, e.g. `"https://{account}.example.com"`. Placeholders are
    /// substituted by host parameters at call time.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Adds an operation.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }
}
