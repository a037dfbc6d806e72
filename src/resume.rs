//! Resuming long-running operations from a serialized description.
//!
//! The runtime only defines the hook point: a serialized [`OperationState`] carrying
//! enough to rebuild an in-flight request without re-evaluating the original arguments.
//! Concrete polling strategies live outside the core and are installed on the client as a
//! [`ResumeHook`] implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::client::Envelope;
use crate::error::{Error, Result};

mod base64_blob {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// A frozen description of an in-flight operation.
///
/// JSON-encoded by default; the `state` blob is opaque to the runtime and carried as
/// base64.
///
/// # Examples
///
/// ```
/// use declarest::resume::OperationState;
///
/// let state = OperationState::new("createItem", "https://api.example.com/operations/42");
/// let json = state.to_json().unwrap();
/// assert_eq!(OperationState::from_json(&json).unwrap(), state);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationState {
    /// The operation name the plan is rebuilt from.
    pub operation: String,
    /// The absolute URL to re-issue requests against.
    pub url: String,
    /// Headers frozen at capture time.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Opaque implementation state.
    #[serde(with = "base64_blob", default)]
    pub state: Vec<u8>,
}

impl OperationState {
    /// Creates a state record with no frozen headers and no opaque state.
    pub fn new(operation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            url: url.into(),
            headers: HashMap::new(),
            state: Vec::new(),
        }
    }

    /// Serializes to the default JSON wire format.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes from the default JSON wire format.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Extension point for resuming long-running operations.
///
/// Implementations rebuild the plan from [`OperationState::operation`], re-issue requests
/// against the frozen URL and headers, and surface intermediate and final results in the
/// same envelope shape as the original call.
#[async_trait]
pub trait ResumeHook: Send + Sync + 'static {
    /// Resumes the operation described by `state`.
    async fn resume(&self, state: OperationState) -> Result<Envelope<serde_json::Value>> {
        let _ = state;
        Err(Error::NotSupported)
    }
}

/// The default hook: resuming is not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResume;

#[async_trait]
impl ResumeHook for NoResume {}
