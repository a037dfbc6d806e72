//! Request and response body representations.
//!
//! Request bodies are plain values ([`Body`]); response bodies are consumed through a
//! [`BodyHandle`] that enforces the at-most-once consumption rule. Buffering is opt-in:
//! [`BodyHandle::buffer`] eagerly drains the stream into memory and re-exposes it as a
//! replayable body.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;

use crate::error::{Error, Result};
use crate::transport::TransportError;

/// A lazy stream of body chunks.
///
/// Chunks are pulled no faster than the consumer reads them; the stream owns whatever
/// transport resources back it and releases them when dropped.
pub type ChunkStream = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// The body of an outgoing request.
///
/// A `Stream` body can be sent only once; cloning a request carrying one is not possible
/// (see [`Body::try_clone`]), which is why the retry policy gives up on stream-bodied
/// requests after the first attempt.
#[derive(Default)]
pub enum Body {
    /// No body. Request building sets `Content-Length: 0` for this variant.
    #[default]
    Empty,
    /// A fully materialized binary body.
    Bytes(Bytes),
    /// A fully materialized text body.
    Text(String),
    /// A lazy chunk stream. The caller is responsible for `Content-Length` or
    /// `Transfer-Encoding` when attaching one.
    Stream(ChunkStream),
}

impl Body {
    /// Returns `true` for [`Body::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// The exact byte length, when the body is materialized.
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(b) => Some(b.len()),
            Body::Text(s) => Some(s.len()),
            Body::Stream(_) => None,
        }
    }

    /// Clones the body if it is not a stream.
    pub fn try_clone(&self) -> Option<Body> {
        match self {
            Body::Empty => Some(Body::Empty),
            Body::Bytes(b) => Some(Body::Bytes(b.clone())),
            Body::Text(s) => Some(Body::Text(s.clone())),
            Body::Stream(_) => None,
        }
    }

    /// Converts the body into a chunk stream.
    pub fn into_stream(self) -> ChunkStream {
        match self {
            Body::Empty => stream::empty().boxed(),
            Body::Bytes(b) => stream::once(async move { Ok(b) }).boxed(),
            Body::Text(s) => stream::once(async move { Ok(Bytes::from(s)) }).boxed(),
            Body::Stream(s) => s,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&format!("{} bytes", b.len())).finish(),
            Body::Text(s) => f.debug_tuple("Text").field(&format!("{} chars", s.len())).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

/// Consumption states of a response body.
enum BodyState {
    /// The wire stream, not yet read.
    Stream(ChunkStream),
    /// Drained into memory; replayable any number of times.
    Buffered(Bytes),
    /// Read without buffering; further reads fail.
    Consumed,
}

/// A response body that may be read at most once.
///
/// Reading ([`bytes`](BodyHandle::bytes), [`take_stream`](BodyHandle::take_stream),
/// [`drain`](BodyHandle::drain)) consumes the underlying stream; a second read fails with
/// [`Error::BodyAlreadyConsumed`]. Calling [`buffer`](BodyHandle::buffer) first drains the
/// stream into memory, after which every read replays the buffered bytes.
pub struct BodyHandle {
    state: BodyState,
}

impl BodyHandle {
    /// A handle over a wire stream.
    pub fn from_stream(stream: ChunkStream) -> Self {
        Self { state: BodyState::Stream(stream) }
    }

    /// A handle over already-materialized bytes. Replayable.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self { state: BodyState::Buffered(bytes) }
    }

    /// An empty, replayable handle.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Returns `true` once the body has been read without buffering.
    pub fn is_consumed(&self) -> bool {
        matches!(self.state, BodyState::Consumed)
    }

    /// Returns `true` if the body has been drained into memory and is replayable.
    pub fn is_buffered(&self) -> bool {
        matches!(self.state, BodyState::Buffered(_))
    }

    /// Takes the body as a chunk stream.
    ///
    /// For a buffered handle this yields the buffered bytes and stays replayable; for a
    /// wire stream it transfers ownership and marks the handle consumed.
    pub fn take_stream(&mut self) -> Result<ChunkStream> {
        match std::mem::replace(&mut self.state, BodyState::Consumed) {
            BodyState::Stream(s) => Ok(s),
            BodyState::Buffered(b) => {
                self.state = BodyState::Buffered(b.clone());
                Ok(stream::once(async move { Ok(b) }).boxed())
            }
            BodyState::Consumed => Err(Error::BodyAlreadyConsumed),
        }
    }

    /// Collects the body into bytes.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.state, BodyState::Consumed) {
            BodyState::Stream(s) => Ok(collect_stream(s).await?),
            BodyState::Buffered(b) => {
                self.state = BodyState::Buffered(b.clone());
                Ok(b)
            }
            BodyState::Consumed => Err(Error::BodyAlreadyConsumed),
        }
    }

    /// Drains the body into memory, making the handle replayable.
    ///
    /// Idempotent on a buffered handle; fails on a consumed one.
    pub async fn buffer(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, BodyState::Consumed) {
            BodyState::Stream(s) => {
                let bytes = collect_stream(s).await?;
                self.state = BodyState::Buffered(bytes);
                Ok(())
            }
            BodyState::Buffered(b) => {
                self.state = BodyState::Buffered(b);
                Ok(())
            }
            BodyState::Consumed => Err(Error::BodyAlreadyConsumed),
        }
    }

    /// Reads the body to completion and discards it, ignoring transport errors.
    ///
    /// Used between retry attempts so the connection can be reused. A consumed or buffered
    /// handle is left as-is.
    pub async fn drain(&mut self) {
        if matches!(self.state, BodyState::Buffered(_)) {
            return;
        }
        if let BodyState::Stream(mut s) = std::mem::replace(&mut self.state, BodyState::Consumed) {
            while let Some(chunk) = s.next().await {
                if chunk.is_err() {
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            BodyState::Stream(_) => f.write_str("BodyHandle(stream)"),
            BodyState::Buffered(b) => write!(f, "BodyHandle(buffered, {} bytes)", b.len()),
            BodyState::Consumed => f.write_str("BodyHandle(consumed)"),
        }
    }
}

async fn collect_stream(mut stream: ChunkStream) -> std::result::Result<Bytes, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
