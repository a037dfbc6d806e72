//! # Declarest - a declarative async REST invocation runtime
//!
//! Declarest turns a declaratively-described REST API surface into executable network
//! calls. An operation is described once — verb, URL template, parameter roles, expected
//! statuses, error mapping — and compiled into an immutable method plan at client
//! construction. Every invocation then builds a typed request from positional arguments,
//! pushes it through a composable policy pipeline around a pluggable transport, and
//! decodes the response lazily into a typed value, surfacing failures as structured
//! errors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use declarest::policies::{RequestIdPolicy, RetryPolicy, UserAgentPolicy};
//! use declarest::{ApiDescription, Arg, Operation, Pipeline, RestClient};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Item {
//!     id: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), declarest::Error> {
//!     // Describe the API surface once.
//!     let api = ApiDescription::new("ItemService")
//!         .host("https://api.example.com")
//!         .operation(
//!             Operation::get("getItem", "/items/{id}")
//!                 .path_param("id")
//!                 .expect_status([200])
//!                 .error("ItemError", "ItemErrorBody"),
//!         )
//!         .operation(
//!             Operation::post("createItem", "/items")
//!                 .body_serialized()
//!                 .expect_status([201]),
//!         );
//!
//!     // Assemble a pipeline: policies in order, transport last.
//!     let pipeline = Pipeline::builder()
//!         .policy(UserAgentPolicy::new("my-app/1.0"))
//!         .policy(RetryPolicy::new())
//!         .policy(RequestIdPolicy::new())
//!         .build();
//!
//!     let client = RestClient::builder().description(api).pipeline(pipeline).build()?;
//!
//!     // Invoke operations by name with positional arguments.
//!     let item: Item = client.invoke("getItem", vec![Arg::text("abc")]).await?;
//!     println!("Fetched {}", item.name);
//!
//!     let created: Item = client
//!         .invoke("createItem", vec![Arg::json(&serde_json::json!({"name": "widget"}))?])
//!         .await?;
//!     println!("Created {}", created.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Describe once, invoke many times** - operations are parsed into immutable plans at
//!   client construction; invocation is a table lookup plus typed dispatch
//! - **Composable policy pipeline** - retry, credentials, cookies, user-agent, request-id,
//!   and decoding policies around a pluggable transport, each able to short-circuit,
//!   transform, or re-enter the chain
//! - **Lazy streaming bodies** - response bodies are chunk streams consumed at most once,
//!   with opt-in buffering for replay
//! - **Rich error handling** - unexpected statuses become structured errors carrying the
//!   status, a bounded body rendering, and the decoded error body
//! - **Typed results in six shapes** - unit, bytes, raw stream, boolean probes, typed
//!   bodies, and full envelopes with decoded headers
//! - **Resume hook** - long-running operations can be re-entered from a serialized
//!   operation state
//!
//! ## Error handling
//!
//! Every failure is a [`Error`] variant preserving what the wire actually said:
//!
//! ```no_run
//! use declarest::{Error, RestClient};
//!
//! # async fn example(client: RestClient) {
//! match client.invoke::<serde_json::Value>("getItem", vec![]).await {
//!     Ok(value) => println!("ok: {value}"),
//!     Err(Error::UnexpectedStatus { status, message, decoded_body, .. }) => {
//!         eprintln!("service said {status}: {message}");
//!         if let Some(body) = decoded_body {
//!             eprintln!("decoded error body: {body}");
//!         }
//!     }
//!     Err(Error::Transport(e)) => eprintln!("transport: {e}"),
//!     Err(e) => eprintln!("other: {e}"),
//! }
//! # }
//! ```
//!
//! ## Pipeline model
//!
//! A [`Pipeline`] is an ordered list of [`Policy`] values terminated by a [`Transport`].
//! Each call walks the policies in order; the [`Next`] token a policy receives is
//! single-use, so invoking the remainder of the chain twice is unrepresentable. The
//! retry policy re-enters the chain from its head with the original call's context, so
//! signing and id-stamping policies see every attempt.

#![warn(missing_docs)]

pub mod body;
mod builder;
mod client;
pub mod codec;
pub mod context;
mod decoder;
mod describe;
mod error;
pub mod headers;
mod parser;
mod pipeline;
mod plan;
pub mod policies;
mod request;
mod response;
pub mod resume;
pub mod transport;
mod url_builder;

pub use body::{Body, BodyHandle, ChunkStream};
pub use client::{Envelope, ErrorConstructor, ErrorContext, RestClient, RestClientBuilder};
pub use codec::{Codec, Encoding, JsonCodec};
pub use context::{PipelineOptions, PolicyContext};
pub use decoder::{DecodedResponse, ResponseDecoder};
pub use describe::{
    ApiDescription, Arg, Binding, BindingKind, BodyKind, Operation, ReturnShape, WireType,
};
pub use error::{Error, Result};
pub use headers::HttpHeaders;
pub use pipeline::{Next, Pipeline, PipelineBuilder, Policy};
pub use plan::MethodPlan;
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use url_builder::UrlBuilder;
