//! Declarative HTTP API client pipeline.
//!
//! `courier` turns an immutable endpoint description (a [`Target`] carrying
//! a [`Task`] body strategy) into a concrete network operation, routes it
//! through an ordered [`InterceptorChain`] of adapt/retry policies, and
//! delivers a typed, decoded result (or a classified [`Error`]) through a
//! cancellable awaitable. Swapping the [`HttpTransport`] for a
//! [`MockTransport`] gives deterministic tests against the exact same
//! `Client` surface.
//!
//! # Quick start
//!
//! ```no_run
//! use courier::{Client, Target, Task};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), courier::Error> {
//! let client = Client::builder().build()?;
//!
//! let target = Target::builder("https://api.example.com", "/users")
//!     .task(Task::QueryValue(json!({"page": 1})))
//!     .build();
//!
//! let users: Vec<User> = client.dispatch(target).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Deterministic tests
//!
//! ```
//! use courier::{Client, MockTransport, Target};
//! use reqwest::Method;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), courier::Error> {
//! let mock = Arc::new(
//!     MockTransport::new().json_fixture(Method::GET, "/users", json!([{"id": 1}])),
//! );
//! let client = Client::builder().transport(mock).build()?;
//!
//! let target = Target::builder("https://api.example.com", "/users").build();
//! let users: serde_json::Value = client.dispatch(target).await?;
//! assert_eq!(users, json!([{"id": 1}]));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod errors;
pub mod http;
pub mod interceptor;
pub mod mock;
pub mod policies;
pub mod registry;
pub mod request;
pub mod target;
pub mod task;
pub mod transport;

pub use client::{Client, ClientBuilder, PendingDownload, PendingResponse};
pub use codec::{EncoderConfig, KeyDecoding, KeyEncoding};
pub use errors::Error;
pub use http::HttpTransport;
pub use interceptor::{Interceptor, InterceptorChain, RetryDecision};
pub use mock::MockTransport;
pub use policies::{
    default_chain, AlwaysOnline, Connectivity, ConnectivityGate, TokenRefresh, TokenSource,
    AUTHORIZATION_HEADER,
};
pub use registry::{CancellationRegistry, RequestHandle, RequestId};
pub use request::{WireBody, WireRequest};
pub use target::{Target, TargetBuilder};
pub use task::{Destination, ParameterEncoding, Parameters, Part, PartContent, Task};
pub use transport::{RawResponse, Transport};
