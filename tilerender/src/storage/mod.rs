//! Resource request channel
//!
//! Issues fetches for named resources and delivers exactly one terminal
//! [`Response`] per fetch, unless the caller cancels first.
//!
//! # Architecture
//!
//! ```text
//! caller ──request(Resource, Callback)──► FileSource ──spawn──► fetch task
//!   ▲                                                             │
//!   │ AsyncRequest (drop = cancel)                    Transport::fetch
//!   │                                                             │
//!   └───────────── Callback(Response), at most once ◄─────────────┘
//! ```
//!
//! - [`Transport`] is the seam to the outside world. [`ReqwestTransport`]
//!   speaks HTTP; tests script their own.
//! - [`assemble_response`] validates raw transport results: `NaN`
//!   timestamps and empty etags become absent, non-binary bodies are
//!   rejected.
//! - [`PendingFetch`] and [`AsyncRequest`] share a take-once slot, so the
//!   callback runs at most once no matter how delivery and cancellation
//!   race.
//!
//! There are no retries and no timeouts at this layer. A fetch that never
//! completes stays outstanding until its `AsyncRequest` is dropped.

mod file_source;
mod http;
mod request;
mod resource;
mod response;
mod transport;

pub use file_source::{FetchMetrics, FetchMetricsSnapshot, TransportFileSource};
pub use http::{HttpConfig, ReqwestTransport, DEFAULT_TIMEOUT_SECS};
pub use request::{AsyncRequest, Callback, CallbackSlot, Delivery, PendingFetch};
pub use resource::{Resource, ResourceKind};
pub use response::{ErrorReason, Response, ResponseError, ResponseOutcome, Timestamp};
pub use transport::{
    assemble_response, timestamp_from_millis, Transport, TransportBody, TransportResponse,
    TransportResult,
};

#[cfg(test)]
pub use transport::tests::MockTransport;

use thiserror::Error;

/// Errors raised synchronously by the fetch layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The transport handed over a body that is not binary data.
    #[error("Response data must be binary, got {0}")]
    InvalidBody(&'static str),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Issues fetches.
///
/// Implementations must allow concurrent in-flight requests. There is no
/// ordering guarantee between requests.
pub trait FileSource: Send + Sync {
    /// Starts fetching `resource`. `callback` receives exactly one response
    /// unless the returned handle is dropped first.
    fn request(&self, resource: Resource, callback: Callback) -> AsyncRequest;
}
