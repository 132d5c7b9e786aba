//! Transport seam and response assembly.
//!
//! A [`Transport`] answers one fetch with a [`TransportResult`]. Raw results
//! carry epoch-millisecond timestamps and an untyped body;
//! [`assemble_response`] turns them into a [`Response`] or rejects them.

use bytes::Bytes;
use futures::future::BoxFuture;

use super::resource::Resource;
use super::response::{ErrorReason, Response, Timestamp};
use super::FetchError;

/// Body value as handed over by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportBody {
    Bytes(Bytes),
    Text(String),
    /// Any other non-binary value, named by its type.
    Other(&'static str),
}

/// Successful transport answer before validation.
///
/// Timestamps are epoch milliseconds; `NaN` means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub modified: Option<f64>,
    pub expires: Option<f64>,
    pub etag: Option<String>,
    pub data: Option<TransportBody>,
}

/// Everything a transport may answer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResult {
    Error { reason: ErrorReason, message: String },
    /// Valid resource, nothing to transfer.
    NoContent,
    Response(TransportResponse),
}

impl TransportResult {
    /// Convenience for an `Other` error.
    pub fn other_error(message: impl Into<String>) -> Self {
        TransportResult::Error {
            reason: ErrorReason::Other,
            message: message.into(),
        }
    }
}

/// Fetches resources for a file source.
///
/// Implementations must be cheap to share across tasks. Dropping the
/// returned future abandons the fetch.
pub trait Transport: Send + Sync + 'static {
    fn fetch<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, TransportResult>;
}

/// Converts an epoch-millisecond value to a whole-second timestamp.
///
/// `NaN`, infinities and out-of-range values are treated as absent.
/// Sub-second precision is truncated toward zero.
pub fn timestamp_from_millis(millis: Option<f64>) -> Option<Timestamp> {
    let millis = millis?;
    if !millis.is_finite() {
        return None;
    }
    let secs = (millis / 1000.0).trunc();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    Timestamp::from_timestamp(secs as i64, 0)
}

/// Validates a transport result and builds the callback [`Response`].
///
/// # Errors
///
/// Returns [`FetchError::InvalidBody`] when a body is present but is not
/// binary data.
pub fn assemble_response(result: TransportResult) -> Result<Response, FetchError> {
    match result {
        TransportResult::Error { reason, message } => Ok(Response::error(reason, message)),
        TransportResult::NoContent => Ok(Response::no_content()),
        TransportResult::Response(raw) => {
            let data = match raw.data {
                None => None,
                Some(TransportBody::Bytes(bytes)) => Some(bytes),
                Some(TransportBody::Text(_)) => return Err(FetchError::InvalidBody("string")),
                Some(TransportBody::Other(kind)) => return Err(FetchError::InvalidBody(kind)),
            };

            Ok(Response {
                data,
                modified: timestamp_from_millis(raw.modified),
                expires: timestamp_from_millis(raw.expires),
                etag: raw.etag.filter(|etag| !etag.is_empty()),
                error: None,
                no_content: false,
            })
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted transport for tests.
    ///
    /// Answers every fetch with a clone of `result`, optionally after a
    /// delay, or never answers at all. Tracks how many fetch futures are
    /// alive so tests can observe cancellation releasing them.
    pub struct MockTransport {
        result: Option<TransportResult>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        in_flight: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn answering(result: TransportResult) -> Self {
            Self {
                result: Some(result),
                delay: None,
                calls: AtomicUsize::new(0),
                in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// A transport whose fetches never complete.
        pub fn pending() -> Self {
            Self {
                result: None,
                ..Self::answering(TransportResult::NoContent)
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn in_flight(&self) -> usize {
            self.in_flight.load(Ordering::SeqCst)
        }
    }

    struct InFlight(Arc<AtomicUsize>);

    impl InFlight {
        fn enter(counter: &Arc<AtomicUsize>) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(Arc::clone(counter))
        }
    }

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Transport for MockTransport {
        fn fetch<'a>(&'a self, _resource: &'a Resource) -> BoxFuture<'a, TransportResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _guard = InFlight::enter(&self.in_flight);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                match &self.result {
                    Some(result) => result.clone(),
                    None => futures::future::pending().await,
                }
            })
        }
    }

    #[test]
    fn test_nan_timestamps_are_absent() {
        let response = assemble_response(TransportResult::Response(TransportResponse {
            modified: Some(f64::NAN),
            expires: Some(f64::NAN),
            ..Default::default()
        }))
        .unwrap();
        assert!(response.modified.is_none());
        assert!(response.expires.is_none());
    }

    #[test]
    fn test_millis_become_seconds() {
        let response = assemble_response(TransportResult::Response(TransportResponse {
            modified: Some(1000.0),
            expires: Some(2999.0),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(response.modified.unwrap().timestamp(), 1);
        assert_eq!(response.expires.unwrap().timestamp(), 2);
    }

    #[test]
    fn test_non_finite_and_huge_timestamps_are_absent() {
        assert!(timestamp_from_millis(Some(f64::INFINITY)).is_none());
        assert!(timestamp_from_millis(Some(f64::NEG_INFINITY)).is_none());
        assert!(timestamp_from_millis(Some(1e300)).is_none());
        assert!(timestamp_from_millis(None).is_none());
    }

    #[test]
    fn test_negative_millis_truncate_toward_zero() {
        assert_eq!(timestamp_from_millis(Some(-1500.0)).unwrap().timestamp(), -1);
    }

    #[test]
    fn test_empty_etag_is_absent() {
        let response = assemble_response(TransportResult::Response(TransportResponse {
            etag: Some(String::new()),
            ..Default::default()
        }))
        .unwrap();
        assert!(response.etag.is_none());
    }

    #[test]
    fn test_non_binary_body_is_rejected() {
        let text = TransportResult::Response(TransportResponse {
            data: Some(TransportBody::Text("hello".into())),
            ..Default::default()
        });
        assert_eq!(assemble_response(text), Err(FetchError::InvalidBody("string")));

        let number = TransportResult::Response(TransportResponse {
            data: Some(TransportBody::Other("number")),
            ..Default::default()
        });
        assert_eq!(assemble_response(number), Err(FetchError::InvalidBody("number")));
    }

    #[test]
    fn test_no_content_and_error() {
        let response = assemble_response(TransportResult::NoContent).unwrap();
        assert!(response.no_content);
        assert!(response.data.is_none() && response.error.is_none());

        let response = assemble_response(TransportResult::other_error("boom")).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.reason, ErrorReason::Other);
        assert_eq!(error.message, "boom");
    }

    #[tokio::test]
    async fn test_mock_transport_answers() {
        let mock = MockTransport::answering(TransportResult::NoContent);
        let resource = Resource::tile("tile://1/0/0");
        assert_eq!(mock.fetch(&resource).await, TransportResult::NoContent);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.in_flight(), 0);
    }
}
