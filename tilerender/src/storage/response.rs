//! Terminal result of one fetch.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Whole-second UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    NotFound,
    Server,
    Connection,
    RateLimit,
    Other,
}

/// Failure reported to the callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason:?}: {message}")]
pub struct ResponseError {
    pub reason: ErrorReason,
    pub message: String,
}

/// Primary outcome of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Data,
    NoContent,
    Error,
    /// No payload, no error and no explicit no-content marker.
    Empty,
}

/// Result delivered to a fetch callback.
///
/// At most one of `data`, `error` and `no_content` is the primary outcome.
/// `modified`, `expires` and `etag` are caching metadata and may accompany
/// any outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub data: Option<Bytes>,
    pub modified: Option<Timestamp>,
    pub expires: Option<Timestamp>,
    pub etag: Option<String>,
    pub error: Option<ResponseError>,
    pub no_content: bool,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn with_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A valid "nothing changed, no body" response.
    pub fn no_content() -> Self {
        Self {
            no_content: true,
            ..Self::default()
        }
    }

    pub fn error(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            error: Some(ResponseError {
                reason,
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> ResponseOutcome {
        if self.error.is_some() {
            ResponseOutcome::Error
        } else if self.no_content {
            ResponseOutcome::NoContent
        } else if self.data.is_some() {
            ResponseOutcome::Data
        } else {
            ResponseOutcome::Empty
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes() {
        assert_eq!(Response::with_data(vec![1u8]).outcome(), ResponseOutcome::Data);
        assert_eq!(Response::no_content().outcome(), ResponseOutcome::NoContent);
        assert_eq!(
            Response::error(ErrorReason::Other, "boom").outcome(),
            ResponseOutcome::Error
        );
        assert_eq!(Response::default().outcome(), ResponseOutcome::Empty);
    }

    #[test]
    fn test_error_display() {
        let response = Response::error(ErrorReason::NotFound, "missing");
        assert_eq!(response.error.unwrap().to_string(), "NotFound: missing");
    }
}
