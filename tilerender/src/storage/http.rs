//! HTTP transport using reqwest.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, ETAG, EXPIRES, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use tracing::debug;

use super::resource::Resource;
use super::response::ErrorReason;
use super::transport::{Transport, TransportBody, TransportResponse, TransportResult};
use super::FetchError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("tilerender/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// [`Transport`] over HTTP(S).
///
/// Status codes map onto [`TransportResult`] as follows:
///
/// | Status            | Result                      |
/// |-------------------|-----------------------------|
/// | 2xx               | `Response` with body        |
/// | 204, 304          | `NoContent`                 |
/// | 404               | `Error(NotFound)`           |
/// | 429               | `Error(RateLimit)`          |
/// | 5xx               | `Error(Server)`             |
/// | other             | `Error(Other)`              |
///
/// Connect failures and timeouts are `Error(Connection)`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get(&self, resource: &Resource) -> TransportResult {
        let mut request = self.client.get(&resource.url);
        if let Some(etag) = &resource.prior_etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return request_error(&e),
        };

        let status = response.status();
        debug!(url = %resource.url, status = status.as_u16(), "HTTP response");
        if let Some(result) = status_result(status, &resource.url) {
            return result;
        }

        let headers = response.headers();
        let modified = header_millis(headers, LAST_MODIFIED);
        let expires = header_millis(headers, EXPIRES);
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(body) => TransportResult::Response(TransportResponse {
                modified,
                expires,
                etag,
                data: Some(TransportBody::Bytes(body)),
            }),
            Err(e) => request_error(&e),
        }
    }
}

impl Transport for ReqwestTransport {
    fn fetch<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, TransportResult> {
        Box::pin(self.get(resource))
    }
}

/// Result for statuses that carry no usable body, `None` for success.
fn status_result(status: StatusCode, url: &str) -> Option<TransportResult> {
    if status == StatusCode::NOT_MODIFIED || status == StatusCode::NO_CONTENT {
        return Some(TransportResult::NoContent);
    }
    if status.is_success() {
        return None;
    }

    let reason = match status {
        StatusCode::NOT_FOUND => ErrorReason::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorReason::RateLimit,
        s if s.is_server_error() => ErrorReason::Server,
        _ => ErrorReason::Other,
    };
    Some(TransportResult::Error {
        reason,
        message: format!("HTTP {} from {}", status, url),
    })
}

fn request_error(e: &reqwest::Error) -> TransportResult {
    let reason = if e.is_connect() || e.is_timeout() {
        ErrorReason::Connection
    } else {
        ErrorReason::Other
    };
    TransportResult::Error {
        reason,
        message: e.to_string(),
    }
}

/// Parses an HTTP date header into epoch milliseconds.
fn header_millis(headers: &HeaderMap, name: HeaderName) -> Option<f64> {
    let value = headers.get(name)?.to_str().ok()?;
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.timestamp_millis() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn reason(status: u16) -> Option<ErrorReason> {
        match status_result(StatusCode::from_u16(status).unwrap(), "http://x") {
            Some(TransportResult::Error { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_result(StatusCode::OK, "u"), None);
        assert_eq!(
            status_result(StatusCode::NOT_MODIFIED, "u"),
            Some(TransportResult::NoContent)
        );
        assert_eq!(
            status_result(StatusCode::NO_CONTENT, "u"),
            Some(TransportResult::NoContent)
        );
        assert_eq!(reason(404), Some(ErrorReason::NotFound));
        assert_eq!(reason(429), Some(ErrorReason::RateLimit));
        assert_eq!(reason(503), Some(ErrorReason::Server));
        assert_eq!(reason(403), Some(ErrorReason::Other));
    }

    #[test]
    fn test_http_date_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Thu, 01 Jan 1970 00:00:01 GMT"),
        );
        headers.insert(EXPIRES, HeaderValue::from_static("0"));

        assert_eq!(header_millis(&headers, LAST_MODIFIED), Some(1000.0));
        assert_eq!(header_millis(&headers, EXPIRES), None);
        assert_eq!(header_millis(&headers, ETAG), None);
    }

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert!(config.user_agent.starts_with("tilerender/"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
