//! File source running each fetch as a tokio task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::request::{AsyncRequest, Callback, Delivery, PendingFetch};
use super::resource::Resource;
use super::response::{ErrorReason, Response};
use super::transport::{Transport, TransportResult};
use super::FileSource;

/// Lock-free fetch counters.
#[derive(Debug, Default)]
pub struct FetchMetrics {
    issued: AtomicU64,
    delivered: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    malformed: AtomicU64,
}

/// Point-in-time copy of [`FetchMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchMetricsSnapshot {
    /// Requests handed to the source.
    pub issued: u64,
    /// Callbacks invoked (errors included).
    pub delivered: u64,
    /// Fetches that ended without invoking the callback.
    pub cancelled: u64,
    /// Delivered responses carrying an error.
    pub failed: u64,
    /// Transport results rejected by validation.
    pub malformed: u64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }

    /// Requests issued but not yet finished either way.
    pub fn outstanding(&self) -> u64 {
        let s = self.snapshot();
        s.issued.saturating_sub(s.delivered + s.cancelled)
    }
}

/// [`FileSource`] backed by a [`Transport`], one task per request.
///
/// The task races the transport against cancellation. A cancelled fetch
/// drops its transport future, releasing whatever the transport held.
///
/// # Example
///
/// ```ignore
/// use tilerender::storage::{FileSource, HttpConfig, ReqwestTransport, Resource, TransportFileSource};
///
/// let transport = ReqwestTransport::new(&HttpConfig::default())?;
/// let source = TransportFileSource::new(transport, tokio::runtime::Handle::current());
/// let request = source.request(Resource::tile("https://example.com/0/0/0.png"), Box::new(|response| {
///     println!("{:?}", response.outcome());
/// }));
/// // Dropping `request` before the callback fires cancels the fetch.
/// ```
pub struct TransportFileSource<T: Transport> {
    transport: Arc<T>,
    runtime: Handle,
    metrics: Arc<FetchMetrics>,
}

impl<T: Transport> TransportFileSource<T> {
    pub fn new(transport: T, runtime: Handle) -> Self {
        Self {
            transport: Arc::new(transport),
            runtime,
            metrics: Arc::new(FetchMetrics::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn metrics(&self) -> Arc<FetchMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<T: Transport> FileSource for TransportFileSource<T> {
    fn request(&self, resource: Resource, callback: Callback) -> AsyncRequest {
        let (pending, request) = PendingFetch::new(resource, callback);
        FetchMetrics::record(&self.metrics.issued);
        debug!(kind = %pending.resource().kind, url = %pending.resource().url, "Fetch issued");

        let transport = Arc::clone(&self.transport);
        let metrics = Arc::clone(&self.metrics);
        self.runtime
            .spawn(async move { run_fetch(transport.as_ref(), pending, &metrics).await });

        request
    }
}

async fn run_fetch<T: Transport>(transport: &T, pending: PendingFetch, metrics: &FetchMetrics) {
    let result = tokio::select! {
        biased;

        _ = pending.cancelled() => {
            FetchMetrics::record(&metrics.cancelled);
            debug!(url = %pending.resource().url, "Fetch abandoned after cancel");
            return;
        }

        result = transport.fetch(pending.resource()) => result,
    };

    let is_error = matches!(result, TransportResult::Error { .. });
    let delivery = match pending.respond(result) {
        Ok(delivery) => {
            if is_error && delivery == Delivery::Delivered {
                FetchMetrics::record(&metrics.failed);
            }
            delivery
        }
        Err(e) => {
            warn!(url = %pending.resource().url, error = %e, "Malformed transport result");
            FetchMetrics::record(&metrics.malformed);
            let delivery = pending.deliver(Response::error(ErrorReason::Other, e.to_string()));
            if delivery == Delivery::Delivered {
                FetchMetrics::record(&metrics.failed);
            }
            delivery
        }
    };

    match delivery {
        Delivery::Delivered => {
            FetchMetrics::record(&metrics.delivered);
            debug!(url = %pending.resource().url, "Fetch delivered");
        }
        Delivery::Dropped => {
            FetchMetrics::record(&metrics.cancelled);
            debug!(url = %pending.resource().url, "Fetch completed after cancel");
        }
    }
}
