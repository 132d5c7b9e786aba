//! tilerender - core of a tiled map renderer
//!
//! Three pipelines share the crate:
//!
//! - [`storage`] fetches named resources asynchronously. Each fetch
//!   delivers at most one response and can be cancelled by dropping its
//!   [`AsyncRequest`](storage::AsyncRequest).
//! - [`tiler`] slices geographic shapes into per-tile integer geometry,
//!   and [`tile`] stores the results per [`CanonicalTileId`](coord::CanonicalTileId).
//! - [`renderer`] packs tile layers into GPU buckets and paints frames
//!   pass by pass through a [`GraphicsContext`](renderer::GraphicsContext).
//!
//! [`config`] and [`logging`] provide the INI settings file and the
//! tracing subscriber.

pub mod config;
pub mod coord;
pub mod geometry;
pub mod logging;
pub mod renderer;
pub mod storage;
pub mod tile;
pub mod tiler;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
