//! HTTP transport: maps the `AssetGraph` operations to JSON endpoints.

pub mod http;

pub use http::{create_router, HttpApiServer};
