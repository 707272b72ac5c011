//! HTTP API layer for the showroom admin server.
//!
//! - **Endpoints**: collections, collection images, gallery and manifest
//! - **Extractors**: lenient JSON bodies with uniform error responses
//! - **Middleware**: application state, CORS preflight handling
//!
//! Requests that match no endpoint fall through to static files from the
//! document root.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{app, router};
pub use middleware::AppState;
