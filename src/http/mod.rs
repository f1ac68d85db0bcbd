//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → limits.rs (in-flight request limit)
//!     → auth.rs (bearer token on /api/*)
//!     → handlers.rs (cluster registry lookups)
//!     → error.rs (JSON error bodies)
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod request;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
