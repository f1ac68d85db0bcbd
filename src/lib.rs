//! CRUSH rule-set REST service library.

pub mod admin;
pub mod cluster;
pub mod config;
pub mod crush;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use cluster::{ClusterRegistry, Fsid};
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
