//! Cluster inventory subsystem.
//!
//! # Data Flow
//! ```text
//! [[clusters]] config
//!     → registry.rs (one entry per fsid, apply on reload)
//!     → entry.refresh() reads the CRUSH dump
//!     → CrushSnapshot swapped in atomically
//!
//! refresh.rs ticks every refresh_interval_secs → registry.refresh_all()
//! ```

pub mod fsid;
pub mod refresh;
pub mod registry;

pub use fsid::{Fsid, InvalidFsid};
pub use refresh::RefreshMonitor;
pub use registry::{
    ClusterEntry, ClusterRegistry, ClusterStatus, ClusterSummary, CrushSnapshot, RegistryError,
};
