//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check cluster ids are UUIDs and unique
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::cluster::Fsid;
use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("clusters: invalid fsid '{0}'")]
    InvalidFsid(String),

    #[error("clusters: duplicate fsid '{0}'")]
    DuplicateFsid(String),

    #[error("clusters: cluster '{0}' has an empty crush_map path")]
    EmptyCrushMap(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::Empty("listener.tls.cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::Empty("listener.tls.key_path"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.shutdown_grace_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::Empty("admin.api_key"));
    }
    if matches!(config.security.api_key.as_deref(), Some("")) {
        errors.push(ValidationError::Empty("security.api_key"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }

    if config.inventory.refresh_enabled && config.inventory.refresh_interval_secs == 0 {
        errors.push(ValidationError::Zero("inventory.refresh_interval_secs"));
    }

    let mut seen = HashSet::new();
    for cluster in &config.clusters {
        match cluster.fsid.parse::<Fsid>() {
            Ok(fsid) => {
                if !seen.insert(fsid) {
                    errors.push(ValidationError::DuplicateFsid(cluster.fsid.clone()));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidFsid(cluster.fsid.clone())),
        }
        if cluster.crush_map.trim().is_empty() {
            errors.push(ValidationError::EmptyCrushMap(cluster.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
