//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs after CLI overrides, before anything binds

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("shutdown.timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("no listener is enabled")]
    NoListeners,

    #[error("listener #{index} has an empty name")]
    EmptyListenerName { index: usize },

    #[error("listener name '{0}' is used more than once")]
    DuplicateListenerName(String),

    #[error("listener '{name}' has invalid bind address '{address}'")]
    InvalidBindAddress { name: String, address: String },

    #[error("bind address '{0}' is used by more than one listener")]
    DuplicateBindAddress(String),

    #[error("listener '{0}' must allow at least one connection")]
    ZeroMaxConnections(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check a fully-merged configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.domain.trim().is_empty() {
        errors.push(ValidationError::EmptyDomain);
    }
    if config.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }
    if config.enabled_listeners().next().is_none() {
        errors.push(ValidationError::NoListeners);
    }

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();
    for (index, listener) in config.enabled_listeners().enumerate() {
        if listener.name.trim().is_empty() {
            errors.push(ValidationError::EmptyListenerName { index });
        } else if !names.insert(listener.name.as_str()) {
            errors.push(ValidationError::DuplicateListenerName(listener.name.clone()));
        }

        match listener.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                // Port 0 asks the OS for a fresh port, so it never collides.
                if addr.port() != 0 && !addresses.insert(addr) {
                    errors.push(ValidationError::DuplicateBindAddress(
                        listener.bind_address.clone(),
                    ));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidBindAddress {
                name: listener.name.clone(),
                address: listener.bind_address.clone(),
            }),
        }

        if listener.max_connections == 0 {
            errors.push(ValidationError::ZeroMaxConnections(listener.name.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
