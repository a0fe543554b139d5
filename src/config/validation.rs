//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Report a broken route table without rejecting the config
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Route text is only warned about: the engine fails open on it per request

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;
use crate::routing::RouteTable;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("routing.fallback_origin '{0}' is not an absolute URL")]
    FallbackOrigin(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if let Some(origin) = &config.routing.fallback_origin {
        if Url::parse(origin).is_err() {
            errors.push(ValidationError::FallbackOrigin(origin.clone()));
        }
    }

    if !config.routing.routes.trim().is_empty() {
        if let Err(e) = RouteTable::try_parse(&config.routing.routes) {
            tracing::warn!(error = %e, "Route table is invalid; all requests will pass through");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RouterConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.routing.fallback_origin = Some("/relative".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroTimeout("request_secs")));
        assert!(errors.contains(&ValidationError::FallbackOrigin("/relative".into())));
    }

    #[test]
    fn test_broken_routes_do_not_fail_validation() {
        let mut config = RouterConfig::default();
        config.routing.routes = "{not json".into();
        assert!(validate_config(&config).is_ok());
    }
}
