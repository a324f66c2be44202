use std::{collections::HashSet, net::SocketAddr};

use http::{HeaderValue, Method};
use tracing_subscriber::EnvFilter;

use crate::{
    adapters::proxy_route::validate_target,
    config::models::{EngineConfig, RouteConfig},
    core::RoutePattern,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Engine configuration validator
pub struct EngineConfigValidator;

impl EngineConfigValidator {
    /// Validate the entire configuration, reporting every problem at once
    pub fn validate(config: &EngineConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        errors.extend(Self::validate_logging(config));

        if let Err(e) = config.proxy.timeout() {
            errors.push(ValidationError::InvalidField {
                field: "proxy.timeout".to_string(),
                message: e.to_string(),
            });
        }

        if !config.api_version.is_empty() && !config.api_version.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "api_version".to_string(),
                message: "API version prefix must be empty or start with '/'".to_string(),
            });
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        }
        for (index, route) in config.routes.iter().enumerate() {
            errors.extend(Self::validate_single_route(index, &config.api_version, route));
        }
        errors.extend(Self::check_route_conflicts(&config.routes));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_logging(config: &EngineConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Err(e) = EnvFilter::try_new(&config.logging.level) {
            errors.push(ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: e.to_string(),
            });
        }
        if let Err(e) = config.logging.slow_request_threshold() {
            errors.push(ValidationError::InvalidField {
                field: "logging.slow_request_threshold".to_string(),
                message: e.to_string(),
            });
        }
        errors
    }

    fn validate_single_route(
        index: usize,
        api_version: &str,
        route: &RouteConfig,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let field = |name: &str| format!("routes[{index}].{name}");

        if let Err(e) = RoutePattern::compile(&format!("{api_version}{}", route.pattern())) {
            errors.push(ValidationError::InvalidField {
                field: field("pattern"),
                message: e.to_string(),
            });
        }

        if Method::from_bytes(route.method().as_bytes()).is_err() {
            errors.push(ValidationError::InvalidField {
                field: field("method"),
                message: format!("'{}' is not a valid HTTP method token", route.method()),
            });
        }

        match route {
            RouteConfig::Proxy { target, .. } => {
                if let Err(e) = validate_target(target) {
                    errors.push(ValidationError::InvalidField {
                        field: field("target"),
                        message: e.to_string(),
                    });
                }
            }
            RouteConfig::Redirect { location, .. } => {
                if location.is_empty() || HeaderValue::from_str(location).is_err() {
                    errors.push(ValidationError::InvalidField {
                        field: field("location"),
                        message: "Redirect location must be a non-empty header-safe string"
                            .to_string(),
                    });
                }
            }
        }
        errors
    }

    fn check_route_conflicts(routes: &[RouteConfig]) -> Vec<ValidationError> {
        let mut seen = HashSet::new();
        routes
            .iter()
            .filter(|route| !seen.insert((route.method().to_ascii_uppercase(), route.pattern())))
            .map(|route| ValidationError::RouteConflict {
                message: format!(
                    "[{}]:{} is configured more than once",
                    route.method().to_ascii_uppercase(),
                    route.pattern()
                ),
            })
            .collect()
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> EngineConfig {
        EngineConfig {
            routes: vec![RouteConfig::Proxy {
                pattern: "/api/**".to_string(),
                method: "GET".to_string(),
                target: "http://backend:8080".to_string(),
                rewrite: false,
            }],
            ..EngineConfig::default()
        }
    }

    fn failure_message(config: &EngineConfig) -> String {
        match EngineConfigValidator::validate(config) {
            Err(ValidationError::ValidationFailed { message }) => message,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(EngineConfigValidator::validate(&minimal_valid_config()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_listen_address() {
        let mut config = minimal_valid_config();
        config.listen_addr = "localhost".to_string();
        assert!(failure_message(&config).contains("Invalid listen address"));
    }

    #[test]
    fn validate_rejects_empty_routes() {
        let mut config = minimal_valid_config();
        config.routes.clear();
        assert!(failure_message(&config).contains("routes"));
    }

    #[test]
    fn validate_collects_every_route_problem() {
        let mut config = minimal_valid_config();
        config.routes = vec![
            RouteConfig::Proxy {
                pattern: "api".to_string(),
                method: "GET".to_string(),
                target: "backend:8080".to_string(),
                rewrite: false,
            },
            RouteConfig::Redirect {
                pattern: "/old".to_string(),
                method: "BAD METHOD".to_string(),
                location: String::new(),
            },
        ];

        let message = failure_message(&config);
        assert!(message.starts_with("Found 4 validation errors"));
        assert!(message.contains("routes[0].pattern"));
        assert!(message.contains("routes[0].target"));
        assert!(message.contains("routes[1].method"));
        assert!(message.contains("routes[1].location"));
    }

    #[test]
    fn validate_rejects_duplicate_method_and_pattern() {
        let mut config = minimal_valid_config();
        config.routes.push(RouteConfig::Redirect {
            pattern: "/api/**".to_string(),
            method: "get".to_string(),
            location: "/elsewhere".to_string(),
        });
        assert!(failure_message(&config).contains("Route conflict detected"));
    }

    #[test]
    fn validate_rejects_bad_durations() {
        let mut config = minimal_valid_config();
        config.logging.slow_request_threshold = "slowly".to_string();
        config.proxy.timeout = Some("1 fortnight-ish".to_string());
        let message = failure_message(&config);
        assert!(message.contains("logging.slow_request_threshold"));
        assert!(message.contains("proxy.timeout"));
    }
}
