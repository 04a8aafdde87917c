use std::error::Error;

use thiserror::Error;

use super::key::ServiceKey;

/// Error type for resolution operations.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The container has not been built yet, so nothing is resolvable.
    #[error("container has not been built; cannot resolve {service}")]
    NotBuilt { service: String },
    /// No active registration for the requested service.
    #[error("no registration for service {service}")]
    NotRegistered { service: String },
    /// A required constructor parameter was neither supplied nor resolvable.
    #[error("cannot construct {service}: missing parameter `{parameter}`")]
    MissingParameter { service: String, parameter: String },
    /// A named argument was supplied with a value of the wrong type.
    #[error("cannot construct {service}: parameter `{parameter}` is not a {expected}")]
    ParameterType {
        service: String,
        parameter: String,
        expected: &'static str,
    },
    /// Resolving the service requires resolving itself.
    #[error("circular dependency: {chain}")]
    Circular { chain: String },
    /// The stored instance is not of the requested type.
    #[error("instance registered for {service} is not a {requested}")]
    TypeMismatch {
        service: String,
        requested: &'static str,
    },
    /// The component constructor itself failed.
    #[error("constructing {service} failed: {source}")]
    Construction {
        service: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl ResolutionError {
    pub fn not_registered(service: &ServiceKey) -> Self {
        ResolutionError::NotRegistered {
            service: service.to_string(),
        }
    }

    /// Wrap a constructor failure for `service`.
    pub fn construction(
        service: &ServiceKey,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        ResolutionError::Construction {
            service: service.to_string(),
            source: source.into(),
        }
    }

    /// The service name the error refers to, when there is a single one.
    pub fn service(&self) -> Option<&str> {
        match self {
            ResolutionError::NotBuilt { service }
            | ResolutionError::NotRegistered { service }
            | ResolutionError::MissingParameter { service, .. }
            | ResolutionError::ParameterType { service, .. }
            | ResolutionError::TypeMismatch { service, .. }
            | ResolutionError::Construction { service, .. } => Some(service),
            ResolutionError::Circular { .. } => None,
        }
    }
}
