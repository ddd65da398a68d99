//! Error types for manifest generation
//!
//! Every variant names the component, resource or field at fault so a failed
//! generation can be fixed from the message alone. Generation never returns a
//! partial result: callers get a complete resource set or one of these.

use thiserror::Error;

/// Default context value when no specific component is known yet
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for wisefood generation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A generator referenced a secret identifier absent from the configuration
    #[error("missing secret reference '{secret}' required by {component}")]
    MissingSecretReference {
        /// Component that needed the secret
        component: String,
        /// Logical secret identifier that was not registered
        secret: String,
    },

    /// Two generators produced a resource with the same key
    #[error("duplicate resource '{name}' produced by {first} and {second}")]
    DuplicateResourceName {
        /// Resource key (`<kind>/<name>`)
        name: String,
        /// Component that produced the resource first
        first: String,
        /// Component that produced the colliding resource
        second: String,
    },

    /// Malformed path rules, host or scheme
    #[error("invalid route configuration for {route}: {message}")]
    InvalidRouteConfiguration {
        /// Route name
        route: String,
        /// Description of what's invalid
        message: String,
    },

    /// A generator read a model key the platform model does not define
    #[error("unresolved model field '{field}' in {component}")]
    UnresolvedModelField {
        /// Component that read the field
        component: String,
        /// Dotted model path (e.g. "ports.postgres")
        field: String,
    },

    /// Structurally invalid deployment configuration
    #[error("invalid configuration at {field}: {message}")]
    InvalidConfiguration {
        /// Configuration field path (e.g. "smtp.port")
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create a missing-secret error without component context
    pub fn missing_secret(secret: impl Into<String>) -> Self {
        Self::MissingSecretReference {
            component: UNKNOWN_CONTEXT.to_string(),
            secret: secret.into(),
        }
    }

    /// Create an unresolved-model-field error without component context
    pub fn unresolved_field(field: impl Into<String>) -> Self {
        Self::UnresolvedModelField {
            component: UNKNOWN_CONTEXT.to_string(),
            field: field.into(),
        }
    }

    /// Create a route configuration error
    pub fn invalid_route(route: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidRouteConfiguration {
            route: route.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error for the given field path
    pub fn invalid_config(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Attach the generating component to errors raised without one.
    ///
    /// Errors that already carry a component keep it.
    pub fn in_component(self, name: &str) -> Self {
        match self {
            Self::MissingSecretReference { component, secret } if component == UNKNOWN_CONTEXT => {
                Self::MissingSecretReference {
                    component: name.to_string(),
                    secret,
                }
            }
            Self::UnresolvedModelField { component, field } if component == UNKNOWN_CONTEXT => {
                Self::UnresolvedModelField {
                    component: name.to_string(),
                    field,
                }
            }
            other => other,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
