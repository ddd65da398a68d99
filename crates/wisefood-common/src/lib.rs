//! Common types for wisefood: platform model, deployment configuration, errors

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod model;

pub use config::{AdminContact, DeploymentConfig, Scheme, SmtpConfig, Subdomains};
pub use error::Error;
pub use model::PlatformModel;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key naming the service a resource belongs to (selector level one)
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Label key naming the platform role of a resource (selector level two)
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Label key grouping every resource of the platform
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value of the part-of label
pub const LABEL_PART_OF_WISEFOOD: &str = "wisefood";

/// Label key for the tool that produced a resource
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label
pub const LABEL_MANAGED_BY_WISEFOOD: &str = "wisefood-compiler";
