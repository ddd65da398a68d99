//! Compiles the wisefood platform model and a deployment configuration into
//! Kubernetes manifests
//!
//! Each platform service has a [`Generator`] that turns the model and
//! configuration into a [`ComponentDescriptor`]. [`compose`] runs the
//! generators in order and aggregates their output into one [`ResourceSet`],
//! rejecting any resource key produced twice.

#![deny(missing_docs)]

pub mod composer;
pub mod generators;
pub mod ingress;
pub mod k8s;
pub mod resources;
pub mod secrets;
pub mod wait;

pub use composer::compose;
pub use generators::{default_generators, generator_names, select_generators, Generator};
pub use resources::{kind_priority, ComponentDescriptor, Resource, ResourceSet};
