//! Component generators
//!
//! One generator per platform service. A generator is a pure function of the
//! model and configuration: it reads nothing else, sees no other generator's
//! output and returns a fresh [`ComponentDescriptor`] on every call.
//!
//! Cross-service wiring happens by name only. A generator that needs another
//! service (a wait step, a connection URL, a route backend) refers to the
//! owning module's `SERVICE` constant and never emits that service's
//! resources itself.

use std::collections::BTreeMap;

use wisefood_common::model::images;
use wisefood_common::{
    DeploymentConfig, Error, PlatformModel, Result, LABEL_COMPONENT, LABEL_NAME, LABEL_PART_OF,
    LABEL_PART_OF_WISEFOOD,
};

use crate::ingress::{build_route, PathRule};
use crate::k8s::{
    selector_labels, Deployment, DeploymentSpec, Ingress, LabelSelector, ObjectMeta,
    PersistentVolumeClaim, PodMeta, PodSpec, PodTemplateSpec, PvcResources, PvcSpec, PvcStorage,
    Service, ServicePort, ServiceSpec, StatefulSet, StatefulSetSpec,
};
use crate::resources::ComponentDescriptor;
use crate::wait::WaitParams;

pub mod cache;
pub mod catalog_api;
pub mod database;
pub mod identity_provider;
pub mod ingress_router;
pub mod init_job;
pub mod object_store;
pub mod search_index;

pub use cache::CacheGenerator;
pub use catalog_api::CatalogApiGenerator;
pub use database::DatabaseGenerator;
pub use identity_provider::IdentityProviderGenerator;
pub use ingress_router::IngressRouterGenerator;
pub use init_job::InitJobGenerator;
pub use object_store::ObjectStoreGenerator;
pub use search_index::SearchIndexGenerator;

/// Produces the resources of one platform service.
///
/// # Example
///
/// ```ignore
/// struct MailRelayGenerator;
///
/// impl Generator for MailRelayGenerator {
///     fn component(&self) -> &'static str { "mail-relay" }
///
///     fn generate(&self, model: &PlatformModel, config: &DeploymentConfig)
///         -> Result<ComponentDescriptor>
///     {
///         let service = internal_service(config, "mail-relay", self.component(), vec![...]);
///         ComponentDescriptor::from_resources(self.component(), vec![service.into()])
///     }
/// }
/// ```
pub trait Generator: Send + Sync {
    /// Component name (used in error attribution and logging)
    fn component(&self) -> &'static str;

    /// Generate the component's resources.
    ///
    /// Errors may leave the component unset; the composer attributes them.
    fn generate(&self, model: &PlatformModel, config: &DeploymentConfig)
        -> Result<ComponentDescriptor>;
}

/// All generators in canonical order
pub fn default_generators() -> Vec<Box<dyn Generator>> {
    vec![
        Box::new(DatabaseGenerator),
        Box::new(CacheGenerator),
        Box::new(SearchIndexGenerator),
        Box::new(ObjectStoreGenerator),
        Box::new(IdentityProviderGenerator),
        Box::new(CatalogApiGenerator),
        Box::new(IngressRouterGenerator),
        Box::new(InitJobGenerator),
    ]
}

/// Component names in canonical order
pub fn generator_names() -> Vec<&'static str> {
    default_generators().iter().map(|g| g.component()).collect()
}

/// Generators for the named components, in canonical order.
///
/// Unknown names are rejected rather than skipped.
pub fn select_generators<S: AsRef<str>>(names: &[S]) -> Result<Vec<Box<dyn Generator>>> {
    let known = generator_names();
    if let Some(unknown) = names.iter().find(|n| !known.contains(&n.as_ref())) {
        return Err(Error::invalid_config(
            "only",
            format!(
                "unknown component '{}', expected one of: {}",
                unknown.as_ref(),
                known.join(", ")
            ),
        ));
    }
    Ok(default_generators()
        .into_iter()
        .filter(|g| names.iter().any(|n| n.as_ref() == g.component()))
        .collect())
}

// =============================================================================
// Shared building blocks
// =============================================================================

/// The service a resource belongs to and that service's platform role.
///
/// Every resource of a service carries the same name/component label pair,
/// whatever the resource itself is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Owner<'a> {
    pub service: &'a str,
    pub component: &'a str,
}

impl<'a> Owner<'a> {
    pub fn new(service: &'a str, component: &'a str) -> Self {
        Self { service, component }
    }
}

/// Metadata for a resource named `name` owned by `owner`
pub(crate) fn component_meta(config: &DeploymentConfig, name: &str, owner: Owner<'_>) -> ObjectMeta {
    ObjectMeta::new(name, &config.namespace)
        .with_label(LABEL_NAME, owner.service)
        .with_label(LABEL_COMPONENT, owner.component)
}

/// Pod template labelled with the selector pair
pub(crate) fn pod_template(name: &str, component: &str, spec: PodSpec) -> PodTemplateSpec {
    let mut labels = selector_labels(name, component);
    labels.insert(LABEL_PART_OF.to_string(), LABEL_PART_OF_WISEFOOD.to_string());
    PodTemplateSpec {
        metadata: PodMeta { labels },
        spec,
    }
}

/// Single-replica StatefulSet governed by the Service of the same name
pub(crate) fn stateful_set(
    config: &DeploymentConfig,
    name: &str,
    component: &str,
    spec: PodSpec,
) -> StatefulSet {
    StatefulSet::new(
        component_meta(config, name, Owner::new(name, component)),
        StatefulSetSpec {
            service_name: name.to_string(),
            replicas: 1,
            selector: LabelSelector {
                match_labels: selector_labels(name, component),
            },
            template: pod_template(name, component, spec),
        },
    )
}

/// Replicated stateless Deployment
pub(crate) fn deployment(
    config: &DeploymentConfig,
    name: &str,
    component: &str,
    replicas: u32,
    spec: PodSpec,
) -> Deployment {
    Deployment::new(
        component_meta(config, name, Owner::new(name, component)),
        DeploymentSpec {
            replicas,
            selector: LabelSelector {
                match_labels: selector_labels(name, component),
            },
            template: pod_template(name, component, spec),
        },
    )
}

/// ClusterIP Service selecting the workload's pods
pub(crate) fn internal_service(
    config: &DeploymentConfig,
    name: &str,
    component: &str,
    ports: Vec<ServicePort>,
) -> Service {
    Service::new(
        component_meta(config, name, Owner::new(name, component)),
        ServiceSpec {
            selector: selector_labels(name, component),
            ports,
            type_: "ClusterIP".to_string(),
        },
    )
}

/// ReadWriteOnce claim on the configured StorageClass
pub(crate) fn volume_claim(
    config: &DeploymentConfig,
    name: &str,
    owner: Owner<'_>,
    size: &str,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim::new(
        component_meta(config, name, owner),
        PvcSpec {
            access_modes: vec!["ReadWriteOnce".to_string()],
            resources: PvcResources {
                requests: PvcStorage {
                    storage: size.to_string(),
                },
            },
            storage_class_name: config.storage_class.clone(),
        },
    )
}

/// Route owned by `owner`, labelled like the owner's other resources
pub(crate) fn component_route(
    model: &PlatformModel,
    config: &DeploymentConfig,
    owner: Owner<'_>,
    name: &str,
    annotations: &BTreeMap<String, String>,
    host: &str,
    path_rules: &[PathRule],
) -> Result<Ingress> {
    let mut route = build_route(model, config, name, annotations, host, path_rules)?;
    route.metadata = route
        .metadata
        .with_label(LABEL_NAME, owner.service)
        .with_label(LABEL_COMPONENT, owner.component);
    Ok(route)
}

/// Wait parameters using the model's wait image
pub(crate) fn wait_params(model: &PlatformModel) -> Result<WaitParams> {
    model.image(images::WAIT).map(WaitParams::new)
}

/// No annotations
pub(crate) fn no_annotations() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::k8s::{Container, EnvVar, PodSpec};
    use crate::resources::{ComponentDescriptor, Resource};

    /// Pod spec of the descriptor's single workload
    pub fn pod_spec(descriptor: &ComponentDescriptor) -> &PodSpec {
        let workload = descriptor
            .resources()
            .values()
            .find(|r| r.is_workload())
            .expect("descriptor has a workload");
        match workload {
            Resource::StatefulSet(s) => &s.spec.template.spec,
            Resource::Deployment(d) => &d.spec.template.spec,
            Resource::Job(j) => &j.spec.template.spec,
            _ => unreachable!(),
        }
    }

    /// First container of the descriptor's workload
    pub fn main_container(descriptor: &ComponentDescriptor) -> &Container {
        &pod_spec(descriptor).containers[0]
    }

    /// Env var by name
    pub fn env<'a>(container: &'a Container, name: &str) -> &'a EnvVar {
        container
            .env
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("env var {} not set", name))
    }

    /// Secret object name behind an env var
    pub fn secret_of(container: &Container, name: &str) -> String {
        env(container, name)
            .value_from
            .as_ref()
            .map(|s| s.secret_key_ref.name.clone())
            .unwrap_or_else(|| panic!("env var {} is not a secret reference", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order() {
        assert_eq!(
            generator_names(),
            vec![
                "database",
                "cache",
                "search-index",
                "object-store",
                "identity-provider",
                "catalog-api",
                "ingress-router",
                "init-job",
            ]
        );
    }

    #[test]
    fn selection_keeps_canonical_order() {
        let selected = select_generators(&["identity-provider", "database"]).unwrap();
        let names: Vec<_> = selected.iter().map(|g| g.component()).collect();
        assert_eq!(names, vec!["database", "identity-provider"]);
    }

    #[test]
    fn selection_rejects_unknown_components() {
        let err = select_generators(&["database", "mailer"]).err().unwrap();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "only"));
        assert!(err.to_string().contains("mailer"));
    }
}
