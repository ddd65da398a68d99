//! Apex-domain router
//!
//! Owns the route on the bare domain and, under `https`, the one
//! cert-manager Certificate every platform route terminates TLS with. The
//! backends belong to other components and are referenced by Service name.

use wisefood_common::model::ports;
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::ingress::PathRule;
use crate::k8s::{Certificate, CertificateSpec, IssuerRef};
use crate::resources::{ComponentDescriptor, Resource};

use super::{
    catalog_api, component_meta, component_route, no_annotations, object_store, Generator, Owner,
};

/// Route name
pub const ROUTE: &str = "platform";

/// Every host a platform route serves, apex first
pub fn platform_hosts(config: &DeploymentConfig) -> Vec<String> {
    let subdomains = &config.subdomains;
    vec![
        config.host(""),
        config.host(&subdomains.identity),
        config.host(&subdomains.storage),
        config.host(&subdomains.storage_console),
        config.host(&subdomains.search),
    ]
}

/// Generator for the `ingress-router` component
pub struct IngressRouterGenerator;

impl Generator for IngressRouterGenerator {
    fn component(&self) -> &'static str {
        "ingress-router"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(ROUTE, component);

        let rules = [
            PathRule::prefix(
                catalog_api::API_PREFIX,
                catalog_api::SERVICE,
                model.port(ports::CATALOG_API)?,
            ),
            PathRule::prefix(
                format!("/{}", model.storage.public_bucket),
                object_store::SERVICE,
                model.port(ports::MINIO_API)?,
            ),
        ];
        let route = component_route(
            model,
            config,
            owner,
            ROUTE,
            &no_annotations(),
            &config.host(""),
            &rules,
        )?;

        let mut resources: Vec<Resource> = vec![route.into()];
        if config.scheme.is_tls() {
            let name = config.tls_secret_name();
            let certificate = Certificate::new(
                component_meta(config, &name, owner),
                CertificateSpec {
                    secret_name: name.clone(),
                    dns_names: platform_hosts(config),
                    issuer_ref: IssuerRef {
                        name: config.cluster_issuer.clone(),
                        kind: "ClusterIssuer".to_string(),
                        group: "cert-manager.io".to_string(),
                    },
                },
            );
            resources.push(certificate.into());
        }

        ComponentDescriptor::from_resources(component, resources)
    }
}
