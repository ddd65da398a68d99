//! MinIO object-storage generator
//!
//! The one Service exposes both listeners. Three routes point at it: the S3
//! API host and the console host here, and the public-bucket path on the
//! apex route owned by the ingress router.

use std::collections::BTreeMap;

use wisefood_common::model::{images, ports, volumes};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::ingress::{PathRule, PROXY_BODY_SIZE_ANNOTATION};
use crate::k8s::{Container, EnvVar, PodSpec, ServicePort, Volume, VolumeMount};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{ProbeTiming, ReadinessCheck};

use super::{
    component_route, internal_service, no_annotations, stateful_set, volume_claim, Generator, Owner,
};

/// Service (and workload) name
pub const SERVICE: &str = "minio";

/// Route for the S3 API host
pub const API_ROUTE: &str = "minio";

/// Route for the web console host
pub const CONSOLE_ROUTE: &str = "minio-console";

const DATA_CLAIM: &str = "minio-data";
const DATA_DIR: &str = "/data";

/// Generator for the `object-store` component
pub struct ObjectStoreGenerator;

impl Generator for ObjectStoreGenerator {
    fn component(&self) -> &'static str {
        "object-store"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(SERVICE, component);
        let api_port = model.port(ports::MINIO_API)?;
        let console_port = model.port(ports::MINIO_CONSOLE)?;
        let api_host = config.host(&config.subdomains.storage);
        let console_host = config.host(&config.subdomains.storage_console);

        let env = vec![
            secret_env(config, "MINIO_ROOT_USER", ids::MINIO_ROOT, fields::USERNAME)?,
            secret_env(config, "MINIO_ROOT_PASSWORD", ids::MINIO_ROOT, fields::PASSWORD)?,
            EnvVar::literal("MINIO_SERVER_URL", config.external_url(&config.subdomains.storage)),
            EnvVar::literal(
                "MINIO_BROWSER_REDIRECT_URL",
                config.external_url(&config.subdomains.storage_console),
            ),
        ];

        let container = Container::new(SERVICE, model.image(images::MINIO)?)
            .with_args([
                "server".to_string(),
                DATA_DIR.to_string(),
                "--address".to_string(),
                format!(":{}", api_port),
                "--console-address".to_string(),
                format!(":{}", console_port),
            ])
            .with_env(env)
            .with_port("api", api_port)
            .with_port("console", console_port)
            .with_readiness(
                ReadinessCheck::http(SERVICE, api_port, "/minio/health/ready")
                    .probe(ProbeTiming::after(10)),
            )
            .with_mount(VolumeMount::new("data", DATA_DIR));

        let pod = PodSpec {
            containers: vec![container],
            volumes: vec![Volume::from_pvc("data", DATA_CLAIM)],
            ..Default::default()
        };

        let service = internal_service(
            config,
            SERVICE,
            component,
            vec![
                ServicePort::tcp("api", api_port),
                ServicePort::tcp("console", console_port),
            ],
        );

        // S3 uploads are unbounded
        let api_annotations =
            BTreeMap::from([(PROXY_BODY_SIZE_ANNOTATION.to_string(), "0".to_string())]);
        let api_route = component_route(
            model,
            config,
            owner,
            API_ROUTE,
            &api_annotations,
            &api_host,
            &[PathRule::prefix("/", SERVICE, api_port)],
        )?;
        let console_route = component_route(
            model,
            config,
            owner,
            CONSOLE_ROUTE,
            &no_annotations(),
            &console_host,
            &[PathRule::prefix("/", SERVICE, console_port)],
        )?;

        ComponentDescriptor::from_resources(
            component,
            vec![
                stateful_set(config, SERVICE, component, pod).into(),
                service.into(),
                volume_claim(config, DATA_CLAIM, owner, model.volume_size(volumes::MINIO)?)
                    .into(),
                api_route.into(),
                console_route.into(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::{env, main_container, secret_of};
    use crate::resources::Resource;
    use crate::testing::demo_config;
    use wisefood_common::Scheme;

    fn generate(config: &DeploymentConfig) -> ComponentDescriptor {
        ObjectStoreGenerator
            .generate(&PlatformModel::default(), config)
            .unwrap()
    }

    fn backend(descriptor: &ComponentDescriptor, key: &str) -> (String, String, u16) {
        match descriptor.get(key) {
            Some(Resource::Ingress(route)) => {
                let rule = &route.spec.rules[0];
                let service = &rule.http.paths[0].backend.service;
                (rule.host.clone(), service.name.clone(), service.port.number)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn two_routes_share_one_service() {
        let descriptor = generate(&demo_config());

        assert_eq!(
            backend(&descriptor, "ingress/minio"),
            ("s3.demo.local".to_string(), "minio".to_string(), 9000)
        );
        assert_eq!(
            backend(&descriptor, "ingress/minio-console"),
            ("minio.demo.local".to_string(), "minio".to_string(), 9001)
        );
        assert!(descriptor.get("service/minio").is_some());
        assert!(descriptor.get("service/minio-console").is_none());
    }

    #[test]
    fn root_credentials_are_secret_references() {
        let descriptor = generate(&demo_config());
        let container = main_container(&descriptor);
        assert_eq!(secret_of(container, "MINIO_ROOT_USER"), "demo-minio-root");
        assert_eq!(secret_of(container, "MINIO_ROOT_PASSWORD"), "demo-minio-root");
    }

    #[test]
    fn external_urls_follow_scheme() {
        let mut config = demo_config();
        config.scheme = Scheme::Https;
        let descriptor = generate(&config);
        let container = main_container(&descriptor);

        assert_eq!(
            env(container, "MINIO_SERVER_URL").value.as_deref(),
            Some("https://s3.demo.local")
        );
        assert_eq!(
            env(container, "MINIO_BROWSER_REDIRECT_URL").value.as_deref(),
            Some("https://minio.demo.local")
        );
    }

    #[test]
    fn api_route_lifts_body_limit() {
        let descriptor = generate(&demo_config());
        match descriptor.get("ingress/minio") {
            Some(Resource::Ingress(route)) => assert_eq!(
                route.metadata.annotations.get(PROXY_BODY_SIZE_ANNOTATION),
                Some(&"0".to_string())
            ),
            other => panic!("unexpected {:?}", other),
        }
    }
}
