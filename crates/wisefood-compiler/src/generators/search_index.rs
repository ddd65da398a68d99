//! Elasticsearch search-index generator

use wisefood_common::model::{images, ports, volumes};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::ingress::PathRule;
use crate::k8s::{Container, EnvVar, PodSecurityContext, PodSpec, ServicePort, Volume, VolumeMount};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{ProbeTiming, ReadinessCheck};

use super::{
    component_route, internal_service, no_annotations, stateful_set, volume_claim, Generator,
    Owner,
};

/// Service (and workload) name
pub const SERVICE: &str = "elasticsearch";

/// Built-in superuser the password secret belongs to
pub const ELASTIC_USER: &str = "elastic";

const DATA_CLAIM: &str = "elasticsearch-data";

/// Generator for the `search-index` component
pub struct SearchIndexGenerator;

impl Generator for SearchIndexGenerator {
    fn component(&self) -> &'static str {
        "search-index"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(SERVICE, component);
        let port = model.port(ports::ELASTICSEARCH)?;

        // Security stays on; with it the HTTP endpoint answers 401 unauthenticated,
        // so readiness is a TCP check
        let env = vec![
            EnvVar::literal("discovery.type", "single-node"),
            EnvVar::literal("http.port", port.to_string()),
            EnvVar::literal("xpack.security.enabled", "true"),
            EnvVar::literal("xpack.security.http.ssl.enabled", "false"),
            EnvVar::literal("ES_JAVA_OPTS", "-Xms1g -Xmx1g"),
            secret_env(config, "ELASTIC_PASSWORD", ids::ELASTIC, fields::PASSWORD)?,
        ];
        let container = Container::new(SERVICE, model.image(images::ELASTICSEARCH)?)
            .with_env(env)
            .with_port("http", port)
            .with_readiness(ReadinessCheck::tcp(SERVICE, port).probe(ProbeTiming::after(30)))
            .with_mount(VolumeMount::new("data", "/usr/share/elasticsearch/data"));

        let pod = PodSpec {
            containers: vec![container],
            volumes: vec![Volume::from_pvc("data", DATA_CLAIM)],
            security_context: Some(PodSecurityContext {
                fs_group: Some(1000),
            }),
            ..Default::default()
        };

        let route = component_route(
            model,
            config,
            owner,
            SERVICE,
            &no_annotations(),
            &config.host(&config.subdomains.search),
            &[PathRule::prefix("/", SERVICE, port)],
        )?;

        ComponentDescriptor::from_resources(
            component,
            vec![
                stateful_set(config, SERVICE, component, pod).into(),
                internal_service(config, SERVICE, component, vec![ServicePort::tcp("http", port)])
                    .into(),
                volume_claim(
                    config,
                    DATA_CLAIM,
                    owner,
                    model.volume_size(volumes::ELASTICSEARCH)?,
                )
                .into(),
                route.into(),
            ],
        )
    }
}
