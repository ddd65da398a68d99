//! Redis cache generator
//!
//! Internal only: no route, and an emptyDir instead of a claim since the
//! cache is rebuilt from the database after a restart.

use wisefood_common::model::{images, ports};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::k8s::{Container, PodSpec, ServicePort, Volume, VolumeMount};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{ProbeTiming, ReadinessCheck};

use super::{internal_service, stateful_set, Generator};

/// Service (and workload) name
pub const SERVICE: &str = "redis";

/// Generator for the `cache` component
pub struct CacheGenerator;

impl Generator for CacheGenerator {
    fn component(&self) -> &'static str {
        "cache"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let port = model.port(ports::REDIS)?;
        let ready = ReadinessCheck::tcp(SERVICE, port);

        // $(VAR) is expanded by the kubelet, so the password never lands in the pod spec
        let container = Container::new(SERVICE, model.image(images::REDIS)?)
            .with_command(["redis-server"])
            .with_args([
                "--port".to_string(),
                port.to_string(),
                "--requirepass".to_string(),
                "$(REDIS_PASSWORD)".to_string(),
                "--appendonly".to_string(),
                "no".to_string(),
            ])
            .with_env([secret_env(config, "REDIS_PASSWORD", ids::REDIS, fields::PASSWORD)?])
            .with_port("redis", port)
            .with_readiness(ready.probe(ProbeTiming::after(5)))
            .with_mount(VolumeMount::new("data", "/data"));

        let pod = PodSpec {
            containers: vec![container],
            volumes: vec![Volume::from_empty_dir("data")],
            ..Default::default()
        };

        ComponentDescriptor::from_resources(
            component,
            vec![
                stateful_set(config, SERVICE, component, pod).into(),
                internal_service(config, SERVICE, component, vec![ServicePort::tcp("redis", port)])
                    .into(),
            ],
        )
    }
}
