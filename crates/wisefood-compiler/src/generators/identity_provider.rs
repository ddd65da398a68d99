//! Keycloak identity-provider generator
//!
//! Keycloak keeps its state in the shared PostgreSQL instance, so it runs
//! as a Deployment and waits for the database before starting. Health and
//! readiness are served on the separate management port.

use wisefood_common::model::{images, ports};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::ingress::PathRule;
use crate::k8s::{Container, EnvVar, PodSpec, ServicePort};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{init_containers, wait_for, ProbeTiming, ReadinessCheck, WaitParams};

use super::{
    component_route, database, deployment, internal_service, no_annotations, Generator, Owner,
};

/// Service (and workload) name
pub const SERVICE: &str = "keycloak";

/// Readiness endpoint on the management port
pub const HEALTH_PATH: &str = "/health/ready";

/// Readiness check dependents use to wait for the identity provider
pub fn health_check(model: &PlatformModel) -> Result<ReadinessCheck> {
    Ok(ReadinessCheck::http(
        SERVICE,
        model.port(ports::KEYCLOAK_MANAGEMENT)?,
        HEALTH_PATH,
    ))
}

/// In-cluster base URL
pub fn internal_url(model: &PlatformModel) -> Result<String> {
    Ok(format!(
        "http://{}:{}",
        SERVICE,
        model.port(ports::KEYCLOAK_HTTP)?
    ))
}

/// Generator for the `identity-provider` component
pub struct IdentityProviderGenerator;

impl Generator for IdentityProviderGenerator {
    fn component(&self) -> &'static str {
        "identity-provider"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(SERVICE, component);
        let http_port = model.port(ports::KEYCLOAK_HTTP)?;
        let management_port = model.port(ports::KEYCLOAK_MANAGEMENT)?;
        let db_port = model.port(ports::POSTGRES)?;
        let account = &model.database.identity_provider;

        let env = vec![
            EnvVar::literal("KC_HOSTNAME", config.external_url(&config.subdomains.identity)),
            EnvVar::literal("KC_HTTP_ENABLED", "true"),
            EnvVar::literal("KC_HTTP_PORT", http_port.to_string()),
            EnvVar::literal("KC_HTTP_MANAGEMENT_PORT", management_port.to_string()),
            EnvVar::literal("KC_PROXY_HEADERS", "xforwarded"),
            EnvVar::literal("KC_HEALTH_ENABLED", "true"),
            EnvVar::literal("KC_DB", "postgres"),
            EnvVar::literal(
                "KC_DB_URL",
                format!(
                    "jdbc:postgresql://{}:{}/{}",
                    database::SERVICE,
                    db_port,
                    account.database
                ),
            ),
            EnvVar::literal("KC_DB_USERNAME", &account.user),
            secret_env(config, "KC_DB_PASSWORD", ids::POSTGRES_IDENTITY, fields::PASSWORD)?,
            secret_env(
                config,
                "KC_BOOTSTRAP_ADMIN_USERNAME",
                ids::KEYCLOAK_ADMIN,
                fields::USERNAME,
            )?,
            secret_env(
                config,
                "KC_BOOTSTRAP_ADMIN_PASSWORD",
                ids::KEYCLOAK_ADMIN,
                fields::PASSWORD,
            )?,
        ];

        let container = Container::new(SERVICE, model.image(images::KEYCLOAK)?)
            .with_args(["start"])
            .with_env(env)
            .with_port("http", http_port)
            .with_port("management", management_port)
            .with_readiness(health_check(model)?.probe(ProbeTiming::after(30)))
            .with_liveness(
                ReadinessCheck::http(SERVICE, management_port, "/health/live")
                    .probe(ProbeTiming::after(60)),
            );

        // pg_isready ships with the database image, not the generic wait image
        let steps = [wait_for(
            database::SERVICE,
            database::pg_isready(model, database::SERVICE)?,
            &WaitParams::new(model.image(images::POSTGRES)?),
        )];

        let pod = PodSpec {
            init_containers: init_containers(&steps),
            containers: vec![container],
            ..Default::default()
        };

        let service = internal_service(
            config,
            SERVICE,
            component,
            vec![
                ServicePort::tcp("http", http_port),
                ServicePort::tcp("management", management_port),
            ],
        );
        let route = component_route(
            model,
            config,
            owner,
            SERVICE,
            &no_annotations(),
            &config.host(&config.subdomains.identity),
            &[PathRule::prefix("/", SERVICE, http_port)],
        )?;

        ComponentDescriptor::from_resources(
            component,
            vec![
                deployment(config, SERVICE, component, model.replicas(images::KEYCLOAK)?, pod)
                    .into(),
                service.into(),
                route.into(),
            ],
        )
    }
}
