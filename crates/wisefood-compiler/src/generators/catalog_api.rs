//! Catalog API generator
//!
//! Stateless; reached only through the apex route owned by the ingress
//! router. Every URL handed to the application is composed here from the
//! model and configuration so the same image runs under either scheme.

use wisefood_common::model::{brokers, clients, images, ports};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::k8s::{Container, EnvVar, PodSpec, ServicePort};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{init_containers, wait_for, ProbeTiming, ReadinessCheck};

use super::{
    cache, database, deployment, identity_provider, internal_service, object_store,
    search_index, wait_params, Generator,
};

/// Service (and workload) name
pub const SERVICE: &str = "catalog-api";

/// Path prefix the API is served under on the apex host
pub const API_PREFIX: &str = "/api";

const HEALTH_PATH: &str = "/api/health";

/// Generator for the `catalog-api` component
pub struct CatalogApiGenerator;

impl CatalogApiGenerator {
    fn env(model: &PlatformModel, config: &DeploymentConfig) -> Result<Vec<EnvVar>> {
        let realm = &model.identity.realm;
        let identity_url = config.external_url(&config.subdomains.identity);
        let app = &model.database.application;

        Ok(vec![
            EnvVar::literal("PUBLIC_URL", config.external_url("")),
            EnvVar::literal("API_ROOT_PATH", API_PREFIX),
            EnvVar::literal("DATABASE_HOST", database::SERVICE),
            EnvVar::literal("DATABASE_PORT", model.port(ports::POSTGRES)?.to_string()),
            EnvVar::literal("DATABASE_NAME", &app.database),
            EnvVar::literal("DATABASE_USER", &app.user),
            secret_env(config, "DATABASE_PASSWORD", ids::POSTGRES_APPLICATION, fields::PASSWORD)?,
            EnvVar::literal(
                "REDIS_URL",
                format!("redis://{}:{}/0", cache::SERVICE, model.port(ports::REDIS)?),
            ),
            secret_env(config, "REDIS_PASSWORD", ids::REDIS, fields::PASSWORD)?,
            EnvVar::literal(
                "ELASTIC_URL",
                format!(
                    "http://{}:{}",
                    search_index::SERVICE,
                    model.port(ports::ELASTICSEARCH)?
                ),
            ),
            EnvVar::literal("ELASTIC_USER", search_index::ELASTIC_USER),
            secret_env(config, "ELASTIC_PASSWORD", ids::ELASTIC, fields::PASSWORD)?,
            EnvVar::literal(
                "MINIO_ENDPOINT",
                format!("{}:{}", object_store::SERVICE, model.port(ports::MINIO_API)?),
            ),
            EnvVar::literal(
                "MINIO_PUBLIC_URL",
                config.external_url(&config.subdomains.storage),
            ),
            secret_env(config, "MINIO_ACCESS_KEY", ids::MINIO_ROOT, fields::USERNAME)?,
            secret_env(config, "MINIO_SECRET_KEY", ids::MINIO_ROOT, fields::PASSWORD)?,
            EnvVar::literal("MINIO_PUBLIC_BUCKET", &model.storage.public_bucket),
            EnvVar::literal("KEYCLOAK_URL", identity_provider::internal_url(model)?),
            EnvVar::literal("KEYCLOAK_REALM", realm),
            EnvVar::literal("OIDC_ISSUER", format!("{}/realms/{}", identity_url, realm)),
            EnvVar::literal("OIDC_CLIENT_ID", model.client_id(clients::CATALOG_API)?),
            secret_env(
                config,
                "OIDC_CLIENT_SECRET",
                ids::CATALOG_API_CLIENT,
                fields::CLIENT_SECRET,
            )?,
            EnvVar::literal("KAFKA_BOOTSTRAP_SERVERS", model.broker(brokers::EVENTS)?),
        ])
    }
}

impl Generator for CatalogApiGenerator {
    fn component(&self) -> &'static str {
        "catalog-api"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let port = model.port(ports::CATALOG_API)?;
        let params = wait_params(model)?;

        let steps = [
            wait_for(
                search_index::SERVICE,
                ReadinessCheck::tcp(search_index::SERVICE, model.port(ports::ELASTICSEARCH)?),
                &params,
            ),
            wait_for(
                identity_provider::SERVICE,
                identity_provider::health_check(model)?,
                &params,
            ),
        ];

        let container = Container::new(SERVICE, model.image(images::CATALOG_API)?)
            .with_env(Self::env(model, config)?)
            .with_env([EnvVar::literal("PORT", port.to_string())])
            .with_port("http", port)
            .with_readiness(
                ReadinessCheck::http(SERVICE, port, HEALTH_PATH).probe(ProbeTiming::after(10)),
            );

        let pod = PodSpec {
            init_containers: init_containers(&steps),
            containers: vec![container],
            ..Default::default()
        };

        ComponentDescriptor::from_resources(
            component,
            vec![
                deployment(config, SERVICE, component, model.replicas(images::CATALOG_API)?, pod)
                    .into(),
                internal_service(config, SERVICE, component, vec![ServicePort::tcp("http", port)])
                    .into(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::{env, main_container, pod_spec, secret_of};
    use crate::resources::Resource;
    use crate::testing::demo_config;
    use wisefood_common::{Error, Scheme};

    #[test]
    fn waits_for_search_index_then_identity_provider() {
        let descriptor = CatalogApiGenerator
            .generate(&PlatformModel::default(), &demo_config())
            .unwrap();
        let init = &pod_spec(&descriptor).init_containers;

        let names: Vec<_> = init.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["wait-for-elasticsearch", "wait-for-keycloak"]);
        assert_eq!(init[0].command.as_ref().unwrap()[0], "nc");
        assert_eq!(
            init[1].command.as_ref().unwrap().last().unwrap(),
            "http://keycloak:9000/health/ready"
        );
    }

    #[test]
    fn external_urls_are_valid_for_both_schemes() {
        for (scheme, prefix) in [(Scheme::Http, "http://"), (Scheme::Https, "https://")] {
            let mut config = demo_config();
            config.scheme = scheme;
            let descriptor = CatalogApiGenerator
                .generate(&PlatformModel::default(), &config)
                .unwrap();
            let container = main_container(&descriptor);

            assert_eq!(
                env(container, "PUBLIC_URL").value.as_deref(),
                Some(format!("{}demo.local", prefix).as_str())
            );
            assert_eq!(
                env(container, "OIDC_ISSUER").value.as_deref(),
                Some(format!("{}auth.demo.local/realms/wisefood", prefix).as_str())
            );
            assert_eq!(
                env(container, "MINIO_PUBLIC_URL").value.as_deref(),
                Some(format!("{}s3.demo.local", prefix).as_str())
            );
        }
    }

    #[test]
    fn reads_broker_and_client_from_model() {
        let descriptor = CatalogApiGenerator
            .generate(&PlatformModel::default(), &demo_config())
            .unwrap();
        let container = main_container(&descriptor);

        assert_eq!(
            env(container, "KAFKA_BOOTSTRAP_SERVERS").value.as_deref(),
            Some("kafka-bootstrap.kafka:9092")
        );
        assert_eq!(env(container, "OIDC_CLIENT_ID").value.as_deref(), Some("wisefood-api"));
        assert_eq!(secret_of(container, "OIDC_CLIENT_SECRET"), "demo-catalog-api-client");
        assert_eq!(secret_of(container, "MINIO_SECRET_KEY"), "demo-minio-root");
    }

    #[test]
    fn replicas_come_from_model() {
        let model = PlatformModel::default().with_replicas(images::CATALOG_API, 5);
        let descriptor = CatalogApiGenerator.generate(&model, &demo_config()).unwrap();
        match descriptor.get("deployment/catalog-api") {
            Some(Resource::Deployment(d)) => assert_eq!(d.spec.replicas, 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_broker_is_unresolved() {
        let mut model = PlatformModel::default();
        model.brokers.clear();
        let err = CatalogApiGenerator
            .generate(&model, &demo_config())
            .unwrap_err();
        assert_eq!(err, Error::unresolved_field("brokers.events"));
    }
}
