//! Composition of generator output into one resource set

use tracing::info;
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::generators::Generator;
use crate::resources::ResourceSet;

/// Run `generators` in order and aggregate their resources.
///
/// The configuration is validated first. Errors raised by a generator are
/// attributed to its component; a key produced by two generators fails with
/// `DuplicateResourceName` naming both. Nothing is returned on failure.
pub fn compose(
    model: &PlatformModel,
    config: &DeploymentConfig,
    generators: &[Box<dyn Generator>],
) -> Result<ResourceSet> {
    config.validate()?;
    model.validate()?;

    let mut set = ResourceSet::new();
    for generator in generators {
        let component = generator.component();
        let descriptor = generator
            .generate(model, config)
            .map_err(|e| e.in_component(component))?;

        info!(component, resources = descriptor.len(), "generated component");

        set.merge(descriptor)?;
    }

    info!(
        namespace = %config.namespace,
        scheme = %config.scheme,
        components = generators.len(),
        resources = set.len(),
        "composed deployment"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{default_generators, select_generators, CacheGenerator};
    use crate::k8s::{ObjectMeta, ServiceAccount};
    use crate::resources::ComponentDescriptor;
    use crate::secrets::ids;
    use crate::testing::demo_config;
    use wisefood_common::model::ports;
    use wisefood_common::Error;

    /// Emits a Service named like the cache's
    struct ShadowRedis;

    impl Generator for ShadowRedis {
        fn component(&self) -> &'static str {
            "shadow-redis"
        }

        fn generate(
            &self,
            model: &PlatformModel,
            config: &DeploymentConfig,
        ) -> Result<ComponentDescriptor> {
            let cache = CacheGenerator.generate(model, config)?;
            ComponentDescriptor::from_resources(
                self.component(),
                cache
                    .resources()
                    .values()
                    .filter(|r| r.kind() == "Service")
                    .cloned(),
            )
        }
    }

    struct Account(&'static str);

    impl Generator for Account {
        fn component(&self) -> &'static str {
            self.0
        }

        fn generate(
            &self,
            _model: &PlatformModel,
            config: &DeploymentConfig,
        ) -> Result<ComponentDescriptor> {
            ComponentDescriptor::from_resources(
                self.0,
                vec![ServiceAccount::new(ObjectMeta::new(self.0, &config.namespace)).into()],
            )
        }
    }

    #[test]
    fn composes_every_component() {
        let set = compose(&PlatformModel::default(), &demo_config(), &default_generators())
            .unwrap();
        assert_eq!(set.workload_count(), 7);
        assert_eq!(set.component_of("service/minio"), Some("object-store"));
        assert_eq!(set.component_of("ingress/platform"), Some("ingress-router"));
    }

    #[test]
    fn colliding_generators_are_named() {
        let generators: Vec<Box<dyn Generator>> =
            vec![Box::new(CacheGenerator), Box::new(ShadowRedis)];
        let err = compose(&PlatformModel::default(), &demo_config(), &generators).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateResourceName {
                name: "service/redis".to_string(),
                first: "cache".to_string(),
                second: "shadow-redis".to_string(),
            }
        );
    }

    #[test]
    fn same_name_across_kinds_does_not_collide() {
        let generators: Vec<Box<dyn Generator>> =
            vec![Box::new(CacheGenerator), Box::new(Account("redis"))];
        let set = compose(&PlatformModel::default(), &demo_config(), &generators).unwrap();
        assert!(set.get("serviceaccount/redis").is_some());
        assert!(set.get("service/redis").is_some());
    }

    #[test]
    fn generator_errors_are_attributed() {
        let mut config = demo_config();
        config.secrets.remove(ids::REDIS);
        let err = compose(&PlatformModel::default(), &config, &default_generators()).unwrap_err();
        assert_eq!(
            err,
            Error::MissingSecretReference {
                component: "cache".to_string(),
                secret: "redis".to_string(),
            }
        );

        let mut model = PlatformModel::default();
        model.ports.remove(ports::KEYCLOAK_HTTP);
        let generators = select_generators(&["identity-provider"]).unwrap();
        let err = compose(&model, &demo_config(), &generators).unwrap_err();
        assert_eq!(
            err,
            Error::UnresolvedModelField {
                component: "identity-provider".to_string(),
                field: "ports.keycloak-http".to_string(),
            }
        );
    }

    #[test]
    fn invalid_configuration_is_rejected_before_generation() {
        let mut config = demo_config();
        config.namespace = "Not A Label".to_string();
        let err = compose(&PlatformModel::default(), &config, &default_generators()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "namespace"));
    }
}
