//! Platform-independent model (PIM)
//!
//! The fixed parameter set shared by every wisefood deployment: images,
//! ports, volume sizes, identity-provider clients and database accounts.
//! Environments never edit it in place; they derive a new model through the
//! `with_*` builders, which keeps the key set of the built-in model stable.
//!
//! Keyed sections are read through accessors that fail with
//! [`Error::UnresolvedModelField`] when a generator asks for a key the model
//! does not define (a model/generator version mismatch).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Image keys
pub mod images {
    /// PostgreSQL server
    pub const POSTGRES: &str = "postgres";
    /// Redis cache
    pub const REDIS: &str = "redis";
    /// Elasticsearch search index
    pub const ELASTICSEARCH: &str = "elasticsearch";
    /// MinIO object storage
    pub const MINIO: &str = "minio";
    /// Keycloak identity provider
    pub const KEYCLOAK: &str = "keycloak";
    /// Catalog API
    pub const CATALOG_API: &str = "catalog-api";
    /// Realm and bucket bootstrap job
    pub const PLATFORM_INIT: &str = "platform-init";
    /// Small image used by tcp/http wait steps (needs `nc` and `wget`)
    pub const WAIT: &str = "wait";
}

/// Port keys
pub mod ports {
    /// PostgreSQL
    pub const POSTGRES: &str = "postgres";
    /// Redis
    pub const REDIS: &str = "redis";
    /// Elasticsearch HTTP
    pub const ELASTICSEARCH: &str = "elasticsearch";
    /// MinIO S3 API
    pub const MINIO_API: &str = "minio-api";
    /// MinIO web console
    pub const MINIO_CONSOLE: &str = "minio-console";
    /// Keycloak HTTP
    pub const KEYCLOAK_HTTP: &str = "keycloak-http";
    /// Keycloak management (health and metrics)
    pub const KEYCLOAK_MANAGEMENT: &str = "keycloak-management";
    /// Catalog API HTTP
    pub const CATALOG_API: &str = "catalog-api";
}

/// Volume keys
pub mod volumes {
    /// PostgreSQL data directory
    pub const POSTGRES: &str = "postgres";
    /// Elasticsearch data directory
    pub const ELASTICSEARCH: &str = "elasticsearch";
    /// MinIO data directory
    pub const MINIO: &str = "minio";
}

/// Identity-provider client keys
pub mod clients {
    /// Confidential client used by the catalog API
    pub const CATALOG_API: &str = "catalog-api";
    /// Public client used by browser front-ends
    pub const WEB: &str = "web";
}

/// Broker keys
pub mod brokers {
    /// Platform event stream
    pub const EVENTS: &str = "events";
}

/// A database user and the database/schema it owns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DbAccount {
    /// Login role name
    pub user: String,
    /// Database owned by the role
    pub database: String,
}

impl DbAccount {
    fn new(user: &str, database: &str) -> Self {
        Self {
            user: user.to_string(),
            database: database.to_string(),
        }
    }
}

/// The three logical database accounts the platform provisions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatabaseModel {
    /// Cluster superuser
    pub superuser: DbAccount,
    /// Account used by the identity provider
    pub identity_provider: DbAccount,
    /// Account used by the catalog API
    pub application: DbAccount,
}

/// Identity-provider realm and client ids
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IdentityModel {
    /// Realm bootstrapped by the init job
    pub realm: String,
    /// Client ids keyed by role
    pub clients: BTreeMap<String, String>,
}

/// Object-storage buckets
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageModel {
    /// Buckets created by the init job
    pub buckets: Vec<String>,
    /// Bucket served anonymously through the apex route
    pub public_bucket: String,
}

/// The platform-independent model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlatformModel {
    /// Container image references keyed by component
    pub images: BTreeMap<String, String>,
    /// Port numbers keyed by listener
    pub ports: BTreeMap<String, u16>,
    /// Requested persistent volume sizes keyed by component
    pub volumes: BTreeMap<String, String>,
    /// Replica counts for stateless workloads
    pub replicas: BTreeMap<String, u32>,
    /// Identity-provider parameters
    pub identity: IdentityModel,
    /// Database account assignments
    pub database: DatabaseModel,
    /// Object-storage layout
    pub storage: StorageModel,
    /// Message broker addresses keyed by stream
    pub brokers: BTreeMap<String, String>,
    /// IngressClass every route is attached to
    pub ingress_class: String,
}

fn owned_map<V: Clone>(entries: &[(&str, V)]) -> BTreeMap<String, V> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl Default for PlatformModel {
    /// The built-in model every environment starts from
    fn default() -> Self {
        Self {
            images: owned_map(&[
                (images::POSTGRES, "docker.io/library/postgres:16.4-alpine".to_string()),
                (images::REDIS, "docker.io/library/redis:7.4-alpine".to_string()),
                (
                    images::ELASTICSEARCH,
                    "docker.elastic.co/elasticsearch/elasticsearch:8.15.3".to_string(),
                ),
                (
                    images::MINIO,
                    "quay.io/minio/minio:RELEASE.2024-10-13T13-34-11Z".to_string(),
                ),
                (images::KEYCLOAK, "quay.io/keycloak/keycloak:26.0.5".to_string()),
                (images::CATALOG_API, "ghcr.io/wisefood/catalog-api:0.4.2".to_string()),
                (
                    images::PLATFORM_INIT,
                    "ghcr.io/wisefood/platform-init:0.4.2".to_string(),
                ),
                (images::WAIT, "docker.io/library/busybox:1.36".to_string()),
            ]),
            ports: owned_map(&[
                (ports::POSTGRES, 5432),
                (ports::REDIS, 6379),
                (ports::ELASTICSEARCH, 9200),
                (ports::MINIO_API, 9000),
                (ports::MINIO_CONSOLE, 9001),
                (ports::KEYCLOAK_HTTP, 8080),
                (ports::KEYCLOAK_MANAGEMENT, 9000),
                (ports::CATALOG_API, 8000),
            ]),
            volumes: owned_map(&[
                (volumes::POSTGRES, "10Gi".to_string()),
                (volumes::ELASTICSEARCH, "20Gi".to_string()),
                (volumes::MINIO, "50Gi".to_string()),
            ]),
            replicas: owned_map(&[(images::CATALOG_API, 2), (images::KEYCLOAK, 1)]),
            identity: IdentityModel {
                realm: "wisefood".to_string(),
                clients: owned_map(&[
                    (clients::CATALOG_API, "wisefood-api".to_string()),
                    (clients::WEB, "wisefood-web".to_string()),
                ]),
            },
            database: DatabaseModel {
                superuser: DbAccount::new("postgres", "postgres"),
                identity_provider: DbAccount::new("keycloak", "keycloak"),
                application: DbAccount::new("wisefood", "wisefood"),
            },
            storage: StorageModel {
                buckets: vec![
                    "public".to_string(),
                    "uploads".to_string(),
                    "datasets".to_string(),
                ],
                public_bucket: "public".to_string(),
            },
            brokers: owned_map(&[(brokers::EVENTS, "kafka-bootstrap.kafka:9092".to_string())]),
            ingress_class: "nginx".to_string(),
        }
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, section: &str, key: &str) -> Result<&'a V> {
    map.get(key)
        .ok_or_else(|| Error::unresolved_field(format!("{}.{}", section, key)))
}

impl PlatformModel {
    /// Load a complete model from YAML.
    ///
    /// The document replaces the built-in model; it is not merged into it.
    pub fn from_yaml(input: &str) -> Result<Self> {
        let model: Self = serde_yaml::from_str(input)?;
        model.validate()?;
        Ok(model)
    }

    /// Check internal consistency of the model
    pub fn validate(&self) -> Result<()> {
        if !self
            .storage
            .buckets
            .iter()
            .any(|b| b == &self.storage.public_bucket)
        {
            return Err(Error::invalid_config(
                "model.storage.publicBucket",
                format!(
                    "public bucket '{}' is not among the declared buckets",
                    self.storage.public_bucket
                ),
            ));
        }
        if let Some((key, _)) = self.ports.iter().find(|(_, port)| **port == 0) {
            return Err(Error::invalid_config(
                format!("model.ports.{}", key),
                "port must be non-zero",
            ));
        }
        Ok(())
    }

    /// Image reference for a component
    pub fn image(&self, key: &str) -> Result<&str> {
        lookup(&self.images, "images", key).map(String::as_str)
    }

    /// Port number for a listener
    pub fn port(&self, key: &str) -> Result<u16> {
        lookup(&self.ports, "ports", key).copied()
    }

    /// Requested volume size for a component
    pub fn volume_size(&self, key: &str) -> Result<&str> {
        lookup(&self.volumes, "volumes", key).map(String::as_str)
    }

    /// Replica count for a stateless workload
    pub fn replicas(&self, key: &str) -> Result<u32> {
        lookup(&self.replicas, "replicas", key).copied()
    }

    /// Identity-provider client id for a role
    pub fn client_id(&self, key: &str) -> Result<&str> {
        lookup(&self.identity.clients, "identity.clients", key).map(String::as_str)
    }

    /// Broker address for a stream
    pub fn broker(&self, key: &str) -> Result<&str> {
        lookup(&self.brokers, "brokers", key).map(String::as_str)
    }

    /// Return a copy with one port overridden
    pub fn with_port(mut self, key: impl Into<String>, port: u16) -> Self {
        self.ports.insert(key.into(), port);
        self
    }

    /// Return a copy with one image overridden
    pub fn with_image(mut self, key: impl Into<String>, image: impl Into<String>) -> Self {
        self.images.insert(key.into(), image.into());
        self
    }

    /// Return a copy with one replica count overridden
    pub fn with_replicas(mut self, key: impl Into<String>, replicas: u32) -> Self {
        self.replicas.insert(key.into(), replicas);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_model_is_consistent() {
        let model = PlatformModel::default();
        model.validate().unwrap();
        assert_eq!(model.port(ports::POSTGRES).unwrap(), 5432);
        assert_eq!(model.client_id(clients::WEB).unwrap(), "wisefood-web");
        assert_eq!(model.volume_size(volumes::MINIO).unwrap(), "50Gi");
    }

    #[test]
    fn missing_key_names_the_model_path() {
        let mut model = PlatformModel::default();
        model.ports.remove(ports::REDIS);

        assert_eq!(
            model.port(ports::REDIS).unwrap_err(),
            Error::unresolved_field("ports.redis")
        );
        assert_eq!(
            model.client_id("mobile").unwrap_err(),
            Error::unresolved_field("identity.clients.mobile")
        );
    }

    #[test]
    fn builders_return_new_values() {
        let base = PlatformModel::default();
        let changed = base.clone().with_port(ports::POSTGRES, 6543);

        assert_eq!(base.port(ports::POSTGRES).unwrap(), 5432);
        assert_eq!(changed.port(ports::POSTGRES).unwrap(), 6543);
        assert_eq!(changed.ports.len(), base.ports.len());
    }

    #[test]
    fn yaml_round_trip_keeps_model() {
        let model = PlatformModel::default().with_replicas(images::CATALOG_API, 4);
        let yaml = serde_yaml::to_string(&model).unwrap();
        assert_eq!(PlatformModel::from_yaml(&yaml).unwrap(), model);
    }

    #[test]
    fn public_bucket_must_be_declared() {
        let mut model = PlatformModel::default();
        model.storage.public_bucket = "downloads".to_string();
        let err = model.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "model.storage.publicBucket"));
    }

    #[test]
    fn unknown_model_fields_are_rejected() {
        let yaml = serde_yaml::to_string(&PlatformModel::default()).unwrap();
        let yaml = format!("{}extra: true\n", yaml);
        assert!(matches!(
            PlatformModel::from_yaml(&yaml),
            Err(Error::Serialization { .. })
        ));
    }
}
