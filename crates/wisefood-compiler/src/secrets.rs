//! Secret indirection
//!
//! Generators only know logical secret identifiers. This module resolves an
//! identifier through `config.secrets` to the Secret object registered for
//! it and emits a `secretKeyRef`, which the kubelet resolves at container
//! start. A literal credential never appears in generated output.

use wisefood_common::{DeploymentConfig, Result};

use crate::k8s::{EnvVar, EnvVarSource, SecretKeySelector};

/// Logical secret identifiers generators may request
pub mod ids {
    /// PostgreSQL superuser password
    pub const POSTGRES_SUPERUSER: &str = "postgres-superuser";
    /// Password of the identity-provider database account
    pub const POSTGRES_IDENTITY: &str = "postgres-identity";
    /// Password of the application database account
    pub const POSTGRES_APPLICATION: &str = "postgres-application";
    /// Redis `requirepass`
    pub const REDIS: &str = "redis";
    /// Elasticsearch `elastic` user password
    pub const ELASTIC: &str = "elastic";
    /// MinIO root credentials
    pub const MINIO_ROOT: &str = "minio-root";
    /// Keycloak bootstrap administrator
    pub const KEYCLOAK_ADMIN: &str = "keycloak-admin";
    /// Client secret of the catalog API's confidential client
    pub const CATALOG_API_CLIENT: &str = "catalog-api-client";
}

/// Field names inside the referenced Secret objects
pub mod fields {
    /// Username field
    pub const USERNAME: &str = "username";
    /// Password field
    pub const PASSWORD: &str = "password";
    /// OAuth client secret field
    pub const CLIENT_SECRET: &str = "client-secret";
}

/// Resolve a secret identifier and field to an env value source.
///
/// Fails with `MissingSecretReference` if `secret_id` is not registered in
/// the configuration.
pub fn secret_env_ref(
    config: &DeploymentConfig,
    secret_id: &str,
    field: &str,
) -> Result<EnvVarSource> {
    let name = config.secret_name(secret_id)?;
    Ok(EnvVarSource {
        secret_key_ref: SecretKeySelector {
            name: name.to_string(),
            key: field.to_string(),
        },
    })
}

/// Environment variable whose value is resolved from a registered secret
pub fn secret_env(
    config: &DeploymentConfig,
    env_name: &str,
    secret_id: &str,
    field: &str,
) -> Result<EnvVar> {
    secret_env_ref(config, secret_id, field).map(|source| EnvVar::from_source(env_name, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::demo_config;
    use wisefood_common::Error;

    #[test]
    fn resolves_to_registered_secret_object() {
        let config = demo_config();
        let env = secret_env(&config, "POSTGRES_PASSWORD", ids::POSTGRES_SUPERUSER, fields::PASSWORD)
            .unwrap();

        assert_eq!(env.name, "POSTGRES_PASSWORD");
        assert!(env.value.is_none());
        let selector = env.value_from.unwrap().secret_key_ref;
        assert_eq!(selector.name, "demo-postgres-superuser");
        assert_eq!(selector.key, "password");
    }

    #[test]
    fn unregistered_identifier_fails_fast() {
        let mut config = demo_config();
        config.secrets.remove(ids::MINIO_ROOT);

        let err = secret_env_ref(&config, ids::MINIO_ROOT, fields::USERNAME).unwrap_err();
        assert_eq!(err, Error::missing_secret("minio-root"));
    }

    #[test]
    fn reference_serializes_as_value_from() {
        let config = demo_config();
        let env = secret_env(&config, "ELASTIC_PASSWORD", ids::ELASTIC, fields::PASSWORD).unwrap();
        let value = serde_json::to_value(&env).unwrap();

        assert!(value.get("value").is_none());
        assert_eq!(value["valueFrom"]["secretKeyRef"]["name"], "demo-elastic");
        assert_eq!(value["valueFrom"]["secretKeyRef"]["key"], "password");
    }
}
