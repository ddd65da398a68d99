//! PostgreSQL database generator
//!
//! One StatefulSet backed by a PVC. On first start the image runs the
//! scripts mounted into `/docker-entrypoint-initdb.d`; ours creates the
//! identity-provider and application accounts from environment variables, so
//! their passwords arrive through secret references like the superuser's.

use tracing::debug;
use wisefood_common::model::{images, ports, volumes};
use wisefood_common::{DeploymentConfig, PlatformModel, Result};

use crate::k8s::{ConfigMap, Container, EnvVar, PodSpec, ServicePort, Volume, VolumeMount};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{ProbeTiming, ReadinessCheck};

use super::{component_meta, internal_service, stateful_set, volume_claim, Generator, Owner};

/// Service (and workload) name
pub const SERVICE: &str = "postgres";

const INIT_CONFIG_MAP: &str = "postgres-init";
const DATA_CLAIM: &str = "postgres-data";
const DATA_DIR: &str = "/var/lib/postgresql/data";
const INIT_SCRIPT: &str = "10-create-accounts.sh";

const CREATE_ACCOUNTS: &str = r#"#!/bin/sh
set -eu

# Values go through psql variables so quotes in a password stay data
create_account() {
  psql -v ON_ERROR_STOP=1 -v user="$1" -v pw="$2" -v db="$3" \
    --username "$POSTGRES_USER" --dbname "$POSTGRES_DB" <<-'EOSQL'
	CREATE USER :"user" WITH PASSWORD :'pw';
	CREATE DATABASE :"db" OWNER :"user";
	GRANT ALL PRIVILEGES ON DATABASE :"db" TO :"user";
EOSQL
}

create_account "$IDENTITY_DB_USER" "$IDENTITY_DB_PASSWORD" "$IDENTITY_DB_NAME"
create_account "$APP_DB_USER" "$APP_DB_PASSWORD" "$APP_DB_NAME"
"#;

/// `pg_isready` against `host`; a zero exit means the server accepts connections
pub fn pg_isready(model: &PlatformModel, host: &str) -> Result<ReadinessCheck> {
    let port = model.port(ports::POSTGRES)?;
    let superuser = &model.database.superuser;
    Ok(ReadinessCheck::exec([
        "pg_isready".to_string(),
        "-h".to_string(),
        host.to_string(),
        "-p".to_string(),
        port.to_string(),
        "-U".to_string(),
        superuser.user.clone(),
        "-d".to_string(),
        superuser.database.clone(),
    ]))
}

/// Generator for the `database` component
pub struct DatabaseGenerator;

impl Generator for DatabaseGenerator {
    fn component(&self) -> &'static str {
        "database"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(SERVICE, component);
        let port = model.port(ports::POSTGRES)?;
        let db = &model.database;

        let env = vec![
            EnvVar::literal("POSTGRES_USER", &db.superuser.user),
            EnvVar::literal("POSTGRES_DB", &db.superuser.database),
            secret_env(config, "POSTGRES_PASSWORD", ids::POSTGRES_SUPERUSER, fields::PASSWORD)?,
            EnvVar::literal("PGDATA", format!("{}/pgdata", DATA_DIR)),
            EnvVar::literal("IDENTITY_DB_USER", &db.identity_provider.user),
            EnvVar::literal("IDENTITY_DB_NAME", &db.identity_provider.database),
            secret_env(config, "IDENTITY_DB_PASSWORD", ids::POSTGRES_IDENTITY, fields::PASSWORD)?,
            EnvVar::literal("APP_DB_USER", &db.application.user),
            EnvVar::literal("APP_DB_NAME", &db.application.database),
            secret_env(config, "APP_DB_PASSWORD", ids::POSTGRES_APPLICATION, fields::PASSWORD)?,
        ];

        let ready = pg_isready(model, "127.0.0.1")?;
        let container = Container::new(SERVICE, model.image(images::POSTGRES)?)
            .with_env(env)
            .with_port("postgres", port)
            .with_readiness(ready.probe(ProbeTiming::after(5)))
            .with_liveness(ready.probe(ProbeTiming::after(30)))
            .with_mount(VolumeMount::new("data", DATA_DIR))
            .with_mount(VolumeMount::readonly("init", "/docker-entrypoint-initdb.d"));

        let pod = PodSpec {
            containers: vec![container],
            volumes: vec![
                Volume::from_pvc("data", DATA_CLAIM),
                Volume::from_config_map("init", INIT_CONFIG_MAP),
            ],
            ..Default::default()
        };

        let init_scripts = ConfigMap::new(component_meta(config, INIT_CONFIG_MAP, owner))
            .with_data(INIT_SCRIPT, CREATE_ACCOUNTS);
        let claim = volume_claim(config, DATA_CLAIM, owner, model.volume_size(volumes::POSTGRES)?);
        let service = internal_service(config, SERVICE, component, vec![ServicePort::tcp("postgres", port)]);

        debug!(port, "generated postgres");
        ComponentDescriptor::from_resources(
            component,
            vec![
                stateful_set(config, SERVICE, component, pod).into(),
                service.into(),
                claim.into(),
                init_scripts.into(),
            ],
        )
    }
}
