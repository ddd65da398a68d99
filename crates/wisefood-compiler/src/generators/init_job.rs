//! Platform bootstrap job
//!
//! A one-shot Job that creates the realm, clients, SMTP settings and
//! buckets once the database and identity provider are up. It records its
//! progress in a ConfigMap, which is the only API access it gets.

use wisefood_common::model::{clients, images, ports};
use wisefood_common::{DeploymentConfig, Error, PlatformModel, Result};

use crate::k8s::{
    Container, EnvVar, Job, JobSpec, ObjectMeta, PodSpec, PolicyRule, Role, RoleBinding,
    ServiceAccount,
};
use crate::resources::ComponentDescriptor;
use crate::secrets::{fields, ids, secret_env};
use crate::wait::{init_containers, wait_for, WaitParams};

use super::{
    component_meta, database, identity_provider, object_store, pod_template, wait_params,
    Generator, Owner,
};

/// Job, ServiceAccount, Role and RoleBinding name
pub const NAME: &str = "platform-init";

/// ConfigMap the job records completed steps in
pub const STATE_CONFIG_MAP: &str = "platform-init-state";

const BACKOFF_LIMIT: u32 = 4;

/// The job's API permissions
pub fn access_rules() -> Vec<PolicyRule> {
    vec![PolicyRule {
        api_groups: vec![String::new()],
        resources: vec!["configmaps".to_string()],
        verbs: vec![
            "get".to_string(),
            "create".to_string(),
            "update".to_string(),
            "patch".to_string(),
        ],
    }]
}

/// Build the job's Role, rejecting wildcard grants
pub fn checked_role(metadata: ObjectMeta, rules: Vec<PolicyRule>) -> Result<Role> {
    for (index, rule) in rules.iter().enumerate() {
        let lists = [
            ("apiGroups", &rule.api_groups),
            ("resources", &rule.resources),
            ("verbs", &rule.verbs),
        ];
        for (field, values) in lists {
            if values.iter().any(|v| v.contains('*')) {
                return Err(Error::invalid_config(
                    format!("role/{}.rules[{}].{}", metadata.name, index, field),
                    "wildcards are not allowed, list each entry explicitly",
                ));
            }
            if field != "apiGroups" && values.is_empty() {
                return Err(Error::invalid_config(
                    format!("role/{}.rules[{}].{}", metadata.name, index, field),
                    "must not be empty",
                ));
            }
        }
    }
    Ok(Role::new(metadata, rules))
}

/// Generator for the `init-job` component
pub struct InitJobGenerator;

impl InitJobGenerator {
    fn env(model: &PlatformModel, config: &DeploymentConfig) -> Result<Vec<EnvVar>> {
        let apex = config.external_url("");
        let mut env = vec![
            EnvVar::literal("KEYCLOAK_URL", identity_provider::internal_url(model)?),
            secret_env(config, "KEYCLOAK_ADMIN_USER", ids::KEYCLOAK_ADMIN, fields::USERNAME)?,
            secret_env(
                config,
                "KEYCLOAK_ADMIN_PASSWORD",
                ids::KEYCLOAK_ADMIN,
                fields::PASSWORD,
            )?,
            EnvVar::literal("REALM", &model.identity.realm),
            EnvVar::literal("API_CLIENT_ID", model.client_id(clients::CATALOG_API)?),
            secret_env(
                config,
                "API_CLIENT_SECRET",
                ids::CATALOG_API_CLIENT,
                fields::CLIENT_SECRET,
            )?,
            EnvVar::literal("WEB_CLIENT_ID", model.client_id(clients::WEB)?),
            EnvVar::literal("WEB_REDIRECT_URI", format!("{}/*", apex)),
            EnvVar::literal("WEB_ORIGIN", apex),
            EnvVar::literal("ADMIN_EMAIL", &config.admin.email),
        ];
        if let Some(ref name) = config.admin.name {
            env.push(EnvVar::literal("ADMIN_NAME", name));
        }

        if let Some(ref smtp) = config.smtp {
            env.push(EnvVar::literal("SMTP_HOST", &smtp.host));
            env.push(EnvVar::literal("SMTP_PORT", smtp.port.to_string()));
            env.push(EnvVar::literal("SMTP_FROM", &smtp.from));
            env.push(EnvVar::literal("SMTP_STARTTLS", smtp.starttls.to_string()));
            if let Some(ref user) = smtp.user {
                env.push(EnvVar::literal("SMTP_USER", user));
            }
            if let Some(ref secret_id) = smtp.password_secret {
                env.push(secret_env(config, "SMTP_PASSWORD", secret_id, fields::PASSWORD)?);
            }
        }

        env.extend([
            EnvVar::literal(
                "MINIO_ENDPOINT",
                format!(
                    "http://{}:{}",
                    object_store::SERVICE,
                    model.port(ports::MINIO_API)?
                ),
            ),
            secret_env(config, "MINIO_ROOT_USER", ids::MINIO_ROOT, fields::USERNAME)?,
            secret_env(config, "MINIO_ROOT_PASSWORD", ids::MINIO_ROOT, fields::PASSWORD)?,
            EnvVar::literal("BUCKETS", model.storage.buckets.join(",")),
            EnvVar::literal("PUBLIC_BUCKET", &model.storage.public_bucket),
            EnvVar::literal("STATE_CONFIGMAP", STATE_CONFIG_MAP),
        ]);
        Ok(env)
    }
}

impl Generator for InitJobGenerator {
    fn component(&self) -> &'static str {
        "init-job"
    }

    fn generate(
        &self,
        model: &PlatformModel,
        config: &DeploymentConfig,
    ) -> Result<ComponentDescriptor> {
        let component = self.component();
        let owner = Owner::new(NAME, component);

        let steps = [
            wait_for(
                database::SERVICE,
                database::pg_isready(model, database::SERVICE)?,
                &WaitParams::new(model.image(images::POSTGRES)?),
            ),
            wait_for(
                identity_provider::SERVICE,
                identity_provider::health_check(model)?,
                &wait_params(model)?,
            ),
        ];

        let container = Container::new(NAME, model.image(images::PLATFORM_INIT)?)
            .with_env(Self::env(model, config)?);

        let pod = PodSpec {
            service_account_name: Some(NAME.to_string()),
            automount_service_account_token: Some(true),
            init_containers: init_containers(&steps),
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        };

        let job = Job::new(
            component_meta(config, NAME, owner),
            JobSpec {
                backoff_limit: BACKOFF_LIMIT,
                template: pod_template(NAME, component, pod),
            },
        );
        let role = checked_role(component_meta(config, NAME, owner), access_rules())?;
        let binding =
            RoleBinding::for_service_account(component_meta(config, NAME, owner), NAME, NAME);

        ComponentDescriptor::from_resources(
            component,
            vec![
                ServiceAccount::new(component_meta(config, NAME, owner)).into(),
                role.into(),
                binding.into(),
                job.into(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::{env, main_container, pod_spec, secret_of};
    use crate::testing::demo_config;
    use wisefood_common::SmtpConfig;

    #[test]
    fn emits_job_with_access_binding() {
        let descriptor = InitJobGenerator
            .generate(&PlatformModel::default(), &demo_config())
            .unwrap();
        let keys: Vec<_> = descriptor.resources().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "job/platform-init",
                "role/platform-init",
                "rolebinding/platform-init",
                "serviceaccount/platform-init",
            ]
        );

        let pod = pod_spec(&descriptor);
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
        assert_eq!(pod.service_account_name.as_deref(), Some("platform-init"));
    }

    #[test]
    fn waits_for_database_then_identity_provider() {
        let descriptor = InitJobGenerator
            .generate(&PlatformModel::default(), &demo_config())
            .unwrap();
        let names: Vec<_> = pod_spec(&descriptor)
            .init_containers
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["wait-for-postgres", "wait-for-keycloak"]);
    }

    #[test]
    fn wildcard_grants_are_rejected() {
        let meta = ObjectMeta::new(NAME, "demo");
        let mut rules = access_rules();
        rules[0].verbs.push("*".to_string());
        let err = checked_role(meta.clone(), rules).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfiguration { ref field, .. } if field == "role/platform-init.rules[0].verbs"
        ));

        let wildcard_resources = vec![PolicyRule {
            api_groups: vec![String::new()],
            resources: vec!["*".to_string()],
            verbs: vec!["get".to_string()],
        }];
        assert!(checked_role(meta.clone(), wildcard_resources).is_err());

        assert!(checked_role(meta, access_rules()).is_ok());
    }

    #[test]
    fn smtp_settings_are_passed_with_secret_password() {
        let mut config = demo_config();
        config
            .secrets
            .insert("smtp-relay".to_string(), "demo-smtp".to_string());
        config.smtp = Some(SmtpConfig {
            host: "smtp.demo.local".to_string(),
            port: 2525,
            from: "noreply@demo.local".to_string(),
            user: Some("mailer".to_string()),
            password_secret: Some("smtp-relay".to_string()),
            starttls: true,
        });

        let descriptor = InitJobGenerator
            .generate(&PlatformModel::default(), &config)
            .unwrap();
        let container = main_container(&descriptor);
        assert_eq!(env(container, "SMTP_PORT").value.as_deref(), Some("2525"));
        assert_eq!(env(container, "SMTP_USER").value.as_deref(), Some("mailer"));
        assert_eq!(secret_of(container, "SMTP_PASSWORD"), "demo-smtp");
    }

    #[test]
    fn unregistered_smtp_secret_fails() {
        let mut config = demo_config();
        config.smtp = Some(SmtpConfig {
            host: "smtp.demo.local".to_string(),
            port: 587,
            from: "noreply@demo.local".to_string(),
            user: Some("mailer".to_string()),
            password_secret: Some("smtp-relay".to_string()),
            starttls: true,
        });
        let err = InitJobGenerator
            .generate(&PlatformModel::default(), &config)
            .unwrap_err();
        assert_eq!(err, Error::missing_secret("smtp-relay"));
    }

    #[test]
    fn buckets_and_clients_come_from_model() {
        let descriptor = InitJobGenerator
            .generate(&PlatformModel::default(), &demo_config())
            .unwrap();
        let container = main_container(&descriptor);
        assert_eq!(
            env(container, "BUCKETS").value.as_deref(),
            Some("public,uploads,datasets")
        );
        assert_eq!(env(container, "WEB_CLIENT_ID").value.as_deref(), Some("wisefood-web"));
        assert_eq!(
            env(container, "WEB_REDIRECT_URI").value.as_deref(),
            Some("http://demo.local/*")
        );
        assert_eq!(secret_of(container, "API_CLIENT_SECRET"), "demo-catalog-api-client");
    }
}
