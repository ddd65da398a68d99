//! CLI commands

use std::path::Path;

use clap::ValueEnum;
use tracing::debug;
use wisefood_common::{DeploymentConfig, PlatformModel};

use crate::{Error, Result};

pub mod components;
pub mod render;
pub mod validate;

/// Manifest output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Multi-document YAML (default)
    #[default]
    Yaml,
    /// JSON array
    Json,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate a deployment configuration file
pub fn load_config(path: &Path) -> Result<DeploymentConfig> {
    let config = DeploymentConfig::from_yaml(&read(path)?)?;
    debug!(path = %path.display(), namespace = %config.namespace, "loaded configuration");
    Ok(config)
}

/// Load a model file, or the built-in model when none is given
pub fn load_model(path: Option<&Path>) -> Result<PlatformModel> {
    match path {
        Some(path) => {
            let model = PlatformModel::from_yaml(&read(path)?)?;
            debug!(path = %path.display(), "loaded platform model");
            Ok(model)
        }
        None => Ok(PlatformModel::default()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use tempfile::TempDir;

    pub const CONFIG: &str = r#"
namespace: demo
scheme: http
domain: demo.local
secrets:
  postgres-superuser: pg-superuser
  postgres-identity: pg-keycloak
  postgres-application: pg-wisefood
  redis: redis-auth
  elastic: elastic-auth
  minio-root: minio-root
  keycloak-admin: keycloak-admin
  catalog-api-client: catalog-api-oidc
admin:
  email: ops@demo.local
"#;

    /// Write `content` to `name` inside a fresh temp dir
    pub fn write(content: &str, name: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{write, CONFIG};
    use super::*;

    #[test]
    fn loads_valid_config() {
        let (_dir, path) = write(CONFIG, "demo.yaml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.namespace, "demo");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config(Path::new("/nonexistent/wisefood.yaml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn invalid_config_is_a_compile_error() {
        let (_dir, path) = write(&CONFIG.replace("scheme: http", "scheme: gopher"), "bad.yaml");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.to_string().contains("gopher"));
    }

    #[test]
    fn model_defaults_to_builtin() {
        assert_eq!(load_model(None).unwrap(), PlatformModel::default());

        let mut model = PlatformModel::default();
        model.ingress_class = "traefik".to_string();
        let (_dir, path) = write(&serde_yaml::to_string(&model).unwrap(), "model.yaml");
        assert_eq!(load_model(Some(path.as_path())).unwrap().ingress_class, "traefik");
    }
}
