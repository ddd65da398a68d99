//! Per-deployment configuration
//!
//! Everything that differs between environments: namespace, routing scheme,
//! domains, secret identifiers and contact details. Secret entries map a
//! logical identifier (e.g. `postgres-superuser`) to the name of a Secret
//! object that already exists in the namespace; values never pass through
//! this crate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default cert-manager ClusterIssuer for https deployments
pub const DEFAULT_CLUSTER_ISSUER: &str = "letsencrypt-prod";

/// Default SMTP submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// External routing scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scheme {
    /// Plain HTTP, no TLS termination at the ingress
    Http,
    /// TLS terminated at the ingress with a cert-manager certificate
    Https,
}

impl Scheme {
    /// Parse a scheme name; anything but `http`/`https` is a route error
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::invalid_route(
                "scheme",
                format!("unsupported scheme '{}', expected http or https", other),
            )),
        }
    }

    /// Scheme name as used in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Whether routes terminate TLS
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Scheme {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Scheme> for String {
    fn from(scheme: Scheme) -> Self {
        scheme.as_str().to_string()
    }
}

/// Subdomains of the root domain used for externally routed services
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Subdomains {
    /// Identity provider
    pub identity: String,
    /// Object-storage S3 API
    pub storage: String,
    /// Object-storage web console
    pub storage_console: String,
    /// Search index HTTP API
    pub search: String,
}

impl Default for Subdomains {
    fn default() -> Self {
        Self {
            identity: "auth".to_string(),
            storage: "s3".to_string(),
            storage_console: "minio".to_string(),
            search: "search".to_string(),
        }
    }
}

/// Platform administrator contact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminContact {
    /// Email address, used for realm notifications
    pub email: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Outgoing mail settings for the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Sender address
    pub from: String,
    /// Login user, if the relay requires authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Secret identifier holding the relay password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<String>,
    /// Upgrade the connection with STARTTLS
    #[serde(default = "default_true")]
    pub starttls: bool,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_true() -> bool {
    true
}

fn default_cluster_issuer() -> String {
    DEFAULT_CLUSTER_ISSUER.to_string()
}

/// Validated per-deployment configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Target namespace for every resource
    pub namespace: String,
    /// External routing scheme
    pub scheme: Scheme,
    /// Root domain (e.g. "wisefood.example.org")
    pub domain: String,
    /// Subdomains for routed services
    #[serde(default)]
    pub subdomains: Subdomains,
    /// Logical secret identifier -> Secret object name
    pub secrets: BTreeMap<String, String>,
    /// Administrator contact
    pub admin: AdminContact,
    /// Optional outgoing mail settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
    /// StorageClass for persistent volume claims (cluster default if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// cert-manager ClusterIssuer used when the scheme is https
    #[serde(default = "default_cluster_issuer")]
    pub cluster_issuer: String,
}

/// Check a DNS-1123 label (lowercase alphanumerics and '-', max 63)
pub fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}

/// Check a DNS-1123 subdomain (dot-separated labels, max 253)
pub fn is_dns_subdomain(value: &str) -> bool {
    !value.is_empty() && value.len() <= 253 && value.split('.').all(is_dns_label)
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

impl DeploymentConfig {
    /// Parse and validate a configuration document
    pub fn from_yaml(input: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(input)
            .map_err(|e| Error::invalid_config("config", e.to_string()))?;
        // An unsupported scheme is a routing error, not a parse error
        if let Some(scheme) = raw.get("scheme").and_then(serde_yaml::Value::as_str) {
            Scheme::parse(scheme)?;
        }
        let config: Self = serde_yaml::from_value(raw)
            .map_err(|e| Error::invalid_config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject structurally invalid configuration with the offending field path
    pub fn validate(&self) -> Result<()> {
        if !is_dns_label(&self.namespace) {
            return Err(Error::invalid_config(
                "namespace",
                format!("'{}' is not a valid DNS-1123 label", self.namespace),
            ));
        }
        if !is_dns_subdomain(&self.domain) {
            return Err(Error::invalid_config(
                "domain",
                format!("'{}' is not a valid domain name", self.domain),
            ));
        }

        let subdomains = [
            ("subdomains.identity", &self.subdomains.identity),
            ("subdomains.storage", &self.subdomains.storage),
            ("subdomains.storageConsole", &self.subdomains.storage_console),
            ("subdomains.search", &self.subdomains.search),
        ];
        for (index, (field, value)) in subdomains.iter().enumerate() {
            if !is_dns_label(value) {
                return Err(Error::invalid_config(
                    *field,
                    format!("'{}' is not a valid DNS-1123 label", value),
                ));
            }
            // Two routes on one host would be merged by the ingress controller
            if let Some((other, _)) = subdomains[..index].iter().find(|(_, v)| v == value) {
                return Err(Error::invalid_config(
                    *field,
                    format!("'{}' is already used by {}", value, other),
                ));
            }
        }

        for (id, secret_name) in &self.secrets {
            if id.is_empty() {
                return Err(Error::invalid_config("secrets", "empty secret identifier"));
            }
            if !is_dns_subdomain(secret_name) {
                return Err(Error::invalid_config(
                    format!("secrets.{}", id),
                    format!("'{}' is not a valid Secret name", secret_name),
                ));
            }
        }

        if !is_email(&self.admin.email) {
            return Err(Error::invalid_config(
                "admin.email",
                format!("'{}' is not an email address", self.admin.email),
            ));
        }

        if let Some(ref smtp) = self.smtp {
            if smtp.host.is_empty() {
                return Err(Error::invalid_config("smtp.host", "must not be empty"));
            }
            if smtp.port == 0 {
                return Err(Error::invalid_config("smtp.port", "must be non-zero"));
            }
            if !is_email(&smtp.from) {
                return Err(Error::invalid_config(
                    "smtp.from",
                    format!("'{}' is not an email address", smtp.from),
                ));
            }
            if smtp.user.is_some() && smtp.password_secret.is_none() {
                return Err(Error::invalid_config(
                    "smtp.passwordSecret",
                    "required when smtp.user is set",
                ));
            }
        }

        if let Some(ref class) = self.storage_class {
            if !is_dns_subdomain(class) {
                return Err(Error::invalid_config(
                    "storageClass",
                    format!("'{}' is not a valid StorageClass name", class),
                ));
            }
        }
        if self.scheme.is_tls() && !is_dns_subdomain(&self.cluster_issuer) {
            return Err(Error::invalid_config(
                "clusterIssuer",
                format!("'{}' is not a valid issuer name", self.cluster_issuer),
            ));
        }
        Ok(())
    }

    /// Secret object name registered for a logical identifier
    pub fn secret_name(&self, secret_id: &str) -> Result<&str> {
        self.secrets
            .get(secret_id)
            .map(String::as_str)
            .ok_or_else(|| Error::missing_secret(secret_id))
    }

    /// Fully qualified host for a subdomain; an empty subdomain is the apex
    pub fn host(&self, subdomain: &str) -> String {
        if subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", subdomain, self.domain)
        }
    }

    /// External base URL for a subdomain under the configured scheme
    pub fn external_url(&self, subdomain: &str) -> String {
        format!("{}://{}", self.scheme, self.host(subdomain))
    }

    /// Name of the TLS Secret shared by every route of the deployment
    pub fn tls_secret_name(&self) -> String {
        format!("{}-tls", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
namespace: demo
scheme: https
domain: demo.local
secrets:
  postgres-superuser: demo-postgres
admin:
  email: ops@demo.local
smtp:
  host: smtp.demo.local
  from: noreply@demo.local
"#;

    fn config() -> DeploymentConfig {
        DeploymentConfig::from_yaml(CONFIG).unwrap()
    }

    #[test]
    fn parses_with_defaults() {
        let config = config();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.subdomains, Subdomains::default());
        assert_eq!(config.cluster_issuer, DEFAULT_CLUSTER_ISSUER);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert!(smtp.starttls);
    }

    #[test]
    fn urls_follow_scheme() {
        let mut config = config();
        assert_eq!(config.external_url("auth"), "https://auth.demo.local");
        assert_eq!(config.external_url(""), "https://demo.local");

        config.scheme = Scheme::Http;
        assert_eq!(config.external_url("auth"), "http://auth.demo.local");
        assert_eq!(config.tls_secret_name(), "demo-tls");
    }

    #[test]
    fn unsupported_scheme_is_a_route_error() {
        assert!(matches!(
            Scheme::parse("ftp"),
            Err(Error::InvalidRouteConfiguration { .. })
        ));

        let yaml = CONFIG.replace("scheme: https", "scheme: ftp");
        let err = DeploymentConfig::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err,
            Error::invalid_route("scheme", "unsupported scheme 'ftp', expected http or https")
        );
    }

    #[test]
    fn secret_lookup_fails_fast() {
        let config = config();
        assert_eq!(config.secret_name("postgres-superuser").unwrap(), "demo-postgres");
        assert_eq!(
            config.secret_name("minio-root").unwrap_err(),
            Error::missing_secret("minio-root")
        );
    }

    #[test]
    fn rejects_invalid_namespace() {
        let mut config = config();
        config.namespace = "Demo_NS".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "namespace"));
    }

    #[test]
    fn subdomains_must_be_distinct() {
        let yaml = CONFIG.replace(
            "admin:",
            "subdomains:\n  identity: auth\n  storage: auth\n  storageConsole: auth\n  search: auth\nadmin:",
        );
        let err = DeploymentConfig::from_yaml(&yaml).unwrap_err();
        assert_eq!(
            err,
            Error::invalid_config(
                "subdomains.storage",
                "'auth' is already used by subdomains.identity"
            )
        );

        let mut config = config();
        config.subdomains.search = config.subdomains.storage_console.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("subdomains.search"));
        assert!(err.to_string().contains("subdomains.storageConsole"));
    }

    #[test]
    fn rejects_bad_admin_email() {
        let mut config = config();
        config.admin.email = "ops".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "admin.email"));
    }

    #[test]
    fn smtp_user_requires_password_secret() {
        let mut config = config();
        if let Some(ref mut smtp) = config.smtp {
            smtp.user = Some("mailer".to_string());
        }
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, Error::InvalidConfiguration { ref field, .. } if field == "smtp.passwordSecret")
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = format!("{}replicas: 3\n", CONFIG);
        let err = DeploymentConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("replicas"));
    }

    #[test]
    fn dns_helpers() {
        assert!(is_dns_label("wisefood-prod"));
        assert!(!is_dns_label("-prod"));
        assert!(!is_dns_label(""));
        assert!(is_dns_subdomain("demo.local"));
        assert!(!is_dns_subdomain("demo..local"));
    }
}
