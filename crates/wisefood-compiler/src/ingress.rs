//! Ingress route builder
//!
//! Turns an ordered list of (path, match kind, service, port) rules into a
//! networking.k8s.io `Ingress`. The scheme decides the topology:
//!
//! - `http`: a plain route, no TLS block
//! - `https`: one TLS block for the host naming the `<namespace>-tls`
//!   Secret issued by cert-manager, plus redirect annotations
//!
//! Ingress controllers match paths first-match-wins within a host, so the
//! emitted path order is exactly the input order.

use std::collections::BTreeMap;

use wisefood_common::{DeploymentConfig, Error, PlatformModel, Result};

use crate::k8s::{
    HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTls, ObjectMeta, ServiceBackendPort,
};

/// Annotation forcing http -> https redirects
pub const SSL_REDIRECT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/ssl-redirect";

/// Annotation forcing redirects even without a TLS block on this host
pub const FORCE_SSL_REDIRECT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/force-ssl-redirect";

/// Annotation lifting the request body limit (uploads to object storage)
pub const PROXY_BODY_SIZE_ANNOTATION: &str = "nginx.ingress.kubernetes.io/proxy-body-size";

/// How a rule's pattern is matched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathMatch {
    /// Element-wise path prefix
    Prefix,
    /// Exact path
    Exact,
    /// Controller-defined matching (regex for ingress-nginx)
    ImplementationSpecific,
}

impl PathMatch {
    /// Kubernetes `pathType` value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "Prefix",
            Self::Exact => "Exact",
            Self::ImplementationSpecific => "ImplementationSpecific",
        }
    }
}

/// One routing rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRule {
    /// URL path pattern
    pub pattern: String,
    /// Match kind
    pub match_kind: PathMatch,
    /// Target Service name
    pub service: String,
    /// Target Service port
    pub port: u16,
}

impl PathRule {
    /// Create a rule
    pub fn new(
        pattern: impl Into<String>,
        match_kind: PathMatch,
        service: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            match_kind,
            service: service.into(),
            port,
        }
    }

    /// Prefix rule
    pub fn prefix(pattern: impl Into<String>, service: impl Into<String>, port: u16) -> Self {
        Self::new(pattern, PathMatch::Prefix, service, port)
    }

    fn validate(&self, route: &str, index: usize) -> Result<()> {
        if !self.pattern.starts_with('/') {
            return Err(Error::invalid_route(
                route,
                format!("rule {}: pattern '{}' must start with '/'", index, self.pattern),
            ));
        }
        if self.service.is_empty() {
            return Err(Error::invalid_route(
                route,
                format!("rule {}: empty target service", index),
            ));
        }
        if self.port == 0 {
            return Err(Error::invalid_route(
                route,
                format!("rule {}: target port must be non-zero", index),
            ));
        }
        Ok(())
    }

    fn to_path(&self) -> HttpIngressPath {
        HttpIngressPath {
            path: self.pattern.clone(),
            path_type: self.match_kind.as_str().to_string(),
            backend: IngressBackend {
                service: IngressServiceBackend {
                    name: self.service.clone(),
                    port: ServiceBackendPort { number: self.port },
                },
            },
        }
    }
}

/// Build the Ingress for one host.
///
/// Caller annotations are applied first; with `https` the redirect
/// annotations are then forced on.
pub fn build_route(
    model: &PlatformModel,
    config: &DeploymentConfig,
    name: &str,
    annotations: &BTreeMap<String, String>,
    host: &str,
    path_rules: &[PathRule],
) -> Result<Ingress> {
    if host.is_empty() {
        return Err(Error::invalid_route(name, "empty host"));
    }
    if path_rules.is_empty() {
        return Err(Error::invalid_route(name, "no path rules"));
    }
    for (index, rule) in path_rules.iter().enumerate() {
        rule.validate(name, index)?;
    }

    let mut metadata = ObjectMeta::new(name, &config.namespace);
    metadata.annotations = annotations.clone();

    let tls = if config.scheme.is_tls() {
        metadata = metadata
            .with_annotation(SSL_REDIRECT_ANNOTATION, "true")
            .with_annotation(FORCE_SSL_REDIRECT_ANNOTATION, "true");
        vec![IngressTls {
            hosts: vec![host.to_string()],
            secret_name: config.tls_secret_name(),
        }]
    } else {
        Vec::new()
    };

    Ok(Ingress::new(
        metadata,
        IngressSpec {
            ingress_class_name: model.ingress_class.clone(),
            tls,
            rules: vec![IngressRule {
                host: host.to_string(),
                http: HttpIngressRuleValue {
                    paths: path_rules.iter().map(PathRule::to_path).collect(),
                },
            }],
        },
    ))
}
