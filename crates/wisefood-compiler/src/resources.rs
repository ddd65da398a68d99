//! Component descriptors and the aggregated resource set
//!
//! Resources are keyed `<kind>/<name>` with a lower-case kind, the same key
//! the API server uses to identify an object within a namespace. A key may
//! be produced only once per deployment.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use wisefood_common::{Error, Result};

use crate::k8s::{
    Certificate, ConfigMap, Deployment, HasApiResource, Ingress, Job, ObjectMeta,
    PersistentVolumeClaim, Role, RoleBinding, Service, ServiceAccount, StatefulSet,
};

/// Any document a generator can emit
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    /// ServiceAccount
    ServiceAccount(ServiceAccount),
    /// Role
    Role(Role),
    /// RoleBinding
    RoleBinding(RoleBinding),
    /// ConfigMap
    ConfigMap(ConfigMap),
    /// PersistentVolumeClaim
    PersistentVolumeClaim(PersistentVolumeClaim),
    /// Service
    Service(Service),
    /// StatefulSet
    StatefulSet(StatefulSet),
    /// Deployment
    Deployment(Deployment),
    /// Job
    Job(Job),
    /// Certificate
    Certificate(Certificate),
    /// Ingress
    Ingress(Ingress),
}

/// Implements `From<$type> for Resource` and the per-variant accessors
macro_rules! resource_variants {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(resource: $variant) -> Self {
                    Self::$variant(resource)
                }
            }
        )+

        impl Resource {
            /// Kubernetes kind
            pub fn kind(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$variant as HasApiResource>::KIND,)+
                }
            }

            /// Object metadata
            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(Self::$variant(r) => &r.metadata,)+
                }
            }
        }
    };
}

resource_variants!(
    ServiceAccount,
    Role,
    RoleBinding,
    ConfigMap,
    PersistentVolumeClaim,
    Service,
    StatefulSet,
    Deployment,
    Job,
    Certificate,
    Ingress,
);

impl Resource {
    /// Object name
    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Unique key within a deployment: `<kind>/<name>`
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind().to_ascii_lowercase(), self.name())
    }

    /// Whether this is a primary workload (StatefulSet, Deployment or Job)
    pub fn is_workload(&self) -> bool {
        matches!(
            self,
            Self::StatefulSet(_) | Self::Deployment(_) | Self::Job(_)
        )
    }

    /// Serialize to a JSON document
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::serialization_for(self.kind(), e.to_string()))
    }
}

/// Apply priority for a kind (lower = apply first)
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "ServiceAccount" => 2,
        "Role" => 3,
        "RoleBinding" => 4,
        "ConfigMap" => 5,
        "PersistentVolumeClaim" => 6,
        "Service" => 7,
        "StatefulSet" | "Deployment" => 8,
        "Job" => 9,
        _ => 10, // certificates and routes come last
    }
}

/// One generator's output: logical resource key -> document
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentDescriptor {
    component: String,
    resources: BTreeMap<String, Resource>,
}

impl ComponentDescriptor {
    /// Collect a component's resources, rejecting keys produced twice
    pub fn from_resources(
        component: &str,
        resources: impl IntoIterator<Item = Resource>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for resource in resources {
            let key = resource.key();
            if map.contains_key(&key) {
                return Err(Error::DuplicateResourceName {
                    name: key,
                    first: component.to_string(),
                    second: component.to_string(),
                });
            }
            map.insert(key, resource);
        }
        Ok(Self {
            component: component.to_string(),
            resources: map,
        })
    }

    /// Component name
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Resources keyed by `<kind>/<name>`
    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    /// Look up a resource by key
    pub fn get(&self, key: &str) -> Option<&Resource> {
        self.resources.get(key)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the component produced nothing
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    component: String,
    resource: Resource,
}

/// Every resource of one deployment, keyed globally unique
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSet {
    entries: BTreeMap<String, Entry>,
}

impl ResourceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a descriptor, failing on the first key already present.
    ///
    /// On error the set is left unchanged.
    pub fn merge(&mut self, descriptor: ComponentDescriptor) -> Result<()> {
        if let Some((key, existing)) = descriptor
            .resources
            .keys()
            .find_map(|key| self.entries.get(key).map(|e| (key, e)))
        {
            return Err(Error::DuplicateResourceName {
                name: key.clone(),
                first: existing.component.clone(),
                second: descriptor.component.clone(),
            });
        }

        for (key, resource) in descriptor.resources {
            debug!(component = %descriptor.component, resource = %key, "merged resource");
            self.entries.insert(
                key,
                Entry {
                    component: descriptor.component.clone(),
                    resource,
                },
            );
        }
        Ok(())
    }

    /// Look up a resource by key
    pub fn get(&self, key: &str) -> Option<&Resource> {
        self.entries.get(key).map(|e| &e.resource)
    }

    /// Component that produced a resource
    pub fn component_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.component.as_str())
    }

    /// All resources in apply order (kind priority, then key)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        let mut ordered: Vec<_> = self
            .entries
            .iter()
            .map(|(k, e)| (k.as_str(), &e.resource))
            .collect();
        ordered.sort_by_key(|(key, resource)| (kind_priority(resource.kind()), *key));
        ordered.into_iter()
    }

    /// Number of resources of a kind
    pub fn count_kind(&self, kind: &str) -> usize {
        self.entries
            .values()
            .filter(|e| e.resource.kind() == kind)
            .count()
    }

    /// Number of primary workloads
    pub fn workload_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.resource.is_workload())
            .count()
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON documents in apply order
    pub fn documents(&self) -> Result<Vec<Value>> {
        self.iter().map(|(_, r)| r.to_value()).collect()
    }

    /// Multi-document YAML in apply order
    pub fn to_yaml(&self) -> Result<String> {
        let docs = self
            .documents()?
            .iter()
            .map(|doc| serde_yaml::to_string(doc).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(docs.join("---\n"))
    }

    /// JSON array in apply order
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.documents()?).map_err(|e| Error::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> Resource {
        ServiceAccount::new(ObjectMeta::new(name, "demo")).into()
    }

    fn config_map(name: &str) -> Resource {
        ConfigMap::new(ObjectMeta::new(name, "demo")).into()
    }

    #[test]
    fn key_uses_lowercase_kind() {
        assert_eq!(account("platform-init").key(), "serviceaccount/platform-init");
        assert_eq!(config_map("postgres-init").kind(), "ConfigMap");
    }

    #[test]
    fn same_name_different_kind_is_allowed() {
        let descriptor = ComponentDescriptor::from_resources(
            "init-job",
            vec![account("platform-init"), config_map("platform-init")],
        )
        .unwrap();
        assert_eq!(descriptor.len(), 2);
    }

    #[test]
    fn duplicate_within_component_is_rejected() {
        let err = ComponentDescriptor::from_resources("cache", vec![account("redis"), account("redis")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResourceName { ref name, .. } if name == "serviceaccount/redis"));
    }

    #[test]
    fn merge_rejects_collision_and_leaves_set_unchanged() {
        let mut set = ResourceSet::new();
        set.merge(ComponentDescriptor::from_resources("a", vec![account("shared")]).unwrap())
            .unwrap();

        let second =
            ComponentDescriptor::from_resources("b", vec![config_map("b-config"), account("shared")])
                .unwrap();
        let err = set.merge(second).unwrap_err();

        assert_eq!(
            err,
            Error::DuplicateResourceName {
                name: "serviceaccount/shared".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }
        );
        assert_eq!(set.len(), 1);
        assert!(set.get("configmap/b-config").is_none());
    }

    #[test]
    fn iter_follows_apply_order() {
        let mut set = ResourceSet::new();
        set.merge(
            ComponentDescriptor::from_resources("x", vec![config_map("a"), account("z")]).unwrap(),
        )
        .unwrap();

        let keys: Vec<_> = set.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["serviceaccount/z", "configmap/a"]);
        assert_eq!(set.component_of("configmap/a"), Some("x"));
    }

    #[test]
    fn yaml_output_separates_documents() {
        let mut set = ResourceSet::new();
        set.merge(
            ComponentDescriptor::from_resources("x", vec![config_map("a"), account("b")]).unwrap(),
        )
        .unwrap();

        let yaml = set.to_yaml().unwrap();
        assert_eq!(yaml.matches("---\n").count(), 1);
        assert!(yaml.contains("kind: ServiceAccount"));
        assert!(yaml.contains("kind: ConfigMap"));
    }
}
