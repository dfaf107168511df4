use serde_json::json;
use serde_yaml::Value;
use tracing::debug;

use super::ManifestMutator;
use crate::dependencies::{split_image, POD_CONTAINERS_PATH};
use crate::error::{Result, StatefulError};
use crate::events::Reporter;
use crate::settings::ClusterProfile;
use crate::store::{get_path, get_path_mut, set_path};
use crate::types::PluginContext;

pub const LINKED_TAG: &str = "linked";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CLAIM_NAME: &str = "data";

const NAMESPACE_PATH: &str = "metadata.namespace";
const CLAIM_TEMPLATES_PATH: &str = "spec.volumeClaimTemplates";

/// Container names that should run a locally linked image.
///
/// A dependent counts when a performer with its module id is linked in the
/// current context and advertises a `service:<name>` label.
pub fn linked_services(context: &PluginContext) -> Vec<String> {
    context
        .performer
        .dependents
        .iter()
        .filter_map(|dependent| context.linked_performer(dependent))
        .filter_map(|performer| performer.service_name())
        .map(str::to_string)
        .collect()
}

fn prefix_namespace(manifest: &mut Value, instance_id: &str) -> Result<()> {
    let namespace = get_path(manifest, NAMESPACE_PATH)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string();
    set_path(
        manifest,
        NAMESPACE_PATH,
        Value::String(format!("{instance_id}-{namespace}")),
    )
}

/// Namespaces a Service under its instance.
pub struct ServiceMutator {
    instance_id: String,
}

impl ServiceMutator {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }
}

impl ManifestMutator for ServiceMutator {
    fn mutate(&self, manifest: &mut Value) -> Result<()> {
        prefix_namespace(manifest, &self.instance_id)
    }
}

/// Namespaces a StatefulSet, pins its claim template to the cluster profile
/// and points linked containers at their local images.
pub struct StatefulMutator {
    instance_id: String,
    profile: ClusterProfile,
    linked: Vec<String>,
    reporter: Reporter,
}

impl StatefulMutator {
    pub fn new(
        instance_id: impl Into<String>,
        profile: ClusterProfile,
        linked: Vec<String>,
        reporter: Reporter,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            profile,
            linked,
            reporter,
        }
    }

    fn normalize_claims(&self, manifest: &mut Value) -> Result<()> {
        let name = get_path(manifest, CLAIM_TEMPLATES_PATH)
            .and_then(|claims| claims.get(0))
            .and_then(|claim| claim.get("metadata"))
            .and_then(|metadata| metadata.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CLAIM_NAME)
            .to_string();

        let claim = json!({
            "metadata": { "name": name },
            "spec": {
                "accessModes": [self.profile.access_mode],
                "storageClassName": self.profile.storage_class,
                "resources": {
                    "requests": { "storage": self.profile.capacity },
                },
            },
        });
        let claims = Value::Sequence(vec![serde_yaml::to_value(claim)?]);
        set_path(manifest, CLAIM_TEMPLATES_PATH, claims)
    }

    fn link_images(&self, manifest: &mut Value) -> Result<()> {
        if self.linked.is_empty() {
            return Ok(());
        }

        let Some(Value::Sequence(containers)) = get_path_mut(manifest, POD_CONTAINERS_PATH) else {
            debug!("No pod containers to link");
            return Ok(());
        };

        for service in &self.linked {
            let Some(container) = containers
                .iter_mut()
                .find(|c| c.get("name").and_then(Value::as_str) == Some(service.as_str()))
            else {
                debug!("No container named {} to link", service);
                continue;
            };

            let image = container
                .get("image")
                .and_then(Value::as_str)
                .ok_or_else(|| StatefulError::InvalidManifest {
                    path: POD_CONTAINERS_PATH.into(),
                    reason: format!("container {service} has no image"),
                })?;
            let linked = split_image(image).with_tag(LINKED_TAG);

            self.reporter
                .info(format!("Linked {service} container to {linked}"));
            if let Some(slot) = container.get_mut("image") {
                *slot = Value::String(linked);
            }
        }
        Ok(())
    }
}

impl ManifestMutator for StatefulMutator {
    fn mutate(&self, manifest: &mut Value) -> Result<()> {
        prefix_namespace(manifest, &self.instance_id)?;
        self.normalize_claims(manifest)?;
        self.link_images(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelSink, EventLevel};
    use std::sync::Arc;

    fn stateful(extra: &str) -> Value {
        serde_yaml::from_str(&format!(
            r#"
kind: StatefulSet
metadata:
  name: db
{extra}
spec:
  template:
    spec:
      containers:
        - name: db
          image: registry.local:5000/db:1.0.0
        - name: api
          image: api:2.1
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_service_namespace_defaults() {
        let mut manifest: Value = serde_yaml::from_str("kind: Service\nmetadata:\n  name: db\n").unwrap();
        ServiceMutator::new("dev1").mutate(&mut manifest).unwrap();
        assert_eq!(manifest["metadata"]["namespace"], Value::from("dev1-default"));
    }

    #[test]
    fn test_stateful_claims_and_links() {
        let (sink, mut events) = ChannelSink::new();
        let mutator = StatefulMutator::new(
            "dev1",
            ClusterProfile::default(),
            vec!["api".to_string()],
            Reporter::new(Arc::new(sink)),
        );

        let mut manifest = stateful("  namespace: storage");
        let claims = serde_yaml::from_str("- metadata: { name: pgdata }\n- metadata: { name: extra }\n").unwrap();
        set_path(&mut manifest, CLAIM_TEMPLATES_PATH, claims).unwrap();
        mutator.mutate(&mut manifest).unwrap();

        assert_eq!(manifest["metadata"]["namespace"], Value::from("dev1-storage"));

        let claims = manifest["spec"]["volumeClaimTemplates"].as_sequence().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0]["metadata"]["name"], Value::from("pgdata"));
        assert_eq!(claims[0]["spec"]["storageClassName"], Value::from("local-storage"));
        assert_eq!(claims[0]["spec"]["resources"]["requests"]["storage"], Value::from("50Mi"));

        let containers = &manifest["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers[0]["image"], Value::from("registry.local:5000/db:1.0.0"));
        assert_eq!(containers[1]["image"], Value::from("api:linked"));

        let event = events.try_recv().unwrap();
        assert_eq!(event.level, EventLevel::Info);
    }

    #[test]
    fn test_missing_claim_template_gets_default_name() {
        let (sink, _events) = ChannelSink::new();
        let mutator = StatefulMutator::new(
            "dev1",
            ClusterProfile::default(),
            Vec::new(),
            Reporter::new(Arc::new(sink)),
        );
        let mut manifest = stateful("");
        mutator.mutate(&mut manifest).unwrap();

        let claims = manifest["spec"]["volumeClaimTemplates"].as_sequence().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0]["metadata"]["name"], Value::from("data"));
    }

    #[test]
    fn test_digest_pinned_image_is_relinked_by_name() {
        let (sink, _events) = ChannelSink::new();
        let mutator = StatefulMutator::new(
            "dev1",
            ClusterProfile::default(),
            vec!["api".to_string()],
            Reporter::new(Arc::new(sink)),
        );
        let mut manifest = stateful("");
        manifest["spec"]["template"]["spec"]["containers"][1]["image"] = Value::from("api@sha256:0f3c9a");
        mutator.mutate(&mut manifest).unwrap();

        let containers = &manifest["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers[1]["image"], Value::from("api:linked"));
    }
}
