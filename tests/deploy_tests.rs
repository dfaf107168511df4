mod common;

use async_trait::async_trait;
use serde_yaml::Value;
use stateful_deploy::cluster::{ClusterControl, ClusterOutput, Presence, Reconciler};
use stateful_deploy::error::Result;
use stateful_deploy::events::EventLevel;
use stateful_deploy::render::Renderer;
use stateful_deploy::settings::EngineSettings;
use stateful_deploy::store::ModuleFolder;
use stateful_deploy::types::{Operation, OperationStatus};
use stateful_deploy::{StatefulError, StatefulPlugin};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Records every call; `present` names the manifests the cluster already has.
#[derive(Default)]
struct FakeCluster {
    present: HashSet<String>,
    failing_get: bool,
    failing_apply: Option<String>,
    calls: Mutex<Vec<(String, String, Instant)>>,
}

impl FakeCluster {
    fn with_present(names: &[&str]) -> Self {
        Self {
            present: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn record(&self, action: &str, manifest: &Path) -> String {
        let name = manifest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), name.clone(), Instant::now()));
        name
    }

    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(action, name, _)| format!("{action} {name}"))
            .collect()
    }

    fn instant(&self, call: &str) -> Instant {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(action, name, _)| format!("{action} {name}") == call)
            .map(|(_, _, at)| *at)
            .unwrap()
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
    async fn apply(&self, manifest: &Path) -> Result<ClusterOutput> {
        let name = self.record("apply", manifest);
        if self.failing_apply.as_deref() == Some(name.as_str()) {
            return Err(StatefulError::ClusterCallFailed {
                action: "apply".to_string(),
                manifest: manifest.to_path_buf(),
                reason: "admission webhook denied the request".to_string(),
            });
        }
        Ok(ClusterOutput::new(format!("{name} configured")))
    }

    async fn get(&self, manifest: &Path) -> Result<Presence> {
        let name = self.record("get", manifest);
        if self.failing_get {
            return Err(StatefulError::ClusterCallFailed {
                action: "get".to_string(),
                manifest: manifest.to_path_buf(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(if self.present.contains(&name) {
            Presence::Found(ClusterOutput::new(format!("{name} 1/1")))
        } else {
            Presence::NotFound(format!("{name} not found"))
        })
    }

    async fn delete(&self, manifest: &Path) -> Result<Presence> {
        let name = self.record("delete", manifest);
        Ok(if self.present.contains(&name) {
            Presence::Found(ClusterOutput::new(format!("{name} deleted")))
        } else {
            Presence::NotFound(format!("{name} not found"))
        })
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_millis(10),
        settle_interval: Duration::from_millis(50),
        stop_grace: Duration::from_millis(10),
        ..EngineSettings::default()
    }
}

async fn rendered_module(temp_dir: &TempDir) -> PathBuf {
    let root = common::module_folder(temp_dir, "db");
    Renderer::new()
        .unwrap()
        .render(&ModuleFolder::new(&root))
        .await
        .unwrap()
        .into_result()
        .unwrap();
    root
}

#[tokio::test]
async fn test_existing_stateful_is_recreated_after_settle() {
    let temp_dir = TempDir::new().unwrap();
    let cluster = Arc::new(FakeCluster::with_present(&["stateful.yaml"]));
    let (reporter, mut events) = common::reporter();
    let reconciler = Reconciler::new(cluster.clone(), reporter, Duration::from_millis(50));

    assert_ok!(reconciler.deploy(temp_dir.path()).await);

    assert_eq!(
        cluster.calls(),
        vec![
            "apply volume.yaml",
            "apply service.yaml",
            "get stateful.yaml",
            "delete stateful.yaml",
            "apply stateful.yaml",
        ]
    );
    let waited = cluster.instant("apply stateful.yaml") - cluster.instant("delete stateful.yaml");
    assert!(waited >= Duration::from_millis(50), "{waited:?}");

    let events = common::drain(&mut events);
    assert!(events
        .iter()
        .any(|e| e.level == EventLevel::Out && e.message == "stateful.yaml deleted"));
}

#[tokio::test]
async fn test_absent_stateful_is_applied_without_delete() {
    let temp_dir = TempDir::new().unwrap();
    let cluster = Arc::new(FakeCluster::default());
    let (reporter, mut events) = common::reporter();
    let reconciler = Reconciler::new(cluster.clone(), reporter, Duration::from_secs(60));

    let started = Instant::now();
    reconciler.deploy(temp_dir.path()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(
        cluster.calls(),
        vec![
            "apply volume.yaml",
            "apply service.yaml",
            "get stateful.yaml",
            "apply stateful.yaml",
        ]
    );
    assert!(common::drain(&mut events)
        .iter()
        .any(|e| e.level == EventLevel::Warning));
}

#[tokio::test]
async fn test_failed_lookup_counts_as_absent() {
    let temp_dir = TempDir::new().unwrap();
    let cluster = Arc::new(FakeCluster {
        failing_get: true,
        ..FakeCluster::default()
    });
    let (reporter, _events) = common::reporter();

    Reconciler::new(cluster.clone(), reporter, Duration::from_secs(60))
        .deploy(temp_dir.path())
        .await
        .unwrap();

    assert_eq!(cluster.calls().last().map(String::as_str), Some("apply stateful.yaml"));
    assert!(!cluster.calls().iter().any(|c| c.starts_with("delete")));
}

#[tokio::test]
async fn test_failed_apply_aborts_the_sequence() {
    let temp_dir = TempDir::new().unwrap();
    let cluster = Arc::new(FakeCluster {
        failing_apply: Some("service.yaml".to_string()),
        ..FakeCluster::default()
    });
    let (reporter, _events) = common::reporter();

    let error = assert_err!(
        Reconciler::new(cluster.clone(), reporter, Duration::from_millis(1))
            .deploy(temp_dir.path())
            .await
    );

    assert!(matches!(error, StatefulError::ClusterCallFailed { .. }));
    assert_eq!(cluster.calls(), vec!["apply volume.yaml", "apply service.yaml"]);
}

#[tokio::test]
async fn test_run_start_deploys_linked_manifests() {
    let temp_dir = TempDir::new().unwrap();
    let root = rendered_module(&temp_dir).await;
    let context = common::linked_context(&root);
    let cluster = Arc::new(FakeCluster::default());
    let (reporter, mut events) = common::reporter();
    let plugin = Arc::new(StatefulPlugin::new(settings(), reporter).with_cluster(cluster.clone()));

    let operation = Operation::new("run-1");
    let task = {
        let plugin = plugin.clone();
        let operation = operation.clone();
        tokio::spawn(async move { plugin.run_start(&context, &operation).await })
    };

    let mut done = false;
    while let Some(event) = events.recv().await {
        assert_eq!(event.operation_id.as_deref(), Some("run-1"));
        if event.level == EventLevel::Done {
            done = true;
            break;
        }
        assert_ne!(event.level, EventLevel::Error, "{}", event.message);
    }
    assert!(done);

    let tmp = root.join("tmp");
    let service: Value =
        serde_yaml::from_str(&std::fs::read_to_string(tmp.join("service.yaml")).unwrap()).unwrap();
    let stateful: Value =
        serde_yaml::from_str(&std::fs::read_to_string(tmp.join("stateful.yaml")).unwrap()).unwrap();
    let volume: Value =
        serde_yaml::from_str(&std::fs::read_to_string(tmp.join("volume.yaml")).unwrap()).unwrap();

    assert_eq!(service["metadata"]["namespace"], Value::from("dev1-storage"));
    assert_eq!(stateful["metadata"]["namespace"], Value::from("dev1-storage"));
    assert_eq!(volume["metadata"]["name"], Value::from("volume-dev1-db"));

    let claims = stateful["spec"]["volumeClaimTemplates"].as_sequence().unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0]["metadata"]["name"], Value::from("pgdata"));
    assert_eq!(claims[0]["spec"]["resources"]["requests"]["storage"], Value::from("50Mi"));

    let containers = &stateful["spec"]["template"]["spec"]["containers"];
    assert_eq!(containers[0]["image"], Value::from("myapp:1.2.3"));
    assert_eq!(containers[1]["image"], Value::from("registry.local:5000/api:linked"));

    operation.request_stop();
    task.await.unwrap().unwrap();
    assert_eq!(operation.status(), OperationStatus::Stopped);
    assert!(common::drain(&mut events)
        .iter()
        .any(|e| e.level == EventLevel::Stopped));
}

#[tokio::test]
async fn test_run_start_without_instance_reports_and_fails() {
    let temp_dir = TempDir::new().unwrap();
    let root = rendered_module(&temp_dir).await;
    let mut context = common::linked_context(&root);
    context.instance = None;
    let (reporter, mut events) = common::reporter();
    let plugin = StatefulPlugin::new(settings(), reporter).with_cluster(Arc::new(FakeCluster::default()));

    let operation = Operation::new("run-2");
    let result = plugin.run_start(&context, &operation).await;

    assert!(matches!(result, Err(StatefulError::MissingInstance { .. })));
    assert_eq!(operation.status(), OperationStatus::Stopped);
    assert!(common::drain(&mut events)
        .iter()
        .any(|e| e.level == EventLevel::Error));
}

#[tokio::test]
async fn test_run_clear_warns_per_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let context = common::linked_context(&root);
    let cluster = Arc::new(FakeCluster::with_present(&["stateful.yaml"]));
    let (reporter, mut events) = common::reporter();
    let plugin = StatefulPlugin::new(settings(), reporter).with_cluster(cluster.clone());

    assert_ok!(plugin.run_clear(&context).await);

    assert_eq!(cluster.calls(), vec!["delete stateful.yaml", "delete service.yaml"]);
    let warnings: Vec<String> = common::drain(&mut events)
        .into_iter()
        .filter(|e| e.level == EventLevel::Warning)
        .map(|e| e.message)
        .collect();
    assert_eq!(
        warnings,
        vec!["stateful.yaml removed...", "service.yaml is not present..."]
    );
}
