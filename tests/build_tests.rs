mod common;

use stateful_deploy::events::{Event, EventLevel};
use stateful_deploy::render::Renderer;
use stateful_deploy::settings::EngineSettings;
use stateful_deploy::store::ModuleFolder;
use stateful_deploy::types::{Dependent, ModuleKind, Operation, OperationStatus, PerformerKind};
use stateful_deploy::{StatefulError, StatefulPlugin};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn settings() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_millis(10),
        debounce: Duration::from_millis(20),
        stop_grace: Duration::from_millis(10),
        ..EngineSettings::default()
    }
}

async fn next_matching(
    events: &mut UnboundedReceiver<Event>,
    matches: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            let found = matches(&event);
            seen.push(event);
            if found {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    seen
}

#[tokio::test]
async fn test_init_links_config_performers() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let shared = temp_dir.path().join("shared-config");
    std::fs::create_dir_all(&shared).unwrap();
    std::fs::write(shared.join("config.json"), r#"{"values": {"region": "eu-west"}}"#).unwrap();

    let mut context = common::linked_context(&root);
    context.performer.dependents.push(Dependent {
        module_id: "shared-config".to_string(),
    });
    let mut config_performer = common::performer("shared-config", &shared, ModuleKind::Config);
    config_performer.linked = true;
    context.performers.push(config_performer);

    let (reporter, mut events) = common::reporter();
    let plugin = StatefulPlugin::new(settings(), reporter);

    plugin.build_init(&context).await.unwrap();
    plugin.build_init(&context).await.unwrap();

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("config.json")).unwrap()).unwrap();
    assert_eq!(
        config["dependencies"]["shared-config"],
        "file:./../shared-config"
    );

    let linked: Vec<Event> = common::drain(&mut events)
        .into_iter()
        .filter(|e| e.level == EventLevel::Info)
        .collect();
    assert_eq!(linked.len(), 2);
    assert_eq!(linked[0].message, "shared-config config linked!");

    let rendered = Renderer::new().unwrap().render(&ModuleFolder::new(&root)).await.unwrap();
    assert!(rendered.is_complete());
    let variables = std::fs::read_to_string(root.join("dist/config.json")).unwrap();
    assert!(variables.contains("eu-west"));
}

#[tokio::test]
async fn test_init_rejects_non_instanced_performers() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let mut context = common::linked_context(&root);
    context.performer.kind = PerformerKind::Other;

    let (reporter, mut events) = common::reporter();
    let result = StatefulPlugin::new(settings(), reporter).build_init(&context).await;

    assert!(matches!(result, Err(StatefulError::PerformerNotInstanced { .. })));
    let events = common::drain(&mut events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, EventLevel::Error);
}

#[tokio::test]
async fn test_init_without_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    std::fs::remove_file(root.join("config.json")).unwrap();

    let (reporter, _events) = common::reporter();
    let result = StatefulPlugin::new(settings(), reporter)
        .build_init(&common::linked_context(&root))
        .await;
    assert!(matches!(result, Err(StatefulError::ConfigMissing { .. })));
}

#[tokio::test]
async fn test_clear_removes_derived_output() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let folder = ModuleFolder::new(&root);
    Renderer::new().unwrap().render(&folder).await.unwrap();
    assert!(folder.dist_dir().exists());

    let (reporter, _events) = common::reporter();
    let plugin = StatefulPlugin::new(settings(), reporter);
    plugin.build_clear(&common::linked_context(&root)).await.unwrap();
    plugin.build_clear(&common::linked_context(&root)).await.unwrap();

    assert!(!folder.dist_dir().exists());
    assert!(root.join("stateful.yaml").exists());
}

#[tokio::test]
async fn test_build_start_rebuilds_on_change_and_stops() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let context = common::linked_context(&root);
    let (reporter, mut events) = common::reporter();
    let plugin = std::sync::Arc::new(StatefulPlugin::new(settings(), reporter));

    let operation = Operation::new("build-1");
    let task = {
        let plugin = plugin.clone();
        let operation = operation.clone();
        tokio::spawn(async move { plugin.build_start(&context, &operation).await })
    };

    let startup = next_matching(&mut events, |e| {
        e.level == EventLevel::Out && e.message.starts_with("Watching")
    })
    .await;
    assert_eq!(startup[0].level, EventLevel::Info);
    assert_eq!(startup[0].message, "api linked");
    assert!(startup
        .iter()
        .any(|e| e.level == EventLevel::Done && e.message == "Service generated!"));

    std::fs::write(
        root.join("config.json"),
        r#"{"values": {"name": "db2", "port": 5433}}"#,
    )
    .unwrap();

    let rebuild = next_matching(&mut events, |e| e.level == EventLevel::Done).await;
    assert!(rebuild
        .iter()
        .any(|e| e.level == EventLevel::Warning && e.message.ends_with("changed...")));
    let stateful = std::fs::read_to_string(root.join("dist/stateful.yaml")).unwrap();
    assert!(stateful.contains("db2"));

    operation.request_stop();
    timeout(Duration::from_secs(5), task)
        .await
        .expect("watcher did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(operation.status(), OperationStatus::Stopped);
    let tail = common::drain(&mut events);
    assert_eq!(tail.last().map(|e| e.level), Some(EventLevel::Stopped));
}

#[tokio::test]
async fn test_build_start_keeps_watching_after_a_failed_render() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    std::fs::write(root.join("service.yaml"), "metadata:\n  name: ${nope}\n").unwrap();
    let (reporter, mut events) = common::reporter();
    let plugin = std::sync::Arc::new(StatefulPlugin::new(settings(), reporter));

    let operation = Operation::new("build-2");
    let task = {
        let plugin = plugin.clone();
        let operation = operation.clone();
        let context = common::linked_context(&root);
        tokio::spawn(async move { plugin.build_start(&context, &operation).await })
    };

    let startup = next_matching(&mut events, |e| e.message.starts_with("Watching")).await;
    assert!(startup
        .iter()
        .any(|e| e.level == EventLevel::Error && e.message.contains("nope")));

    std::fs::write(root.join("service.yaml"), "metadata:\n  name: ${name}\n").unwrap();
    next_matching(&mut events, |e| e.level == EventLevel::Done).await;
    assert!(root.join("dist/service.yaml").exists());

    operation.request_stop();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_save_during_first_build_triggers_rebuild() {
    let temp_dir = TempDir::new().unwrap();
    let root = common::module_folder(&temp_dir, "db");
    let (reporter, mut events) = common::reporter();
    let plugin = std::sync::Arc::new(StatefulPlugin::new(settings(), reporter));

    let operation = Operation::new("build-3");
    let task = {
        let plugin = plugin.clone();
        let operation = operation.clone();
        let context = common::linked_context(&root);
        tokio::spawn(async move { plugin.build_start(&context, &operation).await })
    };

    next_matching(&mut events, |e| e.message == "Watcher building").await;
    std::fs::write(
        root.join("config.json"),
        r#"{"values": {"name": "db3", "port": 5434}}"#,
    )
    .unwrap();

    let seen = next_matching(&mut events, |e| {
        e.level == EventLevel::Warning && e.message.ends_with("changed...")
    })
    .await;
    assert!(seen.iter().any(|e| e.message == "Service generated!"));
    next_matching(&mut events, |e| e.level == EventLevel::Done).await;

    let stateful = std::fs::read_to_string(root.join("dist/stateful.yaml")).unwrap();
    assert!(stateful.contains("db3"));

    operation.request_stop();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
}
