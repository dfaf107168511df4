#![allow(dead_code)]

use stateful_deploy::events::{ChannelSink, Event, Reporter};
use stateful_deploy::types::{
    Dependent, Instance, ModuleInfo, ModuleKind, Performer, PerformerKind, PluginContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const FIXTURE_FILES: [&str; 3] = ["config.json", "service.yaml", "stateful.yaml"];

/// Copies the fixture module into `<temp>/<name>` and returns its path.
pub fn module_folder(temp_dir: &TempDir, name: &str) -> PathBuf {
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/module");
    let folder = temp_dir.path().join(name);
    std::fs::create_dir_all(&folder).unwrap();
    for file in FIXTURE_FILES {
        std::fs::copy(fixture.join(file), folder.join(file)).unwrap();
    }
    folder
}

pub fn reporter() -> (Reporter, UnboundedReceiver<Event>) {
    let (sink, events) = ChannelSink::new();
    (Reporter::new(Arc::new(sink)), events)
}

pub fn drain(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub fn performer(id: &str, folder: &Path, kind: ModuleKind) -> Performer {
    Performer {
        performer_id: id.to_string(),
        kind: PerformerKind::Instanced,
        folder: folder.to_path_buf(),
        module: ModuleInfo {
            module_id: id.to_string(),
            fullname: format!("@demo/{id}"),
            kind,
        },
        linked: false,
        labels: Vec::new(),
        dependents: Vec::new(),
    }
}

/// A stateful `db` performer depending on `api`, with `api` linked.
pub fn linked_context(folder: &Path) -> PluginContext {
    let mut db = performer("db", folder, ModuleKind::Stateful);
    db.dependents.push(Dependent {
        module_id: "api".to_string(),
    });

    let mut api = performer("api", &folder.with_file_name("api"), ModuleKind::Service);
    api.linked = true;
    api.labels.push("service:api".to_string());

    PluginContext {
        performer: db.clone(),
        performers: vec![db, api],
        instance: Some(Instance {
            instance_id: "dev1".to_string(),
        }),
    }
}
