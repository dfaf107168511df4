use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::store::{ModuleFolder, CONFIG_SOURCES, TEMPLATES};

/// Open file watches for one module, owned by the operation task.
///
/// The folder itself is watched (non-recursively) and events are filtered by
/// file name, so editors that save through a rename are still seen. Dropping
/// the set closes the watches.
pub struct WatchSet {
    _watcher: RecommendedWatcher,
    sources: Vec<PathBuf>,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl WatchSet {
    pub fn open(folder: &ModuleFolder) -> Result<Self> {
        let names: HashSet<String> = CONFIG_SOURCES
            .iter()
            .chain(TEMPLATES.iter())
            .map(|name| name.to_string())
            .collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    let watched = path
                        .file_name()
                        .map(|name| names.contains(name.to_string_lossy().as_ref()))
                        .unwrap_or(false);
                    if watched {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(folder.root(), RecursiveMode::NonRecursive)?;

        let sources = folder.watched_sources();
        debug!("Watching {} sources in {}", sources.len(), folder.root().display());

        Ok(Self {
            _watcher: watcher,
            sources,
            rx,
        })
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Next changed source path; `None` once the watches are gone.
    pub async fn next_change(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }

    pub fn close(self) {
        debug!("Closing {} watches", self.sources.len());
    }
}
