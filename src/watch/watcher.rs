use std::time::Duration;
use tracing::{debug, info, warn};

use super::state::{PendingChanges, WatcherState};
use super::watch_set::WatchSet;
use crate::error::Result;
use crate::events::Reporter;
use crate::render::Renderer;
use crate::settings::EngineSettings;
use crate::store::ModuleFolder;
use crate::types::Operation;

/// Keeps a module's `dist/` in step with its sources for the lifetime of an
/// operation.
///
/// Builds run one at a time on the watcher's own task; change bursts are
/// coalesced. A failed build is reported and the loop carries on, so a
/// half-saved file heals on the next save.
pub struct ChangeWatcher {
    folder: ModuleFolder,
    renderer: Renderer,
    reporter: Reporter,
    poll_interval: Duration,
    debounce: Duration,
    stop_grace: Duration,
    state: WatcherState,
}

impl ChangeWatcher {
    pub fn new(folder: ModuleFolder, settings: &EngineSettings, reporter: Reporter) -> Result<Self> {
        Ok(Self {
            folder,
            renderer: Renderer::new()?,
            reporter,
            poll_interval: settings.poll_interval,
            debounce: settings.debounce,
            stop_grace: settings.stop_grace,
            state: WatcherState::Idle,
        })
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub async fn run(mut self, operation: &Operation) -> Result<()> {
        // Watches go up before the first build so saves made during it queue.
        let watches = match WatchSet::open(&self.folder) {
            Ok(watches) => watches,
            Err(e) => {
                self.reporter.error(format!("Unable to watch sources: {e}"));
                operation.mark_stopped();
                return Err(e);
            }
        };

        self.enter(WatcherState::Building);
        self.build().await;
        self.enter(WatcherState::Watching);
        self.reporter.out(format!(
            "Watching {} for changes...",
            watches
                .sources()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let watches = self.watch_until_stopped(watches, operation).await;

        self.enter(WatcherState::Stopping);
        watches.close();
        tokio::time::sleep(self.stop_grace).await;

        self.enter(WatcherState::Stopped);
        operation.mark_stopped();
        Ok(())
    }

    async fn watch_until_stopped(&mut self, mut watches: WatchSet, operation: &Operation) -> WatchSet {
        let mut pending = PendingChanges::new(self.debounce);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while operation.is_running() {
            tokio::select! {
                change = watches.next_change() => match change {
                    Some(path) => pending.add(path),
                    None => {
                        warn!("Watches for {} closed unexpectedly", self.folder.root().display());
                        break;
                    }
                },
                _ = ticker.tick() => {}
            }

            if pending.is_ready() {
                for path in pending.take() {
                    self.reporter.warning(format!("{} changed...", path.display()));
                }
                self.enter(WatcherState::Building);
                self.build().await;
                self.enter(WatcherState::Watching);
            }
        }

        watches
    }

    /// One render + report cycle. Returns whether every template rendered.
    async fn build(&mut self) -> bool {
        self.reporter.out("Start building config...");

        match self.renderer.render(&self.folder).await {
            Ok(rendered) if rendered.is_complete() => {
                self.reporter.done("Service generated!");
                true
            }
            Ok(rendered) => {
                for failure in rendered.failures {
                    self.reporter
                        .error(format!("{}: {}", failure.template, failure.error));
                }
                false
            }
            Err(e) => {
                self.reporter.error(e.to_string());
                false
            }
        }
    }

    fn enter(&mut self, next: WatcherState) {
        if !self.state.can_enter(next) {
            debug!("Unexpected watcher transition {} -> {}", self.state, next);
        }
        info!("Watcher for {}: {} -> {}", self.folder.root().display(), self.state, next);
        self.state = next;

        match next {
            WatcherState::Stopped => self.reporter.stopped("Build watcher stopped"),
            WatcherState::Idle => {}
            other => self.reporter.out(format!("Watcher {other}")),
        }
    }
}
