use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Lifecycle of a [`ChangeWatcher`](super::ChangeWatcher).
///
/// `Watching` is a steady state; rebuilds pass through `Building` and come
/// back without leaving it logically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Building,
    Watching,
    Stopping,
    Stopped,
}

impl WatcherState {
    pub fn can_enter(self, next: WatcherState) -> bool {
        use WatcherState::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Watching)
                | (Building, Stopping)
                | (Watching, Building)
                | (Watching, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatcherState::Idle => "idle",
            WatcherState::Building => "building",
            WatcherState::Watching => "watching",
            WatcherState::Stopping => "stopping",
            WatcherState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Changed paths collected until the debounce window has been quiet.
#[derive(Debug)]
pub struct PendingChanges {
    paths: BTreeSet<PathBuf>,
    last_change: Option<Instant>,
    debounce: Duration,
}

impl PendingChanges {
    pub fn new(debounce: Duration) -> Self {
        Self {
            paths: BTreeSet::new(),
            last_change: None,
            debounce,
        }
    }

    pub fn add(&mut self, path: PathBuf) {
        self.paths.insert(path);
        self.last_change = Some(Instant::now());
    }

    pub fn has_pending(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        match self.last_change {
            Some(last) => self.has_pending() && last.elapsed() >= self.debounce,
            None => false,
        }
    }

    pub fn take(&mut self) -> Vec<PathBuf> {
        self.last_change = None;
        std::mem::take(&mut self.paths).into_iter().collect()
    }
}
