//! Rebuild-on-change loop over a module's source files.

pub mod state;
pub mod watch_set;
pub mod watcher;

pub use state::{PendingChanges, WatcherState};
pub use watch_set::WatchSet;
pub use watcher::ChangeWatcher;
