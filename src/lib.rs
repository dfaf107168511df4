//! Stateful Deploy - template rendering and cluster reconciliation for
//! stateful modules
//!
//! A module folder holds a config source plus `service.yaml` and
//! `stateful.yaml` templates. The engine renders them into `dist/`, keeps
//! them rendered while sources change, rewrites them for a local cluster into
//! `tmp/` and applies them in a fixed order.

pub mod cluster;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod events;
pub mod plugin;
pub mod render;
pub mod settings;
pub mod store;
pub mod transform;
pub mod types;
pub mod watch;

pub use error::{Result, StatefulError};
pub use events::{Event, EventLevel, EventSink, Reporter};
pub use plugin::StatefulPlugin;
pub use settings::EngineSettings;
pub use types::*;
