//! Module folder layout and document persistence.
//!
//! Sources (`config.*`, `service.yaml`, `stateful.yaml`) are the only truth;
//! `dist/` and `tmp/` are derived and every write into them is atomic.

pub mod atomic;
pub mod document;
pub mod folder;

pub use atomic::{write_atomic, AtomicWriter};
pub use document::*;
pub use folder::*;
