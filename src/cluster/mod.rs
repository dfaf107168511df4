//! Cluster access and the ordered apply/delete sequences built on it.

pub mod kubectl;
pub mod reconciler;

pub use kubectl::KubectlClient;
pub use reconciler::Reconciler;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Captured output of a single cluster call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ClusterOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Result of a call that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Found(ClusterOutput),
    NotFound(String),
}

impl Presence {
    pub fn is_found(&self) -> bool {
        matches!(self, Presence::Found(_))
    }
}

/// Issues manifest-level calls against a cluster.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    async fn apply(&self, manifest: &Path) -> Result<ClusterOutput>;

    async fn get(&self, manifest: &Path) -> Result<Presence>;

    async fn delete(&self, manifest: &Path) -> Result<Presence>;
}
