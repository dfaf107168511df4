//! Host-facing entry points for build, run and dependency operations.

mod build;
mod dependencies;
mod link;
mod run;

pub use link::{link_performers, LinkNotice};

use std::sync::Arc;
use tracing::warn;

use crate::cluster::{ClusterControl, KubectlClient, Reconciler};
use crate::error::{Result, StatefulError};
use crate::events::Reporter;
use crate::settings::EngineSettings;
use crate::store::ModuleFolder;
use crate::types::PluginContext;

/// The engine as a plugin host sees it.
///
/// Every failure that leaves an entry point is first reported as an `error`
/// event on the plugin's reporter.
pub struct StatefulPlugin {
    settings: EngineSettings,
    reporter: Reporter,
    cluster: Arc<dyn ClusterControl>,
}

impl StatefulPlugin {
    pub fn new(settings: EngineSettings, reporter: Reporter) -> Self {
        let cluster = Arc::new(KubectlClient::new(settings.kubectl.clone()));
        Self {
            settings,
            reporter,
            cluster,
        }
    }

    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterControl>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn reconciler(&self, reporter: Reporter) -> Reconciler {
        Reconciler::new(self.cluster.clone(), reporter, self.settings.settle_interval)
    }

    fn mirror<T>(&self, reporter: &Reporter, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("Operation failed: {}", e);
            reporter.error(e.to_string());
        }
        result
    }
}

fn instanced_folder(context: &PluginContext) -> Result<ModuleFolder> {
    let performer = &context.performer;
    if !performer.is_instanced() {
        return Err(StatefulError::PerformerNotInstanced {
            performer_id: performer.performer_id.clone(),
            kind: performer.kind.to_string(),
        });
    }
    Ok(ModuleFolder::new(&performer.folder))
}
