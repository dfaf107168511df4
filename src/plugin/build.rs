use tracing::debug;

use super::link::{link_performers, report_link_state};
use super::{instanced_folder, StatefulPlugin};
use crate::config;
use crate::error::Result;
use crate::store::ModuleFolder;
use crate::types::{Operation, PluginContext};
use crate::watch::ChangeWatcher;

impl StatefulPlugin {
    /// Removes `dist/` and `tmp/`. Non-instanced performers have nothing to clear.
    pub async fn build_clear(&self, context: &PluginContext) -> Result<()> {
        if !context.performer.is_instanced() {
            debug!("Skipping clear for {} performer", context.performer.kind);
            return Ok(());
        }
        let folder = ModuleFolder::new(&context.performer.folder);
        let result = config::clear(&folder).await;
        self.mirror(&self.reporter, result)
    }

    /// Links config dependents into the module config, then checks it resolves.
    pub async fn build_init(&self, context: &PluginContext) -> Result<()> {
        let result = self.init(context).await;
        self.mirror(&self.reporter, result)
    }

    async fn init(&self, context: &PluginContext) -> Result<()> {
        let folder = instanced_folder(context)?;

        for notice in link_performers(context).into_iter().filter(|n| n.is_config()) {
            self.reporter
                .info(format!("{} config linked!", notice.performer_id));
            config::link(&folder, &notice.performer_id).await?;
        }

        config::init(&folder).await?;
        Ok(())
    }

    /// Renders once, then re-renders on every source change until `operation`
    /// is asked to stop.
    pub async fn build_start(&self, context: &PluginContext, operation: &Operation) -> Result<()> {
        let reporter = self.reporter.for_operation(operation.id());

        let watcher = match instanced_folder(context)
            .and_then(|folder| ChangeWatcher::new(folder, &self.settings, reporter.clone()))
        {
            Ok(watcher) => watcher,
            Err(e) => {
                operation.mark_stopped();
                return self.mirror(&reporter, Err(e));
            }
        };

        report_link_state(context, &reporter);
        watcher.run(operation).await
    }
}
