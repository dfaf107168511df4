use tracing::info;

use super::{instanced_folder, StatefulPlugin};
use crate::error::{Result, StatefulError};
use crate::events::Reporter;
use crate::store::{ModuleFolder, SERVICE_MANIFEST, STATEFUL_MANIFEST};
use crate::transform::{self, linked_services, ServiceMutator, StatefulMutator};
use crate::types::{Operation, PluginContext};

impl StatefulPlugin {
    /// Deploys the rendered manifests and holds until `operation` is asked to
    /// stop. A failed deploy ends the operation.
    pub async fn run_start(&self, context: &PluginContext, operation: &Operation) -> Result<()> {
        let reporter = self.reporter.for_operation(operation.id());

        let deployed = self.deploy(context, &reporter).await;
        if let Err(e) = self.mirror(&reporter, deployed) {
            operation.mark_stopped();
            return Err(e);
        }
        reporter.done("Stateful deployed!");

        while operation.is_running() {
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        operation.mark_stopped();
        reporter.stopped("Run stopped");
        Ok(())
    }

    async fn deploy(&self, context: &PluginContext, reporter: &Reporter) -> Result<()> {
        let folder = instanced_folder(context)?;
        let performer = &context.performer;
        let instance = context
            .instance
            .as_ref()
            .ok_or_else(|| StatefulError::MissingInstance {
                performer_id: performer.performer_id.clone(),
            })?;

        let dist = folder.dist_dir();
        let tmp = folder.tmp_dir();

        reporter.out("Setting service config...");
        transform::write_volume(
            &tmp,
            &instance.instance_id,
            &performer.performer_id,
            &self.settings.cluster,
        )
        .await?;
        let service = ServiceMutator::new(&instance.instance_id);
        transform::transform(SERVICE_MANIFEST, &dist, &tmp, &service).await?;

        reporter.out("Setting stateful config...");
        let stateful = StatefulMutator::new(
            &instance.instance_id,
            self.settings.cluster.clone(),
            linked_services(context),
            reporter.clone(),
        );
        transform::transform(STATEFUL_MANIFEST, &dist, &tmp, &stateful).await?;

        self.reconciler(reporter.clone()).deploy(&tmp).await?;
        info!(
            "Deployed {} into instance {}",
            performer.performer_id, instance.instance_id
        );
        Ok(())
    }

    /// Deletes the deployed stateful set and service.
    pub async fn run_clear(&self, context: &PluginContext) -> Result<()> {
        let folder = ModuleFolder::new(&context.performer.folder);
        let removed = self.reconciler(self.reporter.clone()).remove(&folder.tmp_dir()).await;
        self.mirror(&self.reporter, removed)
    }
}
