use super::StatefulPlugin;
use crate::dependencies::DependencySync;
use crate::error::Result;
use crate::store::ModuleFolder;
use crate::types::{DependencyDescriptor, PluginContext};

impl StatefulPlugin {
    pub async fn dependencies_list(&self, context: &PluginContext) -> Result<Vec<DependencyDescriptor>> {
        let folder = ModuleFolder::new(&context.performer.folder);
        let listed = self
            .dependency_sync()
            .list(&folder, &context.performer.module.fullname)
            .await;
        self.mirror(&self.reporter, listed)
    }

    /// Returns whether any file changed.
    pub async fn dependencies_sync(
        &self,
        context: &PluginContext,
        dependency: &DependencyDescriptor,
    ) -> Result<bool> {
        let folder = ModuleFolder::new(&context.performer.folder);
        let synced = self.dependency_sync().sync(&folder, dependency).await;
        self.mirror(&self.reporter, synced)
    }

    fn dependency_sync(&self) -> DependencySync {
        DependencySync::new(self.settings.image_mismatch)
    }
}
