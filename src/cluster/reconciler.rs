use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ClusterControl, ClusterOutput, Presence};
use crate::error::Result;
use crate::events::Reporter;
use crate::store::{SERVICE_MANIFEST, STATEFUL_MANIFEST, VOLUME_MANIFEST};

/// Applies the transformed manifests in `tmp/` in dependency order.
///
/// The volume and service go first. A StatefulSet cannot change its claim
/// templates in place, so an existing one is deleted and given the settle
/// interval before it is applied again.
pub struct Reconciler {
    cluster: Arc<dyn ClusterControl>,
    reporter: Reporter,
    settle_interval: Duration,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn ClusterControl>, reporter: Reporter, settle_interval: Duration) -> Self {
        Self {
            cluster,
            reporter,
            settle_interval,
        }
    }

    pub async fn deploy(&self, tmp: &Path) -> Result<()> {
        let volume = tmp.join(VOLUME_MANIFEST);
        let service = tmp.join(SERVICE_MANIFEST);
        let stateful = tmp.join(STATEFUL_MANIFEST);

        let output = self.cluster.apply(&volume).await?;
        self.stream(&output);

        let output = self.cluster.apply(&service).await?;
        self.stream(&output);

        match self.cluster.get(&stateful).await {
            Ok(Presence::Found(output)) => {
                self.stream(&output);
                if let Presence::Found(output) = self.cluster.delete(&stateful).await? {
                    self.stream(&output);
                }
                debug!("Waiting {:?} for the stateful set to settle", self.settle_interval);
                tokio::time::sleep(self.settle_interval).await;
            }
            Ok(Presence::NotFound(reason)) => {
                self.reporter
                    .warning(format!("{STATEFUL_MANIFEST} is not present, applying: {}", reason.trim()));
            }
            Err(e) => {
                self.reporter
                    .warning(format!("Unable to look up {STATEFUL_MANIFEST}, applying: {e}"));
            }
        }

        let output = self.cluster.apply(&stateful).await?;
        self.stream(&output);

        info!("Deployed manifests from {}", tmp.display());
        Ok(())
    }

    /// Deletes the stateful set, then the service. Missing objects only warn.
    pub async fn remove(&self, tmp: &Path) -> Result<()> {
        for name in [STATEFUL_MANIFEST, SERVICE_MANIFEST] {
            match self.cluster.delete(&tmp.join(name)).await? {
                Presence::Found(output) => {
                    self.stream(&output);
                    self.reporter.warning(format!("{name} removed..."));
                }
                Presence::NotFound(_) => {
                    self.reporter.warning(format!("{name} is not present..."));
                }
            }
        }
        Ok(())
    }

    fn stream(&self, output: &ClusterOutput) {
        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            self.reporter.out(line);
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            self.reporter.warning(line);
        }
    }
}
