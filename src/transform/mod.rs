//! Turns rendered manifests into cluster-ready ones under `tmp/`.

pub mod mutators;
pub mod volume;

pub use mutators::{linked_services, ServiceMutator, StatefulMutator, LINKED_TAG};
pub use volume::{persistent_volume, write_volume};

use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::store::{load_document, save_document};

/// A structural edit applied to a manifest on its way to `tmp/`.
pub trait ManifestMutator: Send + Sync {
    fn mutate(&self, manifest: &mut Value) -> Result<()>;
}

impl<F> ManifestMutator for F
where
    F: Fn(&mut Value) -> Result<()> + Send + Sync,
{
    fn mutate(&self, manifest: &mut Value) -> Result<()> {
        self(manifest)
    }
}

/// Loads `dist/<name>`, applies `mutator`, writes `tmp/<name>`.
pub async fn transform(
    name: &str,
    dist: &Path,
    tmp: &Path,
    mutator: &dyn ManifestMutator,
) -> Result<PathBuf> {
    let mut manifest = load_document(&dist.join(name)).await?;
    mutator.mutate(&mut manifest)?;

    tokio::fs::create_dir_all(tmp).await?;
    let dest = tmp.join(name);
    save_document(&dest, &manifest).await?;
    debug!("Transformed {} into {}", name, dest.display());
    Ok(dest)
}
