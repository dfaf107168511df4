use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

pub const SERVICE_MANIFEST: &str = "service.yaml";
pub const STATEFUL_MANIFEST: &str = "stateful.yaml";
pub const VOLUME_MANIFEST: &str = "volume.yaml";
pub const RENDERED_CONFIG: &str = "config.json";

/// Manifest templates rendered on every build, in render order.
pub const TEMPLATES: [&str; 2] = [SERVICE_MANIFEST, STATEFUL_MANIFEST];

/// Accepted config source names, first match wins.
pub const CONFIG_SOURCES: [&str; 3] = ["config.json", "config.yaml", "config.yml"];

const DIST_DIR: &str = "dist";
const TMP_DIR: &str = "tmp";

/// A module's working folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFolder {
    root: PathBuf,
}

impl ModuleFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Existing config source, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        CONFIG_SOURCES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// The three files whose modification triggers a rebuild.
    pub fn watched_sources(&self) -> Vec<PathBuf> {
        let config = self
            .config_path()
            .unwrap_or_else(|| self.root.join(CONFIG_SOURCES[0]));
        vec![
            config,
            self.source_path(SERVICE_MANIFEST),
            self.source_path(STATEFUL_MANIFEST),
        ]
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(DIST_DIR)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    pub fn dist_path(&self, name: &str) -> PathBuf {
        self.dist_dir().join(name)
    }

    pub fn tmp_path(&self, name: &str) -> PathBuf {
        self.tmp_dir().join(name)
    }

    /// Resolves a `file:` style reference relative to this folder.
    pub fn resolve_reference(&self, relative: &str) -> ModuleFolder {
        ModuleFolder::new(self.root.join(relative))
    }

    pub async fn ensure_derived_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.dist_dir()).await?;
        tokio::fs::create_dir_all(self.tmp_dir()).await?;
        Ok(())
    }

    /// Removes `dist/` and `tmp/`; both are regenerated on demand.
    pub async fn clear_derived(&self) -> Result<()> {
        for dir in [self.dist_dir(), self.tmp_dir()] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
