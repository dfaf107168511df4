//! Module config: values, dependency pins, and their resolution.

pub mod resolver;
pub mod source;

pub use resolver::{VariableMap, VariableResolver};
pub use source::{DependencyRef, ModuleConfig, FILE_REFERENCE_PREFIX};

use tracing::{debug, info};

use crate::error::{Result, StatefulError};
use crate::store::{write_atomic, ModuleFolder, RENDERED_CONFIG};
use crate::types::{DependencyDescriptor, DependencyKind, FieldLocator};

const DEPENDENCY_PATH_PREFIX: &str = "dependencies.";

/// Checks that the config exists and resolves.
pub async fn init(folder: &ModuleFolder) -> Result<VariableMap> {
    let variables = VariableResolver::new().resolve(folder).await?;
    info!(
        "Config initialized for {} ({} variables)",
        folder.root().display(),
        variables.len()
    );
    Ok(variables)
}

/// Drops everything derived from the config and templates.
pub async fn clear(folder: &ModuleFolder) -> Result<()> {
    folder.clear_derived().await
}

/// Points the dependency `module_id` at its sibling folder.
///
/// Returns `false` when the link was already in place.
pub async fn link(folder: &ModuleFolder, module_id: &str) -> Result<bool> {
    let mut config = ModuleConfig::load(folder).await?;
    let changed = config.set_dependency(module_id, &DependencyRef::linked_sibling(module_id));
    if changed {
        config.save().await?;
        debug!("Linked config dependency {} in {}", module_id, folder.root().display());
    }
    Ok(changed)
}

/// The config's own version-bearing fields.
pub async fn dependencies(folder: &ModuleFolder) -> Result<Vec<DependencyDescriptor>> {
    let config = match ModuleConfig::load(folder).await {
        Ok(config) => config,
        Err(StatefulError::ConfigMissing { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let filename = config.filename();
    Ok(config
        .dependencies()
        .into_iter()
        .map(|(name, version)| {
            DependencyDescriptor::new(
                DependencyKind::Config,
                filename.clone(),
                FieldLocator::field(format!("{DEPENDENCY_PATH_PREFIX}{name}")),
                name,
                Some(version),
            )
        })
        .collect())
}

/// Schema-aware write of a dependency pin addressed by its descriptor path.
pub async fn set_dependency(folder: &ModuleFolder, path: &str, version: &str) -> Result<bool> {
    let name = path
        .strip_prefix(DEPENDENCY_PATH_PREFIX)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| StatefulError::InvalidLocator {
            locator: path.to_string(),
            reason: format!("config fields live under `{DEPENDENCY_PATH_PREFIX}`"),
        })?;

    let mut config = ModuleConfig::load(folder).await?;
    let changed = config.set_dependency(name, version);
    if changed {
        config.save().await?;
    }
    Ok(changed)
}

/// Resolves the config and publishes the variable map to `dist/config.json`.
pub async fn build(folder: &ModuleFolder) -> Result<VariableMap> {
    let variables = VariableResolver::new().resolve(folder).await?;
    tokio::fs::create_dir_all(folder.dist_dir()).await?;

    let mut rendered = serde_json::to_string_pretty(&variables)?;
    rendered.push('\n');
    write_atomic(folder.dist_path(RENDERED_CONFIG), rendered.as_bytes()).await?;
    Ok(variables)
}
