use serde_yaml::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tracing::debug;

use super::source::{DependencyRef, ModuleConfig};
use crate::error::{Result, StatefulError};
use crate::store::{scalar_to_string, ModuleFolder};

/// Flat dotted-name → scalar map used for template substitution.
pub type VariableMap = BTreeMap<String, String>;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<VariableMap>> + Send + 'a>>;

/// Resolves a module's config into a [`VariableMap`].
///
/// Linked dependencies (`file:` references) are resolved first, in declaration
/// order, and the module's own values are applied last so they win.
pub struct VariableResolver;

impl VariableResolver {
    pub fn new() -> Self {
        Self
    }

    pub async fn resolve(&self, folder: &ModuleFolder) -> Result<VariableMap> {
        let mut chain = Vec::new();
        self.resolve_folder(folder.clone(), &mut chain).await
    }

    fn resolve_folder<'a>(
        &'a self,
        folder: ModuleFolder,
        chain: &'a mut Vec<PathBuf>,
    ) -> ResolveFuture<'a> {
        Box::pin(async move {
            let canonical = tokio::fs::canonicalize(folder.root())
                .await
                .map_err(|_| StatefulError::ConfigMissing {
                    folder: folder.root().to_path_buf(),
                })?;

            if let Some(start) = chain.iter().position(|p| p == &canonical) {
                let cycle: Vec<String> = chain[start..]
                    .iter()
                    .chain(std::iter::once(&canonical))
                    .map(|p| p.display().to_string())
                    .collect();
                return Err(StatefulError::ResolutionFailed {
                    folder: folder.root().to_path_buf(),
                    reason: format!("circular config reference: {}", cycle.join(" -> ")),
                });
            }

            let config = ModuleConfig::load(&folder).await?;
            chain.push(canonical);

            let mut variables = VariableMap::new();
            for (name, reference) in config.dependencies() {
                let DependencyRef::Linked(relative) = DependencyRef::parse(&reference) else {
                    continue;
                };

                debug!("Resolving linked config {} from {}", name, relative);
                let linked = folder.resolve_reference(&relative);
                let inherited = self
                    .resolve_folder(linked, chain)
                    .await
                    .map_err(|e| match e {
                        StatefulError::ConfigMissing { folder: missing } => {
                            StatefulError::ResolutionFailed {
                                folder: folder.root().to_path_buf(),
                                reason: format!(
                                    "linked dependency {name} has no config at {}",
                                    missing.display()
                                ),
                            }
                        }
                        other => other,
                    })?;
                variables.extend(inherited);
            }

            if let Some(values) = config.values() {
                flatten_into(&mut variables, None, values).map_err(|reason| {
                    StatefulError::ResolutionFailed {
                        folder: folder.root().to_path_buf(),
                        reason,
                    }
                })?;
            }

            chain.pop();
            Ok(variables)
        })
    }
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_into(
    variables: &mut VariableMap,
    prefix: Option<&str>,
    value: &Value,
) -> std::result::Result<(), String> {
    let join = |key: &str| match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    };

    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = scalar_to_string(key)
                    .ok_or_else(|| "values keys must be scalars".to_string())?;
                flatten_into(variables, Some(&join(&key)), child)?;
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(variables, Some(&join(&index.to_string())), child)?;
            }
        }
        Value::Tagged(tagged) => flatten_into(variables, prefix, &tagged.value)?,
        scalar => match prefix {
            Some(prefix) => {
                variables.insert(prefix.to_string(), scalar_to_string(scalar).unwrap_or_default());
            }
            None => return Err("values must be a mapping".to_string()),
        },
    }
    Ok(())
}
