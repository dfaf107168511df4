use serde_yaml::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::normalize::{stringify_env_values, Yaml11Quoter};
use super::substitute::Substituter;
use crate::config::{self, VariableMap};
use crate::error::{Result, StatefulError};
use crate::store::{write_atomic, ModuleFolder, TEMPLATES};

/// A template that did not make it into `dist/` this round.
#[derive(Debug)]
pub struct TemplateFailure {
    pub template: String,
    pub error: StatefulError,
}

/// Outcome of one render pass.
#[derive(Debug, Default)]
pub struct RenderedSet {
    pub variables: usize,
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<TemplateFailure>,
}

impl RenderedSet {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fails with the first template failure, if any.
    pub fn into_result(mut self) -> Result<Vec<PathBuf>> {
        if self.failures.is_empty() {
            Ok(self.outputs)
        } else {
            Err(self.failures.remove(0).error)
        }
    }
}

/// Renders `service.yaml` and `stateful.yaml` into `dist/`.
///
/// Each template is published on its own: a failing template keeps its last
/// good output while its sibling still renders. Resolution failures abort
/// before anything is written.
pub struct Renderer {
    substituter: Substituter,
    quoter: Yaml11Quoter,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            substituter: Substituter::new()?,
            quoter: Yaml11Quoter::new()?,
        })
    }

    pub async fn render(&self, folder: &ModuleFolder) -> Result<RenderedSet> {
        let variables = config::build(folder).await.map_err(|e| match e {
            failed @ StatefulError::ResolutionFailed { .. } => failed,
            other => StatefulError::ResolutionFailed {
                folder: folder.root().to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let mut rendered = RenderedSet {
            variables: variables.len(),
            ..RenderedSet::default()
        };

        for name in TEMPLATES {
            match self.render_template(folder, name, &variables).await {
                Ok(path) => {
                    debug!("Rendered {}", path.display());
                    rendered.outputs.push(path);
                }
                Err(error) => {
                    warn!("Failed to render {}: {}", name, error);
                    rendered.failures.push(TemplateFailure {
                        template: name.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            "Rendered {}/{} templates for {}",
            rendered.outputs.len(),
            TEMPLATES.len(),
            folder.root().display()
        );
        Ok(rendered)
    }

    pub async fn render_template(
        &self,
        folder: &ModuleFolder,
        name: &str,
        variables: &VariableMap,
    ) -> Result<PathBuf> {
        let raw = tokio::fs::read_to_string(folder.source_path(name)).await?;
        let manifest = self.render_manifest(name, &raw, variables)?;

        let dest = folder.dist_path(name);
        write_atomic(&dest, manifest.as_bytes()).await?;
        Ok(dest)
    }

    /// Pure part of a render: substitute, validate, normalize, serialize.
    ///
    /// Templates that already parse as YAML are substituted value by value, so
    /// a variable never changes the document's structure or loses its text to
    /// number parsing. Anything else is substituted as text first.
    pub fn render_manifest(&self, name: &str, raw: &str, variables: &VariableMap) -> Result<String> {
        let missing: Vec<String> = self
            .substituter
            .referenced(raw)
            .into_iter()
            .filter(|variable| !variables.contains_key(variable))
            .collect();
        if !missing.is_empty() {
            return Err(StatefulError::UnresolvedVariable {
                template: name.to_string(),
                missing,
            });
        }

        let mut document = match serde_yaml::from_str::<Value>(raw) {
            Ok(template) if template.is_mapping() => {
                self.substituter.substitute_value(&template, variables)
            }
            _ => {
                debug!("{} is not YAML before substitution, substituting as text", name);
                let substituted = self
                    .substituter
                    .substitute(raw, variables)
                    .map_err(|missing| StatefulError::UnresolvedVariable {
                        template: name.to_string(),
                        missing,
                    })?;
                serde_yaml::from_str(&substituted)
                    .map_err(|e| StatefulError::invalid_manifest(name, e.to_string()))?
            }
        };
        if !document.is_mapping() {
            return Err(StatefulError::invalid_manifest(
                name,
                "rendered manifest is not a mapping",
            ));
        }

        let coerced = stringify_env_values(&mut document);
        if coerced > 0 {
            debug!("Stringified {} env values in {}", coerced, name);
        }

        let serialized = serde_yaml::to_string(&document)?;
        Ok(self.quoter.apply(&serialized))
    }
}
