use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, info};

use super::image::{replace_capture, split_image};
use crate::config;
use crate::error::{Result, StatefulError};
use crate::settings::NoMatchPolicy;
use crate::store::{
    get_path, get_path_mut, load_document, save_document, scalar_to_string, ModuleFolder,
    SERVICE_MANIFEST, STATEFUL_MANIFEST,
};
use crate::types::{DependencyDescriptor, DependencyKind, FieldLocator};

pub const VERSION_LABEL_PATH: &str = "metadata.labels.version";
pub const POD_VERSION_LABEL_PATH: &str = "spec.template.metadata.labels.version";
pub const POD_CONTAINERS_PATH: &str = "spec.template.spec.containers";
pub const CONTAINER_VERSION_PATTERN: &str = "(?:.+):(.+)";

/// Lists and rewrites the version-bearing fields of a module folder.
pub struct DependencySync {
    image_mismatch: NoMatchPolicy,
}

impl DependencySync {
    pub fn new(image_mismatch: NoMatchPolicy) -> Self {
        Self { image_mismatch }
    }

    /// Manifest labels, pod containers, then the config's own pins.
    pub async fn list(&self, folder: &ModuleFolder, fullname: &str) -> Result<Vec<DependencyDescriptor>> {
        let mut dependencies = Vec::new();

        let service = load_document(&folder.source_path(SERVICE_MANIFEST)).await?;
        dependencies.push(label_descriptor(&service, SERVICE_MANIFEST, VERSION_LABEL_PATH, fullname));

        let stateful = load_document(&folder.source_path(STATEFUL_MANIFEST)).await?;
        dependencies.push(label_descriptor(&stateful, STATEFUL_MANIFEST, VERSION_LABEL_PATH, fullname));
        dependencies.push(label_descriptor(
            &stateful,
            STATEFUL_MANIFEST,
            POD_VERSION_LABEL_PATH,
            fullname,
        ));

        if let Some(Value::Sequence(containers)) = get_path(&stateful, POD_CONTAINERS_PATH) {
            for (index, container) in containers.iter().enumerate() {
                let locator = FieldLocator::container(POD_CONTAINERS_PATH, index, CONTAINER_VERSION_PATTERN);
                let (fullname, version) = match container.get("image").and_then(Value::as_str) {
                    Some(image) => {
                        let image = split_image(image);
                        (image.name, image.tag)
                    }
                    None => {
                        // Listed without a version; the container name stands in for the image.
                        debug!("Container {} in {} has no image", index, STATEFUL_MANIFEST);
                        let name = container.get("name").and_then(scalar_to_string);
                        (name.unwrap_or_default(), None)
                    }
                };
                dependencies.push(DependencyDescriptor::new(
                    DependencyKind::Container,
                    STATEFUL_MANIFEST,
                    locator,
                    fullname,
                    version,
                ));
            }
        }

        dependencies.extend(config::dependencies(folder).await?);
        Ok(dependencies)
    }

    /// Writes `dependency.version` into the field it locates.
    ///
    /// Returns whether the file changed; repeating a sync is a no-op.
    pub async fn sync(&self, folder: &ModuleFolder, dependency: &DependencyDescriptor) -> Result<bool> {
        let version = dependency
            .version
            .as_deref()
            .ok_or_else(|| StatefulError::InvalidLocator {
                locator: dependency.dependency_id.clone(),
                reason: "descriptor carries no version".to_string(),
            })?;

        let changed = match (dependency.kind, &dependency.path) {
            (DependencyKind::Config, path) => {
                config::set_dependency(folder, &path.to_string(), version).await?
            }
            (
                _,
                FieldLocator::Container {
                    array_path,
                    index,
                    capture,
                },
            ) => {
                self.sync_container(folder, &dependency.filename, array_path, *index, capture, version)
                    .await?
            }
            (_, FieldLocator::Field(path)) => {
                set_field(folder, &dependency.filename, path, version).await?
            }
        };

        if changed {
            info!(
                "Synced {} in {} to {}",
                dependency.path, dependency.filename, version
            );
        }
        Ok(changed)
    }

    async fn sync_container(
        &self,
        folder: &ModuleFolder,
        filename: &str,
        array_path: &str,
        index: usize,
        capture: &str,
        version: &str,
    ) -> Result<bool> {
        let pattern = Regex::new(capture)?;
        let path = folder.source_path(filename);
        let mut document = load_document(&path).await?;

        let container = get_path_mut(&mut document, array_path)
            .and_then(Value::as_sequence_mut)
            .and_then(|containers| containers.get_mut(index))
            .ok_or_else(|| StatefulError::ContainerNotFound {
                filename: filename.to_string(),
                array_path: array_path.to_string(),
                index,
            })?;

        let image = container
            .get("image")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StatefulError::invalid_manifest(&path, format!("container {index} has no image"))
            })?
            .to_string();

        let Some(updated) = replace_capture(&pattern, &image, version) else {
            return match self.image_mismatch {
                NoMatchPolicy::Ignore => {
                    debug!("Image {} does not match {}, leaving it", image, capture);
                    Ok(false)
                }
                NoMatchPolicy::Fail => Err(StatefulError::ImageMismatch {
                    image,
                    pattern: capture.to_string(),
                }),
            };
        };

        if updated == image {
            return Ok(false);
        }

        if let Some(slot) = container.get_mut("image") {
            *slot = Value::String(updated);
        }
        save_document(&path, &document).await?;
        Ok(true)
    }
}

impl Default for DependencySync {
    fn default() -> Self {
        Self::new(NoMatchPolicy::Ignore)
    }
}

fn label_descriptor(document: &Value, filename: &str, path: &str, fullname: &str) -> DependencyDescriptor {
    DependencyDescriptor::new(
        DependencyKind::Inner,
        filename,
        FieldLocator::field(path),
        fullname,
        get_path(document, path).and_then(scalar_to_string),
    )
}

/// Generic dotted-path write, value always stored as a string.
async fn set_field(folder: &ModuleFolder, filename: &str, path: &str, version: &str) -> Result<bool> {
    let file = folder.source_path(filename);
    let mut document = load_document(&file).await?;

    let new_value = Value::String(version.to_string());
    if get_path(&document, path) == Some(&new_value) {
        return Ok(false);
    }

    crate::store::set_path(&mut document, path, new_value)?;
    save_document(&file, &document).await?;
    Ok(true)
}
