use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

use crate::error::{Result, StatefulError};
use crate::store::{load_document, save_document, scalar_to_string, ModuleFolder};

pub const FILE_REFERENCE_PREFIX: &str = "file:";
const VALUES_KEY: &str = "values";
const DEPENDENCIES_KEY: &str = "dependencies";

/// How a config dependency is pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    /// Local in-progress build, relative to the module folder.
    Linked(String),
    Version(String),
}

impl DependencyRef {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(FILE_REFERENCE_PREFIX) {
            Some(relative) => DependencyRef::Linked(relative.trim().to_string()),
            None => DependencyRef::Version(raw.to_string()),
        }
    }

    /// Reference written into a config when `module_id` gets linked.
    pub fn linked_sibling(module_id: &str) -> String {
        format!("{FILE_REFERENCE_PREFIX}./../{module_id}")
    }
}

/// A module's config source, kept as a whole document so unrelated keys
/// survive every read-modify-write.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    path: PathBuf,
    document: Value,
}

impl ModuleConfig {
    pub async fn load(folder: &ModuleFolder) -> Result<Self> {
        let path = folder
            .config_path()
            .ok_or_else(|| StatefulError::ConfigMissing {
                folder: folder.root().to_path_buf(),
            })?;

        let document = load_document(&path)
            .await
            .map_err(|e| StatefulError::ResolutionFailed {
                folder: folder.root().to_path_buf(),
                reason: e.to_string(),
            })?;

        match document {
            Value::Mapping(_) => Ok(Self { path, document }),
            Value::Null => Ok(Self {
                path,
                document: Value::Mapping(Mapping::new()),
            }),
            _ => Err(StatefulError::ResolutionFailed {
                folder: folder.root().to_path_buf(),
                reason: format!("{} must contain a mapping", path.display()),
            }),
        }
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn values(&self) -> Option<&Value> {
        self.document.get(VALUES_KEY)
    }

    /// Declared dependencies in declaration order.
    pub fn dependencies(&self) -> Vec<(String, String)> {
        let Some(Value::Mapping(deps)) = self.document.get(DEPENDENCIES_KEY) else {
            return Vec::new();
        };

        deps.iter()
            .filter_map(|(name, version)| {
                let name = scalar_to_string(name)?;
                let version = scalar_to_string(version)?;
                Some((name, version))
            })
            .collect()
    }

    /// Sets a dependency pin, returning whether the document changed.
    pub fn set_dependency(&mut self, name: &str, version: &str) -> bool {
        if !self.document.is_mapping() {
            self.document = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(root) = &mut self.document else {
            return false;
        };

        let deps = root
            .entry(Value::String(DEPENDENCIES_KEY.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !deps.is_mapping() {
            *deps = Value::Mapping(Mapping::new());
        }

        let Value::Mapping(deps) = deps else {
            return false;
        };

        let key = Value::String(name.to_string());
        let new_value = Value::String(version.to_string());
        if deps.get(&key) == Some(&new_value) {
            return false;
        }
        deps.insert(key, new_value);
        true
    }

    pub async fn save(&self) -> Result<()> {
        save_document(&self.path, &self.document).await
    }
}
