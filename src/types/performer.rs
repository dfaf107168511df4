use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Label prefix a performer uses to name the container it exposes.
pub const SERVICE_LABEL_PREFIX: &str = "service:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformerKind {
    Instanced,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for PerformerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformerKind::Instanced => write!(f, "instanced"),
            PerformerKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Config,
    Stateful,
    Service,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(rename = "moduleid")]
    pub module_id: String,
    pub fullname: String,
    #[serde(rename = "type")]
    pub kind: ModuleKind,
}

/// A module this performer depends on, by module id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    #[serde(rename = "moduleid")]
    pub module_id: String,
}

/// A running instance of a module within the current deployment context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performer {
    #[serde(rename = "performerid")]
    pub performer_id: String,
    #[serde(rename = "type")]
    pub kind: PerformerKind,
    pub folder: PathBuf,
    pub module: ModuleInfo,
    #[serde(default)]
    pub linked: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub dependents: Vec<Dependent>,
}

impl Performer {
    pub fn is_instanced(&self) -> bool {
        self.kind == PerformerKind::Instanced
    }

    /// Container name advertised through a `service:<name>` label.
    pub fn service_name(&self) -> Option<&str> {
        self.labels
            .iter()
            .find_map(|label| label.strip_prefix(SERVICE_LABEL_PREFIX))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "instanceid")]
    pub instance_id: String,
}

/// Everything the host hands over for one plugin invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginContext {
    pub performer: Performer,
    #[serde(default)]
    pub performers: Vec<Performer>,
    #[serde(default)]
    pub instance: Option<Instance>,
}

impl PluginContext {
    /// Looks up the linked performer backing one of this performer's dependents.
    pub fn linked_performer(&self, dependent: &Dependent) -> Option<&Performer> {
        self.performers
            .iter()
            .find(|p| p.performer_id == dependent.module_id && p.linked)
    }
}
