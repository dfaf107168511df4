use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatefulError {
    #[error("Config source missing in {folder}")]
    ConfigMissing { folder: PathBuf },

    #[error("Variable resolution failed for {folder}: {reason}")]
    ResolutionFailed { folder: PathBuf, reason: String },

    #[error("Unresolved variables in {template}: {}", missing.join(", "))]
    UnresolvedVariable {
        template: String,
        missing: Vec<String>,
    },

    #[error("Container {index} not found at {array_path} in {filename}")]
    ContainerNotFound {
        filename: String,
        array_path: String,
        index: usize,
    },

    #[error("Image {image} does not match version pattern {pattern}")]
    ImageMismatch { image: String, pattern: String },

    #[error("Performer {performer_id} is not instanced ({kind})")]
    PerformerNotInstanced { performer_id: String, kind: String },

    #[error("Cluster call `{action}` failed for {manifest}: {reason}")]
    ClusterCallFailed {
        action: String,
        manifest: PathBuf,
        reason: String,
    },

    #[error("No deployment instance given for performer {performer_id}")]
    MissingInstance { performer_id: String },

    #[error("Invalid field locator `{locator}`: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl StatefulError {
    pub fn invalid_manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StatefulError::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatefulError>;
