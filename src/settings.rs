//! Engine tunables and the local cluster profile.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::store::DocumentFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How often long-running operations poll their status.
    #[serde(with = "serde_millis")]
    pub poll_interval: Duration,
    /// Pause between deleting and recreating the stateful resource.
    #[serde(with = "serde_millis")]
    pub settle_interval: Duration,
    /// Wait between closing watches and reporting the stop.
    #[serde(with = "serde_millis")]
    pub stop_grace: Duration,
    /// Window in which bursts of file events collapse into one rebuild.
    #[serde(with = "serde_millis")]
    pub debounce: Duration,
    pub kubectl: PathBuf,
    pub image_mismatch: NoMatchPolicy,
    pub cluster: ClusterProfile,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle_interval: Duration::from_millis(2500),
            stop_grace: Duration::from_millis(250),
            debounce: Duration::from_millis(150),
            kubectl: PathBuf::from("kubectl"),
            image_mismatch: NoMatchPolicy::Ignore,
            cluster: ClusterProfile::default(),
        }
    }
}

impl EngineSettings {
    /// Loads settings from a YAML or JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = match DocumentFormat::from_path(path) {
            DocumentFormat::Json => serde_json::from_str(&text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(&text)?,
        };
        Ok(settings)
    }
}

/// What container sync does when the capture pattern misses the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    Ignore,
    Fail,
}

/// Storage shape for the single-node development cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterProfile {
    pub storage_class: String,
    pub access_mode: String,
    pub capacity: String,
    pub host_path_root: String,
    pub node_name: String,
    pub hostname_label: String,
}

impl Default for ClusterProfile {
    fn default() -> Self {
        Self {
            storage_class: "local-storage".to_string(),
            access_mode: "ReadWriteOnce".to_string(),
            capacity: "50Mi".to_string(),
            host_path_root: "/data".to_string(),
            node_name: "minikube".to_string(),
            hostname_label: "kubernetes.io/hostname".to_string(),
        }
    }
}

mod serde_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
