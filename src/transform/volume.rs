use serde_json::json;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::settings::ClusterProfile;
use crate::store::{save_document, VOLUME_MANIFEST};

/// Host-path PersistentVolume pinned to the profile's single node.
pub fn persistent_volume(instance_id: &str, performer_id: &str, profile: &ClusterProfile) -> Result<Value> {
    let host_path = format!(
        "{}/{}/{}/",
        profile.host_path_root.trim_end_matches('/'),
        instance_id,
        performer_id
    );

    let volume = json!({
        "apiVersion": "v1",
        "kind": "PersistentVolume",
        "metadata": {
            "name": format!("volume-{instance_id}-{performer_id}"),
        },
        "spec": {
            "storageClassName": profile.storage_class,
            "accessModes": [profile.access_mode],
            "capacity": { "storage": profile.capacity },
            "hostPath": { "path": host_path },
            "nodeAffinity": {
                "required": {
                    "nodeSelectorTerms": [{
                        "matchExpressions": [{
                            "key": profile.hostname_label,
                            "operator": "In",
                            "values": [profile.node_name],
                        }],
                    }],
                },
            },
        },
    });

    Ok(serde_yaml::to_value(volume)?)
}

/// Writes the synthesized volume to `tmp/volume.yaml`.
pub async fn write_volume(
    tmp: &Path,
    instance_id: &str,
    performer_id: &str,
    profile: &ClusterProfile,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(tmp).await?;
    let path = tmp.join(VOLUME_MANIFEST);
    save_document(&path, &persistent_volume(instance_id, performer_id, profile)?).await?;
    Ok(path)
}
