use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use super::{ClusterControl, ClusterOutput, Presence};
use crate::error::{Result, StatefulError};

/// `ClusterControl` backed by the `kubectl` binary.
pub struct KubectlClient {
    binary: PathBuf,
}

impl KubectlClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, action: &str, manifest: &Path) -> Result<Output> {
        debug!("{} {} -f {}", self.binary.display(), action, manifest.display());
        Command::new(&self.binary)
            .arg(action)
            .arg("-f")
            .arg(manifest)
            .output()
            .await
            .map_err(|e| StatefulError::ClusterCallFailed {
                action: action.to_string(),
                manifest: manifest.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn run_presence(&self, action: &str, manifest: &Path) -> Result<Presence> {
        let output = self.run(action, manifest).await?;
        let captured = capture(&output);

        if output.status.success() {
            Ok(Presence::Found(captured))
        } else if is_not_found(&captured.stderr) {
            Ok(Presence::NotFound(captured.stderr))
        } else {
            Err(failure(action, manifest, &output, captured))
        }
    }
}

impl Default for KubectlClient {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl ClusterControl for KubectlClient {
    async fn apply(&self, manifest: &Path) -> Result<ClusterOutput> {
        let output = self.run("apply", manifest).await?;
        let captured = capture(&output);
        if output.status.success() {
            Ok(captured)
        } else {
            Err(failure("apply", manifest, &output, captured))
        }
    }

    async fn get(&self, manifest: &Path) -> Result<Presence> {
        self.run_presence("get", manifest).await
    }

    async fn delete(&self, manifest: &Path) -> Result<Presence> {
        self.run_presence("delete", manifest).await
    }
}

fn capture(output: &Output) -> ClusterOutput {
    ClusterOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn failure(action: &str, manifest: &Path, output: &Output, captured: ClusterOutput) -> StatefulError {
    let reason = if captured.stderr.trim().is_empty() {
        format!("exit code {}", output.status.code().unwrap_or(-1))
    } else {
        captured.stderr.trim().to_string()
    };
    StatefulError::ClusterCallFailed {
        action: action.to_string(),
        manifest: manifest.to_path_buf(),
        reason,
    }
}

/// kubectl reports missing objects as `Error from server (NotFound)` or
/// `... not found`.
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("NotFound") || stderr.contains("not found")
}
