use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Running,
    Stopping,
    Stopped,
}

/// Handle to a long-lived build or run operation.
///
/// The host owns the handle and flips the status to request a graceful stop;
/// the engine only polls it. Clones share the same status.
#[derive(Debug, Clone)]
pub struct Operation {
    id: String,
    status: Arc<watch::Sender<OperationStatus>>,
}

impl Operation {
    pub fn new(id: impl Into<String>) -> Self {
        let (status, _) = watch::channel(OperationStatus::Running);
        Self {
            id: id.into(),
            status: Arc::new(status),
        }
    }

    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> OperationStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == OperationStatus::Running
    }

    pub fn request_stop(&self) {
        self.status.send_if_modified(|status| {
            if *status == OperationStatus::Running {
                *status = OperationStatus::Stopping;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn mark_stopped(&self) {
        self.status.send_replace(OperationStatus::Stopped);
    }
}
