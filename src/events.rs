//! Progress events streamed back to the host.
//!
//! Emission is fire-and-forget: sinks never block and never report failure
//! to the engine's control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Out,
    Info,
    Warning,
    Error,
    Done,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub level: EventLevel,
    #[serde(
        rename = "operationid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Mirrors events into the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        let operation = event.operation_id.as_deref().unwrap_or("-");
        match event.level {
            EventLevel::Out => debug!(operation, "{}", event.message),
            EventLevel::Info | EventLevel::Done | EventLevel::Stopped => {
                info!(operation, level = ?event.level, "{}", event.message)
            }
            EventLevel::Warning => warn!(operation, "{}", event.message),
            EventLevel::Error => error!(operation, "{}", event.message),
        }
    }
}

/// One JSON object per line on stdout, the host's wire format.
#[derive(Debug, Default)]
pub struct JsonLinesSink;

impl EventSink for JsonLinesSink {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
                    debug!("Dropped event line: {e}");
                }
            }
            Err(e) => debug!("Failed to encode event: {e}"),
        }
    }
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

/// Sends every event to each inner sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Sink handle bound to an optional operation id.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn EventSink>,
    operation_id: Option<String>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            operation_id: None,
        }
    }

    pub fn for_operation(&self, operation_id: impl Into<String>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            operation_id: Some(operation_id.into()),
        }
    }

    pub fn emit(&self, level: EventLevel, message: impl Into<String>) {
        self.sink.emit(Event {
            level,
            operation_id: self.operation_id.clone(),
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn out(&self, message: impl Into<String>) {
        self.emit(EventLevel::Out, message)
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(EventLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(EventLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(EventLevel::Error, message)
    }

    pub fn done(&self, message: impl Into<String>) {
        self.emit(EventLevel::Done, message)
    }

    pub fn stopped(&self, message: impl Into<String>) {
        self.emit(EventLevel::Stopped, message)
    }
}
