//! Extension events collected by the guest agent
//!
//! Each event is a small JSON file in the handler environment's events folder,
//! named after the UTC time in microseconds.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, warn};

/// Event severity understood by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Critical,
    Error,
    Warning,
    Verbose,
    Informational,
}

/// On-disk event shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtensionEvent {
    pub version: String,
    pub timestamp: String,
    pub task_name: String,
    pub event_level: EventLevel,
    pub message: String,
    pub event_pid: String,
    pub event_tid: String,
    #[serde(rename = "OperationId")]
    pub operation_id: String,
}

#[derive(Debug, Default)]
struct EventContext {
    operation_id: String,
    prefix: String,
}

/// Writes extension events. Without an events folder every call is a logged no-op.
#[derive(Debug)]
pub struct ExtensionEventManager {
    events_folder: Option<PathBuf>,
    extension_version: String,
    context: Mutex<EventContext>,
}

impl ExtensionEventManager {
    pub fn new(events_folder: Option<PathBuf>, extension_version: Option<String>) -> Self {
        Self {
            events_folder,
            extension_version: extension_version.unwrap_or_default(),
            context: Mutex::new(EventContext::default()),
        }
    }

    /// Operation id stamped on every subsequent event
    pub fn set_operation_id(&self, operation_id: impl Into<String>) {
        if let Ok(mut ctx) = self.context.lock() {
            ctx.operation_id = operation_id.into();
        }
    }

    /// Prefix prepended to every subsequent message; an empty prefix clears it
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        if let Ok(mut ctx) = self.context.lock() {
            ctx.prefix = prefix.into();
        }
    }

    pub fn log_critical_event(&self, task_name: &str, message: &str) {
        self.log_event(task_name, EventLevel::Critical, message);
    }

    pub fn log_error_event(&self, task_name: &str, message: &str) {
        self.log_event(task_name, EventLevel::Error, message);
    }

    pub fn log_warning_event(&self, task_name: &str, message: &str) {
        self.log_event(task_name, EventLevel::Warning, message);
    }

    pub fn log_verbose_event(&self, task_name: &str, message: &str) {
        self.log_event(task_name, EventLevel::Verbose, message);
    }

    pub fn log_informational_event(&self, task_name: &str, message: &str) {
        self.log_event(task_name, EventLevel::Informational, message);
    }

    fn log_event(&self, task_name: &str, level: EventLevel, message: &str) {
        let Some(events_folder) = &self.events_folder else {
            warn!("EventsFolder not set. Not writing event.");
            return;
        };

        let (operation_id, prefix) = match self.context.lock() {
            Ok(ctx) => (ctx.operation_id.clone(), ctx.prefix.clone()),
            Err(_) => (String::new(), String::new()),
        };

        let now = Utc::now();
        let event = ExtensionEvent {
            version: self.extension_version.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            task_name: task_name.to_string(),
            event_level: level,
            message: format!("{}{}", prefix, message),
            event_pid: std::process::id().to_string(),
            event_tid: current_thread_id(),
            operation_id,
        };

        let path = events_folder.join(format!("{}.json", now.timestamp_micros()));
        let bytes = match serde_json::to_vec(&event) {
            Ok(b) => b,
            Err(e) => {
                error!("Unable to serialize extension event: <{}>", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, bytes) {
            error!("Unable to write event file {}: <{}>", path.display(), e);
        }
    }
}

/// Numeric form of the current thread id (`ThreadId(7)` -> `7`)
fn current_thread_id() -> String {
    format!("{:?}", std::thread::current().id())
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}
