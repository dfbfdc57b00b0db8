//! Status reporting
//!
//! The agent polls `<statusFolder>/<N>.status` to learn the outcome of an
//! operation. The file is a JSON array with exactly one entry:
//! ```json
//! [
//! 	{
//! 		"version": 1,
//! 		"timestampUTC": "2026-10-18T09:00:00Z",
//! 		"status": {
//! 			"operation": "Enable",
//! 			"status": "success",
//! 			"formattedMessage": { "lang": "en", "message": "Enable succeeded" },
//! 			"substatus": []
//! 		}
//! 	}
//! ]
//! ```
//! Files are written to a temporary file in the same folder and renamed over
//! the destination, so a reader never sees a partial write.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use vmext_core::{Error, Result, SequenceNumber};

/// Status protocol version, do not change unless the agent protocol changes
pub const STATUS_PROTOCOL_VERSION: u32 = 1;

/// Sub-status name carrying an error code
pub const ERROR_CLARIFICATION_SUBSTATUS_NAME: &str = "ErrorClarification";

/// Outcome reported to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    /// The operation has begun but not yet completed
    Transitioning,
    /// The operation failed
    Error,
    /// The operation succeeded
    Success,
}

impl StatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusType::Transitioning => "transitioning",
            StatusType::Error => "error",
            StatusType::Success => "success",
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status document: always exactly one [`StatusItem`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusReport(Vec<StatusItem>);

/// One status entry as read by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusItem {
    pub version: u32,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: String,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub operation: String,
    pub status: StatusType,
    pub formatted_message: FormattedMessage,
    #[serde(rename = "substatus", default, deserialize_with = "null_as_empty")]
    pub substatuses: Vec<Substatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substatus {
    pub name: String,
    pub status: String,
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedMessage {
    pub lang: String,
    pub message: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Substatus>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Substatus>>::deserialize(deserializer)?.unwrap_or_default())
}

impl StatusReport {
    /// Build a report for `operation` with an already formatted message
    pub fn new(status: StatusType, operation: &str, message: &str) -> Self {
        Self(vec![StatusItem {
            version: STATUS_PROTOCOL_VERSION,
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            status: Status {
                operation: operation.to_string(),
                status,
                formatted_message: FormattedMessage {
                    lang: "en".to_string(),
                    message: message.to_string(),
                },
                substatuses: Vec::new(),
            },
        }])
    }

    /// Build an error report carrying an `ErrorClarification` sub-status with `code`
    pub fn new_error(operation: &str, message: &str, code: i32) -> Self {
        let mut report = Self::new(StatusType::Error, operation, message);
        if let Some(item) = report.0.first_mut() {
            item.status.substatuses.push(Substatus {
                name: ERROR_CLARIFICATION_SUBSTATUS_NAME.to_string(),
                status: StatusType::Error.as_str().to_string(),
                code,
            });
        }
        report
    }

    pub fn items(&self) -> &[StatusItem] {
        &self.0
    }

    /// The single entry of the report
    pub fn item(&self) -> Option<&StatusItem> {
        self.0.first()
    }

    /// Serialize with tab indentation, as the agent's reference writer does
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Path of the status file for `seq` inside `status_folder`
    pub fn path(status_folder: &Path, seq: SequenceNumber) -> PathBuf {
        status_folder.join(seq.status_file_name())
    }

    /// Persist to `<status_folder>/<seq>.status` through a temporary file and
    /// an atomic rename.
    pub fn save(&self, status_folder: &Path, seq: SequenceNumber) -> Result<()> {
        let file_name = seq.status_file_name();
        let path = status_folder.join(&file_name);
        let bytes = self.to_json()?;

        let mut temp = tempfile::Builder::new()
            .prefix(&file_name)
            .tempfile_in(status_folder)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!("Saved status to {}", path.display());
        Ok(())
    }

    /// Read `<status_folder>/<seq>.status` back
    pub fn load(status_folder: &Path, seq: SequenceNumber) -> Result<Self> {
        let bytes = std::fs::read(Self::path(status_folder, seq))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Formats the human readable status message from the operation's status name,
/// the status type and the operation's own message.
pub type StatusMessageFormatter = Box<dyn Fn(&str, StatusType, &str) -> String>;

/// Default status message: `"<Op> succeeded|in progress|failed[: msg]"`
pub fn status_message(operation: &str, status: StatusType, msg: &str) -> String {
    let mut s = operation.to_string();
    s.push_str(match status {
        StatusType::Success => " succeeded",
        StatusType::Transitioning => " in progress",
        StatusType::Error => " failed",
    });

    if !msg.is_empty() {
        s.push_str(": ");
        s.push_str(msg);
    }
    s
}
