//! Sequence number type

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one deployment/configuration generation of an extension.
///
/// The agent writes `<N>.settings` for each generation and expects the
/// handler to answer with `<N>.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Name of the settings file for this sequence number
    pub fn settings_file_name(self) -> String {
        format!("{}{}", self.0, crate::constants::SETTINGS_FILE_SUFFIX)
    }

    /// Name of the status file for this sequence number
    pub fn status_file_name(self) -> String {
        format!("{}{}", self.0, crate::constants::STATUS_FILE_SUFFIX)
    }
}

impl From<u64> for SequenceNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SequenceNumber {
    type Err = Error;

    /// Parses a decimal sequence number, tolerating surrounding whitespace
    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::invalid_sequence_number(s))
    }
}
