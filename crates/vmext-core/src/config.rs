//! Runtime overrides read from the process environment
//!
//! The guest agent communicates a handful of knobs through environment
//! variables. They are collected once, through a single lookup function, so
//! tests can inject values without touching the real process environment.

use crate::constants::{CONFIG_SEQUENCE_NUMBER_ENV, EXTENSION_VERSION_ENV, LOG_FILTER_ENV};
use crate::sequence::SequenceNumber;
use tracing::{info, warn};

/// Default tracing filter when none is configured
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Process-environment overrides for a handler invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOverrides {
    /// Requested sequence number forced by `ConfigSequenceNumber`
    pub sequence_number: Option<SequenceNumber>,

    /// Extension version reported in events
    pub extension_version: Option<String>,

    /// Tracing filter directive
    pub log_filter: Option<String>,
}

impl RuntimeOverrides {
    /// Read overrides from the real process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let sequence_number = match lookup(CONFIG_SEQUENCE_NUMBER_ENV) {
            None => None,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => match raw.parse::<SequenceNumber>() {
                Ok(seq) => {
                    info!(
                        "using sequence number {} from environment variable {}",
                        seq, CONFIG_SEQUENCE_NUMBER_ENV
                    );
                    Some(seq)
                }
                Err(_) => {
                    warn!(
                        "could not read sequence number string '{}' into unsigned integer",
                        raw
                    );
                    None
                }
            },
        };

        Self {
            sequence_number,
            extension_version: lookup(EXTENSION_VERSION_ENV).filter(|v| !v.is_empty()),
            log_filter: lookup(LOG_FILTER_ENV).filter(|v| !v.is_empty()),
        }
    }

    /// Tracing filter to use, falling back to the default
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
