//! How an extension tells the framework what to run

use std::fmt;
use vmext_core::constants::exit_code;
use vmext_core::{Error, Result};

use super::VmExtension;
use crate::logging::DEFAULT_LOG_FILE_NAME_FORMAT;
use crate::status::{StatusMessageFormatter, StatusType};

/// Enable callback; the returned message ends up in the success status
pub type EnableCallback = Box<dyn Fn(&VmExtension) -> anyhow::Result<String>>;

/// Callback for every other operation
pub type Callback = Box<dyn Fn(&VmExtension) -> anyhow::Result<()>>;

/// Supplied once by the extension. Only the enable callback is mandatory;
/// operations without a callback fall back to the framework's built-in behavior.
pub struct InitializationInfo {
    /// Extension name, without the Linux or Windows suffix
    pub name: String,
    pub version: String,
    /// Maintain the `disable` marker on disable and clear it on enable
    pub supports_disable: bool,
    /// Clear the data folder on resetstate
    pub supports_reset_state: bool,
    /// Skip enable unless the requested sequence number is newer than the current one
    pub requires_seq_no_change: bool,
    pub install_exit_code: i32,
    /// Exit code for failures of every operation other than install
    pub other_exit_code: i32,
    pub enable_callback: Option<EnableCallback>,
    pub disable_callback: Option<Callback>,
    pub update_callback: Option<Callback>,
    pub reset_state_callback: Option<Callback>,
    pub install_callback: Option<Callback>,
    pub uninstall_callback: Option<Callback>,
    pub status_formatter: Option<StatusMessageFormatter>,
    /// Log file name; `%v` is replaced by the unix time in seconds
    pub log_file_name_format: Option<String>,
}

impl InitializationInfo {
    pub fn new<F>(
        name: impl Into<String>,
        version: impl Into<String>,
        requires_seq_no_change: bool,
        enable: F,
    ) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<String> + 'static,
    {
        Self {
            name: name.into(),
            version: version.into(),
            supports_disable: true,
            supports_reset_state: true,
            requires_seq_no_change,
            install_exit_code: exit_code::DEFAULT_INSTALL_FAILURE,
            other_exit_code: exit_code::DEFAULT_OTHER_FAILURE,
            enable_callback: Some(Box::new(enable)),
            disable_callback: None,
            update_callback: None,
            reset_state_callback: None,
            install_callback: None,
            uninstall_callback: None,
            status_formatter: None,
            log_file_name_format: None,
        }
    }

    pub fn with_supports_disable(mut self, supports: bool) -> Self {
        self.supports_disable = supports;
        self
    }

    pub fn with_supports_reset_state(mut self, supports: bool) -> Self {
        self.supports_reset_state = supports;
        self
    }

    pub fn with_exit_codes(mut self, install: i32, other: i32) -> Self {
        self.install_exit_code = install;
        self.other_exit_code = other;
        self
    }

    pub fn with_disable_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<()> + 'static,
    {
        self.disable_callback = Some(Box::new(f));
        self
    }

    pub fn with_update_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<()> + 'static,
    {
        self.update_callback = Some(Box::new(f));
        self
    }

    pub fn with_reset_state_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<()> + 'static,
    {
        self.reset_state_callback = Some(Box::new(f));
        self
    }

    pub fn with_install_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<()> + 'static,
    {
        self.install_callback = Some(Box::new(f));
        self
    }

    pub fn with_uninstall_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&VmExtension) -> anyhow::Result<()> + 'static,
    {
        self.uninstall_callback = Some(Box::new(f));
        self
    }

    /// Replace the default `"<Op> succeeded: msg"` status message format
    pub fn with_status_formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, StatusType, &str) -> String + 'static,
    {
        self.status_formatter = Some(Box::new(f));
        self
    }

    pub fn with_log_file_name_format(mut self, format: impl Into<String>) -> Self {
        self.log_file_name_format = Some(format.into());
        self
    }

    pub fn log_file_name_format(&self) -> &str {
        self.log_file_name_format
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_LOG_FILE_NAME_FORMAT)
    }

    /// Checked before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::EmptyName);
        }
        if self.version.is_empty() {
            return Err(Error::EmptyVersion);
        }
        if self.enable_callback.is_none() {
            return Err(Error::MissingEnableCallback);
        }
        Ok(())
    }
}

impl fmt::Debug for InitializationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("supports_disable", &self.supports_disable)
            .field("supports_reset_state", &self.supports_reset_state)
            .field("requires_seq_no_change", &self.requires_seq_no_change)
            .field("install_exit_code", &self.install_exit_code)
            .field("other_exit_code", &self.other_exit_code)
            .field("log_file_name_format", &self.log_file_name_format)
            .finish_non_exhaustive()
    }
}
