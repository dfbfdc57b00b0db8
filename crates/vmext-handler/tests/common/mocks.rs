//! Mock implementations for testing
//!
//! Provides mock implementations of the environment collaborators so the
//! state machine runs without the handler environment file, the sequence
//! number store, `openssl` or process spawning.

use anyhow::anyhow;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use vmext_core::{Error, HandlerEnvironment, Result, SequenceNumber};
use vmext_handler::{Decryptor, EnvironmentManager, HandlerSettings, ProcessLauncher};

#[derive(Debug, Default)]
struct MockState {
    handler_env: HandlerEnvironment,
    requested: Option<SequenceNumber>,
    current: Option<SequenceNumber>,
    current_unparsable: bool,
    fail_sequence_writes: bool,
    sequence_writes: Vec<SequenceNumber>,
    settings: HandlerSettings,
}

/// In-memory environment manager. Clones share state so a test can keep a
/// handle after boxing one into the extension.
#[derive(Debug, Clone, Default)]
pub struct MockEnvironment {
    state: Arc<Mutex<MockState>>,
}

impl MockEnvironment {
    pub fn new(handler_env: HandlerEnvironment) -> Self {
        let env = Self::default();
        env.state.lock().unwrap().handler_env = handler_env;
        env
    }

    /// Requested sequence number; without one, resolution fails with `NoSettingsFiles`
    pub fn with_requested(self, seq: u64) -> Self {
        self.state.lock().unwrap().requested = Some(SequenceNumber::new(seq));
        self
    }

    pub fn with_current(self, seq: u64) -> Self {
        self.state.lock().unwrap().current = Some(SequenceNumber::new(seq));
        self
    }

    pub fn with_unparsable_current(self) -> Self {
        self.state.lock().unwrap().current_unparsable = true;
        self
    }

    pub fn with_failing_sequence_writes(self) -> Self {
        self.state.lock().unwrap().fail_sequence_writes = true;
        self
    }

    pub fn with_settings(self, settings: HandlerSettings) -> Self {
        self.state.lock().unwrap().settings = settings;
        self
    }

    pub fn sequence_writes(&self) -> Vec<SequenceNumber> {
        self.state.lock().unwrap().sequence_writes.clone()
    }

    pub fn boxed(&self) -> Box<dyn EnvironmentManager> {
        Box::new(self.clone())
    }
}

impl EnvironmentManager for MockEnvironment {
    fn handler_environment(&self, _name: &str, _version: &str) -> Result<HandlerEnvironment> {
        Ok(self.state.lock().unwrap().handler_env.clone())
    }

    fn requested_sequence_number(&self, config_folder: &Path) -> Result<SequenceNumber> {
        self.state
            .lock()
            .unwrap()
            .requested
            .ok_or_else(|| Error::NoSettingsFiles {
                folder: config_folder.to_path_buf(),
            })
    }

    fn current_sequence_number(
        &self,
        _name: &str,
        _version: &str,
    ) -> Result<Option<SequenceNumber>> {
        let state = self.state.lock().unwrap();
        if state.current_unparsable {
            return Err(Error::invalid_sequence_number("yaba"));
        }
        Ok(state.current)
    }

    fn set_sequence_number(&self, _name: &str, _version: &str, seq: SequenceNumber) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sequence_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only store",
            )));
        }
        state.sequence_writes.push(seq);
        state.current = Some(seq);
        Ok(())
    }

    fn handler_settings(
        &self,
        _handler_env: &HandlerEnvironment,
        _seq: SequenceNumber,
    ) -> Result<HandlerSettings> {
        Ok(self.state.lock().unwrap().settings.clone())
    }

    fn extension_version(&self) -> Option<String> {
        Some("1.0.0-test".to_string())
    }
}

/// Record of a decrypt call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptCall {
    pub config_folder: PathBuf,
    pub thumbprint: String,
    pub der: Vec<u8>,
}

/// Decryptor returning a fixed plaintext and recording its calls
#[derive(Debug, Clone, Default)]
pub struct MockDecryptor {
    plaintext: String,
    calls: Rc<RefCell<Vec<DecryptCall>>>,
}

impl MockDecryptor {
    pub fn returning(plaintext: &str) -> Self {
        Self {
            plaintext: plaintext.to_string(),
            calls: Rc::default(),
        }
    }

    pub fn calls(&self) -> Vec<DecryptCall> {
        self.calls.borrow().clone()
    }
}

impl Decryptor for MockDecryptor {
    fn decrypt(&self, config_folder: &Path, thumbprint: &str, der: &[u8]) -> Result<String> {
        self.calls.borrow_mut().push(DecryptCall {
            config_folder: config_folder.to_path_buf(),
            thumbprint: thumbprint.to_string(),
            der: der.to_vec(),
        });
        Ok(self.plaintext.clone())
    }
}

/// Record of a launch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCall {
    pub command: String,
    pub working_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Process launcher that records instead of spawning
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    calls: Rc<RefCell<Vec<LaunchCall>>>,
    fail: bool,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.calls.borrow().clone()
    }
}

impl ProcessLauncher for MockLauncher {
    fn launch(&self, command: &str, working_dir: &Path, log_dir: &Path) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(LaunchCall {
            command: command.to_string(),
            working_dir: working_dir.to_path_buf(),
            log_dir: log_dir.to_path_buf(),
        });
        if self.fail {
            return Err(anyhow!("spawn refused"));
        }
        Ok(())
    }
}
