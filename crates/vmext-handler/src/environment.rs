//! Environment access for the lifecycle state machine
//!
//! Everything the state machine reads from or writes to the host goes through
//! [`EnvironmentManager`], so tests can swap the filesystem, registry and
//! `openssl` for in-memory fakes.

use std::path::Path;
use tracing::debug;
use vmext_core::{HandlerEnvironment, Result, RuntimeOverrides, SequenceNumber};

use crate::decrypt::{Decryptor, OpensslDecryptor};
use crate::seqno::{
    default_sequence_number_store, find_requested_sequence_number, SequenceNumberStore,
};
use crate::settings::{load_handler_settings, HandlerSettings};

pub trait EnvironmentManager {
    /// Locate and parse the handler environment for this extension
    fn handler_environment(&self, name: &str, version: &str) -> Result<HandlerEnvironment>;

    /// Sequence number the agent wants applied
    fn requested_sequence_number(&self, config_folder: &Path) -> Result<SequenceNumber>;

    /// Last sequence number this handler began applying, `None` before the first run
    fn current_sequence_number(&self, name: &str, version: &str) -> Result<Option<SequenceNumber>>;

    fn set_sequence_number(&self, name: &str, version: &str, seq: SequenceNumber) -> Result<()>;

    /// Settings for `seq`, with protected settings decrypted
    fn handler_settings(
        &self,
        handler_env: &HandlerEnvironment,
        seq: SequenceNumber,
    ) -> Result<HandlerSettings>;

    /// Version stamped on extension events
    fn extension_version(&self) -> Option<String> {
        None
    }
}

/// Production environment: real files, the platform sequence number store and `openssl`
pub struct SystemEnvironment {
    store: Box<dyn SequenceNumberStore>,
    decryptor: Box<dyn Decryptor>,
    overrides: RuntimeOverrides,
}

impl SystemEnvironment {
    pub fn new(name: &str, version: &str) -> Result<Self> {
        Ok(Self {
            store: default_sequence_number_store(name, version)?,
            decryptor: Box::new(OpensslDecryptor::new()),
            overrides: RuntimeOverrides::from_env(),
        })
    }

    /// Assemble from explicit parts
    pub fn with_parts(
        store: Box<dyn SequenceNumberStore>,
        decryptor: Box<dyn Decryptor>,
        overrides: RuntimeOverrides,
    ) -> Self {
        Self {
            store,
            decryptor,
            overrides,
        }
    }

    pub fn overrides(&self) -> &RuntimeOverrides {
        &self.overrides
    }
}

impl EnvironmentManager for SystemEnvironment {
    fn handler_environment(&self, name: &str, version: &str) -> Result<HandlerEnvironment> {
        HandlerEnvironment::load(name, version)
    }

    fn requested_sequence_number(&self, config_folder: &Path) -> Result<SequenceNumber> {
        find_requested_sequence_number(config_folder, &self.overrides)
    }

    fn current_sequence_number(&self, name: &str, version: &str) -> Result<Option<SequenceNumber>> {
        debug!("Loading current sequence number for {} {}", name, version);
        self.store.load()
    }

    fn set_sequence_number(&self, name: &str, version: &str, seq: SequenceNumber) -> Result<()> {
        debug!("Recording sequence number {} for {} {}", seq, name, version);
        self.store.store(seq)
    }

    fn handler_settings(
        &self,
        handler_env: &HandlerEnvironment,
        seq: SequenceNumber,
    ) -> Result<HandlerSettings> {
        load_handler_settings(&handler_env.config_folder, seq, self.decryptor.as_ref())
    }

    fn extension_version(&self) -> Option<String> {
        self.overrides.extension_version.clone()
    }
}
