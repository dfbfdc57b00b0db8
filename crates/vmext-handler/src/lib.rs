//! Extension handler framework
//!
//! This crate handles:
//! - Resolving the requested and current sequence numbers
//! - Loading (and decrypting) runtime settings
//! - Atomic status file reporting
//! - Disable-state tracking
//! - Extension event files for the guest agent
//! - Running commands and launching independent processes
//! - The lifecycle state machine that dispatches install/enable/disable/
//!   update/uninstall/resetstate to extension callbacks

pub mod command;
pub mod decrypt;
pub mod disable;
pub mod environment;
pub mod events;
pub mod launcher;
pub mod logging;
pub mod seqno;
pub mod settings;
pub mod status;
pub mod vmextension;

pub use command::{CommandHandler, ProcessLauncher};
pub use decrypt::{Decryptor, OpensslDecryptor};
pub use disable::DisableTracker;
pub use environment::{EnvironmentManager, SystemEnvironment};
pub use events::ExtensionEventManager;
pub use seqno::{MrseqFileStore, RegistrySequenceNumberStore, SequenceNumberStore};
pub use settings::HandlerSettings;
pub use status::{StatusReport, StatusType};
pub use vmextension::{
    ErrorWithClarification, InitializationInfo, OperationName, Outcome, VmExtension,
};
