//! # vmext-core
//!
//! Core library for the VM extension handler framework providing:
//! - The error taxonomy shared by every handler component
//! - Sequence number and handler environment types
//! - Process exit codes and well-known file names
//! - Runtime overrides read from the process environment
//! - Filesystem and registry helpers

pub mod config;
pub mod constants;
pub mod error;
pub mod handler_env;
pub mod registry;
pub mod sequence;
pub mod utils;

pub use config::RuntimeOverrides;
pub use error::{Error, Result};
pub use handler_env::HandlerEnvironment;
pub use sequence::SequenceNumber;
