//! Common test utilities for vmext-handler
//!
//! This module provides shared test infrastructure including:
//! - Constants for the test extension
//! - Temporary handler environments and settings files
//! - Mock environment manager, decryptor and process launcher
//! - Assertion helpers for status files and the disable marker

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod constants;
pub mod fixtures;
pub mod mocks;

pub use assertions::*;
pub use constants::*;
pub use fixtures::*;
pub use mocks::*;
