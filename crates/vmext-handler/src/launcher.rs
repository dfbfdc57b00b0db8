//! Extension launcher
//!
//! The agent expects handler commands to return quickly. The launcher writes a
//! placeholder `transitioning` status for enable, then re-runs the real
//! extension executable as an independent process and exits.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use vmext_core::constants::exit_code;
use vmext_core::HandlerEnvironment;

use crate::command::ProcessLauncher;
use crate::environment::EnvironmentManager;
use crate::status::{StatusReport, StatusType};
use crate::vmextension::OperationName;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("could not retrieve the requested sequence number: {0}")]
    SequenceNumber(#[source] vmext_core::Error),

    #[error("could not get current working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("failed to launch '{command}': {message}")]
    Launch { command: String, message: String },
}

impl LaunchError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::SequenceNumber(_) | LaunchError::WorkingDirectory(_) => {
                exit_code::ENVIRONMENT_ERROR
            }
            LaunchError::Launch { .. } => exit_code::EXECUTION_ERROR,
        }
    }
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub extension_name: String,
    pub extension_version: String,
    pub exe_name: String,
    pub operation: String,
}

impl LaunchRequest {
    /// Command line of the extension process: `<exe> <operation>`
    pub fn command_line(&self) -> String {
        format!("{} {}", self.exe_name, self.operation)
    }

    fn is_enable(&self) -> bool {
        self.operation.parse::<OperationName>().ok() == Some(OperationName::Enable)
    }
}

/// Write the placeholder status (enable only) and start the extension from the
/// current working directory.
pub fn run(
    request: &LaunchRequest,
    handler_env: &HandlerEnvironment,
    env: &dyn EnvironmentManager,
    launcher: &dyn ProcessLauncher,
) -> Result<(), LaunchError> {
    let working_dir = std::env::current_dir().map_err(|e| {
        error!("could not get current working directory {}", e);
        LaunchError::WorkingDirectory(e)
    })?;
    run_in(request, handler_env, env, launcher, &working_dir)
}

/// [`run`] with an explicit working directory
pub fn run_in(
    request: &LaunchRequest,
    handler_env: &HandlerEnvironment,
    env: &dyn EnvironmentManager,
    launcher: &dyn ProcessLauncher,
    working_dir: &Path,
) -> Result<(), LaunchError> {
    write_transitioning_status(request, handler_env, env)?;

    let command = request.command_line();
    info!("Starting '{}' as an independent process", command);
    launcher
        .launch(&command, working_dir, &handler_env.log_folder)
        .map_err(|e| {
            error!("failed to launch '{}': {:#}", command, e);
            LaunchError::Launch {
                command: command.clone(),
                message: format!("{:#}", e),
            }
        })
}

/// Placeholder status so the agent sees progress while the real process starts.
///
/// Returns the status file path when one was written. An existing status file
/// is never overwritten and a failed write is only logged.
pub fn write_transitioning_status(
    request: &LaunchRequest,
    handler_env: &HandlerEnvironment,
    env: &dyn EnvironmentManager,
) -> Result<Option<PathBuf>, LaunchError> {
    if !request.is_enable() {
        return Ok(None);
    }

    let seq = env
        .requested_sequence_number(&handler_env.config_folder)
        .map_err(|e| {
            error!("could not retrieve the requested sequence number {}", e);
            LaunchError::SequenceNumber(e)
        })?;

    let path = StatusReport::path(&handler_env.status_folder, seq);
    match path.try_exists() {
        Ok(true) => {
            info!(
                "{} already exists, will not create new status file with transitioning status",
                path.display()
            );
            return Ok(None);
        }
        Ok(false) => {}
        Err(e) => {
            warn!(
                "could not determine whether {} exists, continuing without placeholder status: {}",
                path.display(),
                e
            );
            return Ok(None);
        }
    }

    let message = format!(
        "extension {} version {} started execution",
        request.extension_name, request.extension_version
    );
    let report = StatusReport::new(
        StatusType::Transitioning,
        OperationName::Enable.status_name(),
        &message,
    );
    match report.save(&handler_env.status_folder, seq) {
        Ok(()) => Ok(Some(path)),
        Err(e) => {
            warn!(
                "could not write transitioning status for extension {} version {}: {}",
                request.extension_name, request.extension_version, e
            );
            Ok(None)
        }
    }
}
