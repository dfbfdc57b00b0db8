//! Command execution for extensions
//!
//! [`CommandHandler::execute`] runs a shell command either to completion, with
//! stdout and stderr captured to files in a log directory, or detached so it
//! outlives the handler process.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix applied to every caller-supplied environment variable
pub const CUSTOM_ACTION_ENV_PREFIX: &str = "CustomAction_";

pub const STDOUT_FILE_NAME: &str = "stdout";
pub const STDERR_FILE_NAME: &str = "stderr";

/// A command that ran to completion but did not succeed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("command terminated by a signal")]
    Signaled,
}

/// Starts a detached process. Used by the launcher to re-run the handler
/// executable in the background.
pub trait ProcessLauncher {
    fn launch(&self, command: &str, working_dir: &Path, log_dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }

    /// Run `command` through the shell.
    ///
    /// With `wait`, blocks until the command exits. A non-zero exit is a
    /// [`CommandError::NonZeroExit`]. Without `wait`, returns `0` as soon as the
    /// process is started.
    pub fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        log_dir: &Path,
        wait: bool,
        env: &HashMap<String, String>,
    ) -> Result<i32> {
        if command.trim().is_empty() {
            return Err(anyhow!("command is empty"));
        }
        std::fs::create_dir_all(working_dir).with_context(|| {
            format!("Failed to create working directory {}", working_dir.display())
        })?;
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let env = prefixed_env(env);
        if wait {
            self.execute_and_wait(command, working_dir, log_dir, &env)
        } else {
            self.spawn_detached(command, working_dir, log_dir, &env)?;
            Ok(0)
        }
    }

    fn execute_and_wait(
        &self,
        command: &str,
        working_dir: &Path,
        log_dir: &Path,
        env: &[(String, String)],
    ) -> Result<i32> {
        info!("Executing command: {}", command);

        let (program, args) = shell_invocation(command);
        let mut expression = duct::cmd(program, args)
            .dir(working_dir)
            .stdout_path(log_dir.join(STDOUT_FILE_NAME))
            .stderr_path(log_dir.join(STDERR_FILE_NAME))
            .unchecked();
        for (key, value) in env {
            expression = expression.env(key, value);
        }

        let output = expression
            .run()
            .with_context(|| format!("Failed to run command: {}", command))?;

        log_captured_output(log_dir);

        match output.status.code() {
            Some(0) => Ok(0),
            Some(code) => {
                warn!("Command exited with code {}: {}", code, command);
                Err(CommandError::NonZeroExit { code }.into())
            }
            None => {
                warn!("Command terminated by a signal: {}", command);
                Err(CommandError::Signaled.into())
            }
        }
    }

    fn spawn_detached(
        &self,
        command: &str,
        working_dir: &Path,
        log_dir: &Path,
        env: &[(String, String)],
    ) -> Result<()> {
        info!("Starting detached command: {}", command);

        let stdout = File::create(log_dir.join(STDOUT_FILE_NAME))?;
        let stderr = File::create(log_dir.join(STDERR_FILE_NAME))?;

        let (program, args) = shell_invocation(command);
        let mut child = Command::new(program);
        child
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            child.process_group(0);
        }

        let handle = child
            .spawn()
            .with_context(|| format!("Failed to start command: {}", command))?;
        debug!("Started detached process {}", handle.id());
        Ok(())
    }
}

impl ProcessLauncher for CommandHandler {
    fn launch(&self, command: &str, working_dir: &Path, log_dir: &Path) -> Result<()> {
        self.execute(command, working_dir, log_dir, false, &HashMap::new())
            .map(|_| ())
    }
}

fn log_captured_output(log_dir: &Path) {
    for name in [STDOUT_FILE_NAME, STDERR_FILE_NAME] {
        match std::fs::read_to_string(log_dir.join(name)) {
            Ok(contents) if !contents.is_empty() => debug!("{}: {}", name, contents.trim_end()),
            Ok(_) => {}
            Err(e) => debug!("Unable to read captured {}: {}", name, e),
        }
    }
}

fn prefixed_env(env: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = env
        .iter()
        .map(|(k, v)| (format!("{}{}", CUSTOM_ACTION_ENV_PREFIX, k), v.clone()))
        .collect();
    vars.sort();
    vars
}

#[cfg(unix)]
fn shell_invocation(command: &str) -> (&'static str, Vec<String>) {
    ("sh", vec!["-c".to_string(), command.to_string()])
}

#[cfg(windows)]
fn shell_invocation(command: &str) -> (&'static str, Vec<String>) {
    ("cmd", vec!["/C".to_string(), command.to_string()])
}
