//! Extension lifecycle state machine
//!
//! One process invocation runs exactly one operation:
//! 1. [`VmExtension::new`] validates the [`InitializationInfo`], loads the
//!    handler environment and the current sequence number
//! 2. [`VmExtension::run`] parses the operation from the command line
//! 3. [`VmExtension::dispatch`] applies the enable skip rule, records the
//!    sequence number, reports status and invokes the operation's handler
//!
//! The result is an [`Outcome`]; only the binary's `main` turns it into a
//! process exit.

mod enable_disable;
mod error_clarification;
mod initialization;
mod install_uninstall;

pub use error_clarification::ErrorWithClarification;
pub use initialization::{Callback, EnableCallback, InitializationInfo};

use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};
use vmext_core::constants::exit_code;
use vmext_core::{Error, HandlerEnvironment, Result, SequenceNumber};

use crate::disable::DisableTracker;
use crate::environment::{EnvironmentManager, SystemEnvironment};
use crate::events::ExtensionEventManager;
use crate::logging;
use crate::settings::HandlerSettings;
use crate::status::{status_message, StatusReport, StatusType};

/// Operations the agent can ask a handler to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    Install,
    Uninstall,
    Enable,
    Update,
    Disable,
    ResetState,
}

impl OperationName {
    pub const ALL: [OperationName; 6] = [
        OperationName::Install,
        OperationName::Uninstall,
        OperationName::Enable,
        OperationName::Update,
        OperationName::Disable,
        OperationName::ResetState,
    ];

    /// Command line name
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationName::Install => "install",
            OperationName::Uninstall => "uninstall",
            OperationName::Enable => "enable",
            OperationName::Update => "update",
            OperationName::Disable => "disable",
            OperationName::ResetState => "resetstate",
        }
    }

    /// Name used in status files
    pub fn status_name(&self) -> &'static str {
        match self {
            OperationName::Install => "Install",
            OperationName::Uninstall => "Uninstall",
            OperationName::Enable => "Enable",
            OperationName::Update => "Update",
            OperationName::Disable => "Disable",
            OperationName::ResetState => "Resetstate",
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OperationName::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::invalid_operation(s))
    }
}

/// How an operation is run: fixed when the extension is constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Operation {
    name: OperationName,
    reports_status: bool,
    fail_exit_code: i32,
}

/// Result of one invocation
#[derive(Debug)]
pub enum Outcome {
    Succeeded {
        operation: OperationName,
        message: String,
    },
    /// Enable was asked to re-apply a sequence number that is not newer than the current one
    Skipped { operation: OperationName },
    Failed {
        operation: OperationName,
        exit_code: i32,
        error: anyhow::Error,
    },
    /// Bad command line; carries the text to print
    Usage { text: String },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Succeeded { .. } | Outcome::Skipped { .. } => exit_code::SUCCESS,
            Outcome::Failed { exit_code, .. } => *exit_code,
            Outcome::Usage { .. } => exit_code::ARGUMENT_ERROR,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == exit_code::SUCCESS
    }
}

/// Usage text: the operation list followed by the extension version
pub fn usage(program: &str, version: &str) -> String {
    let ops: Vec<&str> = OperationName::ALL.iter().map(|op| op.as_str()).collect();
    format!("Usage: {} {}\n{}", program, ops.join("|"), version)
}

/// Parse `<program> <operation>`. Anything else yields the usage text.
pub fn parse_operation<S: AsRef<str>>(
    args: &[S],
    version: &str,
) -> std::result::Result<OperationName, String> {
    let program = args.first().map(|a| a.as_ref()).unwrap_or("extension");
    let [_, op] = args else {
        return Err(format!("{}\nIncorrect usage.", usage(program, version)));
    };
    op.as_ref().parse::<OperationName>().map_err(|_| {
        format!(
            "{}\nIncorrect command: {:?}",
            usage(program, version),
            op.as_ref()
        )
    })
}

/// A constructed extension, ready to dispatch one operation.
///
/// Callbacks receive a reference to it so they can read settings, the handler
/// environment and sequence numbers, and raise events.
pub struct VmExtension {
    info: InitializationInfo,
    handler_env: HandlerEnvironment,
    current_sequence_number: Option<SequenceNumber>,
    events: ExtensionEventManager,
    disable_tracker: DisableTracker,
    manager: Box<dyn EnvironmentManager>,
}

impl VmExtension {
    /// Build against the real host: handler environment file or registry, the
    /// platform sequence number store and `openssl`. Also starts file logging.
    pub fn new(info: InitializationInfo) -> Result<Self> {
        info.validate()?;

        let system = SystemEnvironment::new(&info.name, &info.version)?;
        let handler_env = system.handler_environment(&info.name, &info.version)?;
        logging::init_tracing(
            &handler_env.log_folder,
            info.log_file_name_format(),
            system.overrides().log_filter(),
        );

        Self::with_handler_environment(info, Box::new(system), handler_env)
    }

    /// Build against an injected environment
    pub fn new_with(
        info: InitializationInfo,
        manager: Box<dyn EnvironmentManager>,
    ) -> Result<Self> {
        info.validate()?;
        let handler_env = manager.handler_environment(&info.name, &info.version)?;
        Self::with_handler_environment(info, manager, handler_env)
    }

    fn with_handler_environment(
        info: InitializationInfo,
        manager: Box<dyn EnvironmentManager>,
        handler_env: HandlerEnvironment,
    ) -> Result<Self> {
        let current_sequence_number = manager
            .current_sequence_number(&info.name, &info.version)
            .map_err(|e| {
                error!("failed to read the current sequence number: {}", e);
                e
            })?;
        match current_sequence_number {
            Some(seq) => debug!("Current sequence number is {}", seq),
            None => debug!("No current sequence number, extension has not run before"),
        }

        let events = ExtensionEventManager::new(
            handler_env.events_folder.clone(),
            manager.extension_version(),
        );
        let disable_tracker = DisableTracker::new(&handler_env.config_folder);

        Ok(Self {
            info,
            handler_env,
            current_sequence_number,
            events,
            disable_tracker,
            manager,
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn handler_env(&self) -> &HandlerEnvironment {
        &self.handler_env
    }

    /// `None` when the extension has never run
    pub fn current_sequence_number(&self) -> Option<SequenceNumber> {
        self.current_sequence_number
    }

    /// Resolved fresh on every call
    pub fn requested_sequence_number(&self) -> Result<SequenceNumber> {
        self.manager
            .requested_sequence_number(&self.handler_env.config_folder)
    }

    /// Settings for the requested sequence number
    pub fn settings(&self) -> Result<HandlerSettings> {
        let seq = self.requested_sequence_number()?;
        self.manager.handler_settings(&self.handler_env, seq)
    }

    pub fn events(&self) -> &ExtensionEventManager {
        &self.events
    }

    pub fn is_disabled(&self) -> bool {
        self.info.supports_disable && self.disable_tracker.is_disabled()
    }

    /// Parse the operation from `args` (program name first) and dispatch it
    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> Outcome {
        match parse_operation(args, &self.info.version) {
            Ok(name) => self.dispatch(name),
            Err(text) => Outcome::Usage { text },
        }
    }

    /// [`run`](Self::run) for a binary's `main`: prints usage, logs failures
    /// and returns the process exit code.
    pub fn execute<I>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let outcome = self.run(args.as_slice());
        match &outcome {
            Outcome::Usage { text } => println!("{}", text),
            Outcome::Failed { operation, error, .. } => {
                error!("failed to handle {}: {:#}", operation, error);
            }
            Outcome::Skipped { .. } | Outcome::Succeeded { .. } => {}
        }
        outcome.exit_code()
    }

    fn operation(&self, name: OperationName) -> Operation {
        let (reports_status, fail_exit_code) = match name {
            OperationName::Install => (false, self.info.install_exit_code),
            OperationName::Enable | OperationName::Disable => (true, self.info.other_exit_code),
            OperationName::Uninstall | OperationName::Update | OperationName::ResetState => {
                (false, self.info.other_exit_code)
            }
        };
        Operation {
            name,
            reports_status,
            fail_exit_code,
        }
    }

    /// Run one operation to completion
    pub fn dispatch(&self, name: OperationName) -> Outcome {
        let op = self.operation(name);

        if name == OperationName::Enable {
            let requested = match self.requested_sequence_number() {
                Ok(seq) => seq,
                Err(e) => {
                    error!("could not determine requested sequence number: {}", e);
                    return Outcome::Failed {
                        operation: name,
                        exit_code: op.fail_exit_code,
                        error: anyhow::Error::new(e)
                            .context("could not determine requested sequence number"),
                    };
                }
            };

            if self.should_skip_enable(requested) {
                info!("sequence number has not increased. Exiting.");
                return Outcome::Skipped { operation: name };
            }

            info!("Running operation {} for seqNo {}", name, requested);
            if let Err(e) = self
                .manager
                .set_sequence_number(&self.info.name, &self.info.version, requested)
            {
                warn!("failed to write new sequence number: {}", e);
            }
        } else {
            info!("Running operation {}", name);
        }

        self.report_status(&op, StatusType::Transitioning, "", None);

        match self.handle(name) {
            Ok(message) => {
                info!("{} succeeded", name.status_name());
                self.report_status(&op, StatusType::Success, &message, None);
                Outcome::Succeeded {
                    operation: name,
                    message,
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("{} failed: {}", name.status_name(), message);
                let clarification_code =
                    error_clarification::find_clarification(&e).map(|c| c.code);
                self.report_status(&op, StatusType::Error, &message, clarification_code);
                Outcome::Failed {
                    operation: name,
                    exit_code: op.fail_exit_code,
                    error: e,
                }
            }
        }
    }

    /// Enable is skipped only when a change is required, a current number is
    /// known and the requested number is not newer
    fn should_skip_enable(&self, requested: SequenceNumber) -> bool {
        self.info.requires_seq_no_change
            && self
                .current_sequence_number
                .is_some_and(|current| requested <= current)
    }

    fn handle(&self, name: OperationName) -> anyhow::Result<String> {
        match name {
            OperationName::Install => self.install(),
            OperationName::Uninstall => self.uninstall(),
            OperationName::Enable => self.enable(),
            OperationName::Update => match &self.info.update_callback {
                Some(callback) => self.update(callback),
                None => self.noop(),
            },
            OperationName::Disable => {
                if self.info.supports_disable || self.info.disable_callback.is_some() {
                    self.disable()
                } else {
                    self.noop()
                }
            }
            OperationName::ResetState => {
                if self.info.supports_reset_state || self.info.reset_state_callback.is_some() {
                    self.reset_state()
                } else {
                    self.noop()
                }
            }
        }
    }

    fn noop(&self) -> anyhow::Result<String> {
        info!("noop");
        Ok(String::new())
    }

    /// Write a status file for `op` when it reports status. Failures are logged.
    fn report_status(
        &self,
        op: &Operation,
        status: StatusType,
        msg: &str,
        clarification_code: Option<i32>,
    ) {
        if !op.reports_status {
            debug!("status not reported for operation {}", op.name);
            return;
        }

        let seq = match self.requested_sequence_number() {
            Ok(seq) => seq,
            Err(e) => {
                error!("Failed to save handler status: {}", e);
                return;
            }
        };

        let status_name = op.name.status_name();
        let message = match &self.info.status_formatter {
            Some(formatter) => formatter(status_name, status, msg),
            None => status_message(status_name, status, msg),
        };
        let report = match clarification_code {
            Some(code) => StatusReport::new_error(status_name, &message, code),
            None => StatusReport::new(status, status_name, &message),
        };

        if let Err(e) = report.save(&self.handler_env.status_folder, seq) {
            error!("Failed to save handler status: {}", e);
        }
    }
}

impl fmt::Debug for VmExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmExtension")
            .field("info", &self.info)
            .field("handler_env", &self.handler_env)
            .field("current_sequence_number", &self.current_sequence_number)
            .finish_non_exhaustive()
    }
}
