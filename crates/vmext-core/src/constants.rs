//! Well-known file names, environment variables and process exit codes

/// File name of the handler environment placed by the guest agent
pub const HANDLER_ENV_FILE_NAME: &str = "HandlerEnvironment.json";

/// Most recent sequence number file, kept beside the extension executable
pub const MOST_RECENT_SEQUENCE_FILE_NAME: &str = "mrseq";

/// Sentinel file in the config folder whose presence marks the extension disabled
pub const DISABLE_FILE_NAME: &str = "disable";

/// Suffix of runtime settings files (`<N>.settings`)
pub const SETTINGS_FILE_SUFFIX: &str = ".settings";

/// Suffix of status files (`<N>.status`)
pub const STATUS_FILE_SUFFIX: &str = ".status";

/// Directory where the Linux agent keeps extension data
pub const AGENT_DIR: &str = "/var/lib/waagent";

/// Environment variable overriding the requested sequence number
pub const CONFIG_SEQUENCE_NUMBER_ENV: &str = "ConfigSequenceNumber";

/// Environment variable carrying the extension version for events
pub const EXTENSION_VERSION_ENV: &str = "AZURE_GUEST_AGENT_EXTENSION_VERSION";

/// Environment variable holding the tracing filter directive
pub const LOG_FILTER_ENV: &str = "VMEXT_LOG";

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const MISC_ERROR: i32 = 1;
    pub const ARGUMENT_ERROR: i32 = 2;
    pub const ENVIRONMENT_ERROR: i32 = 3;
    pub const COMMUNICATION_ERROR: i32 = 4;
    pub const FILE_SYSTEM_ERROR: i32 = 5;
    pub const EXECUTION_ERROR: i32 = 6;

    /// Default failure code for the install operation
    pub const DEFAULT_INSTALL_FAILURE: i32 = 52;

    /// Default failure code for every other operation
    pub const DEFAULT_OTHER_FAILURE: i32 = 3;
}
