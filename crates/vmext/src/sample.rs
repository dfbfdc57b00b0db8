//! The sample extension's callbacks

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};
use vmext_core::constants::SETTINGS_FILE_SUFFIX;
use vmext_core::utils::try_clear_extension_scripts_directories_and_settings_files_except_most_recent;
use vmext_handler::command::CommandError;
use vmext_handler::{
    CommandHandler, ErrorWithClarification, HandlerSettings, InitializationInfo, VmExtension,
};

pub const EXTENSION_NAME: &str = "VMExtensionSample";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandSettings {
    #[serde(default)]
    command_to_execute: Option<String>,
}

pub fn initialization_info() -> InitializationInfo {
    InitializationInfo::new(EXTENSION_NAME, env!("CARGO_PKG_VERSION"), true, enable)
        .with_disable_callback(|ext| {
            ext.events()
                .log_informational_event("Disable", "sample extension disabled");
            Ok(())
        })
        .with_log_file_name_format("vmext_sample_%v.log")
}

/// The command to run: protected settings take precedence over public ones
fn command_to_execute(settings: &HandlerSettings) -> Result<Option<String>> {
    let protected: Option<CommandSettings> = settings
        .protected_settings_as()
        .context("protected settings are not valid JSON")?;
    if let Some(command) = protected.and_then(|s| s.command_to_execute) {
        return Ok(Some(command));
    }

    let public: CommandSettings = settings
        .public_settings_as()
        .context("public settings are malformed")?;
    Ok(public.command_to_execute.filter(|c| !c.trim().is_empty()))
}

fn enable(ext: &VmExtension) -> Result<String> {
    let settings = ext.settings().context("failed to load settings")?;
    let Some(command) = command_to_execute(&settings)? else {
        info!("No commandToExecute in settings, nothing to do");
        return Ok("no command to execute".to_string());
    };

    let seq = ext.requested_sequence_number()?;
    let handler_env = ext.handler_env();
    let working_dir = handler_env.data_folder.join(seq.to_string());
    let log_dir = handler_env.log_folder.join(seq.to_string());

    ext.events().set_operation_id(seq.to_string());
    ext.events()
        .log_informational_event("Enable", &format!("executing '{}'", command));

    CommandHandler::new()
        .execute(&command, &working_dir, &log_dir, true, &HashMap::new())
        .map_err(|e| match e.downcast_ref::<CommandError>() {
            Some(CommandError::NonZeroExit { code }) => ErrorWithClarification::new(
                *code,
                format!("'{}' exited with code {}", command, code),
            )
            .into(),
            _ => e,
        })?;

    cleanup_previous_runs(ext, seq);
    Ok(format!("executed '{}'", command))
}

/// Drop working directories and settings of older sequence numbers
fn cleanup_previous_runs(ext: &VmExtension, seq: vmext_core::SequenceNumber) {
    let handler_env = ext.handler_env();
    let (Some(scripts_dir), Some(dir_name)) = (
        handler_env.data_folder.parent(),
        handler_env.data_folder.file_name().and_then(|n| n.to_str()),
    ) else {
        return;
    };

    let settings_pattern = format!(r"^\d+{}$", regex::escape(SETTINGS_FILE_SUFFIX));
    let keep_format = format!("{{}}{}", SETTINGS_FILE_SUFFIX);
    if let Err(e) = try_clear_extension_scripts_directories_and_settings_files_except_most_recent(
        scripts_dir,
        &handler_env.config_folder,
        dir_name,
        seq,
        &settings_pattern,
        &keep_format,
    ) {
        warn!("Could not clean up previous runs: {}", e);
    }
}
