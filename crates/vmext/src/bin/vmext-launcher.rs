//! Extension launcher
//!
//! Writes a placeholder `transitioning` status for enable and starts the
//! extension executable as an independent process, so the agent's call returns
//! immediately.

use clap::Parser;
use tracing::error;
use vmext_core::constants::exit_code;
use vmext_core::HandlerEnvironment;
use vmext_handler::launcher::{self, LaunchRequest};
use vmext_handler::{logging, CommandHandler, SystemEnvironment};

const LAUNCHER_LOG_FILE_NAME_FORMAT: &str = "vmext_launcher_%v.log";

#[derive(Parser, Debug)]
#[command(name = "vmext-launcher")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the extension
    #[arg(long = "extensionname")]
    extension_name: String,

    /// Version of the extension
    #[arg(long = "extensionversion")]
    extension_version: String,

    /// File name of the extension executable
    #[arg(long = "exename")]
    exe_name: String,

    /// Operation to perform on the extension
    #[arg(long)]
    operation: String,
}

fn main() {
    let cli = Cli::parse();

    let env = match SystemEnvironment::new(&cli.extension_name, &cli.extension_version) {
        Ok(env) => env,
        Err(e) => {
            logging::init_stderr_tracing(vmext_core::config::DEFAULT_LOG_FILTER);
            error!("could not set up the extension environment: {}", e);
            std::process::exit(exit_code::ENVIRONMENT_ERROR);
        }
    };

    let handler_env = match HandlerEnvironment::load(&cli.extension_name, &cli.extension_version) {
        Ok(handler_env) => handler_env,
        Err(e) => {
            logging::init_stderr_tracing(env.overrides().log_filter());
            error!("could not load the handler environment: {}", e);
            std::process::exit(exit_code::ENVIRONMENT_ERROR);
        }
    };
    logging::init_tracing(
        &handler_env.log_folder,
        LAUNCHER_LOG_FILE_NAME_FORMAT,
        env.overrides().log_filter(),
    );

    let request = LaunchRequest {
        extension_name: cli.extension_name,
        extension_version: cli.extension_version,
        exe_name: cli.exe_name,
        operation: cli.operation,
    };

    if let Err(e) = launcher::run(&request, &handler_env, &env, &CommandHandler::new()) {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
