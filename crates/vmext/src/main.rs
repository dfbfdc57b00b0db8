//! Sample VM extension
//!
//! Runs `commandToExecute` from the extension settings on enable. Everything
//! else is handled by the framework's built-in operations.

mod sample;

use vmext_core::constants::exit_code;
use vmext_handler::VmExtension;

fn main() {
    let ext = match VmExtension::new(sample::initialization_info()) {
        Ok(ext) => ext,
        Err(e) => {
            eprintln!("failed to initialize extension: {}", e);
            std::process::exit(exit_code::ENVIRONMENT_ERROR);
        }
    };

    std::process::exit(ext.execute(std::env::args()));
}
