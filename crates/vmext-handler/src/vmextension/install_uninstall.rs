use anyhow::Context;
use std::fs;
use tracing::{error, info};
use vmext_core::utils::remove_directory_contents;

use super::{Callback, VmExtension};

impl VmExtension {
    pub(super) fn install(&self) -> anyhow::Result<String> {
        let data_folder = &self.handler_env.data_folder;
        if !data_folder.try_exists()? {
            info!("Creating data dir {}", data_folder.display());
            fs::create_dir_all(data_folder).context("failed to create data dir")?;
            info!("Created data dir {}", data_folder.display());
        }

        if let Some(callback) = &self.info.install_callback {
            callback(self)?;
        }
        info!("installed");
        Ok(String::new())
    }

    pub(super) fn uninstall(&self) -> anyhow::Result<String> {
        let data_folder = &self.handler_env.data_folder;
        if data_folder.try_exists()? {
            info!("Removing data dir {}", data_folder.display());
            fs::remove_dir_all(data_folder).context("failed to delete data dir")?;
            info!("removed data dir");
        }

        if let Some(callback) = &self.info.uninstall_callback {
            callback(self)?;
        }
        info!("uninstalled");
        Ok(String::new())
    }

    pub(super) fn update(&self, callback: &Callback) -> anyhow::Result<String> {
        info!("update called");
        callback(self)?;
        Ok(String::new())
    }

    pub(super) fn reset_state(&self) -> anyhow::Result<String> {
        info!("resetState called");

        if self.info.supports_reset_state {
            // Best effort; the callback still gets its turn
            if let Err(e) = remove_directory_contents(&self.handler_env.data_folder) {
                error!("Removing data directory contents failed: {}", e);
            }
        }

        if let Some(callback) = &self.info.reset_state_callback {
            callback(self)?;
        }
        Ok(String::new())
    }
}
