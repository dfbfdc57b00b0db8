use anyhow::{anyhow, Context};
use tracing::{error, info};
use vmext_core::Error;

use super::VmExtension;

impl VmExtension {
    pub(super) fn enable(&self) -> anyhow::Result<String> {
        if self.info.supports_disable && self.disable_tracker.is_disabled() {
            // Enable implies re-enabling a disabled extension
            info!("re-enabling the extension");
            if let Err(e) = self.disable_tracker.set_disabled(false) {
                error!("Could not re-enable the extension: {}", e);
            }
        }

        let callback = self
            .info
            .enable_callback
            .as_ref()
            .ok_or_else(|| anyhow!(Error::MissingEnableCallback))?;
        callback(self)
    }

    pub(super) fn disable(&self) -> anyhow::Result<String> {
        info!("disable called");

        if self.info.supports_disable {
            if self.disable_tracker.is_disabled() {
                info!("Extension is already disabled");
            } else {
                self.disable_tracker
                    .set_disabled(true)
                    .context("could not mark the extension disabled")?;
            }
        } else {
            info!("supports_disable is false, disable marker left untouched");
        }

        if let Some(callback) = &self.info.disable_callback {
            callback(self)?;
        }
        Ok(String::new())
    }
}
