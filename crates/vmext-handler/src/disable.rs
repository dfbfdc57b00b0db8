//! Disable-state tracking
//!
//! An extension is disabled exactly when the `disable` sentinel file exists in
//! its config folder. Toggling tolerates the file already being in the desired
//! state, so overlapping enable/disable invocations do not fail each other.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use vmext_core::constants::DISABLE_FILE_NAME;
use vmext_core::Result;

#[derive(Debug, Clone)]
pub struct DisableTracker {
    marker: PathBuf,
}

impl DisableTracker {
    pub fn new(config_folder: &Path) -> Self {
        Self {
            marker: config_folder.join(DISABLE_FILE_NAME),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// True when the sentinel file exists. A failure to check is logged and
    /// reported as disabled.
    pub fn is_disabled(&self) -> bool {
        match self.marker.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                error!("could not check for {}: {}", self.marker.display(), e);
                true
            }
        }
    }

    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        if disabled {
            self.mark_disabled()
        } else {
            self.clear_disabled()
        }
    }

    fn mark_disabled(&self) -> Result<()> {
        if self.marker.try_exists().unwrap_or(false) {
            info!("Extension is already disabled");
            return Ok(());
        }

        info!("Disabling extension");
        fs::write(&self.marker, b"1").map_err(|e| {
            error!("Could not disable the extension: {}", e);
            e
        })?;
        info!("Disabled extension");
        Ok(())
    }

    fn clear_disabled(&self) -> Result<()> {
        info!("Un-disabling extension");
        match fs::remove_file(&self.marker) {
            Ok(()) => {
                info!("Re-enabled extension");
                Ok(())
            }
            // Another invocation may have removed it first
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Disable file was not present, ignoring");
                Ok(())
            }
            Err(e) => {
                error!("Could not re-enable the extension: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disable_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let tracker = DisableTracker::new(temp.path());

        tracker.set_disabled(true).unwrap();
        tracker.set_disabled(true).unwrap();
        assert!(tracker.is_disabled());
        assert!(temp.path().join("disable").exists());
    }

    #[test]
    fn test_enable_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let tracker = DisableTracker::new(temp.path());
        tracker.set_disabled(true).unwrap();

        tracker.set_disabled(false).unwrap();
        tracker.set_disabled(false).unwrap();
        assert!(!tracker.is_disabled());
    }

    #[test]
    fn test_fresh_extension_is_enabled() {
        let temp = TempDir::new().unwrap();
        assert!(!DisableTracker::new(temp.path()).is_disabled());
    }

    #[test]
    fn test_mark_disabled_in_missing_folder_fails() {
        let temp = TempDir::new().unwrap();
        let tracker = DisableTracker::new(&temp.path().join("missing"));
        assert!(tracker.set_disabled(true).is_err());
    }
}
