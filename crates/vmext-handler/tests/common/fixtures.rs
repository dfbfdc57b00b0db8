//! Temporary handler environments

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use vmext_core::HandlerEnvironment;

/// A handler environment whose folders live in a temporary directory
pub struct TestHandlerEnv {
    temp_dir: TempDir,
    pub handler_env: HandlerEnvironment,
}

impl TestHandlerEnv {
    /// Status, config and log folders exist; the data folder does not
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let handler_env = HandlerEnvironment {
            status_folder: root.join("status"),
            config_folder: root.join("config"),
            log_folder: root.join("log"),
            data_folder: root.join("data"),
            events_folder: Some(root.join("events")),
            ..Default::default()
        };
        for dir in [
            &handler_env.status_folder,
            &handler_env.config_folder,
            &handler_env.log_folder,
        ] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::create_dir_all(root.join("events")).unwrap();

        Self {
            temp_dir,
            handler_env,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_folder(&self) -> &Path {
        &self.handler_env.config_folder
    }

    pub fn status_folder(&self) -> &Path {
        &self.handler_env.status_folder
    }

    pub fn data_folder(&self) -> &Path {
        &self.handler_env.data_folder
    }

    pub fn disable_marker(&self) -> PathBuf {
        self.config_folder().join("disable")
    }

    /// Write `<seq>.settings` into the config folder
    pub fn write_settings(&self, seq: u64, contents: &str) -> PathBuf {
        write_settings_file(self.config_folder(), &format!("{}.settings", seq), contents)
    }
}

/// Write a settings file and return its path
pub fn write_settings_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Set a file's modification time to `UNIX_EPOCH + secs`
pub fn set_mtime(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000 + secs))
        .unwrap();
}
