//! Handler environment: the filesystem locations and deployment metadata the
//! guest agent hands to an extension
//!
//! On Linux the agent writes `HandlerEnvironment.json` into the extension
//! directory:
//! ```json
//! [{
//!   "version": 1.0,
//!   "name": "Microsoft.Azure.Extensions.Sample",
//!   "handlerEnvironment": {
//!     "logFolder": "/var/log/azure/Sample",
//!     "configFolder": "/var/lib/waagent/Sample-1.0/config",
//!     "statusFolder": "/var/lib/waagent/Sample-1.0/status",
//!     "heartbeatFile": "/var/lib/waagent/Sample-1.0/heartbeat.log",
//!     "eventsFolder": "/var/log/azure/Sample/events"
//!   }
//! }]
//! ```
//! On Windows the status folder and heartbeat file live in the registry and the
//! remaining folders are derived from `%SystemDrive%`.

use crate::constants::{AGENT_DIR, HANDLER_ENV_FILE_NAME};
use crate::error::{Error, Result};
use crate::registry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only description of where an extension keeps its files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEnvironment {
    pub heartbeat_file: Option<PathBuf>,
    pub status_folder: PathBuf,
    pub config_folder: PathBuf,
    pub log_folder: PathBuf,
    pub data_folder: PathBuf,
    pub events_folder: Option<PathBuf>,
    pub deployment_id: Option<String>,
    pub role_name: Option<String>,
    pub instance: Option<String>,
    pub host_resolver_address: Option<String>,
}

/// On-disk shape of one HandlerEnvironment.json entry
#[derive(Debug, Deserialize)]
struct HandlerEnvironmentFile {
    #[serde(rename = "handlerEnvironment")]
    handler_environment: HandlerEnvironmentPaths,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlerEnvironmentPaths {
    #[serde(default)]
    heartbeat_file: Option<PathBuf>,
    status_folder: PathBuf,
    config_folder: PathBuf,
    log_folder: PathBuf,
    #[serde(default)]
    events_folder: Option<PathBuf>,
    #[serde(default, rename = "deploymentid")]
    deployment_id: Option<String>,
    #[serde(default, rename = "rolename")]
    role_name: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default)]
    host_resolver_address: Option<String>,
}

impl HandlerEnvironment {
    /// Locate the handler environment for the running extension, choosing the
    /// platform-specific source.
    pub fn load(name: &str, version: &str) -> Result<Self> {
        if cfg!(windows) {
            Self::from_registry(name, version)
        } else {
            Self::discover(name, &executable_dir()?)
        }
    }

    /// Find HandlerEnvironment.json next to or one level above `base_dir`
    pub fn discover(name: &str, base_dir: &Path) -> Result<Self> {
        let (contents, location) = find_and_read_file(base_dir, HANDLER_ENV_FILE_NAME)?
            .ok_or_else(|| {
                Error::handler_environment_not_found(
                    base_dir.join(HANDLER_ENV_FILE_NAME).display().to_string(),
                )
            })?;
        debug!("Loaded handler environment from {}", location.display());
        Self::parse(&contents, name)
    }

    /// Parse HandlerEnvironment.json contents
    pub fn parse(contents: &[u8], name: &str) -> Result<Self> {
        let entries: Vec<HandlerEnvironmentFile> =
            serde_json::from_slice(contents).map_err(|e| {
                Error::invalid_handler_environment(format!("failed to parse handler env: {}", e))
            })?;

        if entries.len() != 1 {
            return Err(Error::invalid_handler_environment(format!(
                "expected 1 config in parsed HandlerEnvironment, found: {}",
                entries.len()
            )));
        }

        let Some(entry) = entries.into_iter().next() else {
            return Err(Error::invalid_handler_environment("empty handler environment"));
        };
        let paths = entry.handler_environment;

        Ok(Self {
            heartbeat_file: paths.heartbeat_file,
            status_folder: paths.status_folder,
            config_folder: paths.config_folder,
            log_folder: paths.log_folder,
            // The data directory is a subdirectory of the agent dir, with the extension name
            data_folder: Path::new(AGENT_DIR).join(name),
            events_folder: paths.events_folder.filter(|p| !p.as_os_str().is_empty()),
            deployment_id: paths.deployment_id,
            role_name: paths.role_name,
            instance: paths.instance,
            host_resolver_address: paths.host_resolver_address,
        })
    }

    /// Build the Windows handler environment from the HandlerState registry key
    pub fn from_registry(name: &str, version: &str) -> Result<Self> {
        let key = registry::handler_state_key(name, version);

        let status_folder = registry::query_value(&key, "StatusFolder")?
            .ok_or_else(|| Error::handler_environment_not_found(format!("{}\\StatusFolder", key)))?;
        let heartbeat_file = registry::query_value(&key, "HeartBeatFile")?;

        let system_drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        let plugin_dir = PathBuf::from(format!("{}\\", system_drive))
            .join("Packages")
            .join("Plugins")
            .join(name)
            .join(version);
        let log_folder = PathBuf::from(format!("{}\\", system_drive))
            .join("WindowsAzure")
            .join("Logs")
            .join("Plugins")
            .join(name)
            .join(version);

        Ok(Self {
            heartbeat_file: heartbeat_file.map(PathBuf::from),
            status_folder: PathBuf::from(status_folder),
            config_folder: plugin_dir.join("RuntimeSettings"),
            data_folder: plugin_dir.join("Downloads"),
            events_folder: None,
            log_folder,
            ..Default::default()
        })
    }
}

/// Directory holding the running executable
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::handler_environment_not_found(exe.display().to_string()))
}

/// Look for `file_name` in `dir` (executable in `[EXT]/`) and then in its
/// parent (executable in `[EXT]/bin/`). Returns the contents and where they
/// were found, or `None` when neither exists.
pub fn find_and_read_file(dir: &Path, file_name: &str) -> Result<Option<(Vec<u8>, PathBuf)>> {
    let candidates = [dir.join(file_name), dir.join("..").join(file_name)];
    for path in candidates {
        match std::fs::read(&path) {
            Ok(bytes) => return Ok(Some((bytes, path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(None)
}
