//! Sequence number resolution
//!
//! Two numbers matter for every invocation:
//! - the *requested* sequence number: the generation the agent wants applied,
//!   found by looking for the most recently written `<N>.settings` file
//! - the *current* sequence number: the last generation this handler started
//!   applying, persisted by a [`SequenceNumberStore`]
//!
//! The current number is `None` until the extension has run once. Callers must
//! not treat "never ran" as "ran at zero".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info};
use vmext_core::constants::{MOST_RECENT_SEQUENCE_FILE_NAME, SETTINGS_FILE_SUFFIX};
use vmext_core::handler_env::executable_dir;
use vmext_core::{registry, Error, Result, RuntimeOverrides, SequenceNumber};

/// Determine the requested sequence number.
///
/// An override from the environment wins. Otherwise the `.settings` file with
/// the latest modification time names the number. When several files share
/// the latest modification time, the numerically highest stem among *all*
/// settings files is chosen.
pub fn find_requested_sequence_number(
    config_folder: &Path,
    overrides: &RuntimeOverrides,
) -> Result<SequenceNumber> {
    if let Some(seq) = overrides.sequence_number {
        return Ok(seq);
    }

    let candidates = list_settings_files(config_folder)?;
    if candidates.is_empty() {
        error!(
            "Cannot find the seqNo from {}. Not enough files",
            config_folder.display()
        );
        return Err(Error::NoSettingsFiles {
            folder: config_folder.to_path_buf(),
        });
    }

    let latest = candidates
        .iter()
        .map(|c| c.modified)
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let newest: Vec<&SettingsFile> = candidates.iter().filter(|c| c.modified == latest).collect();

    if let [only] = newest.as_slice() {
        debug!("Most recent settings file is {}", only.name);
        return Ok(only.sequence_number);
    }

    // Several files carry the same timestamp; fall back to the highest number
    info!(
        "{} settings files share the latest modification time, choosing the highest sequence number",
        newest.len()
    );
    candidates
        .iter()
        .map(|c| c.sequence_number)
        .max()
        .ok_or_else(|| Error::NoSettingsFiles {
            folder: config_folder.to_path_buf(),
        })
}

#[derive(Debug)]
struct SettingsFile {
    name: String,
    sequence_number: SequenceNumber,
    modified: SystemTime,
}

/// All regular `*.settings` files in the folder, with their parsed stems.
/// A stem that is not an unsigned integer is an error.
fn list_settings_files(config_folder: &Path) -> Result<Vec<SettingsFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(config_folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(SETTINGS_FILE_SUFFIX) else {
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let sequence_number = stem.parse::<u64>().map(SequenceNumber::new).map_err(|_| {
            error!("Can't parse int from filename: {}", name);
            Error::invalid_settings_file_name(name.clone())
        })?;

        files.push(SettingsFile {
            name,
            sequence_number,
            modified: metadata.modified()?,
        });
    }
    Ok(files)
}

/// Persistent record of the last sequence number the handler began applying
pub trait SequenceNumberStore {
    /// `Ok(None)` when nothing has been recorded yet
    fn load(&self) -> Result<Option<SequenceNumber>>;

    fn store(&self, seq: SequenceNumber) -> Result<()>;
}

/// Pick the store for the running platform
pub fn default_sequence_number_store(
    name: &str,
    version: &str,
) -> Result<Box<dyn SequenceNumberStore>> {
    if cfg!(windows) {
        Ok(Box::new(RegistrySequenceNumberStore::new(name, version)))
    } else {
        Ok(Box::new(MrseqFileStore::beside_executable()?))
    }
}

/// `mrseq` file holding the decimal sequence number
#[derive(Debug, Clone)]
pub struct MrseqFileStore {
    path: PathBuf,
}

impl MrseqFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The `mrseq` file lives in the same directory as the extension executable
    pub fn beside_executable() -> Result<Self> {
        Ok(Self::new(executable_dir()?.join(MOST_RECENT_SEQUENCE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SequenceNumberStore for MrseqFileStore {
    fn load(&self) -> Result<Option<SequenceNumber>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => contents.parse().map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn store(&self, seq: SequenceNumber) -> Result<()> {
        fs::write(&self.path, seq.to_string())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// `SequenceNumber` value under the extension's HandlerState registry key
#[derive(Debug, Clone)]
pub struct RegistrySequenceNumberStore {
    key: String,
}

const SEQUENCE_NUMBER_VALUE_NAME: &str = "SequenceNumber";

impl RegistrySequenceNumberStore {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            key: registry::handler_state_key(name, version),
        }
    }
}

impl SequenceNumberStore for RegistrySequenceNumberStore {
    fn load(&self) -> Result<Option<SequenceNumber>> {
        registry::query_value(&self.key, SEQUENCE_NUMBER_VALUE_NAME)?
            .map(|raw| raw.parse())
            .transpose()
    }

    fn store(&self, seq: SequenceNumber) -> Result<()> {
        let value = u32::try_from(seq.get()).map_err(|_| {
            Error::registry(format!("sequence number {} does not fit in a REG_DWORD", seq))
        })?;
        registry::set_dword_value(&self.key, SEQUENCE_NUMBER_VALUE_NAME, value)
    }
}
