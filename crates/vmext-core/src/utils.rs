//! Filesystem helpers used by the built-in operations and by extensions that
//! clean up after older sequence numbers

use crate::error::{Error, Result};
use crate::sequence::SequenceNumber;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Remove everything inside `dir`, keeping the directory itself.
///
/// An empty path is ignored.
pub fn remove_directory_contents(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Delete (or truncate) files in `directory` whose names match `pattern`,
/// except the one named `except_file_name`. Individual failures are logged.
pub fn try_clear_regex_matching_files_except(
    directory: &Path,
    pattern: &str,
    except_file_name: &str,
    delete_files: bool,
) -> Result<()> {
    if pattern.is_empty() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty file name pattern",
        )));
    }
    let regex = Regex::new(pattern).map_err(|e| {
        Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
    })?;

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name == except_file_name || !regex.is_match(&file_name) {
            continue;
        }

        let path = entry.path();
        let result = if delete_files {
            fs::remove_file(&path)
        } else {
            fs::File::create(&path).map(|_| ())
        };
        if let Err(e) = result {
            warn!("Could not clear {}: {}", path.display(), e);
        }
    }
    Ok(())
}

/// Delete every directory under `parent` except the one named `except_dir_name`
pub fn try_delete_directories_except(parent: &Path, except_dir_name: &str) -> Result<()> {
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || entry.file_name() == except_dir_name {
            continue;
        }
        let path = entry.path();
        if let Err(e) = fs::remove_dir_all(&path) {
            warn!("Could not delete {}: {}", path.display(), e);
        }
    }
    Ok(())
}

/// Delete script directories of previous sequence numbers and empty their
/// runtime settings files, keeping only `most_recent`.
///
/// `settings_pattern` matches every settings file of the extension (for example
/// `^\d+\.settings$`); `settings_name_format` renders the file to keep, with
/// `{}` standing in for the sequence number (for example `{}.settings`).
pub fn try_clear_extension_scripts_directories_and_settings_files_except_most_recent(
    scripts_directory: &Path,
    runtime_settings_directory: &Path,
    extension_name: &str,
    most_recent: SequenceNumber,
    settings_pattern: &str,
    settings_name_format: &str,
) -> Result<()> {
    let most_recent_name = most_recent.to_string();
    try_delete_directories_except(&scripts_directory.join(extension_name), &most_recent_name)?;

    let keep = settings_name_format.replacen("{}", &most_recent_name, 1);
    try_clear_regex_matching_files_except(
        runtime_settings_directory,
        settings_pattern,
        &keep,
        false,
    )
}
