//! Minimal access to `HKEY_LOCAL_MACHINE` values through the `reg` tool
//!
//! The Windows guest agent keeps per-handler state under
//! `HKLM\Software\Microsoft\Windows Azure\HandlerState\<name>_<version>`.

use crate::error::{Error, Result};
use tracing::debug;

/// Registry key holding per-handler state for one extension version
pub fn handler_state_key(name: &str, version: &str) -> String {
    format!(
        "HKLM\\Software\\Microsoft\\Windows Azure\\HandlerState\\{}_{}",
        name, version
    )
}

/// Read a `REG_SZ` or `REG_DWORD` value as text. `REG_DWORD` data is
/// rendered in decimal. A missing key or value yields `Ok(None)`.
pub fn query_value(key: &str, value_name: &str) -> Result<Option<String>> {
    let output = duct::cmd("reg", ["query", key, "/v", value_name])
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()?;

    if !output.status.success() {
        debug!(
            "reg query {} /v {} returned {:?}",
            key, value_name, output.status
        );
        let stderr = String::from_utf8_lossy(&output.stderr);
        return classify_query_failure(key, value_name, &stderr).map(|()| None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_query_output(&stdout, value_name)
}

/// Write a `REG_DWORD` value, creating the key when needed
pub fn set_dword_value(key: &str, value_name: &str, data: u32) -> Result<()> {
    let data = data.to_string();
    let output = duct::cmd(
        "reg",
        [
            "add",
            key,
            "/v",
            value_name,
            "/t",
            "REG_DWORD",
            "/d",
            data.as_str(),
            "/f",
        ],
    )
    .stdout_capture()
    .stderr_capture()
    .unchecked()
    .run()?;

    if !output.status.success() {
        return Err(Error::registry(format!(
            "could not set {}\\{}: {}",
            key,
            value_name,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// A failed `reg query` is only "absent" when reg reports it could not find
/// the key or value. Anything else (access denied, bad key) is an error.
fn classify_query_failure(key: &str, value_name: &str, stderr: &str) -> Result<()> {
    if stderr.to_ascii_lowercase().contains("unable to find") {
        return Ok(());
    }
    Err(Error::registry(format!(
        "could not read {}\\{}: {}",
        key,
        value_name,
        stderr.trim()
    )))
}

/// Extract the data column of `reg query` output for `value_name`.
///
/// Lines look like `    SequenceNumber    REG_SZ    5` or
/// `    SequenceNumber    REG_DWORD    0x5`.
fn parse_query_output(stdout: &str, value_name: &str) -> Result<Option<String>> {
    for line in stdout.lines() {
        let rest = line.trim_start();
        let Some(name) = rest.split_whitespace().next() else {
            continue;
        };
        if !name.eq_ignore_ascii_case(value_name) {
            continue;
        }
        let rest = rest[name.len()..].trim_start();
        let Some(kind) = rest.split_whitespace().next() else {
            continue;
        };
        if !kind.starts_with("REG_") {
            continue;
        }
        let data = rest[kind.len()..].trim_start().trim_end_matches(['\r', '\n']);

        if kind.eq_ignore_ascii_case("REG_DWORD") {
            let digits = data.trim();
            let hex = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(digits);
            let value = u32::from_str_radix(hex, 16).map_err(|_| {
                Error::registry(format!("invalid REG_DWORD data for {}: {}", value_name, data))
            })?;
            return Ok(Some(value.to_string()));
        }
        return Ok(Some(data.to_string()));
    }
    Ok(None)
}
