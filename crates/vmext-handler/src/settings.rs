//! Runtime settings loading
//!
//! `<configFolder>/<N>.settings` holds one runtime settings container:
//! ```json
//! {"runtimeSettings":[{"handlerSettings":{
//!     "publicSettings":{"commandToExecute":"echo hi"},
//!     "protectedSettings":"<base64 DER>",
//!     "protectedSettingsCertThumbprint":"<thumbprint>"}}]}
//! ```
//! An empty file means no configuration was provided.

use crate::decrypt::Decryptor;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::error;
use vmext_core::{Error, Result, SequenceNumber};

/// Decrypted settings for one sequence number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerSettings {
    pub public_settings: Map<String, Value>,
    pub protected_settings: Option<String>,
}

impl HandlerSettings {
    /// Deserialize the public settings into a caller-defined type
    pub fn public_settings_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.public_settings.clone()))?)
    }

    /// Deserialize the decrypted protected settings (a JSON document) into a
    /// caller-defined type. `Ok(None)` when there are no protected settings.
    pub fn protected_settings_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.protected_settings
            .as_deref()
            .map(|s| serde_json::from_str(s).map_err(Error::from))
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlerSettingsFile {
    #[serde(default)]
    runtime_settings: Vec<HandlerSettingsContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlerSettingsContainer {
    handler_settings: RawHandlerSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHandlerSettings {
    #[serde(default)]
    public_settings: Option<Map<String, Value>>,
    #[serde(default, rename = "protectedSettings")]
    protected_settings_base64: Option<String>,
    #[serde(default, rename = "protectedSettingsCertThumbprint")]
    settings_cert_thumbprint: Option<String>,
}

/// Read, parse and decrypt `<config_folder>/<seq>.settings`
pub fn load_handler_settings(
    config_folder: &Path,
    seq: SequenceNumber,
    decryptor: &dyn Decryptor,
) -> Result<HandlerSettings> {
    let path = config_folder.join(seq.settings_file_name());
    let raw = parse_handler_settings_file(&path)?;
    let protected_settings = decrypt_protected_settings(config_folder, &raw, decryptor)?;

    Ok(HandlerSettings {
        public_settings: raw.public_settings.unwrap_or_default(),
        protected_settings,
    })
}

fn parse_handler_settings_file(path: &Path) -> Result<RawHandlerSettings> {
    let bytes = std::fs::read(path).map_err(|e| {
        error!("Error reading {}: {}", path.display(), e);
        Error::invalid_settings_file(path, e.to_string())
    })?;

    // No configuration specified
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RawHandlerSettings::default());
    }

    let file: HandlerSettingsFile = serde_json::from_slice(&bytes).map_err(|e| {
        error!("error parsing json in {}: {}", path.display(), e);
        Error::invalid_settings_file(path, format!("error parsing json: {}", e))
    })?;

    let count = file.runtime_settings.len();
    let mut containers = file.runtime_settings.into_iter();
    match (containers.next(), count) {
        (Some(container), 1) => Ok(container.handler_settings),
        _ => {
            error!("wrong runtimeSettings count. expected:1, got:{}", count);
            Err(Error::InvalidRuntimeSettingsCount { count })
        }
    }
}

fn decrypt_protected_settings(
    config_folder: &Path,
    raw: &RawHandlerSettings,
    decryptor: &dyn Decryptor,
) -> Result<Option<String>> {
    let payload = raw
        .protected_settings_base64
        .as_deref()
        .filter(|s| !s.is_empty());
    let thumbprint = raw
        .settings_cert_thumbprint
        .as_deref()
        .filter(|s| !s.is_empty());

    match (payload, thumbprint) {
        (None, None) => Ok(None),
        (Some(_), None) => {
            error!("protected settings present without a certificate thumbprint");
            Err(Error::NoCertificateThumbprint)
        }
        (None, Some(_)) => {
            error!("certificate thumbprint present without protected settings");
            Err(Error::MissingProtectedSettings)
        }
        (Some(payload), Some(thumbprint)) => {
            let der = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| {
                    error!("failed to decode base64: {}", e);
                    Error::InvalidProtectedSettingsData
                })?;
            decryptor.decrypt(config_folder, thumbprint, &der).map(Some)
        }
    }
}
