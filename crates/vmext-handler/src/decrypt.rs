//! Protected settings decryption
//!
//! The agent encrypts protected settings for the VM's certificate and drops the
//! certificate (`<thumbprint>.crt`) and private key (`<thumbprint>.prv`) two
//! directories above the extension's config folder.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vmext_core::{Error, Result};

/// Decrypts the DER-encoded protected settings payload
pub trait Decryptor {
    fn decrypt(&self, config_folder: &Path, thumbprint: &str, der: &[u8]) -> Result<String>;
}

/// Decrypts with the `openssl` command line tool: `cms` first (FIPS 140-3
/// friendly), then `smime` when `cms` fails.
#[derive(Debug, Clone, Default)]
pub struct OpensslDecryptor {
    certificate_dir: Option<PathBuf>,
}

impl OpensslDecryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for certificates in a fixed directory instead of two levels above the config folder
    pub fn with_certificate_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            certificate_dir: Some(dir.into()),
        }
    }

    fn certificate_dir(&self, config_folder: &Path) -> PathBuf {
        self.certificate_dir
            .clone()
            .unwrap_or_else(|| config_folder.join("..").join(".."))
    }

    fn run_openssl(
        subcommand: &str,
        crt: &Path,
        prv: &Path,
        der: &[u8],
    ) -> std::result::Result<String, String> {
        let args: [&OsStr; 8] = [
            OsStr::new(subcommand),
            OsStr::new("-inform"),
            OsStr::new("DER"),
            OsStr::new("-decrypt"),
            OsStr::new("-recip"),
            crt.as_os_str(),
            OsStr::new("-inkey"),
            prv.as_os_str(),
        ];
        let output = duct::cmd("openssl", args)
            .stdin_bytes(der.to_vec())
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(format!(
                "{:?} stderr={}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

impl Decryptor for OpensslDecryptor {
    fn decrypt(&self, config_folder: &Path, thumbprint: &str, der: &[u8]) -> Result<String> {
        let cert_dir = self.certificate_dir(config_folder);
        let crt = cert_dir.join(format!("{}.crt", thumbprint));
        let prv = cert_dir.join(format!("{}.prv", thumbprint));
        debug!("Decrypting protected settings with certificate {}", crt.display());

        match Self::run_openssl("cms", &crt, &prv, der) {
            Ok(plain) => Ok(plain),
            Err(cms_err) => {
                warn!(
                    "decrypting protected settings with cms command failed: {}, now decrypting with smime command",
                    cms_err
                );
                Self::run_openssl("smime", &crt, &prv, der).map_err(|smime_err| {
                    Error::decryption(format!(
                        "cms command failed: {}; smime command failed: {}",
                        cms_err, smime_err
                    ))
                })
            }
        }
    }
}
