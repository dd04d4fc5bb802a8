//! Key files: a JSON record holding a base64 IV and key
//!
//! ```json
//! {
//!   "iv": "<16 bytes, standard base64>",
//!   "key": "<32 bytes, standard base64>"
//! }
//! ```

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::file_ops;
use crate::{IV_LEN, KEY_LEN};

/// Serialized form. Fields are optional so a missing field is reported as an
/// invalid key file rather than a generic JSON error.
#[derive(Serialize, Deserialize)]
struct KeyFileRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

/// Decoded key file contents.
pub struct KeyFile {
    pub key: Zeroizing<[u8; KEY_LEN]>,
    pub iv: [u8; IV_LEN],
}

impl KeyFile {
    /// Random key and IV from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::fill(&mut key[..]);
        let mut iv = [0u8; IV_LEN];
        rand::fill(&mut iv[..]);
        Self { key, iv }
    }

    /// Load and validate a key file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PathInvalid,
                format!("key file {} does not exist or is not a file", path.display()),
            ));
        }
        let data = Zeroizing::new(file_ops::read_file(path)?);
        let key_file =
            Self::from_json(&data).map_err(|e| e.with_context(format!("in {}", path.display())))?;
        debug!(path = %path.display(), "loaded key file");
        Ok(key_file)
    }

    /// Parse and validate the JSON representation.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let record: KeyFileRecord = serde_json::from_slice(data).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::InvalidKeyFile,
                format!("key file is not valid JSON: {}", e),
                e,
            )
        })?;

        let iv: [u8; IV_LEN] = *decode_field::<IV_LEN>("iv", record.iv.as_deref())?;
        let key = decode_field::<KEY_LEN>("key", record.key.as_deref())?;
        Ok(Self { key, iv })
    }

    /// Pretty-printed JSON representation.
    pub fn to_json(&self) -> Result<Zeroizing<String>> {
        let record = KeyFileRecord {
            iv: Some(BASE64_STANDARD.encode(self.iv)),
            key: Some(BASE64_STANDARD.encode(*self.key)),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "failed to serialize key file",
                e,
            )
        })?;
        Ok(Zeroizing::new(json + "\n"))
    }

    /// Write the key file atomically with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        file_ops::write_file_atomic(path, json.as_bytes())
    }
}

fn decode_field<const N: usize>(name: &str, value: Option<&str>) -> Result<Zeroizing<[u8; N]>> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => {
            return Err(invalid(format!("key file has no '{}' field", name)));
        }
    };
    let bytes = Zeroizing::new(BASE64_STANDARD.decode(value).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::InvalidKeyFile,
            format!("key file field '{}' is not valid base64: {}", name, e),
            e,
        )
    })?);
    if bytes.len() != N {
        return Err(invalid(format!(
            "key file field '{}' decodes to {} bytes, expected {}",
            name,
            bytes.len(),
            N
        )));
    }
    let mut out = Zeroizing::new([0u8; N]);
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn invalid(msg: String) -> SealError {
    SealError::with_kind(ErrorCategory::User, ErrorKind::InvalidKeyFile, msg)
}
