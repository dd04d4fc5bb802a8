//! Container byte layout
//!
//! The container is the on-disk artifact produced by sealing:
//! - salt: 16 bytes (unused when sealed with a key file, but always present)
//! - iv: 16 bytes
//! - ciphertext: variable length, multiple of the cipher block size
//!
//! There is no magic number and no version tag.

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::{IV_LEN, SALT_LEN};

/// Length of the fixed salt + IV header.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// A parsed container borrowing its ciphertext from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container<'a> {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    pub ciphertext: &'a [u8],
}

impl<'a> Container<'a> {
    /// Split `data` into salt, IV and ciphertext.
    ///
    /// Only the header length is validated here; ciphertext alignment is the
    /// cipher's concern.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedContainer,
                format!(
                    "input is {} bytes, shorter than the {}-byte container header; likely truncated",
                    data.len(),
                    HEADER_LEN
                ),
            ));
        }

        let (salt, rest) = data.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);
        let salt: [u8; SALT_LEN] = salt.try_into().map_err(|_| invariant("salt"))?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| invariant("iv"))?;

        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }

    /// Serialize as `salt || iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(self.ciphertext);
        out
    }
}

fn invariant(field: &str) -> SealError {
    SealError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::InternalInvariant,
        format!("container {field} slice has unexpected length"),
    )
}
