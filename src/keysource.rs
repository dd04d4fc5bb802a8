//! Key material resolution
//!
//! Both pipeline operations accept either a password or a key file. The
//! difference is confined to [`KeySource::resolve`]; callers only ever see
//! the resulting [`KeyMaterial`].

use std::path::PathBuf;

use tracing::debug;
use zeroize::Zeroizing;

use crate::container::Container;
use crate::error::Result;
use crate::kdf;
use crate::keyfile::KeyFile;
use crate::passphrase::PassphraseReader;
use crate::{IV_LEN, KEY_LEN, SALT_LEN};

/// Where the symmetric key comes from.
pub enum KeySource {
    /// Derive the key from a password read from this reader.
    Password(Box<dyn PassphraseReader>),
    /// Load the key (and, when sealing, the IV) from a key file.
    KeyFile(PathBuf),
}

/// Which pipeline direction the material is resolved for.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Seal,
    /// Opening takes salt and IV from the parsed container header.
    Open(&'a Container<'a>),
}

/// Everything the cipher and the container codec need for one operation.
pub struct KeyMaterial {
    pub key: Zeroizing<[u8; KEY_LEN]>,
    pub iv: [u8; IV_LEN],
    pub salt: [u8; SALT_LEN],
}

impl KeySource {
    /// Resolve (key, iv, salt) for `operation`.
    ///
    /// - Password, seal: fresh salt and IV, key derived from (password, salt).
    /// - Password, open: salt and IV from the container, key derived.
    /// - Key file, seal: key and IV from the file, fresh salt that only keeps
    ///   the container layout uniform.
    /// - Key file, open: key from the file; IV and salt from the container.
    ///   The container's IV wins over the key file's.
    pub fn resolve(&mut self, operation: Operation<'_>) -> Result<KeyMaterial> {
        match (self, operation) {
            (KeySource::Password(reader), Operation::Seal) => {
                let passphrase = reader.read_passphrase()?;
                let salt = random_salt();
                let mut iv = [0u8; IV_LEN];
                rand::fill(&mut iv[..]);
                debug!("deriving key from password with fresh salt");
                Ok(KeyMaterial {
                    key: kdf::derive_key(&passphrase, &salt),
                    iv,
                    salt,
                })
            }
            (KeySource::Password(reader), Operation::Open(container)) => {
                let passphrase = reader.read_passphrase()?;
                debug!("deriving key from password with container salt");
                Ok(KeyMaterial {
                    key: kdf::derive_key(&passphrase, &container.salt),
                    iv: container.iv,
                    salt: container.salt,
                })
            }
            (KeySource::KeyFile(path), Operation::Seal) => {
                let key_file = KeyFile::load(path)?;
                Ok(KeyMaterial {
                    key: key_file.key,
                    iv: key_file.iv,
                    salt: random_salt(),
                })
            }
            (KeySource::KeyFile(path), Operation::Open(container)) => {
                let key_file = KeyFile::load(path)?;
                Ok(KeyMaterial {
                    key: key_file.key,
                    iv: container.iv,
                    salt: container.salt,
                })
            }
        }
    }
}

fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::fill(&mut salt[..]);
    salt
}
