//! Password based key derivation (PBKDF2-HMAC-SHA256)

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{KEY_LEN, SALT_LEN};

/// PBKDF2 iteration count. Part of the container format: changing it makes
/// existing password-sealed containers unreadable.
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Derive a 32-byte key from a password and salt.
///
/// Deterministic for a given (password, salt) pair, which is what lets
/// `open` rebuild the key used by `seal`. Any byte sequence is accepted as
/// a password, including the empty one.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    derive_key_with_rounds(password, salt, PBKDF2_ROUNDS)
}

fn derive_key_with_rounds(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, rounds, key.as_mut_slice());
    key
}
