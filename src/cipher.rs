//! AES-256-CBC with PKCS#7 padding
//!
//! This is a confidentiality-only construction: there is no authentication
//! tag. A wrong key or a corrupted ciphertext is usually caught by the
//! padding check on decryption, but not always; roughly one random key in
//! 256 yields valid-looking padding and garbage plaintext.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::{BLOCK_LEN, IV_LEN, KEY_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Message for padding failures. The cipher cannot distinguish a wrong key
/// from a damaged file, so both are reported the same way.
pub const BAD_KEY_OR_CORRUPT: &str = "incorrect password or corrupted file";

/// Encrypt `plaintext`, returning a ciphertext whose length is the next
/// multiple of the block size strictly greater than the plaintext length.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt `ciphertext` and strip its padding.
pub fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::CipherLength,
            format!(
                "ciphertext length {} is not a non-zero multiple of {}; input truncated or corrupt",
                ciphertext.len(),
                BLOCK_LEN
            ),
        ));
    }

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PaddingInvalid,
                BAD_KEY_OR_CORRUPT,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_LEN] = [0x11; KEY_LEN];
    const IV: [u8; IV_LEN] = [0x22; IV_LEN];

    #[test]
    fn test_sp800_38a_first_block() {
        // NIST SP 800-38A F.2.5, CBC-AES256.Encrypt, block #1.
        let key: [u8; KEY_LEN] =
            hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4")
                .unwrap()
                .try_into()
                .unwrap();
        let iv: [u8; IV_LEN] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let ciphertext = encrypt(&plaintext, &key, &iv);

        // One data block plus one full block of padding.
        assert_eq!(ciphertext.len(), 2 * BLOCK_LEN);
        assert_eq!(
            hex::encode(&ciphertext[..BLOCK_LEN]),
            "f58c4c04d6e5f1ba779eabfb5f7bfbd6"
        );
        assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_lengths() {
        for len in [0usize, 1, 15, 16, 17, 31, 32, 1000] {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let ciphertext = encrypt(&plaintext, &KEY, &IV);
            assert_eq!(ciphertext.len(), (len / BLOCK_LEN + 1) * BLOCK_LEN);
            assert_eq!(decrypt(&ciphertext, &KEY, &IV).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_iv_changes_ciphertext() {
        let ct1 = encrypt(b"hello world", &KEY, &IV);
        let ct2 = encrypt(b"hello world", &KEY, &[0x23; IV_LEN]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_empty_ciphertext_rejected() {
        let err = decrypt(&[], &KEY, &IV).expect_err("expected length error");
        assert_eq!(err.kind, Some(ErrorKind::CipherLength));
    }

    #[test]
    fn test_unaligned_ciphertext_rejected() {
        let mut ciphertext = encrypt(b"some data", &KEY, &IV);
        ciphertext.pop();
        let err = decrypt(&ciphertext, &KEY, &IV).expect_err("expected length error");
        assert_eq!(err.kind, Some(ErrorKind::CipherLength));
    }

    #[test]
    fn test_wrong_key_mostly_rejected() {
        // Valid padding under a random key happens with probability ~1/256,
        // so allow a handful through but require the bulk to be caught.
        let ciphertext = encrypt(b"secret payload", &KEY, &IV);
        let trials = 2000;
        let mut accepted = 0;
        for _ in 0..trials {
            let mut wrong = [0u8; KEY_LEN];
            rand::fill(&mut wrong[..]);
            match decrypt(&ciphertext, &wrong, &IV) {
                Ok(plaintext) => {
                    assert_ne!(plaintext, b"secret payload");
                    accepted += 1;
                }
                Err(err) => {
                    assert_eq!(err.kind, Some(ErrorKind::PaddingInvalid));
                    assert_eq!(err.message(), BAD_KEY_OR_CORRUPT);
                }
            }
        }
        assert!(accepted < trials / 20, "{accepted} of {trials} wrong keys accepted");
    }

    #[test]
    fn test_tampered_last_block_detected() {
        let mut ciphertext = encrypt(b"0123456789abcdef", &KEY, &IV);
        // The last block is pure padding (0x10 * 16). Flipping a bit in the
        // second-to-last block flips the same bit of the decrypted padding.
        let idx = ciphertext.len() - BLOCK_LEN - 1;
        ciphertext[idx] ^= 0x01;
        let err = decrypt(&ciphertext, &KEY, &IV).expect_err("expected padding error");
        assert_eq!(err.kind, Some(ErrorKind::PaddingInvalid));
    }
}
