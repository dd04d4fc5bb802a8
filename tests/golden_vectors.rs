//! Golden test vector validation
//!
//! The vectors pin the exact container bytes for fixed salt/IV so any change
//! to key derivation, padding or layout is caught.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::Deserialize;

use sealpack::container::Container;
use sealpack::keysource::{KeySource, Operation};
use sealpack::passphrase::ConstantPassphraseReader;
use sealpack::{IV_LEN, KEY_LEN, SALT_LEN, cipher, kdf};

#[derive(Debug, Deserialize)]
struct GoldenVector {
    mode: String,
    passphrase: String,
    key: String,
    salt: String,
    iv: String,
    plaintext: String,
    container: String,
    comment: String,
}

fn load_golden_vectors() -> Vec<GoldenVector> {
    let json_data = include_str!("../testdata/golden-vectors.json");
    serde_json::from_str(json_data).expect("failed to parse golden vectors")
}

fn decode(field: &str) -> Vec<u8> {
    BASE64_STANDARD.decode(field).expect("failed to decode base64")
}

#[test]
fn test_golden_vectors_encrypt() {
    let vectors = load_golden_vectors();
    assert!(!vectors.is_empty(), "No golden vectors were tested");

    for (i, vector) in vectors.iter().enumerate() {
        let key: [u8; KEY_LEN] = decode(&vector.key).try_into().unwrap();
        let salt: [u8; SALT_LEN] = decode(&vector.salt).try_into().unwrap();
        let iv: [u8; IV_LEN] = decode(&vector.iv).try_into().unwrap();
        let plaintext = decode(&vector.plaintext);

        if vector.mode == "password" {
            let derived = kdf::derive_key(&decode(&vector.passphrase), &salt);
            assert_eq!(*derived, key, "vector {} ({}): derived key", i, vector.comment);
        }

        let ciphertext = cipher::encrypt(&plaintext, &key, &iv);
        let container = Container {
            salt,
            iv,
            ciphertext: &ciphertext,
        };
        assert_eq!(
            BASE64_STANDARD.encode(container.to_bytes()),
            vector.container,
            "vector {} ({}): container bytes",
            i,
            vector.comment
        );
    }
}

#[test]
fn test_golden_vectors_decrypt() {
    for (i, vector) in load_golden_vectors().iter().enumerate() {
        let data = decode(&vector.container);
        let container = Container::parse(&data).unwrap();
        let expected = decode(&vector.plaintext);

        let key: [u8; KEY_LEN] = if vector.mode == "password" {
            let mut source = KeySource::Password(Box::new(ConstantPassphraseReader::new(
                decode(&vector.passphrase),
            )));
            let material = source.resolve(Operation::Open(&container)).unwrap();
            assert_eq!(material.iv, container.iv);
            *material.key
        } else {
            decode(&vector.key).try_into().unwrap()
        };

        let plaintext = cipher::decrypt(container.ciphertext, &key, &container.iv)
            .unwrap_or_else(|e| panic!("vector {} ({}): {}", i, vector.comment, e));
        assert_eq!(plaintext, expected, "vector {} ({}): plaintext", i, vector.comment);
    }
}
