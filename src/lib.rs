//! sealpack - Seal files and directory trees into password or key-file
//! encrypted containers

#![forbid(unsafe_code)]

pub mod archive;
pub mod cipher;
pub mod container;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod keyfile;
pub mod keysource;
pub mod passphrase;
pub mod pipeline;

pub use error::{ErrorCategory, ErrorKind, Result, SealError};
pub use keysource::KeySource;
pub use pipeline::{KeyGenMode, OpenOutcome, PayloadKind, SealOutcome, generate_key, open, seal};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Password salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;
