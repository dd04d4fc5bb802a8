//! Seal, open and key generation
//!
//! This module composes the archive, key source, cipher and container layers
//! into the three user-facing operations.
//!
//! Seal: `pack (directories only) -> resolve key -> encrypt -> write container`.
//! Open: `parse container -> resolve key -> decrypt -> sniff -> unpack | write`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::archive;
use crate::cipher;
use crate::container::Container;
use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use crate::file_ops;
use crate::kdf;
use crate::keyfile::KeyFile;
use crate::keysource::{KeySource, Operation};
use crate::passphrase::PassphraseReader;
use crate::SALT_LEN;

/// Extension stripped from the container name when a raw payload is opened
/// into a directory.
pub const CONTAINER_EXTENSION: &str = "sealed";

/// What the plaintext inside a container is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Bytes of a single file.
    File,
    /// Zip archive of a directory tree.
    Archive,
}

#[derive(Debug)]
pub struct SealOutcome {
    pub container: PathBuf,
    pub payload: PayloadKind,
    pub plaintext_len: usize,
}

#[derive(Debug)]
pub enum OpenOutcome {
    /// An archive payload was extracted below `dest`.
    Extracted { dest: PathBuf, entries: Vec<PathBuf> },
    /// A raw payload was written to `path`.
    Written { path: PathBuf },
}

/// How `generate_key` produces the key.
pub enum KeyGenMode {
    /// Derive the key from a password and a throwaway salt.
    Password(Box<dyn PassphraseReader>),
    /// Draw key and IV from the CSPRNG.
    Random,
}

/// Encrypt the file or directory at `input` into a container at `output`.
pub fn seal(input: &Path, output: &Path, source: &mut KeySource) -> Result<SealOutcome> {
    seal_inner(input, output, source)
        .map_err(|e| e.with_context(format!("failed to seal {}", input.display())))
}

fn seal_inner(input: &Path, output: &Path, source: &mut KeySource) -> Result<SealOutcome> {
    let metadata = fs::metadata(input).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!("input path {} does not exist", input.display()),
            e,
        )
    })?;

    let (plaintext, payload) = if metadata.is_dir() {
        debug!(input = %input.display(), "packing directory");
        (Zeroizing::new(archive::pack_directory(input)?), PayloadKind::Archive)
    } else if metadata.is_file() {
        (Zeroizing::new(file_ops::read_file(input)?), PayloadKind::File)
    } else {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!("input path {} is neither a file nor a directory", input.display()),
        ));
    };

    debug!("resolving key material");
    let material = source.resolve(Operation::Seal)?;

    debug!(bytes = plaintext.len(), "encrypting");
    let ciphertext = cipher::encrypt(&plaintext, &material.key, &material.iv);
    let container = Container {
        salt: material.salt,
        iv: material.iv,
        ciphertext: &ciphertext,
    };

    file_ops::write_file_atomic(output, &container.to_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output.display())))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        ?payload,
        "sealed"
    );
    Ok(SealOutcome {
        container: output.to_path_buf(),
        payload,
        plaintext_len: plaintext.len(),
    })
}

/// Decrypt the container at `input`, extracting archives into `output` and
/// writing anything else as a single file.
pub fn open(input: &Path, output: &Path, source: &mut KeySource) -> Result<OpenOutcome> {
    open_inner(input, output, source)
        .map_err(|e| e.with_context(format!("failed to open {}", input.display())))
}

fn open_inner(input: &Path, output: &Path, source: &mut KeySource) -> Result<OpenOutcome> {
    if !input.is_file() {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!("input file {} does not exist or is not a file", input.display()),
        ));
    }

    let data = file_ops::read_file(input)?;
    // Parsed before any key material is resolved: a truncated container
    // never prompts for a password.
    let container = Container::parse(&data)?;

    debug!("resolving key material");
    let material = source.resolve(Operation::Open(&container))?;

    debug!(bytes = container.ciphertext.len(), "decrypting");
    let plaintext = Zeroizing::new(cipher::decrypt(
        container.ciphertext,
        &material.key,
        &material.iv,
    )?);

    if archive::is_archive(&plaintext) {
        debug!(dest = %output.display(), "payload is an archive, unpacking");
        let entries = archive::unpack(&plaintext, output)?;
        info!(
            input = %input.display(),
            dest = %output.display(),
            entries = entries.len(),
            "opened archive"
        );
        return Ok(OpenOutcome::Extracted {
            dest: output.to_path_buf(),
            entries,
        });
    }

    let target = raw_output_path(input, output)?;
    debug!(target = %target.display(), "payload is a single file");
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            SealError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }
    file_ops::write_file_atomic(&target, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", target.display())))?;

    info!(input = %input.display(), output = %target.display(), "opened file");
    Ok(OpenOutcome::Written { path: target })
}

/// Where a raw payload goes: `output` itself, or, if `output` is an existing
/// directory, a file inside it named after the container minus its
/// `.sealed` extension. The original file name is not stored anywhere, so
/// this is a best-effort guess.
fn raw_output_path(input: &Path, output: &Path) -> Result<PathBuf> {
    if !output.is_dir() {
        return Ok(output.to_path_buf());
    }

    let file_name = input.file_name().ok_or_else(|| {
        SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!("cannot derive an output file name from {}", input.display()),
        )
    })?;
    // `extension` and `file_stem` work on the OS string, so names that are
    // not UTF-8 resolve too. A bare ".sealed" has no extension and is kept.
    let stem = match (input.extension(), input.file_stem()) {
        (Some(ext), Some(stem)) if ext == CONTAINER_EXTENSION => stem,
        _ => file_name,
    };
    let target = output.join(stem);

    if target.exists() && same_file(&target, input) {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!(
                "decrypted output {} would overwrite the container; pass an explicit file path",
                target.display()
            ),
        ));
    }
    Ok(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write a new key file to `output`.
pub fn generate_key(output: &Path, mode: KeyGenMode) -> Result<()> {
    let key_file = match mode {
        KeyGenMode::Random => {
            debug!("generating random key and IV");
            KeyFile::random()
        }
        KeyGenMode::Password(mut reader) => {
            let passphrase = reader.read_passphrase()?;
            // The salt only feeds the derivation and is not recorded; the
            // key file is what has to be kept.
            let mut salt = [0u8; SALT_LEN];
            rand::fill(&mut salt[..]);
            let mut key_file = KeyFile::random();
            key_file.key = kdf::derive_key(&passphrase, &salt);
            debug!("derived key from password");
            key_file
        }
    };

    key_file
        .save(output)
        .map_err(|e| e.with_context(format!("failed to write key file {}", output.display())))?;
    info!(output = %output.display(), "generated key file");
    Ok(())
}
