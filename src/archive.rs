//! Directory trees as a single zip blob
//!
//! Sealing a directory packs it into a deflate-compressed zip archive, which
//! then goes through the cipher like any other file. On open the decrypted
//! payload is recognised as an archive purely by its leading magic bytes.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};

/// Local file header signature that every non-empty zip archive starts with.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Whether a decrypted payload should be unpacked rather than written as-is.
pub fn is_archive(data: &[u8]) -> bool {
    data.starts_with(&ARCHIVE_MAGIC)
}

/// Pack every file and sub-directory below `root` into a zip blob.
///
/// Entries are named by their path relative to `root`, with `/` separators,
/// and visited in file name order so identical trees pack identically apart
/// from timestamps. Symbolic links and other special files are skipped.
///
/// The archive is staged in an anonymous temporary file, which the OS
/// reclaims however this function exits.
pub fn pack_directory(root: &Path) -> Result<Vec<u8>> {
    let staging = tempfile::tempfile().map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create archive staging file",
            e,
        )
    })?;
    let mut writer = ZipWriter::new(staging);

    let mut entries = 0usize;
    let mut skipped = 0usize;
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to walk {}", root.display()),
                e,
            )
        })?;
        let relative = entry.path().strip_prefix(root).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("{} is not below {}", entry.path().display(), root.display()),
                e,
            )
        })?;
        let name = entry_name(relative)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            writer
                .add_directory(name, entry_options())
                .map_err(|e| archive_write_error(entry.path(), e))?;
        } else if file_type.is_file() {
            let path = entry.path();
            let mut source = File::open(path)
                .map_err(|e| SealError::io(format!("failed to open {}", path.display()), e))?;
            let len = source
                .metadata()
                .map_err(|e| SealError::io(format!("failed to stat {}", path.display()), e))?
                .len();
            writer
                .start_file(name, entry_options().large_file(len >= u64::from(u32::MAX)))
                .map_err(|e| archive_write_error(path, e))?;
            io::copy(&mut source, &mut writer)
                .map_err(|e| SealError::io(format!("failed to archive {}", path.display()), e))?;
        } else {
            warn!(
                path = %entry.path().display(),
                "skipping entry that is neither a file nor a directory"
            );
            skipped += 1;
            continue;
        }
        entries += 1;
    }

    if entries == 0 {
        // An empty zip is only an end-of-central-directory record and would
        // not carry the archive magic, so it could never be unpacked again.
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PathInvalid,
            format!(
                "directory {} has no files or directories to seal ({} other entries skipped)",
                root.display(),
                skipped
            ),
        ));
    }

    let mut staging = writer.finish().map_err(|e| archive_write_error(root, e))?;
    let mut blob = Vec::new();
    staging
        .seek(SeekFrom::Start(0))
        .and_then(|_| staging.read_to_end(&mut blob))
        .map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read back archive staging file",
                e,
            )
        })?;

    debug!(root = %root.display(), entries, bytes = blob.len(), "packed directory");
    Ok(blob)
}

/// Recreate every archive entry below `dest`, creating directories as
/// needed. Returns the paths written, in archive order.
///
/// Entries whose names are absolute or climb out of `dest` make the whole
/// archive count as corrupt.
pub fn unpack(blob: &[u8], dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive =
        ZipArchive::new(Cursor::new(blob)).map_err(|e| corrupt("not a readable archive", e))?;
    fs::create_dir_all(dest)
        .map_err(|e| SealError::io(format!("failed to create directory {}", dest.display()), e))?;

    let mut written = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| corrupt(&format!("cannot read entry #{}", index), e))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::CorruptArchive,
                format!("archive entry '{}' escapes the destination", entry.name()),
            )
        })?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                SealError::io(format!("failed to create directory {}", target.display()), e)
            })?;
        } else {
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| corrupt(&format!("cannot decompress '{}'", entry.name()), e))?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    SealError::io(format!("failed to create directory {}", parent.display()), e)
                })?;
            }
            fs::write(&target, &contents)
                .map_err(|e| SealError::io(format!("failed to write {}", target.display()), e))?;
        }
        written.push(target);
    }

    debug!(dest = %dest.display(), entries = written.len(), "unpacked archive");
    Ok(written)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Archive entry name for a root-relative path.
fn entry_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    SealError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::PathInvalid,
                        format!("file name {} is not valid UTF-8", relative.display()),
                    )
                })?;
                parts.push(part);
            }
            _ => {
                return Err(SealError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::InternalInvariant,
                    format!("unexpected path component in {}", relative.display()),
                ));
            }
        }
    }
    Ok(parts.join("/"))
}

fn corrupt(what: &str, err: impl std::error::Error + Send + Sync + 'static) -> SealError {
    SealError::with_kind_and_source(
        ErrorCategory::User,
        ErrorKind::CorruptArchive,
        format!("corrupt archive: {}", what),
        err,
    )
}

fn archive_write_error(path: &Path, err: ZipError) -> SealError {
    SealError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::Io,
        format!("failed to add {} to archive", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Relative path -> contents (None for directories) for a whole tree.
    fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                let entry = entry.unwrap();
                let name = entry_name(entry.path().strip_prefix(root).unwrap()).unwrap();
                let contents = entry
                    .file_type()
                    .is_file()
                    .then(|| fs::read(entry.path()).unwrap());
                (name, contents)
            })
            .collect()
    }

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty_dir")).unwrap();
        fs::write(root.join("top.txt"), b"top level").unwrap();
        fs::write(root.join("a/one.bin"), [0u8, 1, 2, 255]).unwrap();
        fs::write(root.join("a/b/c/deep.txt"), b"deep").unwrap();
        fs::write(root.join("a/b/empty.txt"), b"").unwrap();
    }

    #[test]
    fn test_pack_unpack_tree() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        sample_tree(&src);

        let blob = pack_directory(&src).unwrap();
        assert!(is_archive(&blob));

        let written = unpack(&blob, &dst).unwrap();
        assert!(written.contains(&dst.join("a/b/c/deep.txt")));
        assert_eq!(snapshot(&src), snapshot(&dst));
    }

    #[test]
    fn test_only_empty_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("x/y")).unwrap();

        let blob = pack_directory(&src).unwrap();
        assert!(is_archive(&blob));

        let dst = temp_dir.path().join("dst");
        unpack(&blob, &dst).unwrap();
        assert!(dst.join("x/y").is_dir());
    }

    #[test]
    fn test_empty_directory_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = pack_directory(temp_dir.path()).expect_err("expected empty directory error");
        assert_eq!(err.kind, Some(ErrorKind::PathInvalid));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"outside").unwrap();
        fs::write(src.join("real.txt"), b"real").unwrap();
        symlink(src.join("real.txt"), src.join("link.txt")).unwrap();
        symlink(&outside, src.join("linked_dir")).unwrap();

        let blob = pack_directory(&src).unwrap();
        let dst = temp_dir.path().join("dst");
        let written = unpack(&blob, &dst).unwrap();

        assert_eq!(written, vec![dst.join("real.txt")]);
        assert_eq!(fs::read(dst.join("real.txt")).unwrap(), b"real");
        assert!(!dst.join("link.txt").exists());
        assert!(!dst.join("linked_dir").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_only_symlinks_rejected() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(temp_dir.path().join("target.txt"), b"t").unwrap();
        symlink(temp_dir.path().join("target.txt"), src.join("link.txt")).unwrap();

        let err = pack_directory(&src).expect_err("expected nothing to seal");
        assert_eq!(err.kind, Some(ErrorKind::PathInvalid));
        assert!(err.to_string().contains("1 other entries skipped"), "{}", err);
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive(b"PK\x03\x04rest"));
        assert!(is_archive(&ARCHIVE_MAGIC));
        assert!(!is_archive(b"PK\x05\x06"));
        assert!(!is_archive(b"PK\x03"));
        assert!(!is_archive(b""));
        assert!(!is_archive(b"hello world"));
    }

    #[test]
    fn test_garbage_with_magic_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let mut blob = ARCHIVE_MAGIC.to_vec();
        blob.extend_from_slice(b"definitely not the rest of a zip file");

        let err = unpack(&blob, temp_dir.path()).expect_err("expected corrupt archive");
        assert_eq!(err.kind, Some(ErrorKind::CorruptArchive));
    }

    #[test]
    fn test_escaping_entry_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("../escape.txt", SimpleFileOptions::default())
            .unwrap();
        io::Write::write_all(&mut writer, b"gotcha").unwrap();
        let blob = writer.finish().unwrap().into_inner();

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out");
        let err = unpack(&blob, &dest).expect_err("expected corrupt archive");
        assert_eq!(err.kind, Some(ErrorKind::CorruptArchive));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }
}
