use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The password and its confirmation did not match. Retrying is fine.
    PasswordMismatch,
    /// Password could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Key file is not valid JSON, lacks a field, or a field has the wrong length.
    InvalidKeyFile,
    /// Container is shorter than its fixed salt + IV header.
    TruncatedContainer,
    /// Ciphertext length is not a non-zero multiple of the cipher block size.
    CipherLength,
    /// Padding was inconsistent after decryption. Caused by an incorrect
    /// password/key or by corruption; the cipher mode cannot tell which.
    PaddingInvalid,
    /// Decrypted payload looked like an archive but could not be read as one,
    /// or an archive could not be produced.
    CorruptArchive,
    /// An input path is missing or is of the wrong kind.
    PathInvalid,
    /// Unexpected state reached within sealpack logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct SealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl SealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for an I/O failure on a specific path.
    ///
    /// A missing file is blamed on the user, everything else is internal.
    pub fn io(msg: impl Into<String>, err: std::io::Error) -> Self {
        let category = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorCategory::User
        } else {
            ErrorCategory::Internal
        };
        Self::with_kind_and_source(category, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns true if the error is tagged with `kind`. Context wrappers
    /// added by [`SealError::with_context`] keep the kind of what they wrap.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Renders the message followed by every message in the source chain,
    /// separated by `": "`.
    pub fn chain_message(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = StdError::source(self);
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let err = SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::TruncatedContainer,
            "container too short",
        )
        .with_context("failed to open secret.sealed");

        assert_eq!(err.kind, Some(ErrorKind::TruncatedContainer));
        assert_eq!(err.category, ErrorCategory::User);
        assert!(err.is(ErrorKind::TruncatedContainer));
        assert_eq!(err.message(), "failed to open secret.sealed");
    }

    #[test]
    fn test_chain_message_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = SealError::io("failed to read from a.txt", io).with_context("seal failed");

        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(
            err.chain_message(),
            "seal failed: failed to read from a.txt: no such file"
        );
    }

    #[test]
    fn test_io_error_category() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SealError::io("failed to write", denied);
        assert_eq!(err.category, ErrorCategory::Internal);
        assert_eq!(err.kind, Some(ErrorKind::Io));
    }
}
