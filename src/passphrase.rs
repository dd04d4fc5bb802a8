//! Password reading functionality

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use std::io::{self, IsTerminal, Read, Write};
use tracing::warn;
use zeroize::Zeroizing;

/// Trait for reading passwords from various sources
pub trait PassphraseReader {
    /// Read a password as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the password wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing and scripting)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads password from any io::Read source
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads password from terminal with no echo
pub struct TerminalPassphraseReader {
    prompt: &'static str,
}

impl TerminalPassphraseReader {
    pub fn new(prompt: &'static str) -> Self {
        Self { prompt }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new("Enter password: ")
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read password from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passwords, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(SealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        io::stderr().write_all(self.prompt.as_bytes()).map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // rpassword returns a plain String; move it into a zeroizing buffer
        // straight away.
        let passphrase = rpassword::read_password().map_err(|e| {
            SealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Compare a password with its confirmation.
pub fn confirm_passphrase(
    entry: Zeroizing<Vec<u8>>,
    confirmation: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if entry.as_slice() != confirmation {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PasswordMismatch,
            "passwords do not match",
        ));
    }
    Ok(entry)
}

/// Asks for a password twice and only yields it once both entries agree.
///
/// On a mismatch the pair is requested again, up to `max_attempts` pairs
/// (unbounded when `None`), after which `PasswordMismatch` is returned. An
/// error from either upstream reader ends the loop immediately; that is
/// how an interactive caller cancels.
pub struct ConfirmingPassphraseReader {
    entry: Box<dyn PassphraseReader>,
    confirmation: Box<dyn PassphraseReader>,
    max_attempts: Option<usize>,
}

impl ConfirmingPassphraseReader {
    pub fn new(
        entry: Box<dyn PassphraseReader>,
        confirmation: Box<dyn PassphraseReader>,
        max_attempts: Option<usize>,
    ) -> Self {
        Self {
            entry,
            confirmation,
            max_attempts,
        }
    }

    /// Terminal prompts for "Enter password" / "Confirm password".
    pub fn terminal(max_attempts: Option<usize>) -> Self {
        Self::new(
            Box::new(TerminalPassphraseReader::new("Enter password: ")),
            Box::new(TerminalPassphraseReader::new("Confirm password: ")),
            max_attempts,
        )
    }
}

impl PassphraseReader for ConfirmingPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let entry = self.entry.read_passphrase()?;
            let confirmation = self.confirmation.read_passphrase()?;
            match confirm_passphrase(entry, &confirmation) {
                Ok(passphrase) => return Ok(passphrase),
                Err(err) => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(err);
                    }
                    warn!(attempt, "passwords do not match, asking again");
                }
            }
        }
    }
}
