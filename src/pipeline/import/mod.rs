pub mod background;
pub mod columns;
pub mod delimited;
pub mod format;
pub mod importer;
pub mod orchestrator;
pub mod parsers;
pub mod registry;
pub mod sample;
pub mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use background::*;
pub use columns::*;
pub use format::*;
pub use importer::*;
pub use orchestrator::*;
pub use parsers::{FormatParser, ParseRequest, ParserRegistry};
pub use registry::*;
pub use sample::*;
pub use source::*;

use serde::Serialize;
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Unsupported import format: {0}")]
    UnsupportedFormat(String),

    #[error("A passphrase is required to open this file")]
    PassphraseRequired,

    /// Wrong passphrase (or a ciphertext that fails authentication).
    #[error("Decryption failed: wrong passphrase")]
    DecryptionFailed,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Import cancelled by user")]
    UserCancelled,

    #[error("Importing {incoming} items exceeds the quota of {quota} ({existing} already used)")]
    QuotaExceeded {
        quota: i64,
        existing: usize,
        incoming: usize,
    },

    #[error("Event {event} is not valid while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    #[error("Background worker failed: {0}")]
    Worker(String),
}

/// Classification every failure is reduced to before it reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DecryptionFailed,
    MalformedInput,
    UserCancelled,
    QuotaExceeded,
    PassphraseRequired,
    UnsupportedFormat,
    FileTooLarge,
    Io,
    Internal,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::PassphraseRequired => ErrorKind::PassphraseRequired,
            Self::DecryptionFailed => ErrorKind::DecryptionFailed,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::UserCancelled => ErrorKind::UserCancelled,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::InvalidTransition { .. } | Self::Worker(_) => ErrorKind::Internal,
        }
    }

    /// Only a rejected passphrase sends the session back to a prior state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DecryptionFailed)
    }

    /// Message safe to show to the user. Parser and cipher details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(_) => "The file could not be read.".into(),
            Self::FileTooLarge { .. } => self.to_string(),
            Self::UnsupportedFormat(_) => "This import format is not supported.".into(),
            Self::PassphraseRequired => "This file is protected by a password.".into(),
            Self::DecryptionFailed => "Wrong Password".into(),
            Self::MalformedInput(_) => {
                "The file could not be read. Make sure it is a valid export of the selected format."
                    .into()
            }
            Self::UserCancelled => "Import cancelled.".into(),
            Self::QuotaExceeded { .. } => {
                "The number of imported items exceeds your remaining quota.".into()
            }
            Self::InvalidTransition { .. } | Self::Worker(_) => {
                "Something went wrong while importing. Please try again.".into()
            }
        }
    }
}

impl From<CryptoError> for ImportError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed => Self::DecryptionFailed,
            other => Self::MalformedInput(other.to_string()),
        }
    }
}
