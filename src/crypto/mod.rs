pub mod encoding;
pub mod encryption;
pub mod keys;

pub use encoding::*;
pub use encryption::*;
pub use keys::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// Authentication tag mismatch: wrong passphrase or tampered ciphertext.
    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid encryption parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid base64 encoding in {0}")]
    InvalidEncoding(&'static str),
}
