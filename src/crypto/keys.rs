use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use super::CryptoError;

/// Hash underlying the PBKDF2 pseudo-random function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha256,
    Sha512,
}

impl KdfHash {
    /// Accepts the WebCrypto spellings ("SHA-256") and bare ones ("sha256").
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        match name.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(CryptoError::UnsupportedAlgorithm(format!("PBKDF2 hash {name}"))),
        }
    }
}

/// Key derived from a passphrase, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct PassphraseKey {
    key_bytes: Vec<u8>,
}

impl PassphraseKey {
    /// Derive `key_bits` of key material with PBKDF2-HMAC.
    ///
    /// Rejects iteration counts of zero or above `max_iterations` so a crafted
    /// container cannot stall the import indefinitely.
    pub fn derive(
        passphrase: &str,
        salt: &[u8],
        iterations: u32,
        key_bits: u32,
        hash: KdfHash,
        max_iterations: u32,
    ) -> Result<Self, CryptoError> {
        if iterations == 0 || iterations > max_iterations {
            return Err(CryptoError::InvalidParameters(format!(
                "iteration count {iterations} outside 1..={max_iterations}"
            )));
        }
        if !matches!(key_bits, 128 | 192 | 256) {
            return Err(CryptoError::InvalidParameters(format!(
                "key size {key_bits}"
            )));
        }

        let mut key_bytes = vec![0u8; (key_bits / 8) as usize];
        match hash {
            KdfHash::Sha256 => {
                pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key_bytes)
            }
            KdfHash::Sha512 => {
                pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt, iterations, &mut key_bytes)
            }
        }
        Ok(Self { key_bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    pub fn len_bits(&self) -> usize {
        self.key_bytes.len() * 8
    }
}
