use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::{U11, U12, U13, U16, U8};
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::AesGcm;
use ccm::Ccm;
use zeroize::Zeroizing;

use super::keys::PassphraseKey;
use super::CryptoError;

/// Decrypt with the AEAD `A`, mapping any authentication failure to
/// [`CryptoError::DecryptionFailed`]. `nonce` must already have `A`'s length.
fn open<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    payload: Payload<'_, '_>,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidParameters(format!("key length {}", key.len())))?;
    cipher
        .decrypt(Nonce::<A>::from_slice(nonce), payload)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// AES-GCM decryption as used by PBES2 containers.
///
/// The auth tag is expected at the end of `ciphertext`. Both the 96-bit IV
/// and the 128-bit IV produced by older clients are accepted.
pub fn decrypt_aes_gcm(
    key: &PassphraseKey,
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag_bits: u32,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if tag_bits != 128 {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "AES-GCM with {tag_bits}-bit tag"
        )));
    }
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let key = key.as_bytes();
    let plaintext = match (key.len(), iv.len()) {
        (16, 12) => open::<AesGcm<Aes128, U12>>(key, iv, payload),
        (16, 16) => open::<AesGcm<Aes128, U16>>(key, iv, payload),
        (32, 12) => open::<AesGcm<Aes256, U12>>(key, iv, payload),
        (32, 16) => open::<AesGcm<Aes256, U16>>(key, iv, payload),
        (k, n) => Err(CryptoError::UnsupportedAlgorithm(format!(
            "AES-GCM with {}-bit key and {n}-byte IV",
            k * 8
        ))),
    }?;
    Ok(Zeroizing::new(plaintext))
}

/// CCM nonce length for a given plaintext length, following the SJCL rule:
/// the length field `L` is the smallest of 2..=4 bytes that can hold the
/// plaintext length, the nonce is the leading `15 - L` bytes of the IV.
pub fn ccm_nonce_len(plaintext_len: usize, iv_len: usize) -> usize {
    let mut l = 2usize;
    while l < 4 && (plaintext_len >> (8 * l)) != 0 {
        l += 1;
    }
    if iv_len < 15 && l < 15 - iv_len {
        l = 15 - iv_len;
    }
    15 - l
}

macro_rules! ccm_dispatch {
    ($cipher:ty, $tag_len:expr, $key:expr, $nonce:expr, $payload:expr) => {
        match ($tag_len, $nonce.len()) {
            (8, 11) => open::<Ccm<$cipher, U8, U11>>($key, $nonce, $payload),
            (8, 12) => open::<Ccm<$cipher, U8, U12>>($key, $nonce, $payload),
            (8, 13) => open::<Ccm<$cipher, U8, U13>>($key, $nonce, $payload),
            (12, 11) => open::<Ccm<$cipher, U12, U11>>($key, $nonce, $payload),
            (12, 12) => open::<Ccm<$cipher, U12, U12>>($key, $nonce, $payload),
            (12, 13) => open::<Ccm<$cipher, U12, U13>>($key, $nonce, $payload),
            (16, 11) => open::<Ccm<$cipher, U16, U11>>($key, $nonce, $payload),
            (16, 12) => open::<Ccm<$cipher, U16, U12>>($key, $nonce, $payload),
            (16, 13) => open::<Ccm<$cipher, U16, U13>>($key, $nonce, $payload),
            (t, n) => Err(CryptoError::UnsupportedAlgorithm(format!(
                "AES-CCM with {}-bit tag and {n}-byte nonce",
                t * 8
            ))),
        }
    };
}

/// AES-CCM decryption as used by legacy (SJCL-generation) containers.
///
/// `ciphertext` carries the tag appended; `iv` is the full stored IV, of which
/// only the leading [`ccm_nonce_len`] bytes are used.
pub fn decrypt_aes_ccm(
    key: &PassphraseKey,
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag_bits: u32,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let tag_len = (tag_bits / 8) as usize;
    if tag_bits % 8 != 0 || ciphertext.len() < tag_len {
        return Err(CryptoError::InvalidParameters(format!(
            "{}-byte ciphertext with {tag_bits}-bit tag",
            ciphertext.len()
        )));
    }
    let nonce_len = ccm_nonce_len(ciphertext.len() - tag_len, iv.len());
    if iv.len() < nonce_len {
        return Err(CryptoError::InvalidParameters(format!("{}-byte IV", iv.len())));
    }
    let nonce = &iv[..nonce_len];
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let key = key.as_bytes();
    let plaintext = match key.len() {
        16 => ccm_dispatch!(Aes128, tag_len, key, nonce, payload),
        24 => ccm_dispatch!(Aes192, tag_len, key, nonce, payload),
        32 => ccm_dispatch!(Aes256, tag_len, key, nonce, payload),
        k => Err(CryptoError::UnsupportedAlgorithm(format!(
            "AES-CCM with {}-bit key",
            k * 8
        ))),
    }?;
    Ok(Zeroizing::new(plaintext))
}
