use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use super::CryptoError;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decode base64 written by either export generation.
///
/// Legacy exports use the standard alphabet with padding, newer containers the
/// URL-safe alphabet without it. `what` names the value for error reporting.
pub fn decode_base64(value: &str, what: &'static str) -> Result<Vec<u8>, CryptoError> {
    let value = value.trim();
    let engine = if value.contains(['-', '_']) {
        &URL_SAFE_LENIENT
    } else {
        &STANDARD_LENIENT
    };
    engine
        .decode(value)
        .map_err(|_| CryptoError::InvalidEncoding(what))
}

#[cfg(test)]
pub(crate) fn encode_base64(bytes: &[u8], url_safe: bool) -> String {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    if url_safe {
        URL_SAFE_NO_PAD.encode(bytes)
    } else {
        STANDARD.encode(bytes)
    }
}
