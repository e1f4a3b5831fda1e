//! Legacy password-protected container (`padlock-legacy`).
//!
//! A JSON envelope of base64 values around an AES-CCM ciphertext keyed with
//! PBKDF2-HMAC-SHA-256. The plaintext is a JSON array of records.

use serde::Deserialize;
use serde_json::Value;

use super::{value_to_string, FormatParser, ParseRequest};
use crate::crypto::{decode_base64, decrypt_aes_ccm, KdfHash, PassphraseKey};
use crate::models::{Field, NormalizedItem};
use crate::pipeline::import::registry::{ImportFormat, PADLOCK_LEGACY};
use crate::pipeline::import::source::RawFile;
use crate::pipeline::import::ImportError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default = "default_cipher")]
    cipher: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(alias = "ks", default = "default_key_size")]
    key_size: u32,
    iter: u32,
    #[serde(default = "default_tag_size")]
    ts: u32,
    salt: String,
    iv: String,
    #[serde(default)]
    adata: String,
    ct: String,
}

fn default_cipher() -> String {
    "aes".into()
}

fn default_mode() -> String {
    "ccm".into()
}

fn default_key_size() -> u32 {
    256
}

fn default_tag_size() -> u32 {
    64
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Vec<RecordField>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    removed: bool,
}

#[derive(Debug, Deserialize)]
struct RecordField {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Value,
}

pub struct LegacyContainerParser {
    max_iterations: u32,
}

impl LegacyContainerParser {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}

impl FormatParser for LegacyContainerParser {
    fn format(&self) -> &'static ImportFormat {
        &PADLOCK_LEGACY
    }

    fn parse(
        &self,
        file: &RawFile,
        request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let passphrase = request.require_passphrase()?;
        let envelope: Envelope = serde_json::from_str(file.text()?.trim())
            .map_err(|e| ImportError::MalformedInput(format!("legacy envelope: {e}")))?;

        if !envelope.cipher.eq_ignore_ascii_case("aes") || !envelope.mode.eq_ignore_ascii_case("ccm") {
            return Err(ImportError::MalformedInput(format!(
                "unsupported legacy cipher {}-{}",
                envelope.cipher, envelope.mode
            )));
        }
        if !matches!(envelope.ts, 64 | 96 | 128) {
            return Err(ImportError::MalformedInput(format!(
                "unsupported legacy tag size {}",
                envelope.ts
            )));
        }

        let salt = decode_base64(&envelope.salt, "salt")?;
        let iv = decode_base64(&envelope.iv, "iv")?;
        let adata = decode_base64(&envelope.adata, "adata")?;
        let ct = decode_base64(&envelope.ct, "ct")?;

        let key = PassphraseKey::derive(
            passphrase,
            &salt,
            envelope.iter,
            envelope.key_size,
            KdfHash::Sha256,
            self.max_iterations,
        )?;
        let plaintext = decrypt_aes_ccm(&key, &iv, &adata, &ct, envelope.ts)?;

        let records: Vec<Record> = serde_json::from_slice(&plaintext)
            .map_err(|e| ImportError::MalformedInput(format!("legacy records: {e}")))?;

        Ok(records
            .into_iter()
            .filter(|r| !r.removed)
            .map(convert_record)
            .collect())
    }
}

fn convert_record(record: Record) -> NormalizedItem {
    let mut item = NormalizedItem::new(&record.name);
    for field in record.fields {
        let value = value_to_string(&field.value);
        if !value.trim().is_empty() {
            item.push_field(Field::guessed(field.name, value));
        }
    }
    match record.tags {
        Some(tags) => tags.iter().for_each(|t| item.add_tag(t)),
        None => {
            if let Some(category) = &record.category {
                item.add_tag(category);
            }
        }
    }
    item
}
