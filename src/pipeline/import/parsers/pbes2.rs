//! PBES2 container (`pbes2`): PBKDF2 key parameters, AES-GCM encryption
//! parameters and the ciphertext, all in one JSON object.

use serde::Deserialize;
use serde_json::Value;

use super::{value_to_string, FormatParser, ParseRequest};
use crate::crypto::{decode_base64, decrypt_aes_gcm, KdfHash, PassphraseKey};
use crate::models::{Field, FieldType, NormalizedItem};
use crate::pipeline::import::registry::{ImportFormat, PBES2};
use crate::pipeline::import::source::RawFile;
use crate::pipeline::import::ImportError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    key_params: KeyParams,
    encryption_params: EncryptionParams,
    encrypted_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyParams {
    #[serde(default = "default_kdf")]
    algorithm: String,
    #[serde(default = "default_hash")]
    hash: String,
    #[serde(default = "default_key_size")]
    key_size: u32,
    iterations: u32,
    salt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptionParams {
    #[serde(default = "default_cipher")]
    algorithm: String,
    #[serde(default = "default_tag_size")]
    tag_size: u32,
    #[serde(default = "default_key_size")]
    key_size: u32,
    iv: String,
    #[serde(default)]
    additional_data: String,
}

fn default_kdf() -> String {
    "PBKDF2".into()
}

fn default_hash() -> String {
    "SHA-256".into()
}

fn default_cipher() -> String {
    "AES-GCM".into()
}

fn default_key_size() -> u32 {
    256
}

fn default_tag_size() -> u32 {
    128
}

/// Decrypted payload: `{"items": [...]}`, or the bare item array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Wrapped { items: Vec<PayloadItem> },
    Bare(Vec<PayloadItem>),
}

#[derive(Debug, Deserialize)]
struct PayloadItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Vec<PayloadField>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadField {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
    #[serde(default)]
    value: Value,
}

pub struct Pbes2Parser {
    max_iterations: u32,
}

impl Pbes2Parser {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    fn derive_key(&self, params: &KeyParams, passphrase: &str) -> Result<PassphraseKey, ImportError> {
        if !params.algorithm.eq_ignore_ascii_case("PBKDF2") {
            return Err(ImportError::MalformedInput(format!(
                "unsupported key derivation {}",
                params.algorithm
            )));
        }
        let salt = decode_base64(&params.salt, "keyParams.salt")?;
        let hash = KdfHash::from_name(&params.hash)?;
        Ok(PassphraseKey::derive(
            passphrase,
            &salt,
            params.iterations,
            params.key_size,
            hash,
            self.max_iterations,
        )?)
    }
}

impl FormatParser for Pbes2Parser {
    fn format(&self) -> &'static ImportFormat {
        &PBES2
    }

    fn parse(
        &self,
        file: &RawFile,
        request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let passphrase = request.require_passphrase()?;
        let container: Container = serde_json::from_str(file.text()?.trim())
            .map_err(|e| ImportError::MalformedInput(format!("PBES2 container: {e}")))?;

        let enc = &container.encryption_params;
        if !enc.algorithm.eq_ignore_ascii_case("AES-GCM") {
            return Err(ImportError::MalformedInput(format!(
                "unsupported cipher {}",
                enc.algorithm
            )));
        }
        if enc.key_size != container.key_params.key_size {
            return Err(ImportError::MalformedInput(format!(
                "key size mismatch: {} derived, {} expected by cipher",
                container.key_params.key_size, enc.key_size
            )));
        }

        let iv = decode_base64(&enc.iv, "encryptionParams.iv")?;
        let aad = decode_base64(&enc.additional_data, "encryptionParams.additionalData")?;
        let ciphertext = decode_base64(&container.encrypted_data, "encryptedData")?;

        let key = self.derive_key(&container.key_params, passphrase)?;
        let plaintext = decrypt_aes_gcm(&key, &iv, &aad, &ciphertext, enc.tag_size)?;

        let payload: Payload = serde_json::from_slice(&plaintext)
            .map_err(|e| ImportError::MalformedInput(format!("PBES2 payload: {e}")))?;
        let items = match payload {
            Payload::Wrapped { items } | Payload::Bare(items) => items,
        };

        Ok(items.into_iter().map(convert_item).collect())
    }
}

fn convert_item(source: PayloadItem) -> NormalizedItem {
    let mut item = NormalizedItem::new(&source.name);
    for field in source.fields {
        let value = value_to_string(&field.value);
        if value.is_empty() {
            continue;
        }
        let field = match field.field_type.as_deref() {
            Some(key) => Field::new(field.name, FieldType::from_key_lenient(key), value),
            None => Field::guessed(field.name, value),
        };
        item.push_field(field);
    }
    for tag in &source.tags {
        item.add_tag(tag);
    }
    item
}
