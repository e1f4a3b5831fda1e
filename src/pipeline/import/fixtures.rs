//! Test inputs for every supported format. Encrypted containers are sealed
//! on the fly with random salts and IVs and low iteration counts.

use std::io::{Cursor, Write};

use rand::RngCore;
use serde_json::{json, Value};
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::crypto::encoding::encode_base64;
use crate::crypto::encryption::seal;
use crate::crypto::{KdfHash, PassphraseKey};

pub const SAMPLE_CSV: &str = crate::pipeline::import::sample::CSV_SAMPLE;

pub const LASTPASS_EXPORT: &str = "url,username,password,totp,extra,name,grouping,fav
https://github.com/login,octo,hunter2,,,GitHub,Work,0
http://sn,,,,\"NoteType:Server
Hostname:db.internal
Username:admin
Password:s3cret
Notes:rotate monthly
ask ops first\",DB Server,Infra,0
https://mail.example,me@mail.example,pw,JBSWY3DPEHPK3PXP,\"recovery codes
in the safe\",Mail,(none),1
";

const ITERATIONS: u32 = 1_000;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn derive(passphrase: &str, salt: &[u8], bits: u32) -> PassphraseKey {
    PassphraseKey::derive(passphrase, salt, ITERATIONS, bits, KdfHash::Sha256, u32::MAX).unwrap()
}

/// Items in the PBES2 payload shape.
pub fn sample_items() -> Value {
    json!([
        {
            "name": "Facebook",
            "fields": [
                {"name": "username", "type": "username", "value": "john.doe@gmail.com"},
                {"name": "password", "type": "password", "value": "3kjaf93"},
                {"name": "url", "type": "url", "value": "https://facebook.com/"}
            ],
            "tags": ["social"]
        },
        {
            "name": "Github",
            "fields": [
                {"name": "username", "type": "username", "value": "john.doe@gmail.com"},
                {"name": "password", "type": "password", "value": "129lskdf93"},
                {"name": "url", "type": "url", "value": "https://github.com"},
                {"name": "url", "type": "url", "value": "https://gist.github.com"}
            ],
            "tags": ["work", "coding"]
        }
    ])
}

/// Records in the legacy plaintext shape, one of them removed.
pub fn legacy_records() -> Value {
    json!([
        {
            "name": "Github",
            "fields": [
                {"name": "username", "value": "octo"},
                {"name": "password", "value": "hunter2"},
                {"name": "url", "value": "https://github.com"}
            ],
            "tags": ["work"]
        },
        {
            "name": "Bank",
            "fields": [
                {"name": "pin", "value": 1234},
                {"name": "card number", "value": "4111111111111111"}
            ],
            "category": "finance"
        },
        {"name": "Old", "fields": [], "removed": true}
    ])
}

pub fn legacy_container(passphrase: &str, records: &Value) -> String {
    legacy_container_raw(passphrase, records.to_string().as_bytes())
}

pub fn legacy_container_raw(passphrase: &str, plaintext: &[u8]) -> String {
    let salt = random_bytes(16);
    let iv = random_bytes(16);
    let adata = b"padlock".to_vec();
    let key = derive(passphrase, &salt, 256);
    let ct = seal::aes_ccm_64(&key, &iv, &adata, plaintext);

    json!({
        "cipher": "aes",
        "mode": "ccm",
        "v": 1,
        "iter": ITERATIONS,
        "ks": 256,
        "ts": 64,
        "salt": encode_base64(&salt, false),
        "iv": encode_base64(&iv, false),
        "adata": encode_base64(&adata, false),
        "ct": encode_base64(&ct, false)
    })
    .to_string()
}

pub fn pbes2_container(passphrase: &str, items: &Value) -> String {
    pbes2_container_raw(passphrase, json!({ "items": items }).to_string().as_bytes(), false)
}

/// `alternate` switches to URL-safe unpadded base64 and a 16-byte IV.
pub fn pbes2_container_raw(passphrase: &str, plaintext: &[u8], alternate: bool) -> String {
    let salt = random_bytes(16);
    let iv = random_bytes(if alternate { 16 } else { 12 });
    let aad = random_bytes(8);
    let key = derive(passphrase, &salt, 256);
    let ct = seal::aes_gcm(&key, &iv, &aad, plaintext);

    json!({
        "keyParams": {
            "algorithm": "PBKDF2",
            "hash": "SHA-256",
            "keySize": 256,
            "iterations": ITERATIONS,
            "salt": encode_base64(&salt, alternate)
        },
        "encryptionParams": {
            "algorithm": "AES-GCM",
            "tagSize": 128,
            "keySize": 256,
            "iv": encode_base64(&iv, alternate),
            "additionalData": encode_base64(&aad, alternate)
        },
        "encryptedData": encode_base64(&ct, alternate)
    })
    .to_string()
}

pub fn zip_with_entry(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(name, options).unwrap();
    writer.write_all(contents).unwrap();
    writer.finish().unwrap().into_inner()
}

/// A `.1pux` archive with a login, a trashed item and a credit card.
pub fn onepux_archive() -> Vec<u8> {
    let export = json!({
        "accounts": [{
            "attrs": {"accountName": "John"},
            "vaults": [{
                "attrs": {"name": "Personal"},
                "items": [
                    {
                        "uuid": "a1",
                        "trashed": false,
                        "overview": {
                            "title": "GitHub",
                            "url": "https://github.com",
                            "urls": [
                                {"label": "", "url": "https://github.com"},
                                {"label": "gist", "url": "https://gist.github.com"}
                            ],
                            "tags": ["dev"]
                        },
                        "details": {
                            "loginFields": [
                                {"value": "octo", "name": "login", "fieldType": "T", "designation": "username"},
                                {"value": "hunter2", "name": "password", "fieldType": "P", "designation": "password"},
                                {"value": "", "name": "remember", "fieldType": "C"}
                            ],
                            "notesPlain": "2FA codes in safe",
                            "sections": []
                        }
                    },
                    {
                        "uuid": "a2",
                        "trashed": true,
                        "overview": {"title": "Deleted"},
                        "details": {}
                    },
                    {
                        "uuid": "a3",
                        "overview": {"title": "Bank Card"},
                        "details": {
                            "sections": [{
                                "title": "",
                                "fields": [
                                    {"title": "number", "id": "ccnum", "value": {"creditCardNumber": "4111111111111111"}},
                                    {"title": "expiry date", "id": "expiry", "value": {"monthYear": 202704}},
                                    {"title": "valid from", "id": "validFrom", "value": {"date": 1609459200}},
                                    {"title": "verification number", "id": "cvv", "value": {"concealed": "123"}},
                                    {"title": "billing", "id": "address", "value": {"address": {"street": "1 Main St", "city": "Springfield"}}},
                                    {"title": "support", "id": "email", "value": {"email": {"email_address": "help@bank.example", "provider": null}}}
                                ]
                            }]
                        }
                    }
                ]
            }]
        }]
    });
    zip_with_entry("export.data", export.to_string().as_bytes())
}
