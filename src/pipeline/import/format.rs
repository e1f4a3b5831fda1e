use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::registry::{ImportFormat, CSV, LASTPASS, ONEPUX, PADLOCK_LEGACY, PBES2};
use super::source::RawFile;
use crate::models::DetectionConfidence;

/// ZIP local file header, the container of `.1pux` exports.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Result of format detection
#[derive(Debug, Clone, Serialize)]
pub struct FormatDetection {
    pub format: &'static ImportFormat,
    pub confidence: DetectionConfidence,
    pub mime_type: Option<&'static str>,
    pub file_size_bytes: u64,
}

impl FormatDetection {
    /// No signature matched; the guess is the CSV default.
    pub fn is_ambiguous(&self) -> bool {
        self.confidence == DetectionConfidence::Fallback
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct Pbes2Shape {
    key_params: IgnoredAny,
    encryption_params: IgnoredAny,
    encrypted_data: IgnoredAny,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct LegacyShape {
    ct: String,
    iv: String,
    salt: String,
}

/// Best-guess format for `file`. Never fails; defaults to CSV.
pub fn guess_format(file: &RawFile) -> &'static ImportFormat {
    detect(file).format
}

/// Guess the format from signatures, then extension, then content shape.
///
/// Cheap and side-effect free: JSON envelopes are shape-checked but nothing is
/// decrypted or fully parsed into items.
pub fn detect(file: &RawFile) -> FormatDetection {
    let extension = file.extension();
    let mime_type = file.mime_type();
    let (format, confidence) = classify(file, extension.as_deref(), mime_type);

    tracing::debug!(
        file = %file.name(),
        format = format.key,
        confidence = confidence.as_str(),
        "Import format detected"
    );

    FormatDetection {
        format,
        confidence,
        mime_type,
        file_size_bytes: file.len() as u64,
    }
}

fn classify(
    file: &RawFile,
    extension: Option<&str>,
    mime_type: Option<&str>,
) -> (&'static ImportFormat, DetectionConfidence) {
    if file.bytes().starts_with(&ZIP_MAGIC) {
        return (&ONEPUX, DetectionConfidence::Signature);
    }
    if extension == Some("1pux") {
        return (&ONEPUX, DetectionConfidence::Extension);
    }

    let Ok(text) = file.text() else {
        return (&CSV, DetectionConfidence::Fallback);
    };
    let text = text.trim_start();

    let json_like = text.starts_with('{');
    if json_like {
        if serde_json::from_str::<Pbes2Shape>(text).is_ok() {
            return (&PBES2, DetectionConfidence::Signature);
        }
        if serde_json::from_str::<LegacyShape>(text).is_ok() {
            return (&PADLOCK_LEGACY, DetectionConfidence::Signature);
        }
    }

    let first_line = text.lines().next().unwrap_or_default();
    if is_lastpass_header(first_line) {
        return (&LASTPASS, DetectionConfidence::Signature);
    }
    if matches!(extension, Some("csv" | "tsv")) || mime_type == Some("text/csv") {
        return (&CSV, DetectionConfidence::Extension);
    }
    // Commas inside an unrecognized JSON object say nothing about CSV.
    if !json_like && first_line.contains([',', '\t']) {
        return (&CSV, DetectionConfidence::Signature);
    }

    (&CSV, DetectionConfidence::Fallback)
}

/// LastPass exports start with `url,username,password,` and carry their own
/// `extra`, `name` and `grouping` columns.
pub fn is_lastpass_header(line: &str) -> bool {
    let columns: Vec<String> = line
        .trim()
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    columns.len() >= 6
        && columns[..3] == ["url", "username", "password"]
        && ["extra", "name", "grouping"]
            .iter()
            .all(|required| columns.iter().any(|c| c == required))
}
