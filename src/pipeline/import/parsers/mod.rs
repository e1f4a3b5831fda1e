//! Format parsers and the registry that dispatches to them.
//!
//! Every parser turns the bytes of one [`RawFile`] into a list of
//! [`NormalizedItem`]s, all-or-nothing: on any error no items are returned.

pub mod csv;
pub mod lastpass;
pub mod legacy;
pub mod onepux;
pub mod pbes2;

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use super::columns::ImportColumn;
use super::registry::ImportFormat;
use super::source::RawFile;
use super::ImportError;
use crate::config::ImportConfig;
use crate::models::NormalizedItem;

pub use self::csv::CsvParser;
pub use lastpass::LastPassParser;
pub use legacy::LegacyContainerParser;
pub use onepux::OnePuxParser;
pub use pbes2::Pbes2Parser;

/// Per-attempt inputs a parser may need beyond the file itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseRequest<'a> {
    /// Column mapping for delimited formats; inferred when absent.
    pub columns: Option<&'a [ImportColumn]>,
    pub passphrase: Option<&'a str>,
}

impl<'a> ParseRequest<'a> {
    pub fn with_columns(mut self, columns: &'a [ImportColumn]) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_passphrase(mut self, passphrase: &'a str) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    pub(crate) fn require_passphrase(&self) -> Result<&'a str, ImportError> {
        self.passphrase.ok_or(ImportError::PassphraseRequired)
    }
}

/// Converts one source format into normalized items.
pub trait FormatParser: Send + Sync {
    /// The format this parser reads.
    fn format(&self) -> &'static ImportFormat;

    /// Parse `file`. Wrong passphrase is [`ImportError::DecryptionFailed`],
    /// structural problems are [`ImportError::MalformedInput`].
    fn parse(
        &self,
        file: &RawFile,
        request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError>;
}

/// Parsers keyed by [`ImportFormat::key`].
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Box<dyn FormatParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// One parser for every format in [`list_formats`](super::registry::list_formats).
    pub fn with_defaults(config: &ImportConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(CsvParser::new(config.into())));
        registry.register(Box::new(LegacyContainerParser::new(config.max_kdf_iterations)));
        registry.register(Box::new(LastPassParser));
        registry.register(Box::new(Pbes2Parser::new(config.max_kdf_iterations)));
        registry.register(Box::new(OnePuxParser::new(config.max_file_size)));
        registry
    }

    /// Register `parser`, replacing any previous parser for the same format.
    pub fn register(&mut self, parser: Box<dyn FormatParser>) {
        self.parsers.insert(parser.format().key, parser);
    }

    pub fn get(&self, key: &str) -> Option<&dyn FormatParser> {
        self.parsers.get(key).map(|p| p.as_ref())
    }

    pub fn supports(&self, format: &ImportFormat) -> bool {
        self.parsers.contains_key(format.key)
    }

    pub fn parse(
        &self,
        format: &ImportFormat,
        file: &RawFile,
        request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let parser = self
            .get(format.key)
            .ok_or_else(|| ImportError::UnsupportedFormat(format.key.to_string()))?;
        if format.requires_passphrase && request.passphrase.is_none() {
            return Err(ImportError::PassphraseRequired);
        }

        let start = Instant::now();
        tracing::debug!(file = %file.name(), format = format.key, "Parsing import file");

        match parser.parse(file, request) {
            Ok(items) => {
                tracing::info!(
                    file = %file.name(),
                    format = format.key,
                    items = items.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Import file parsed"
                );
                Ok(items)
            }
            Err(e) => {
                tracing::debug!(
                    file = %file.name(),
                    format = format.key,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Import parse failed"
                );
                Err(e)
            }
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults(&ImportConfig::default())
    }
}

/// Render a JSON scalar as field text. Arrays and objects become their JSON.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
