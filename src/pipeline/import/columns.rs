//! Column inference for delimited text.
//!
//! Proposes a field type for every source column from its header (and, when
//! the header says nothing, from a few sample values). The proposal is shown
//! to the user, who may override it before the file is parsed again.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::delimited::read_records;
use super::source::RawFile;
use crate::config::ImportConfig;
use crate::models::{field_type_from_name, field_type_from_value, FieldType};

/// What a column contributes to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field_type", rename_all = "snake_case")]
pub enum ColumnType {
    /// The item's name.
    Name,
    /// Tag list, split on the tag separator.
    Tags,
    /// Ignored.
    Skip,
    Field(FieldType),
}

impl ColumnType {
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Self::Field(t) => Some(*t),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Tags => "Tags",
            Self::Skip => "Skip",
            Self::Field(t) => t.display_name(),
        }
    }
}

/// One source column of a delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportColumn {
    /// Header text as found in the file.
    pub source_name: String,
    /// Unique key within the file; used as the field name.
    pub name: String,
    pub display_name: String,
    pub inferred_type: ColumnType,
    pub sample_values: Vec<String>,
}

impl ImportColumn {
    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.inferred_type = column_type;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub has_headers: bool,
    pub tag_separator: char,
    pub sample_rows: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for CsvOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            has_headers: config.csv_has_headers,
            tag_separator: config.tag_separator,
            sample_rows: config.sample_rows,
        }
    }
}

/// Apply `overrides` (column name, new type) to `columns`, matching names
/// case-insensitively. Also returns the override names that matched nothing.
pub fn retype_columns<'o>(
    columns: &[ImportColumn],
    overrides: &'o [(String, ColumnType)],
) -> (Vec<ImportColumn>, Vec<&'o str>) {
    let updated = columns
        .iter()
        .map(|column| {
            match overrides
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&column.name))
            {
                Some((_, column_type)) => column.clone().with_type(*column_type),
                None => column.clone(),
            }
        })
        .collect();
    let unmatched = overrides
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
        .collect();
    (updated, unmatched)
}

const NAME_HEADERS: &[&str] = &["name", "title"];
const TAG_HEADERS: &[&str] = &["tags", "tag", "category", "grouping", "folder"];

/// Propose columns for `file`. Never fails: bytes that are not UTF-8 are
/// replaced, and unreadable input yields no columns.
pub fn infer_columns(file: &RawFile, options: &CsvOptions) -> Vec<ImportColumn> {
    let limit = options.sample_rows + usize::from(options.has_headers);
    let rows = match read_records(file, Some(limit)) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(file = %file.name(), error = %e, "Column inference found no readable rows");
            return Vec::new();
        }
    };

    let (header, samples) = match rows.split_first() {
        Some((first, rest)) if options.has_headers => (Some(first.as_slice()), rest),
        _ => (None, rows.as_slice()),
    };
    let columns = infer_from_rows(header, samples);

    tracing::debug!(
        file = %file.name(),
        columns = columns.len(),
        "Columns inferred"
    );
    columns
}

/// Build columns from an optional header row and sample rows.
pub fn infer_from_rows(header: Option<&[String]>, samples: &[Vec<String>]) -> Vec<ImportColumn> {
    let width = header
        .map(<[String]>::len)
        .into_iter()
        .chain(samples.iter().map(Vec::len))
        .max()
        .unwrap_or(0);

    let mut assigned: HashSet<String> = HashSet::new();
    let mut name_taken = false;

    (0..width)
        .map(|index| {
            let source_name = header
                .and_then(|h| h.get(index))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            let sample_values: Vec<String> = samples
                .iter()
                .filter_map(|row| row.get(index))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();

            let base = if source_name.is_empty() {
                format!("column_{}", index + 1)
            } else {
                source_name.clone()
            };
            let (name, display_name) = if assigned.insert(base.to_lowercase()) {
                (base.clone(), clean_display_name(&base, index))
            } else {
                // First free index; a literal `url_2` header already holds its slot.
                let mut occurrence = 2usize;
                while !assigned.insert(format!("{base}_{occurrence}").to_lowercase()) {
                    occurrence += 1;
                }
                (
                    format!("{base}_{occurrence}"),
                    format!("{} {occurrence}", clean_display_name(&base, index)),
                )
            };

            let mut inferred_type = infer_type(&source_name, &sample_values);
            if inferred_type == ColumnType::Name {
                if name_taken {
                    inferred_type = ColumnType::Field(FieldType::Text);
                }
                name_taken = true;
            }

            ImportColumn {
                source_name,
                name,
                display_name,
                inferred_type,
                sample_values,
            }
        })
        .collect()
}

fn infer_type(header: &str, samples: &[String]) -> ColumnType {
    let lower = header.trim().to_lowercase();
    if NAME_HEADERS.contains(&lower.as_str()) {
        return ColumnType::Name;
    }
    if TAG_HEADERS.contains(&lower.as_str()) {
        return ColumnType::Tags;
    }
    if let Some(field_type) = field_type_from_name(&lower) {
        return ColumnType::Field(field_type);
    }

    // Header gave no hint: use the sample values if they all agree.
    let mut guesses = samples.iter().map(|v| field_type_from_value(v));
    let field_type = match guesses.next().flatten() {
        Some(first) if guesses.all(|g| g == Some(first)) => first,
        _ => FieldType::Text,
    };
    ColumnType::Field(field_type)
}

/// Header as shown to the user: trimmed, underscores as spaces, whitespace
/// collapsed, each word capitalized. Acronyms keep their case.
pub fn clean_display_name(header: &str, index: usize) -> String {
    let words: Vec<String> = header
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            if word.chars().all(|c| !c.is_lowercase()) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        format!("Column {}", index + 1)
    } else {
        words.join(" ")
    }
}
