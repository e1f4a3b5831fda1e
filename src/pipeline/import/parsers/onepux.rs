//! 1Password `.1pux` export: a ZIP archive whose `export.data` entry holds
//! accounts, vaults and items as JSON.

use std::io::{Cursor, Read};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{value_to_string, FormatParser, ParseRequest};
use crate::models::{FieldType, NormalizedItem};
use crate::pipeline::import::registry::{ImportFormat, ONEPUX};
use crate::pipeline::import::source::RawFile;
use crate::pipeline::import::ImportError;

const EXPORT_DATA: &str = "export.data";

#[derive(Debug, Deserialize)]
struct ExportData {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    vaults: Vec<Vault>,
}

#[derive(Debug, Deserialize)]
struct Vault {
    #[serde(default)]
    attrs: VaultAttrs,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
struct VaultAttrs {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    trashed: bool,
    #[serde(default)]
    overview: Overview,
    #[serde(default)]
    details: Details,
}

#[derive(Debug, Default, Deserialize)]
struct Overview {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    urls: Vec<UrlEntry>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UrlEntry {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Details {
    #[serde(default)]
    login_fields: Vec<LoginField>,
    #[serde(default)]
    notes_plain: Option<String>,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginField {
    #[serde(default)]
    value: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    field_type: String,
    #[serde(default)]
    designation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    fields: Vec<SectionField>,
}

#[derive(Debug, Deserialize)]
struct SectionField {
    #[serde(default)]
    title: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    value: Map<String, Value>,
}

pub struct OnePuxParser {
    /// Ceiling on the decompressed `export.data` size.
    max_export_size: u64,
}

impl OnePuxParser {
    pub fn new(max_export_size: u64) -> Self {
        Self { max_export_size }
    }
}

impl FormatParser for OnePuxParser {
    fn format(&self) -> &'static ImportFormat {
        &ONEPUX
    }

    fn parse(
        &self,
        file: &RawFile,
        _request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let data = read_export_data(file.bytes(), self.max_export_size)?;
        let export: ExportData = serde_json::from_str(&data)
            .map_err(|e| ImportError::MalformedInput(format!("{EXPORT_DATA}: {e}")))?;

        let mut items = Vec::new();
        let mut trashed = 0usize;
        for vault in export.accounts.iter().flat_map(|a| &a.vaults) {
            for item in &vault.items {
                if item.trashed {
                    trashed += 1;
                    continue;
                }
                items.push(convert_item(item, &vault.attrs.name));
            }
        }

        tracing::debug!(items = items.len(), trashed, "1pux export read");
        Ok(items)
    }
}

fn read_export_data(bytes: &[u8], max_size: u64) -> Result<String, ImportError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ImportError::MalformedInput(format!("not a 1pux archive: {e}")))?;
    let entry = archive
        .by_name(EXPORT_DATA)
        .map_err(|e| ImportError::MalformedInput(format!("{EXPORT_DATA}: {e}")))?;
    if entry.size() > max_size {
        return Err(oversized_export(max_size));
    }

    // The declared size can lie; cap the actual decompressed read as well.
    let mut data = String::new();
    entry
        .take(max_size.saturating_add(1))
        .read_to_string(&mut data)
        .map_err(|e| ImportError::MalformedInput(format!("{EXPORT_DATA}: {e}")))?;
    if data.len() as u64 > max_size {
        return Err(oversized_export(max_size));
    }
    Ok(data)
}

fn oversized_export(max_size: u64) -> ImportError {
    ImportError::MalformedInput(format!("{EXPORT_DATA} expands beyond {max_size} bytes"))
}

fn convert_item(source: &Item, vault_name: &str) -> NormalizedItem {
    let overview = &source.overview;
    let details = &source.details;
    let mut item = NormalizedItem::new(&overview.title);

    for field in &details.login_fields {
        let (name, field_type) = login_field_type(field);
        item.push_value(name, field_type, &field.value);
    }
    if let Some(password) = &details.password {
        item.push_value("password", FieldType::Password, password);
    }

    let mut urls: Vec<&str> = Vec::new();
    for url in std::iter::once(overview.url.as_str()).chain(overview.urls.iter().map(|u| u.url.as_str())) {
        let url = url.trim();
        if !url.is_empty() && !urls.contains(&url) {
            urls.push(url);
        }
    }
    for url in urls {
        item.push_value("url", FieldType::Url, url);
    }

    for field in details.sections.iter().flat_map(|s| &s.fields) {
        let Some((kind, value)) = field.value.iter().next() else {
            continue;
        };
        let field_type = section_field_type(kind);
        let text = section_value_text(kind, value);
        let name = if !field.title.trim().is_empty() {
            field.title.as_str()
        } else if !field.id.trim().is_empty() {
            field.id.as_str()
        } else {
            field_type.as_str()
        };
        item.push_value(name, field_type, &text);
    }

    if let Some(notes) = &details.notes_plain {
        item.push_value("notes", FieldType::Note, notes);
    }

    for tag in &overview.tags {
        item.add_tag(tag);
    }
    item.add_tag(vault_name);
    item
}

fn login_field_type(field: &LoginField) -> (&str, FieldType) {
    match field.designation.as_deref() {
        Some("username") => ("username", FieldType::Username),
        Some("password") => ("password", FieldType::Password),
        _ => {
            let field_type = match field.field_type.as_str() {
                "P" => FieldType::Password,
                "E" => FieldType::Email,
                "U" => FieldType::Url,
                _ => FieldType::Text,
            };
            let name = if field.name.trim().is_empty() {
                field_type.as_str()
            } else {
                field.name.as_str()
            };
            (name, field_type)
        }
    }
}

fn section_field_type(kind: &str) -> FieldType {
    match kind {
        "concealed" => FieldType::Password,
        "email" => FieldType::Email,
        "url" => FieldType::Url,
        "phone" => FieldType::Phone,
        "totp" => FieldType::Totp,
        "date" => FieldType::Date,
        "monthYear" => FieldType::Month,
        "creditCardNumber" => FieldType::Credit,
        _ => FieldType::Text,
    }
}

/// Render a section value. Dates are unix seconds, months are `YYYYMM`
/// integers, structured values (addresses, emails) are objects.
fn section_value_text(kind: &str, value: &Value) -> String {
    match (kind, value) {
        ("date", Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| n.to_string()),
        ("monthYear", Value::Number(n)) => match n.as_u64() {
            Some(v) => format!("{:04}-{:02}", v / 100, v % 100),
            None => n.to_string(),
        },
        ("email", Value::Object(o)) => o.get("email_address").map(value_to_string).unwrap_or_default(),
        (_, Value::Object(o)) => o
            .values()
            .map(value_to_string)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => value_to_string(value),
    }
}
