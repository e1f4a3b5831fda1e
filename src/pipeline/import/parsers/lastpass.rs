//! LastPass CSV export.
//!
//! Regular rows become login items. Rows whose url is `http://sn` are secure
//! notes: their `extra` column holds `Key:Value` lines that become fields.

use super::{FormatParser, ParseRequest};
use crate::models::{guess_field_type, Field, FieldType, NormalizedItem};
use crate::pipeline::import::delimited::{cell, read_records};
use crate::pipeline::import::registry::{ImportFormat, LASTPASS};
use crate::pipeline::import::source::RawFile;
use crate::pipeline::import::ImportError;

const SECURE_NOTE_URL: &str = "http://sn";
const NOTE_TYPE_KEY: &str = "NoteType";
const NO_GROUP: &str = "(none)";

/// Column positions resolved from the header row.
struct Layout {
    url: Option<usize>,
    username: Option<usize>,
    password: Option<usize>,
    totp: Option<usize>,
    extra: Option<usize>,
    name: Option<usize>,
    grouping: Option<usize>,
}

impl Layout {
    fn from_header(header: &[String]) -> Result<Self, ImportError> {
        let find = |column: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
        };
        let layout = Self {
            url: find("url"),
            username: find("username"),
            password: find("password"),
            totp: find("totp"),
            extra: find("extra"),
            name: find("name"),
            grouping: find("grouping"),
        };
        if layout.url.is_none() || layout.name.is_none() {
            return Err(ImportError::MalformedInput(
                "LastPass header is missing the url or name column".into(),
            ));
        }
        Ok(layout)
    }
}

pub struct LastPassParser;

impl FormatParser for LastPassParser {
    fn format(&self) -> &'static ImportFormat {
        &LASTPASS
    }

    fn parse(
        &self,
        file: &RawFile,
        _request: &ParseRequest<'_>,
    ) -> Result<Vec<NormalizedItem>, ImportError> {
        let rows = read_records(file, None)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let layout = Layout::from_header(header)?;

        Ok(data.iter().map(|row| parse_row(row, &layout)).collect())
    }
}

fn parse_row(row: &[String], layout: &Layout) -> NormalizedItem {
    let mut item = NormalizedItem::new(cell(row, layout.name));
    let url = cell(row, layout.url).trim();
    let extra = normalize_newlines(cell(row, layout.extra));

    item.push_value("username", FieldType::Username, cell(row, layout.username));
    item.push_value("password", FieldType::Password, cell(row, layout.password));

    if url == SECURE_NOTE_URL {
        for field in parse_note_fields(&extra) {
            item.push_field(field);
        }
    } else {
        item.push_value("url", FieldType::Url, url);
        item.push_value("totp", FieldType::Totp, cell(row, layout.totp));
        item.push_value("notes", FieldType::Note, &extra);
    }

    let group = cell(row, layout.grouping).trim();
    if group != NO_GROUP {
        item.add_tag(group);
    }
    item
}

/// Split a secure note's `Key:Value` lines into fields. Lines without a colon
/// continue the previous value; the `NoteType` marker is dropped.
fn parse_note_fields(extra: &str) -> Vec<Field> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in extra.lines() {
        match line.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
            _ => match entries.last_mut() {
                Some((_, value)) => {
                    value.push('\n');
                    value.push_str(line);
                }
                None if !line.trim().is_empty() => {
                    entries.push(("Notes".to_string(), line.to_string()));
                }
                None => {}
            },
        }
    }

    entries
        .into_iter()
        .filter(|(key, value)| key != NOTE_TYPE_KEY && !value.trim().is_empty())
        .map(|(key, value)| {
            let field_type = guess_field_type(&key, &value);
            Field::new(key, field_type, value.trim())
        })
        .collect()
}

fn normalize_newlines(value: &str) -> String {
    value.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::import::fixtures;

    fn parse(text: &str) -> Result<Vec<NormalizedItem>, ImportError> {
        LastPassParser.parse(&RawFile::new("lastpass.csv", text), &ParseRequest::default())
    }

    #[test]
    fn parses_export_fixture() {
        let items = parse(fixtures::LASTPASS_EXPORT).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| !i.has_disallowed_duplicates()));

        let github = &items[0];
        assert_eq!(github.name, "GitHub");
        assert_eq!(github.field("username").unwrap().value, "octo");
        assert_eq!(github.field("password").unwrap().field_type, FieldType::Password);
        assert_eq!(github.field("url").unwrap().value, "https://github.com/login");
        assert!(github.tags.contains("Work"));
    }

    #[test]
    fn secure_note_fields_are_expanded() {
        let items = parse(fixtures::LASTPASS_EXPORT).unwrap();
        let note = &items[1];
        assert_eq!(note.name, "DB Server");
        assert!(note.field("NoteType").is_none());
        assert!(note.field("url").is_none());
        assert_eq!(note.field("Hostname").unwrap().value, "db.internal");
        assert_eq!(note.field("Password").unwrap().field_type, FieldType::Password);
        assert_eq!(note.field("Notes").unwrap().value, "rotate monthly\nask ops first");
    }

    #[test]
    fn regular_row_keeps_totp_and_notes() {
        let items = parse(fixtures::LASTPASS_EXPORT).unwrap();
        let mail = &items[2];
        assert_eq!(mail.field("totp").unwrap().field_type, FieldType::Totp);
        assert_eq!(mail.field("notes").unwrap().value, "recovery codes\nin the safe");
        assert!(mail.tags.is_empty(), "(none) grouping must not become a tag");
    }

    #[test]
    fn crlf_in_notes_is_normalized() {
        let text = "url,username,password,extra,name,grouping,fav\r\nhttps://a.example,u,p,\"one\r\ntwo\",A,,0\r\n";
        let items = parse(text).unwrap();
        assert_eq!(items[0].field("notes").unwrap().value, "one\ntwo");
    }

    #[test]
    fn header_without_name_column_is_malformed() {
        let err = parse("url,username,password\nhttps://a.example,u,p\n").unwrap_err();
        assert!(matches!(err, ImportError::MalformedInput(_)));
    }
}
