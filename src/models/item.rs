use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::enums::FieldType;

pub const UNNAMED_ITEM: &str = "Unnamed";

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[\w.+-]+@[\w-]+(\.[\w-]+)*\.[a-z]{2,}$").unwrap());

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(https?://|www\.)[^\s/$.?#][^\s]*$|^[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}(/[^\s]*)?$")
        .unwrap()
});

/// A single `{name, type, value}` entry of an imported item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            value: value.into(),
        }
    }

    /// Build a field whose type is guessed from its name and value.
    pub fn guessed(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let field_type = guess_field_type(&name, &value);
        Self {
            name,
            field_type,
            value,
        }
    }
}

/// Format-independent representation of one imported record.
///
/// Items carry no identity; the receiving vault assigns IDs on insertion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub name: String,
    pub fields: Vec<Field>,
    pub tags: BTreeSet<String>,
}

impl NormalizedItem {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                UNNAMED_ITEM.to_string()
            } else {
                name.to_string()
            },
            fields: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Append a field, renaming it `"<name> (2)"`, `"<name> (3)"`, … when the
    /// name is already taken by a field that may not repeat.
    pub fn push_field(&mut self, mut field: Field) {
        if self.conflicts(&field.name, field.field_type) {
            let base = field.name.clone();
            let mut index = 2;
            loop {
                let candidate = format!("{base} ({index})");
                if !self.conflicts(&candidate, field.field_type) {
                    field.name = candidate;
                    break;
                }
                index += 1;
            }
        }
        self.fields.push(field);
    }

    /// Push a field unless its value is blank.
    pub fn push_value(&mut self, name: &str, field_type: FieldType, value: &str) {
        if !value.trim().is_empty() {
            self.push_field(Field::new(name, field_type, value));
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() {
            self.tags.insert(tag.to_string());
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields_of_type(&self, field_type: FieldType) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.field_type == field_type)
    }

    /// True if two fields share a name and their type does not permit it.
    pub fn has_disallowed_duplicates(&self) -> bool {
        self.fields.iter().enumerate().any(|(i, a)| {
            self.fields[i + 1..].iter().any(|b| {
                a.name == b.name
                    && !(a.field_type == b.field_type && a.field_type.allows_repetition())
            })
        })
    }

    fn conflicts(&self, name: &str, field_type: FieldType) -> bool {
        self.fields.iter().any(|f| {
            f.name == name && !(f.field_type == field_type && field_type.allows_repetition())
        })
    }
}

/// Guess a field type from a field (or column) name.
///
/// Returns `None` when the name carries no hint.
pub fn field_type_from_name(name: &str) -> Option<FieldType> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let words: Vec<&str> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_word = |w: &str| words.iter().any(|x| *x == w);

    if name.contains("pass") {
        Some(FieldType::Password)
    } else if has_word("pin") {
        Some(FieldType::Pin)
    } else if name.contains("user") || name.contains("login") {
        Some(FieldType::Username)
    } else if name.contains("email") || name.contains("e-mail") || has_word("mail") {
        Some(FieldType::Email)
    } else if has_word("url")
        || has_word("uri")
        || name.contains("website")
        || name.contains("site")
        || has_word("link")
    {
        Some(FieldType::Url)
    } else if has_word("totp") || has_word("otp") || has_word("2fa") {
        Some(FieldType::Totp)
    } else if name.contains("note") || has_word("extra") || name.contains("comment") {
        Some(FieldType::Note)
    } else if name.contains("phone") || has_word("mobile") {
        Some(FieldType::Phone)
    } else if name.contains("credit") || name.contains("card number") {
        Some(FieldType::Credit)
    } else {
        None
    }
}

/// Guess a field type from a value alone.
pub fn field_type_from_value(value: &str) -> Option<FieldType> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else if EMAIL_PATTERN.is_match(value) {
        Some(FieldType::Email)
    } else if URL_PATTERN.is_match(value) {
        Some(FieldType::Url)
    } else {
        None
    }
}

/// Name hint first, then value shape, then the generic text type.
pub fn guess_field_type(name: &str, value: &str) -> FieldType {
    field_type_from_name(name)
        .or_else(|| field_type_from_value(value))
        .unwrap_or(FieldType::Text)
}
