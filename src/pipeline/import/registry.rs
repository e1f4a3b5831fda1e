use serde::Serialize;

/// A supported source format. `key` is persisted and compared, never renamed.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ImportFormat {
    pub key: &'static str,
    pub display_name: &'static str,
    pub requires_passphrase: bool,
    pub extensions: &'static [&'static str],
}

impl ImportFormat {
    pub fn is_csv(&self) -> bool {
        self.key == CSV.key
    }
}

impl std::fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name)
    }
}

pub static CSV: ImportFormat = ImportFormat {
    key: "csv",
    display_name: "CSV",
    requires_passphrase: false,
    extensions: &["csv", "tsv", "txt"],
};

pub static PADLOCK_LEGACY: ImportFormat = ImportFormat {
    key: "padlock-legacy",
    display_name: "Padlock (v2)",
    requires_passphrase: true,
    extensions: &["json", "pls", "set"],
};

pub static LASTPASS: ImportFormat = ImportFormat {
    key: "lastpass",
    display_name: "LastPass",
    requires_passphrase: false,
    extensions: &["csv"],
};

pub static PBES2: ImportFormat = ImportFormat {
    key: "pbes2",
    display_name: "Encrypted Container",
    requires_passphrase: true,
    extensions: &["json", "pbes2"],
};

pub static ONEPUX: ImportFormat = ImportFormat {
    key: "1pux",
    display_name: "1Password (1pux)",
    requires_passphrase: false,
    extensions: &["1pux"],
};

static FORMATS: [&ImportFormat; 5] = [&CSV, &PADLOCK_LEGACY, &LASTPASS, &PBES2, &ONEPUX];

/// All supported formats in presentation order.
pub fn list_formats() -> &'static [&'static ImportFormat] {
    &FORMATS
}

pub fn find_format(key: &str) -> Option<&'static ImportFormat> {
    FORMATS.iter().copied().find(|f| f.key == key)
}
