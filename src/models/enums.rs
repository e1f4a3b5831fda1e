use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Closed set of semantic types an item field may carry.
    FieldType {
        Username => "username",
        Password => "password",
        Email => "email",
        Url => "url",
        Date => "date",
        Month => "month",
        Credit => "credit",
        Phone => "phone",
        Pin => "pin",
        Totp => "totp",
        Note => "note",
        Text => "text",
    }
);

impl FieldType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Password => "Password",
            Self::Email => "Email Address",
            Self::Url => "URL",
            Self::Date => "Date",
            Self::Month => "Month",
            Self::Credit => "Credit Card Number",
            Self::Phone => "Phone Number",
            Self::Pin => "PIN",
            Self::Totp => "Two-Factor Token",
            Self::Note => "Note",
            Self::Text => "Other",
        }
    }

    /// Whether one item may hold several fields of this type under the same name.
    pub fn allows_repetition(&self) -> bool {
        matches!(self, Self::Url)
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, Self::Password | Self::Pin | Self::Credit | Self::Totp)
    }

    /// Parse a key found in an export; anything unknown degrades to `Text`.
    pub fn from_key_lenient(key: &str) -> Self {
        key.trim()
            .to_ascii_lowercase()
            .parse()
            .unwrap_or(Self::Text)
    }
}

str_enum!(
    /// How the detector arrived at its guess.
    DetectionConfidence {
        Signature => "signature",
        Extension => "extension",
        Fallback => "fallback",
    }
);

str_enum!(
    /// Severity passed to the notification collaborator.
    AlertKind {
        Info => "info",
        Success => "success",
        Warning => "warning",
        Error => "error",
    }
);

str_enum!(
    /// Where an import session stands.
    ImportPhase {
        Idle => "idle",
        Detecting => "detecting",
        AwaitingFormatConfirmation => "awaiting_format_confirmation",
        Parsing => "parsing",
        AwaitingPassphrase => "awaiting_passphrase",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
);

impl ImportPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

str_enum!(
    ImportEvent {
        Begin => "begin",
        Detected => "detected",
        FormatConfirmed => "format_confirmed",
        ColumnsChanged => "columns_changed",
        PreviewReady => "preview_ready",
        PassphraseNeeded => "passphrase_needed",
        PassphraseSubmitted => "passphrase_submitted",
        PassphraseRejected => "passphrase_rejected",
        PromptAbandoned => "prompt_abandoned",
        ParseSucceeded => "parse_succeeded",
        ParseFailed => "parse_failed",
    }
);
