use std::collections::BTreeMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use vault_import::config::{self, ImportConfig};
use vault_import::models::{AlertKind, FieldType, NormalizedItem};
use vault_import::pipeline::import::{
    commit_import, detect, find_format, infer_columns, list_formats, retype_columns,
    run_import, save_csv_sample, ColumnType, CommitOutcome, CredentialPrompt, CsvOptions,
    DirectorySaver, FormatDetection, ImportColumn, ImportError, ImportFormat, ImportInteraction,
    Notifier, ParserRegistry, PassphraseRequest, RawFile, VaultStore,
};

/// Import password-manager exports into a JSON vault file
#[derive(Parser)]
#[command(name = "vault-import")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # What is this file?
    vault-import detect ~/Downloads/export.1pux

    # Import a CSV, treating the 'pin' column as a PIN and skipping 'comment'
    vault-import import items.csv -o vault.json --column pin=pin --column comment=skip

    # Write the CSV template to the download directory
    vault-import sample
")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file overriding import defaults
    #[arg(long, env = "VAULT_IMPORT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported import formats
    Formats,

    /// Guess the format of a file
    Detect {
        file: PathBuf,
    },

    /// Show the columns inferred for a CSV file
    Columns {
        file: PathBuf,
    },

    /// Parse a file and add its items to a vault file
    Import {
        file: PathBuf,

        /// Format key to use instead of the detected one
        #[arg(long)]
        format: Option<String>,

        /// Vault file (JSON) receiving the items
        #[arg(short, long)]
        output: PathBuf,

        /// Vault inside the output file
        #[arg(long, default_value = "Main")]
        vault: String,

        /// Item quota of the vault; -1 for unlimited
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        quota: i64,

        /// Override an inferred CSV column: NAME=TYPE (name, tags, skip or a field type)
        #[arg(long = "column", value_name = "NAME=TYPE", value_parser = parse_column_override)]
        columns: Vec<(String, ColumnType)>,
    },

    /// Write the CSV sample template
    Sample {
        /// Target directory (default: the download directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ImportConfig::load(path)?,
        None => ImportConfig::default(),
    };
    tracing::debug!(version = config::APP_VERSION, "vault-import starting");

    match cli.command {
        Commands::Formats => {
            for format in list_formats() {
                let lock = if format.requires_passphrase { " (passphrase)" } else { "" };
                println!(
                    "{:<16} {}{lock}  [{}]",
                    format.key,
                    format.display_name,
                    format.extensions.join(", ")
                );
            }
            Ok(())
        }
        Commands::Detect { file } => {
            let file = read_source(&file, &config)?;
            print_json(&detect(&file))
        }
        Commands::Columns { file } => {
            let file = read_source(&file, &config)?;
            print_json(&infer_columns(&file, &CsvOptions::from(&config)))
        }
        Commands::Import {
            file,
            format,
            output,
            vault,
            quota,
            columns,
        } => import(&config, &file, format.as_deref(), &output, &vault, quota, columns),
        Commands::Sample { dir } => {
            let saver = DirectorySaver::new(dir.unwrap_or_else(config::default_sample_dir));
            let path = save_csv_sample(&saver)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        1 => EnvFilter::new("vault_import=debug,info"),
        _ => EnvFilter::new("vault_import=trace,debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_source(path: &Path, config: &ImportConfig) -> Result<RawFile> {
    RawFile::from_path(path, config.max_file_size)
        .with_context(|| format!("Cannot read {}", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn parse_column_override(value: &str) -> Result<(String, ColumnType), String> {
    let (name, kind) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TYPE, got {value:?}"))?;
    let column_type = match kind.trim().to_ascii_lowercase().as_str() {
        "name" => ColumnType::Name,
        "tags" => ColumnType::Tags,
        "skip" => ColumnType::Skip,
        other => ColumnType::Field(other.parse::<FieldType>().map_err(|e| e.to_string())?),
    };
    Ok((name.trim().to_string(), column_type))
}

fn import(
    config: &ImportConfig,
    path: &Path,
    format: Option<&str>,
    output: &Path,
    vault_name: &str,
    quota: i64,
    column_overrides: Vec<(String, ColumnType)>,
) -> Result<()> {
    let file = read_source(path, config)?;
    let format_override = format
        .map(|key| {
            find_format(key)
                .ok_or_else(|| anyhow!("Unknown format {key:?}, see `vault-import formats`"))
        })
        .transpose()?;

    let registry = ParserRegistry::with_defaults(config);
    let mut interaction = TerminalInteraction {
        format_override,
        column_overrides,
        preview_rows: config.sample_rows,
    };
    let result = run_import(&registry, config, &file, &mut interaction, &mut TerminalPrompt);

    let mut store = JsonVaultFile::open(output, quota)?;
    match commit_import(&mut store, vault_name, result, &StderrNotifier)? {
        CommitOutcome::Imported(_) => Ok(()),
        CommitOutcome::Cancelled => {
            eprintln!("Import cancelled.");
            Ok(())
        }
        CommitOutcome::Failed(failure) => bail!("{}", failure.message),
    }
}

/// Format choice and column review driven by command-line flags.
struct TerminalInteraction {
    format_override: Option<&'static ImportFormat>,
    /// Applied on the first review, then cleared.
    column_overrides: Vec<(String, ColumnType)>,
    preview_rows: usize,
}

impl ImportInteraction for TerminalInteraction {
    fn confirm_format(&mut self, detection: &FormatDetection) -> &'static ImportFormat {
        eprintln!(
            "Detected format: {} ({})",
            detection.format,
            detection.confidence
        );
        match self.format_override {
            Some(format) => {
                eprintln!("Using format: {format}");
                format
            }
            None => detection.format,
        }
    }

    fn review_columns(
        &mut self,
        columns: &[ImportColumn],
        preview: &[NormalizedItem],
    ) -> Option<Vec<ImportColumn>> {
        if !self.column_overrides.is_empty() {
            let overrides = std::mem::take(&mut self.column_overrides);
            let (updated, unmatched) = retype_columns(columns, &overrides);
            if !unmatched.is_empty() {
                let known: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
                eprintln!(
                    "Warning: no column named {} (columns: {})",
                    unmatched.join(", "),
                    known.join(", ")
                );
            }
            return Some(updated);
        }

        eprintln!("Columns:");
        for column in columns {
            eprintln!("  {:<24} {}", column.display_name, column.inferred_type.label());
        }
        eprintln!("Preview ({} items):", preview.len());
        for item in preview.iter().take(self.preview_rows) {
            eprintln!("  {} ({} fields)", item.name, item.fields.len());
        }
        None
    }
}

/// Reads the passphrase from the terminal without echo. Empty input cancels.
struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn prompt(&mut self, request: &PassphraseRequest) -> Option<Zeroizing<String>> {
        if let Some(rejection) = &request.rejection {
            eprintln!("{rejection}");
        }
        let prompt = format!(
            "{} Passphrase for {} (empty to cancel): ",
            request.message, request.format_name
        );
        match rpassword::prompt_password(prompt) {
            Ok(passphrase) => {
                let passphrase = Zeroizing::new(passphrase);
                if passphrase.is_empty() {
                    None
                } else {
                    Some(passphrase)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read passphrase from terminal");
                None
            }
        }
    }
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str, kind: AlertKind) {
        eprintln!("[{kind}] {message}");
    }
}

/// Vaults kept as `{ "<vault name>": [items...] }` in one JSON file.
struct JsonVaultFile {
    path: PathBuf,
    quota: i64,
    vaults: BTreeMap<String, Vec<NormalizedItem>>,
}

impl JsonVaultFile {
    fn open(path: &Path, quota: i64) -> Result<Self> {
        let vaults = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read vault file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid vault file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            quota,
            vaults,
        })
    }
}

impl VaultStore for JsonVaultFile {
    type Vault = str;

    fn items_quota(&self, _vault: &str) -> i64 {
        self.quota
    }

    fn item_count(&self, vault: &str) -> usize {
        self.vaults.get(vault).map_or(0, Vec::len)
    }

    fn add_items(&mut self, vault: &str, items: Vec<NormalizedItem>) -> Result<(), ImportError> {
        self.vaults.entry(vault.to_string()).or_default().extend(items);
        let json = serde_json::to_vec_pretty(&self.vaults).map_err(io::Error::from)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
