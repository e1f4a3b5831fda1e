//! Import orchestration: one explicit state machine per invocation.
//!
//! [`ImportPhase::transition`] is the whole transition table. [`ImportSession`]
//! drives it step by step for callers that own their UI loop, and
//! [`run_import`] drives a complete invocation against the interaction and
//! credential-prompt collaborators.

use serde::Serialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::columns::{infer_columns, CsvOptions, ImportColumn};
use super::format::{detect, FormatDetection};
use super::parsers::{ParseRequest, ParserRegistry};
use super::registry::ImportFormat;
use super::source::RawFile;
use super::{ErrorKind, ImportError};
use crate::config::ImportConfig;
use crate::models::{ImportEvent, ImportPhase, NormalizedItem};

pub const PASSPHRASE_PROMPT: &str = "This file is protected by a password.";

impl ImportPhase {
    /// Apply `event`, or report the pair as an invalid transition.
    pub fn transition(self, event: ImportEvent) -> Result<ImportPhase, ImportError> {
        use ImportEvent as E;
        use ImportPhase as P;

        let next = match (self, event) {
            (P::Idle, E::Begin) => P::Detecting,
            (P::Detecting, E::Detected) => P::AwaitingFormatConfirmation,
            (P::AwaitingFormatConfirmation, E::FormatConfirmed) => P::Parsing,
            (P::Parsing, E::PreviewReady | E::ColumnsChanged) => P::Parsing,
            (P::Parsing, E::PassphraseNeeded | E::PassphraseRejected) => P::AwaitingPassphrase,
            (P::AwaitingPassphrase, E::PassphraseSubmitted) => P::Parsing,
            (P::AwaitingPassphrase, E::PromptAbandoned) => P::Cancelled,
            (P::Parsing, E::ParseSucceeded) => P::Succeeded,
            (P::Parsing, E::ParseFailed) => P::Failed,
            (phase, event) => {
                return Err(ImportError::InvalidTransition {
                    phase: phase.as_str(),
                    event: event.as_str(),
                })
            }
        };
        Ok(next)
    }
}

/// Classified failure handed to the caller instead of a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ImportError> for ImportFailure {
    fn from(err: &ImportError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

/// Terminal outcome of one import invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ImportResult {
    Success(Vec<NormalizedItem>),
    Cancelled,
    Failed(ImportFailure),
}

impl ImportResult {
    pub fn items(&self) -> Option<&[NormalizedItem]> {
        match self {
            Self::Success(items) => Some(items),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

/// What the credential prompt is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassphraseRequest {
    pub format_name: &'static str,
    pub message: &'static str,
    /// 1 for the first prompt of a session.
    pub attempt: u32,
    /// Why the previous candidate was refused, if one was.
    pub rejection: Option<String>,
}

/// Asks the user for a passphrase. `None` means the user gave up.
pub trait CredentialPrompt {
    fn prompt(&mut self, request: &PassphraseRequest) -> Option<Zeroizing<String>>;
}

/// The user-facing decisions of an import besides the passphrase.
pub trait ImportInteraction {
    /// Confirm the detected format or pick another one.
    fn confirm_format(&mut self, detection: &FormatDetection) -> &'static ImportFormat;

    /// Review inferred columns against the parsed preview. Returning new
    /// columns re-parses the file; `None` accepts the preview.
    fn review_columns(
        &mut self,
        _columns: &[ImportColumn],
        _preview: &[NormalizedItem],
    ) -> Option<Vec<ImportColumn>> {
        None
    }
}

/// What the session needs next.
#[derive(Debug)]
pub enum SessionStep {
    ConfirmFormat(FormatDetection),
    /// Columns and preview are available from the session.
    ReviewColumns,
    NeedPassphrase(PassphraseRequest),
    Finished(ImportResult),
}

/// One import invocation over one file.
pub struct ImportSession<'a> {
    id: Uuid,
    registry: &'a ParserRegistry,
    config: &'a ImportConfig,
    file: &'a RawFile,
    phase: ImportPhase,
    detection: Option<FormatDetection>,
    format: Option<&'static ImportFormat>,
    columns: Vec<ImportColumn>,
    preview: Vec<NormalizedItem>,
    reviewing: bool,
    attempts: u32,
}

impl<'a> ImportSession<'a> {
    pub fn new(registry: &'a ParserRegistry, config: &'a ImportConfig, file: &'a RawFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            config,
            file,
            phase: ImportPhase::Idle,
            detection: None,
            format: None,
            columns: Vec::new(),
            preview: Vec::new(),
            reviewing: false,
            attempts: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    pub fn detection(&self) -> Option<&FormatDetection> {
        self.detection.as_ref()
    }

    pub fn format(&self) -> Option<&'static ImportFormat> {
        self.format
    }

    pub fn columns(&self) -> &[ImportColumn] {
        &self.columns
    }

    pub fn preview(&self) -> &[NormalizedItem] {
        &self.preview
    }

    fn fire(&mut self, event: ImportEvent) -> Result<(), ImportError> {
        let next = self.phase.transition(event)?;
        tracing::trace!(
            session = %self.id,
            from = self.phase.as_str(),
            to = next.as_str(),
            event = event.as_str(),
            "Import phase change"
        );
        self.phase = next;
        Ok(())
    }

    pub fn begin(&mut self) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::Begin)?;
        tracing::info!(session = %self.id, file = %self.file.name(), size = self.file.len(), "Import started");

        let detection = detect(self.file);
        self.fire(ImportEvent::Detected)?;
        self.detection = Some(detection.clone());
        Ok(SessionStep::ConfirmFormat(detection))
    }

    /// Proceed with `format`, which may differ from the detected one.
    pub fn confirm_format(&mut self, format: &'static ImportFormat) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::FormatConfirmed)?;
        self.format = Some(format);

        let detected = self.detection.as_ref().map(|d| d.format.key);
        tracing::info!(
            session = %self.id,
            format = format.key,
            overridden = detected != Some(format.key),
            "Import format confirmed"
        );

        if format.is_csv() {
            self.columns = infer_columns(self.file, &CsvOptions::from(self.config));
            return self.parse_preview();
        }
        if format.requires_passphrase {
            self.fire(ImportEvent::PassphraseNeeded)?;
            return Ok(SessionStep::NeedPassphrase(self.passphrase_request(None)));
        }

        let result = self.registry.parse(format, self.file, &ParseRequest::default());
        self.finish_parse(result)
    }

    /// Replace the column mapping and parse again.
    pub fn update_columns(&mut self, columns: Vec<ImportColumn>) -> Result<SessionStep, ImportError> {
        self.require_review(ImportEvent::ColumnsChanged)?;
        self.fire(ImportEvent::ColumnsChanged)?;
        tracing::debug!(session = %self.id, columns = columns.len(), "Import columns changed");
        self.columns = columns;
        self.parse_preview()
    }

    /// Accept the current preview as the import result.
    pub fn accept(&mut self) -> Result<SessionStep, ImportError> {
        self.require_review(ImportEvent::ParseSucceeded)?;
        self.reviewing = false;
        let items = std::mem::take(&mut self.preview);
        self.succeed(items)
    }

    pub fn submit_passphrase(&mut self, passphrase: &str) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::PassphraseSubmitted)?;
        self.attempts += 1;
        let format = self.confirmed_format(ImportEvent::PassphraseSubmitted)?;

        let request = ParseRequest::default().with_passphrase(passphrase);
        match self.registry.parse(format, self.file, &request) {
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    session = %self.id,
                    format = format.key,
                    attempt = self.attempts,
                    "Passphrase rejected"
                );
                self.fire(ImportEvent::PassphraseRejected)?;
                let rejection = err.user_message();
                Ok(SessionStep::NeedPassphrase(self.passphrase_request(Some(rejection))))
            }
            result => self.finish_parse(result),
        }
    }

    /// The user dismissed the prompt: the import ends without items.
    pub fn abandon_passphrase(&mut self) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::PromptAbandoned)?;
        tracing::info!(session = %self.id, attempts = self.attempts, "Import cancelled at passphrase prompt");
        Ok(SessionStep::Finished(ImportResult::Cancelled))
    }

    fn parse_preview(&mut self) -> Result<SessionStep, ImportError> {
        let format = self.confirmed_format(ImportEvent::PreviewReady)?;
        let request = ParseRequest::default().with_columns(&self.columns);
        match self.registry.parse(format, self.file, &request) {
            Ok(items) => {
                self.fire(ImportEvent::PreviewReady)?;
                self.preview = items;
                self.reviewing = true;
                Ok(SessionStep::ReviewColumns)
            }
            Err(err) => self.fail(err),
        }
    }

    fn finish_parse(
        &mut self,
        result: Result<Vec<NormalizedItem>, ImportError>,
    ) -> Result<SessionStep, ImportError> {
        match result {
            Ok(items) => self.succeed(items),
            Err(err) => self.fail(err),
        }
    }

    fn succeed(&mut self, items: Vec<NormalizedItem>) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::ParseSucceeded)?;
        tracing::info!(session = %self.id, items = items.len(), "Import parsed");
        Ok(SessionStep::Finished(ImportResult::Success(items)))
    }

    fn fail(&mut self, err: ImportError) -> Result<SessionStep, ImportError> {
        self.fire(ImportEvent::ParseFailed)?;
        self.reviewing = false;
        tracing::warn!(session = %self.id, kind = ?err.kind(), error = %err, "Import failed");
        Ok(SessionStep::Finished(ImportResult::Failed(ImportFailure::from(&err))))
    }

    fn require_review(&self, event: ImportEvent) -> Result<(), ImportError> {
        if self.reviewing && self.phase == ImportPhase::Parsing {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                phase: self.phase.as_str(),
                event: event.as_str(),
            })
        }
    }

    fn confirmed_format(&self, event: ImportEvent) -> Result<&'static ImportFormat, ImportError> {
        self.format.ok_or(ImportError::InvalidTransition {
            phase: self.phase.as_str(),
            event: event.as_str(),
        })
    }

    fn passphrase_request(&self, rejection: Option<String>) -> PassphraseRequest {
        PassphraseRequest {
            format_name: self.format.map(|f| f.display_name).unwrap_or_default(),
            message: PASSPHRASE_PROMPT,
            attempt: self.attempts + 1,
            rejection,
        }
    }
}

/// Drive one whole import of `file` to its terminal result.
pub fn run_import(
    registry: &ParserRegistry,
    config: &ImportConfig,
    file: &RawFile,
    interaction: &mut dyn ImportInteraction,
    prompt: &mut dyn CredentialPrompt,
) -> ImportResult {
    let mut session = ImportSession::new(registry, config, file);
    let mut step = session.begin();

    loop {
        let current = match step {
            Ok(current) => current,
            Err(err) => {
                tracing::error!(session = %session.id(), error = %err, "Import session misused");
                return ImportResult::Failed(ImportFailure::from(&err));
            }
        };

        step = match current {
            SessionStep::ConfirmFormat(detection) => {
                let format = interaction.confirm_format(&detection);
                session.confirm_format(format)
            }
            SessionStep::ReviewColumns => {
                match interaction.review_columns(session.columns(), session.preview()) {
                    Some(columns) => session.update_columns(columns),
                    None => session.accept(),
                }
            }
            SessionStep::NeedPassphrase(request) => match prompt.prompt(&request) {
                Some(passphrase) => session.submit_passphrase(&passphrase),
                None => session.abandon_passphrase(),
            },
            SessionStep::Finished(result) => return result,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::models::FieldType;
    use crate::pipeline::import::columns::ColumnType;
    use crate::pipeline::import::fixtures;
    use crate::pipeline::import::registry::{CSV, LASTPASS, PBES2};

    /// Accepts the detected format (or a fixed override) and, optionally,
    /// rewrites columns once before accepting.
    #[derive(Default)]
    struct Scripted {
        format_override: Option<&'static ImportFormat>,
        skip_column: Option<&'static str>,
        reviews: usize,
    }

    impl ImportInteraction for Scripted {
        fn confirm_format(&mut self, detection: &FormatDetection) -> &'static ImportFormat {
            self.format_override.unwrap_or(detection.format)
        }

        fn review_columns(
            &mut self,
            columns: &[ImportColumn],
            _preview: &[NormalizedItem],
        ) -> Option<Vec<ImportColumn>> {
            self.reviews += 1;
            let skip = self.skip_column.take()?;
            Some(
                columns
                    .iter()
                    .map(|c| {
                        if c.name == skip {
                            c.clone().with_type(ColumnType::Skip)
                        } else {
                            c.clone()
                        }
                    })
                    .collect(),
            )
        }
    }

    struct Answers {
        answers: VecDeque<Option<&'static str>>,
        seen: Vec<PassphraseRequest>,
    }

    impl Answers {
        fn new(answers: &[Option<&'static str>]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                seen: Vec::new(),
            }
        }
    }

    impl CredentialPrompt for Answers {
        fn prompt(&mut self, request: &PassphraseRequest) -> Option<Zeroizing<String>> {
            self.seen.push(request.clone());
            self.answers
                .pop_front()
                .flatten()
                .map(|a| Zeroizing::new(a.to_string()))
        }
    }

    fn run(file: &RawFile, interaction: &mut Scripted, prompt: &mut Answers) -> ImportResult {
        let registry = ParserRegistry::default();
        run_import(&registry, &ImportConfig::default(), file, interaction, prompt)
    }

    #[test]
    fn transition_table_happy_paths() {
        let csv_path = [
            ImportEvent::Begin,
            ImportEvent::Detected,
            ImportEvent::FormatConfirmed,
            ImportEvent::PreviewReady,
            ImportEvent::ColumnsChanged,
            ImportEvent::PreviewReady,
            ImportEvent::ParseSucceeded,
        ];
        let phase = csv_path
            .iter()
            .try_fold(ImportPhase::Idle, |p, e| p.transition(*e))
            .unwrap();
        assert_eq!(phase, ImportPhase::Succeeded);

        let retry_then_cancel = [
            ImportEvent::Begin,
            ImportEvent::Detected,
            ImportEvent::FormatConfirmed,
            ImportEvent::PassphraseNeeded,
            ImportEvent::PassphraseSubmitted,
            ImportEvent::PassphraseRejected,
            ImportEvent::PassphraseSubmitted,
            ImportEvent::PassphraseRejected,
            ImportEvent::PromptAbandoned,
        ];
        let phase = retry_then_cancel
            .iter()
            .try_fold(ImportPhase::Idle, |p, e| p.transition(*e))
            .unwrap();
        assert_eq!(phase, ImportPhase::Cancelled);
    }

    #[test]
    fn terminal_phases_accept_nothing() {
        for phase in ImportPhase::ALL.iter().filter(|p| p.is_terminal()) {
            for event in ImportEvent::ALL {
                assert!(phase.transition(*event).is_err(), "{phase} accepted {event}");
            }
        }
    }

    #[test]
    fn invalid_pair_names_phase_and_event() {
        let err = ImportPhase::Idle
            .transition(ImportEvent::ParseSucceeded)
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidTransition { phase: "idle", event: "parse_succeeded" }
        ));
        assert!(ImportPhase::AwaitingPassphrase
            .transition(ImportEvent::ColumnsChanged)
            .is_err());
    }

    #[test]
    fn csv_sample_imports_after_review() {
        let file = RawFile::new("sample.csv", fixtures::SAMPLE_CSV);
        let mut interaction = Scripted::default();
        let mut prompt = Answers::new(&[]);

        let result = run(&file, &mut interaction, &mut prompt);
        let items = result.items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(interaction.reviews, 1);
        assert!(prompt.seen.is_empty(), "CSV never prompts");
    }

    #[test]
    fn column_change_reparses_without_redetection() {
        let file = RawFile::new("sample.csv", fixtures::SAMPLE_CSV);
        let mut interaction = Scripted {
            skip_column: Some("password"),
            ..Scripted::default()
        };
        let result = run(&file, &mut interaction, &mut Answers::new(&[]));

        assert_eq!(interaction.reviews, 2);
        let items = result.items().unwrap();
        assert!(items.iter().all(|i| i.fields_of_type(FieldType::Password).count() == 0));
    }

    #[test]
    fn wrong_passphrase_retries_until_correct() {
        let file = RawFile::new("vault.json", fixtures::pbes2_container("open sesame", &fixtures::sample_items()));
        let mut prompt = Answers::new(&[Some("nope"), Some("still nope"), Some("open sesame")]);

        let result = run(&file, &mut Scripted::default(), &mut prompt);
        assert_eq!(result.items().map(<[_]>::len), Some(2));

        let attempts: Vec<u32> = prompt.seen.iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, [1, 2, 3]);
        assert_eq!(prompt.seen[0].rejection, None);
        assert_eq!(prompt.seen[1].rejection.as_deref(), Some("Wrong Password"));
        assert_eq!(prompt.seen[0].message, PASSPHRASE_PROMPT);
        assert_eq!(prompt.seen[0].format_name, PBES2.display_name);
    }

    #[test]
    fn abandoning_prompt_cancels() {
        let file = RawFile::new("backup.pls", fixtures::legacy_container("pw", &fixtures::legacy_records()));
        let mut prompt = Answers::new(&[Some("wrong"), None]);

        let result = run(&file, &mut Scripted::default(), &mut prompt);
        assert_eq!(result, ImportResult::Cancelled);
        assert_eq!(prompt.seen.len(), 2);
    }

    #[test]
    fn malformed_plaintext_fails_without_retry() {
        let file = RawFile::new("backup.pls", fixtures::legacy_container_raw("pw", b"{broken"));
        let mut prompt = Answers::new(&[Some("pw"), Some("pw")]);

        let result = run(&file, &mut Scripted::default(), &mut prompt);
        assert_eq!(result.failure_kind(), Some(ErrorKind::MalformedInput));
        assert_eq!(prompt.seen.len(), 1);
    }

    #[test]
    fn format_override_is_honored() {
        let file = RawFile::new("sample.csv", fixtures::SAMPLE_CSV);
        let mut interaction = Scripted {
            format_override: Some(&LASTPASS),
            ..Scripted::default()
        };
        let result = run(&file, &mut interaction, &mut Answers::new(&[]));
        let items = result.items().unwrap();
        assert_eq!(items[0].name, "Facebook");
        assert!(items[0].tags.is_empty(), "read as LastPass, which has no tags column here");
        assert_eq!(interaction.reviews, 0);
    }

    #[test]
    fn onepux_imports_without_prompt() {
        let file = RawFile::new("export.1pux", fixtures::onepux_archive());
        let mut prompt = Answers::new(&[]);
        let result = run(&file, &mut Scripted::default(), &mut prompt);
        assert_eq!(result.items().map(<[_]>::len), Some(2));
        assert!(prompt.seen.is_empty());
    }

    #[test]
    fn session_rejects_out_of_order_calls() {
        let registry = ParserRegistry::default();
        let config = ImportConfig::default();
        let file = RawFile::new("sample.csv", fixtures::SAMPLE_CSV);
        let mut session = ImportSession::new(&registry, &config, &file);

        assert!(matches!(session.accept(), Err(ImportError::InvalidTransition { .. })));
        assert!(matches!(session.submit_passphrase("x"), Err(ImportError::InvalidTransition { .. })));

        assert!(matches!(session.begin(), Ok(SessionStep::ConfirmFormat(_))));
        assert!(matches!(session.begin(), Err(ImportError::InvalidTransition { .. })));
        assert!(matches!(session.confirm_format(&CSV), Ok(SessionStep::ReviewColumns)));
        assert_eq!(session.phase(), ImportPhase::Parsing);
        assert_eq!(session.preview().len(), 2);
        assert!(!session.columns().is_empty());

        assert!(matches!(session.submit_passphrase("x"), Err(ImportError::InvalidTransition { .. })));
        assert!(matches!(session.abandon_passphrase(), Err(ImportError::InvalidTransition { .. })));

        assert!(matches!(session.accept(), Ok(SessionStep::Finished(ImportResult::Success(_)))));
        assert_eq!(session.phase(), ImportPhase::Succeeded);
        assert!(session.accept().is_err());
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let json = serde_json::to_value(ImportResult::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!({"status": "cancelled"}));
    }
}
