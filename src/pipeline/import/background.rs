//! Parsing off the async executor.
//!
//! Key derivation for encrypted containers can take seconds; async callers
//! hand the parse to tokio's blocking pool instead of stalling their runtime.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::columns::ImportColumn;
use super::parsers::{ParseRequest, ParserRegistry};
use super::registry::ImportFormat;
use super::source::RawFile;
use super::ImportError;
use crate::models::NormalizedItem;

/// Owned inputs for [`parse_detached`].
#[derive(Default)]
pub struct DetachedRequest {
    pub columns: Option<Vec<ImportColumn>>,
    pub passphrase: Option<Zeroizing<String>>,
}

/// Parse `file` as `format` on a blocking worker thread.
pub async fn parse_detached(
    registry: Arc<ParserRegistry>,
    format: &'static ImportFormat,
    file: Arc<RawFile>,
    request: DetachedRequest,
) -> Result<Vec<NormalizedItem>, ImportError> {
    tokio::task::spawn_blocking(move || {
        let mut parse_request = ParseRequest::default();
        if let Some(columns) = request.columns.as_deref() {
            parse_request = parse_request.with_columns(columns);
        }
        if let Some(passphrase) = request.passphrase.as_deref() {
            parse_request = parse_request.with_passphrase(passphrase);
        }
        registry.parse(format, &file, &parse_request)
    })
    .await
    .map_err(|e| ImportError::Worker(e.to_string()))?
}
