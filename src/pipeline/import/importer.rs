use serde::Serialize;

use super::orchestrator::{ImportFailure, ImportResult};
use super::ImportError;
use crate::models::{AlertKind, NormalizedItem};

/// Quota value meaning "no limit".
pub const UNLIMITED_QUOTA: i64 = -1;

pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "The number of imported items exceeds your remaining quota.";

/// Destination of imported items.
pub trait VaultStore {
    type Vault: ?Sized;

    /// Maximum number of items `vault` may hold, or [`UNLIMITED_QUOTA`].
    fn items_quota(&self, vault: &Self::Vault) -> i64;

    fn item_count(&self, vault: &Self::Vault) -> usize;

    fn add_items(&mut self, vault: &Self::Vault, items: Vec<NormalizedItem>) -> Result<(), ImportError>;
}

/// Fire-and-forget user notification.
pub trait Notifier {
    fn alert(&self, message: &str, kind: AlertKind);
}

/// What committing an import result did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum CommitOutcome {
    Imported(usize),
    Cancelled,
    Failed(ImportFailure),
}

pub fn success_message(count: usize) -> String {
    format!("Successfully imported {count} items.")
}

/// Fails with [`ImportError::QuotaExceeded`] when `incoming` more items
/// would not fit.
pub fn check_quota(quota: i64, existing: usize, incoming: usize) -> Result<(), ImportError> {
    if quota == UNLIMITED_QUOTA {
        return Ok(());
    }
    let limit = usize::try_from(quota).unwrap_or(0);
    if existing.saturating_add(incoming) > limit {
        return Err(ImportError::QuotaExceeded {
            quota,
            existing,
            incoming,
        });
    }
    Ok(())
}

/// Insert a successful result into `vault`, after checking its quota.
///
/// Cancelled and failed results never touch the store.
pub fn commit_import<S: VaultStore>(
    store: &mut S,
    vault: &S::Vault,
    result: ImportResult,
    notifier: &dyn Notifier,
) -> Result<CommitOutcome, ImportError> {
    let items = match result {
        ImportResult::Success(items) => items,
        ImportResult::Cancelled => return Ok(CommitOutcome::Cancelled),
        ImportResult::Failed(failure) => {
            notifier.alert(&failure.message, AlertKind::Error);
            return Ok(CommitOutcome::Failed(failure));
        }
    };

    let quota = store.items_quota(vault);
    let existing = store.item_count(vault);
    if let Err(err) = check_quota(quota, existing, items.len()) {
        tracing::warn!(quota, existing, incoming = items.len(), "Import exceeds vault quota");
        notifier.alert(QUOTA_EXCEEDED_MESSAGE, AlertKind::Warning);
        return Err(err);
    }

    let count = items.len();
    store.add_items(vault, items)?;

    tracing::info!(items = count, "Imported items added to vault");
    notifier.alert(&success_message(count), AlertKind::Success);
    Ok(CommitOutcome::Imported(count))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::pipeline::import::ErrorKind;

    struct MemoryVault {
        quota: i64,
        items: Vec<NormalizedItem>,
    }

    impl VaultStore for MemoryVault {
        type Vault = str;

        fn items_quota(&self, _vault: &str) -> i64 {
            self.quota
        }

        fn item_count(&self, _vault: &str) -> usize {
            self.items.len()
        }

        fn add_items(&mut self, _vault: &str, items: Vec<NormalizedItem>) -> Result<(), ImportError> {
            self.items.extend(items);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Alerts(RefCell<Vec<(String, AlertKind)>>);

    impl Notifier for Alerts {
        fn alert(&self, message: &str, kind: AlertKind) {
            self.0.borrow_mut().push((message.to_string(), kind));
        }
    }

    fn vault(quota: i64, existing: usize) -> MemoryVault {
        MemoryVault {
            quota,
            items: (0..existing).map(|i| NormalizedItem::new(&format!("item {i}"))).collect(),
        }
    }

    fn items(n: usize) -> Vec<NormalizedItem> {
        (0..n).map(|i| NormalizedItem::new(&format!("new {i}"))).collect()
    }

    #[test]
    fn quota_exceeded_inserts_nothing() {
        let mut store = vault(5, 4);
        let alerts = Alerts::default();

        let err = commit_import(&mut store, "main", ImportResult::Success(items(2)), &alerts).unwrap_err();

        assert!(matches!(err, ImportError::QuotaExceeded { quota: 5, existing: 4, incoming: 2 }));
        assert_eq!(store.items.len(), 4);
        assert_eq!(
            alerts.0.borrow().as_slice(),
            [(QUOTA_EXCEEDED_MESSAGE.to_string(), AlertKind::Warning)]
        );
    }

    #[test]
    fn within_quota_inserts_and_reports() {
        let mut store = vault(5, 3);
        let alerts = Alerts::default();

        let outcome = commit_import(&mut store, "main", ImportResult::Success(items(2)), &alerts).unwrap();

        assert_eq!(outcome, CommitOutcome::Imported(2));
        assert_eq!(store.items.len(), 5);
        assert_eq!(alerts.0.borrow()[0].0, "Successfully imported 2 items.");
        assert_eq!(alerts.0.borrow()[0].1, AlertKind::Success);
    }

    #[test]
    fn unlimited_quota() {
        let mut store = vault(UNLIMITED_QUOTA, 10_000);
        let outcome = commit_import(&mut store, "main", ImportResult::Success(items(3)), &Alerts::default()).unwrap();
        assert_eq!(outcome, CommitOutcome::Imported(3));
    }

    #[test]
    fn cancelled_and_failed_never_insert() {
        let mut store = vault(UNLIMITED_QUOTA, 1);
        let alerts = Alerts::default();

        let outcome = commit_import(&mut store, "main", ImportResult::Cancelled, &alerts).unwrap();
        assert_eq!(outcome, CommitOutcome::Cancelled);
        assert!(alerts.0.borrow().is_empty());

        let failure = ImportFailure::from(&ImportError::MalformedInput("bad row".into()));
        let outcome = commit_import(&mut store, "main", ImportResult::Failed(failure), &alerts).unwrap();
        assert!(matches!(outcome, CommitOutcome::Failed(ImportFailure { kind: ErrorKind::MalformedInput, .. })));
        assert_eq!(alerts.0.borrow()[0].1, AlertKind::Error);
        assert_eq!(store.items.len(), 1);
    }

    #[test]
    fn quota_arithmetic() {
        assert!(check_quota(5, 3, 2).is_ok());
        assert!(check_quota(5, 5, 1).is_err());
        assert!(check_quota(0, 0, 1).is_err());
        assert!(check_quota(-1, usize::MAX, 1).is_ok());
    }
}
