//! One-off data migrations.
//!
//! A migration fetches every document of its doctypes, applies a pure
//! transformation and writes the result back in bulk. Runs are dry by
//! default: instead of writing, the run logs a diff of the first changed
//! document per doctype and what it would have done. Nothing is retried and
//! the first failure stops the run.

mod bank_metadata_v1;
mod duplicate_accounts;

pub use duplicate_accounts::find_duplicate_accounts_with_no_operations;

use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use tracing::info;

use crate::client::CozyClient;
use crate::error::MigrationError;

/// The registered migrations, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Stamps `metadata.version = 1` on banking documents and normalizes
    /// operation dates to Paris local time.
    BankMetadataV1,
    /// Deletes bank accounts that duplicate another account of the same
    /// institution and have no operations attached.
    DeleteDuplicateBankAccounts,
}

impl Migration {
    /// Every registered migration, in a stable order.
    pub fn all() -> &'static [Migration] {
        &[
            Migration::BankMetadataV1,
            Migration::DeleteDuplicateBankAccounts,
        ]
    }

    /// CLI name of the migration.
    pub fn name(&self) -> &'static str {
        match self {
            Migration::BankMetadataV1 => "bank-metadata-v1",
            Migration::DeleteDuplicateBankAccounts => "delete-duplicate-bank-accounts",
        }
    }

    /// Looks a migration up by its CLI name.
    pub fn from_name(name: &str) -> Result<Self, MigrationError> {
        Self::all()
            .iter()
            .copied()
            .find(|migration| migration.name() == name)
            .ok_or_else(|| MigrationError::Unknown(name.to_string()))
    }

    /// Doctypes the migration reads.
    pub fn doctypes(&self) -> &'static [&'static str] {
        match self {
            Migration::BankMetadataV1 => bank_metadata_v1::DOCTYPES,
            Migration::DeleteDuplicateBankAccounts => duplicate_accounts::DOCTYPES,
        }
    }

    /// Runs the migration; a dry run reports instead of writing.
    pub async fn run(
        &self,
        client: &CozyClient,
        dry_run: bool,
    ) -> Result<MigrationReport, MigrationError> {
        match self {
            Migration::BankMetadataV1 => bank_metadata_v1::run(client, dry_run).await,
            Migration::DeleteDuplicateBankAccounts => {
                duplicate_accounts::run(client, dry_run).await
            }
        }
    }
}

/// What a migration run did (or, for a dry run, would have done).
#[derive(Debug, PartialEq, Eq)]
pub struct MigrationReport {
    /// Whether writes were skipped.
    pub dry_run: bool,
    /// Per-doctype count of affected documents.
    pub affected: Vec<(String, usize)>,
}

/// Logs a unified diff of the first document `transform` changes, labeled
/// with the store instance. Dry runs use this so the operator can inspect
/// one concrete change before re-running with writes enabled.
pub(crate) fn log_first_diff(instance: &str, doctype: &str, before: &[Value], after: &[Value]) {
    let Some((original, updated)) = before
        .iter()
        .zip(after)
        .find(|(original, updated)| original != updated)
    else {
        info!(instance, "dry run: no {doctype} document would change");
        return;
    };
    info!(
        instance,
        "dry run: first changed {doctype} document:\n{}",
        render_diff(original, updated)
    );
}

fn render_diff(before: &Value, after: &Value) -> String {
    let old = serde_json::to_string_pretty(before).unwrap_or_default();
    let new = serde_json::to_string_pretty(after).unwrap_or_default();
    let diff = TextDiff::from_lines(&old, &new);

    let mut rendered = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        rendered.push_str(sign);
        rendered.push_str(change.value());
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn migrations_resolve_by_name() {
        assert_eq!(
            Migration::from_name("bank-metadata-v1").unwrap(),
            Migration::BankMetadataV1
        );
        assert!(matches!(
            Migration::from_name("nope"),
            Err(MigrationError::Unknown(_))
        ));
    }

    #[test]
    fn every_migration_is_listed_under_its_name() {
        for migration in Migration::all() {
            assert_eq!(Migration::from_name(migration.name()).unwrap(), *migration);
            assert!(!migration.doctypes().is_empty());
        }
    }

    #[test]
    fn render_diff_marks_changed_lines() {
        let before = json!({ "label": "Checking", "balance": 10 });
        let after = json!({ "label": "Checking", "balance": 25 });

        let diff = render_diff(&before, &after);
        assert!(diff.contains("-  \"balance\": 10"));
        assert!(diff.contains("+  \"balance\": 25"));
    }
}
