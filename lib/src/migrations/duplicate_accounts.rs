//! Cleanup of duplicated bank accounts.
//!
//! Some connectors create an account a second time instead of updating the
//! existing one, leaving an empty twin behind. An account is a deletable
//! duplicate when another account of the same institution carries the same
//! label and no operation references it.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use super::MigrationReport;
use crate::client::CozyClient;
use crate::error::MigrationError;

const DOCTYPE_BANK_ACCOUNTS: &str = "io.cozy.bank.accounts";
const DOCTYPE_BANK_OPERATIONS: &str = "io.cozy.bank.operations";

pub(super) const DOCTYPES: &[&str] = &[DOCTYPE_BANK_ACCOUNTS, DOCTYPE_BANK_OPERATIONS];

pub(super) async fn run(
    client: &CozyClient,
    dry_run: bool,
) -> Result<MigrationReport, MigrationError> {
    let accounts = client.fetch_all(DOCTYPE_BANK_ACCOUNTS).await?;
    let operations = client.fetch_all(DOCTYPE_BANK_OPERATIONS).await?;

    let duplicates = find_duplicate_accounts_with_no_operations(&accounts, &operations);
    let ids: Vec<&str> = duplicates
        .iter()
        .filter_map(|account| account.get("_id").and_then(Value::as_str))
        .collect();

    if dry_run {
        info!(
            instance = client.instance(),
            "Would delete {} duplicate account(s): {ids:?}",
            duplicates.len()
        );
    } else {
        if !duplicates.is_empty() {
            client
                .delete_all(DOCTYPE_BANK_ACCOUNTS, &duplicates)
                .await?;
        }
        info!(
            instance = client.instance(),
            "Has deleted {} duplicate account(s): {ids:?}",
            duplicates.len()
        );
    }

    Ok(MigrationReport {
        dry_run,
        affected: vec![(DOCTYPE_BANK_ACCOUNTS.to_string(), duplicates.len())],
    })
}

/// Accounts that duplicate another account of the same institution and have
/// no operations attached, in input order.
///
/// Accounts are grouped by institution label and account label; only groups
/// with more than one member can contain duplicates, so two same-labeled
/// accounts at different institutions are never duplicates of each other.
pub fn find_duplicate_accounts_with_no_operations(
    accounts: &[Value],
    operations: &[Value],
) -> Vec<Value> {
    let mut operation_counts: HashMap<&str, usize> = HashMap::new();
    for operation in operations {
        if let Some(account_id) = operation.get("account").and_then(Value::as_str) {
            *operation_counts.entry(account_id).or_insert(0) += 1;
        }
    }

    let mut group_sizes: HashMap<(&str, &str), usize> = HashMap::new();
    for account in accounts {
        *group_sizes.entry(group_key(account)).or_insert(0) += 1;
    }

    accounts
        .iter()
        .filter(|account| {
            let duplicated = group_sizes
                .get(&group_key(account))
                .is_some_and(|size| *size > 1);
            let operations_attached = account
                .get("_id")
                .and_then(Value::as_str)
                .map_or(0, |id| operation_counts.get(id).copied().unwrap_or(0));
            duplicated && operations_attached == 0
        })
        .cloned()
        .collect()
}

fn group_key(account: &Value) -> (&str, &str) {
    let institution = account
        .get("institutionLabel")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let label = account.get("label").and_then(Value::as_str).unwrap_or_default();
    (institution, label)
}
