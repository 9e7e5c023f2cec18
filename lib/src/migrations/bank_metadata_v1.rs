//! First banking metadata migration.
//!
//! Stamps `metadata.version = 1` on accounts, operations and settings, and
//! rewrites operation dates to Paris local time so every stored date carries
//! an explicit offset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Europe::Paris;
use serde_json::{Value, json};
use tracing::info;

use super::{MigrationReport, log_first_diff};
use crate::client::CozyClient;
use crate::error::MigrationError;

const DOCTYPE_BANK_OPERATIONS: &str = "io.cozy.bank.operations";
const DOCTYPE_BANK_ACCOUNTS: &str = "io.cozy.bank.accounts";
const DOCTYPE_BANK_SETTINGS: &str = "io.cozy.bank.settings";

pub(super) const DOCTYPES: &[&str] = &[
    DOCTYPE_BANK_OPERATIONS,
    DOCTYPE_BANK_ACCOUNTS,
    DOCTYPE_BANK_SETTINGS,
];

pub(super) async fn run(
    client: &CozyClient,
    dry_run: bool,
) -> Result<MigrationReport, MigrationError> {
    let accounts = client.fetch_all(DOCTYPE_BANK_ACCOUNTS).await?;
    let operations = client.fetch_all(DOCTYPE_BANK_OPERATIONS).await?;
    let settings = client.fetch_all(DOCTYPE_BANK_SETTINGS).await?;

    let updated_accounts: Vec<Value> = accounts.iter().map(stamped).collect();
    let updated_operations: Vec<Value> = operations.iter().map(migrate_operation).collect();
    let updated_settings: Vec<Value> = settings.iter().map(stamped).collect();

    if dry_run {
        log_first_diff(
            client.instance(),
            DOCTYPE_BANK_ACCOUNTS,
            &accounts,
            &updated_accounts,
        );
        log_first_diff(
            client.instance(),
            DOCTYPE_BANK_OPERATIONS,
            &operations,
            &updated_operations,
        );
        log_first_diff(
            client.instance(),
            DOCTYPE_BANK_SETTINGS,
            &settings,
            &updated_settings,
        );
    } else {
        client
            .update_all(DOCTYPE_BANK_ACCOUNTS, &updated_accounts)
            .await?;
        client
            .update_all(DOCTYPE_BANK_OPERATIONS, &updated_operations)
            .await?;
        client
            .update_all(DOCTYPE_BANK_SETTINGS, &updated_settings)
            .await?;
    }

    let verb = if dry_run { "Would update" } else { "Has updated" };
    let affected = vec![
        (DOCTYPE_BANK_ACCOUNTS.to_string(), updated_accounts.len()),
        (DOCTYPE_BANK_OPERATIONS.to_string(), updated_operations.len()),
        (DOCTYPE_BANK_SETTINGS.to_string(), updated_settings.len()),
    ];
    for (doctype, count) in &affected {
        info!(instance = client.instance(), "{verb} {count} {doctype}");
    }

    Ok(MigrationReport { dry_run, affected })
}

/// The document with `metadata.version = 1` stamped on.
fn stamped(doc: &Value) -> Value {
    let mut updated = doc.clone();
    if let Value::Object(map) = &mut updated {
        map.insert("metadata".to_string(), json!({ "version": 1 }));
    }
    updated
}

/// Stamps the operation and rewrites its `date` and `dateOperation` fields
/// to Paris local time. Dates that do not parse are left untouched.
fn migrate_operation(doc: &Value) -> Value {
    let mut updated = stamped(doc);
    for key in ["date", "dateOperation"] {
        let paris = updated
            .get(key)
            .and_then(Value::as_str)
            .and_then(paris_time);
        if let Some(rewritten) = paris {
            updated[key] = Value::String(rewritten);
        }
    }
    updated
}

/// Renders a stored date in Paris local time, `YYYY-MM-DD HH:MM:SS+offset`.
fn paris_time(raw: &str) -> Option<String> {
    let utc = parse_utc(raw)?;
    Some(
        utc.with_timezone(&Paris)
            .format("%Y-%m-%d %H:%M:%S%z")
            .to_string(),
    )
}

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn winter_dates_get_the_cet_offset() {
        assert_eq!(
            paris_time("2018-01-15T10:00:00Z").unwrap(),
            "2018-01-15 11:00:00+0100"
        );
    }

    #[test]
    fn summer_dates_get_the_cest_offset() {
        assert_eq!(
            paris_time("2018-06-15T10:00:00Z").unwrap(),
            "2018-06-15 12:00:00+0200"
        );
    }

    #[test]
    fn bare_dates_are_taken_as_utc_midnight() {
        assert_eq!(
            paris_time("2018-01-15").unwrap(),
            "2018-01-15 01:00:00+0100"
        );
    }

    #[test]
    fn unparseable_dates_are_left_untouched() {
        assert!(paris_time("not a date").is_none());

        let operation = json!({ "_id": "op-1", "date": "whenever" });
        let migrated = migrate_operation(&operation);
        assert_eq!(migrated["date"], "whenever");
        assert_eq!(migrated["metadata"], json!({ "version": 1 }));
    }

    #[test]
    fn operations_get_both_date_fields_rewritten() {
        let operation = json!({
            "_id": "op-1",
            "date": "2018-06-15T10:00:00Z",
            "dateOperation": "2018-06-16T08:30:00Z",
            "amount": -12.5
        });

        let migrated = migrate_operation(&operation);
        assert_eq!(migrated["date"], "2018-06-15 12:00:00+0200");
        assert_eq!(migrated["dateOperation"], "2018-06-16 10:30:00+0200");
        assert_eq!(migrated["amount"], json!(-12.5));
        assert_eq!(migrated["metadata"], json!({ "version": 1 }));
    }

    #[test]
    fn operations_without_date_operation_keep_only_date() {
        let operation = json!({ "_id": "op-1", "date": "2018-01-15T10:00:00Z" });

        let migrated = migrate_operation(&operation);
        assert_eq!(migrated["date"], "2018-01-15 11:00:00+0100");
        assert!(migrated.get("dateOperation").is_none());
    }

    fn all_docs_body(docs: &[Value]) -> Value {
        json!({ "rows": docs.iter().map(|doc| json!({ "doc": doc })).collect::<Vec<_>>() })
    }

    #[tokio::test]
    async fn a_dry_run_fetches_but_never_writes() {
        let server = MockServer::start().await;
        for doctype in DOCTYPES {
            Mock::given(method("GET"))
                .and(path(format!("/data/{doctype}/_all_docs")))
                .respond_with(ResponseTemplate::new(200).set_body_json(all_docs_body(&[
                    json!({ "_id": "doc-1", "date": "2018-01-15T10:00:00Z" }),
                ])))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/data/{doctype}/_bulk_docs")))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
                .expect(0)
                .mount(&server)
                .await;
        }

        let client = CozyClient::new(&server.uri(), "t").unwrap();
        let report = run(&client, true).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.affected.len(), 3);
        assert!(report.affected.iter().all(|(_, count)| *count == 1));
    }

    #[tokio::test]
    async fn a_live_run_bulk_writes_every_doctype() {
        let server = MockServer::start().await;
        for doctype in DOCTYPES {
            Mock::given(method("GET"))
                .and(path(format!("/data/{doctype}/_all_docs")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(all_docs_body(&[json!({ "_id": "doc-1" })])),
                )
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/data/{doctype}/_bulk_docs")))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = CozyClient::new(&server.uri(), "t").unwrap();
        let report = run(&client, false).await.unwrap();
        assert!(!report.dry_run);
    }
}
