//! Fixture import pipeline.
//!
//! Reads a templated JSON description of documents, renders it in two passes
//! and creates every document one at a time, in template order. Each
//! creation result is recorded in a [`MetadataStore`] owned by the run, so a
//! document can reference the results of the documents created immediately
//! before it. The first failure anywhere stops the remaining work.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::CozyClient;
use crate::error::{ImportError, RemoteError};
use crate::files::{FileTree, upload_tree};
use crate::metadata::MetadataStore;
use crate::serial::run_serially;
use crate::template::{HelperConfig, Renderer, ResolveContext, resolve_document};

/// Doctype whose documents describe files to upload instead of records to
/// create.
pub const FILE_DOCTYPE: &str = "io.cozy.files";

/// Ordered mapping of doctype to the documents to create, in template order.
pub type DocumentSet = serde_json::Map<String, Value>;

/// Parses rendered template text into a [`DocumentSet`].
///
/// The text must be a JSON object mapping each doctype to an array of
/// document descriptions.
pub fn parse_document_set(rendered: &str) -> Result<DocumentSet, ImportError> {
    let value: Value = serde_json::from_str(rendered)?;
    let Value::Object(set) = value else {
        return Err(ImportError::NotADocumentSet);
    };
    if set.values().any(|docs| !docs.is_array()) {
        return Err(ImportError::NotADocumentSet);
    }
    Ok(set)
}

/// Imports the fixture file at `path`.
///
/// Runs the load-time template pass with the built-in helpers plus the
/// overrides from `helpers` (when given), parses the result into a
/// [`DocumentSet`] and hands it to [`import_data`] with the `dir`
/// placeholder bound to the template's containing directory.
pub async fn import_file(
    client: &CozyClient,
    path: &Path,
    helpers: Option<&Path>,
) -> Result<Vec<(String, usize)>, ImportError> {
    let text = tokio::fs::read_to_string(path).await?;
    let template_dir = tokio::fs::canonicalize(path)
        .await?
        .parent()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();

    let overrides = match helpers {
        Some(config) => HelperConfig::load(config)?,
        None => HelperConfig::default(),
    };
    let renderer = Renderer::with_overrides(&overrides);
    let rendered = renderer.render_template(&text)?;
    let documents = parse_document_set(&rendered)?;

    import_data(client, &documents, &template_dir).await
}

/// Creates every document in `documents`, doctype by doctype, one document
/// at a time.
///
/// Returns the per-doctype creation counts, or the first failure
/// encountered anywhere in the nested serial execution.
pub async fn import_data(
    client: &CozyClient,
    documents: &DocumentSet,
    template_dir: &str,
) -> Result<Vec<(String, usize)>, ImportError> {
    let mut metadata = MetadataStore::new();
    run_serially(documents.iter(), async |(doctype, docs)| {
        let docs = docs.as_array().ok_or(ImportError::NotADocumentSet)?;
        let results = run_serially(docs.iter(), async |doc| {
            create_doc(client, template_dir, &mut metadata, doctype, doc).await
        })
        .await?;

        debug!(doctype = doctype.as_str(), ?results, "created documents");
        info!(
            "Imported {} {} document{}",
            results.len(),
            doctype,
            if results.len() == 1 { "" } else { "s" }
        );
        let ids: Vec<&str> = results
            .iter()
            .filter_map(|result| result.get("_id").and_then(Value::as_str))
            .collect();
        info!(?ids, "created identifiers");

        Ok((doctype.clone(), results.len()))
    })
    .await
}

/// Resolves one description against the current metadata, creates it
/// remotely, and records the result so later documents can reference it.
async fn create_doc(
    client: &CozyClient,
    template_dir: &str,
    metadata: &mut MetadataStore,
    doctype: &str,
    description: &Value,
) -> Result<Value, ImportError> {
    let resolved = {
        let ctx = ResolveContext {
            dir: template_dir,
            metadata,
        };
        resolve_document(description, &ctx)?
    };
    match create_document(client, doctype, &resolved).await {
        Ok(result) => {
            metadata.save(doctype, result.clone());
            Ok(result)
        }
        Err(err) => {
            log_creation_failure(&err);
            Err(err)
        }
    }
}

/// Turns one resolved description into a created remote document.
///
/// Documents of [`FILE_DOCTYPE`] must carry `__SRC__` and `__DEST__`; their
/// source path is walked and uploaded. Everything else is force-created,
/// bypassing normal conflict checks.
pub async fn create_document(
    client: &CozyClient,
    doctype: &str,
    data: &Value,
) -> Result<Value, ImportError> {
    if doctype == FILE_DOCTYPE {
        let src = data.get("__SRC__").and_then(Value::as_str);
        let dest = data.get("__DEST__").and_then(Value::as_str);
        let (Some(src), Some(dest)) = (src, dest) else {
            return Err(ImportError::MissingSrcDest);
        };
        let tree = FileTree::walk(Path::new(src))?;
        upload_tree(client, &tree, dest).await
    } else {
        Ok(client.force_create(doctype, data).await?)
    }
}

/// Logs a hint for the recognized remote failure kinds before the error
/// propagates and stops the run.
fn log_creation_failure(err: &ImportError) {
    let ImportError::Remote(remote) = err else {
        warn!("could not create document: {err}");
        return;
    };
    match remote {
        RemoteError::BadRequest { reason } => warn!("server rejected the document: {reason}"),
        RemoteError::Forbidden { url } => warn!(
            "{url} replied with 403 forbidden; check that the token is still valid and \
             carries the needed permissions, and generate a fresh one if not"
        ),
        RemoteError::Conflict { url } => warn!("document update conflict: {url}"),
        RemoteError::BadUrl { url } => warn!("invalid store url: {url}"),
        RemoteError::Other { status, body } => {
            warn!("remote call failed with status {status}: {body}");
        }
        RemoteError::Transport(transport) => warn!("remote call failed: {transport}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CozyClient {
        CozyClient::new(&server.uri(), "test-token").unwrap()
    }

    #[test]
    fn a_document_set_must_map_doctypes_to_arrays() {
        assert!(parse_document_set(r#"{ "io.cozy.contacts": [] }"#).is_ok());
        assert!(matches!(
            parse_document_set(r#"[1, 2]"#),
            Err(ImportError::NotADocumentSet)
        ));
        assert!(matches!(
            parse_document_set(r#"{ "io.cozy.contacts": {} }"#),
            Err(ImportError::NotADocumentSet)
        ));
        assert!(matches!(
            parse_document_set("not json"),
            Err(ImportError::Parse(_))
        ));
    }

    #[test]
    fn document_set_keeps_template_order() {
        let set = parse_document_set(
            r#"{ "io.cozy.z": [], "io.cozy.a": [], "io.cozy.m": [] }"#,
        )
        .unwrap();
        let doctypes: Vec<&String> = set.keys().collect();
        assert_eq!(doctypes, ["io.cozy.z", "io.cozy.a", "io.cozy.m"]);
    }

    #[tokio::test]
    async fn a_document_can_reference_the_one_created_before_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.contacts/"))
            .and(body_partial_json(json!({ "name": "first" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "_id": "contact-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.contacts/"))
            .and(body_partial_json(
                json!({ "name": "second", "friend": "contact-1" }),
            ))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "_id": "contact-2" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let documents = parse_document_set(
            r#"{
                "io.cozy.contacts": [
                    { "name": "first" },
                    { "name": "second", "friend": "{{ metadata 'io.cozy.contacts' 0 '_id' }}" }
                ]
            }"#,
        )
        .unwrap();

        let summary = import_data(&client_for(&server), &documents, "/fixtures")
            .await
            .unwrap();
        assert_eq!(summary, vec![("io.cozy.contacts".to_string(), 2)]);
    }

    #[tokio::test]
    async fn referencing_an_uncreated_index_stops_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.contacts/"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "_id": "contact-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let documents = parse_document_set(
            r#"{
                "io.cozy.contacts": [
                    { "name": "first" },
                    { "friend": "{{ metadata 'io.cozy.contacts' 1 '_id' }}" },
                    { "name": "never reached" }
                ]
            }"#,
        )
        .unwrap();

        let err = import_data(&client_for(&server), &documents, "/")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingReference { index: 1, .. }));
    }

    #[tokio::test]
    async fn a_failed_creation_stops_later_doctypes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.contacts/"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.bank.accounts/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "x" })))
            .expect(0)
            .mount(&server)
            .await;

        let documents = parse_document_set(
            r#"{
                "io.cozy.contacts": [{ "name": "conflicting" }],
                "io.cozy.bank.accounts": [{ "label": "never created" }]
            }"#,
        )
        .unwrap();

        let err = import_data(&client_for(&server), &documents, "/")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::Remote(RemoteError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn a_file_document_without_src_and_dest_fails_before_any_remote_call() {
        let server = MockServer::start().await;

        let documents = parse_document_set(
            r#"{ "io.cozy.files": [{ "__SRC__": "/somewhere" }] }"#,
        )
        .unwrap();

        let err = import_data(&client_for(&server), &documents, "/")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingSrcDest));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_file_document_uploads_its_tree() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/directories"))
            .and(query_param("Path", "Backup"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "dir-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files/upload"))
            .and(query_param("Path", "Backup/notes.txt"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "file-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("notes.txt"), b"remember").unwrap();

        let documents = parse_document_set(&format!(
            r#"{{ "io.cozy.files": [{{ "__SRC__": "{}", "__DEST__": "Backup" }}] }}"#,
            src.path().display()
        ))
        .unwrap();

        let summary = import_data(&client_for(&server), &documents, "/")
            .await
            .unwrap();
        assert_eq!(summary, vec![("io.cozy.files".to_string(), 1)]);
    }

    #[tokio::test]
    async fn import_file_binds_dir_to_the_template_directory() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/io.cozy.contacts/"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "_id": "contact-1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("example-data.json");
        fs::write(
            &template,
            r#"{ "io.cozy.contacts": [{ "name": "{{firstName}}", "avatar": "{{ dir }}/avatar.png" }] }"#,
        )
        .unwrap();

        let summary = import_file(&client_for(&server), &template, None)
            .await
            .unwrap();
        assert_eq!(summary, vec![("io.cozy.contacts".to_string(), 1)]);

        let canonical = fs::canonicalize(dir.path()).unwrap();
        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["avatar"],
            json!(format!("{}/avatar.png", canonical.display()))
        );
        assert!(!body["name"].as_str().unwrap().is_empty());
    }
}
