//! HTTP client for the remote document store.
//!
//! Thin wrapper over [`reqwest`] carrying the store URL and a bearer token.
//! Non-success responses are mapped into the closed [`RemoteError`] set so
//! callers can match on the recognized statuses and print tailored hints.

use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{Value, json};

use crate::error::RemoteError;

/// Authenticated client for one store instance.
#[derive(Debug, Clone)]
pub struct CozyClient {
    http: Client,
    base: String,
    instance: String,
    token: String,
}

impl CozyClient {
    /// Builds a client for the store at `url` using `token` for auth.
    pub fn new(url: &str, token: impl Into<String>) -> Result<Self, RemoteError> {
        let parsed = Url::parse(url).map_err(|_| RemoteError::BadUrl {
            url: url.to_string(),
        })?;
        let instance = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RemoteError::BadUrl {
                    url: url.to_string(),
                });
            }
        };
        Ok(Self {
            http: Client::new(),
            base: url.trim_end_matches('/').to_string(),
            instance,
            token: token.into(),
        })
    }

    /// Host label of the store, used only for log labeling.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Creates a document of `doctype` unconditionally.
    ///
    /// An administrative create: data carrying an `_id` is written in place
    /// of whatever revision exists, bypassing normal conflict checks.
    pub async fn force_create(&self, doctype: &str, data: &Value) -> Result<Value, RemoteError> {
        let request = match data.get("_id").and_then(Value::as_str) {
            Some(id) => self.http.put(self.endpoint(&format!("data/{doctype}/{id}"))),
            None => self.http.post(self.endpoint(&format!("data/{doctype}/"))),
        };
        let response = request
            .bearer_auth(&self.token)
            .json(data)
            .send()
            .await?;
        check(response).await
    }

    /// Fetches every document of `doctype`.
    pub async fn fetch_all(&self, doctype: &str) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .http
            .get(self.endpoint(&format!("data/{doctype}/_all_docs")))
            .query(&[("include_docs", "true")])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body = check(response).await?;
        let rows = body
            .get("rows")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .iter()
            .filter_map(|row| row.get("doc"))
            .filter(|doc| {
                doc.get("_id")
                    .and_then(Value::as_str)
                    .is_none_or(|id| !id.starts_with("_design"))
            })
            .cloned()
            .collect())
    }

    /// Writes back a batch of updated documents in one bulk call.
    pub async fn update_all(&self, doctype: &str, docs: &[Value]) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .http
            .post(self.endpoint(&format!("data/{doctype}/_bulk_docs")))
            .bearer_auth(&self.token)
            .json(&json!({ "docs": docs }))
            .send()
            .await?;
        let body = check(response).await?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    /// Deletes a batch of documents by writing `_deleted` tombstones.
    pub async fn delete_all(&self, doctype: &str, docs: &[Value]) -> Result<Vec<Value>, RemoteError> {
        let tombstones: Vec<Value> = docs
            .iter()
            .cloned()
            .map(|mut doc| {
                if let Value::Object(map) = &mut doc {
                    map.insert("_deleted".to_string(), Value::Bool(true));
                }
                doc
            })
            .collect();
        self.update_all(doctype, &tombstones).await
    }

    /// Creates a directory at `path` in the store's file hierarchy.
    pub async fn create_directory(&self, path: &str) -> Result<Value, RemoteError> {
        let response = self
            .http
            .post(self.endpoint("files/directories"))
            .query(&[("Path", path)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await
    }

    /// Uploads `bytes` as the file at `path`.
    pub async fn upload_file(&self, path: &str, bytes: Vec<u8>) -> Result<Value, RemoteError> {
        let response = self
            .http
            .post(self.endpoint("files/upload"))
            .query(&[("Path", path)])
            .bearer_auth(&self.token)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        check(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

/// Maps a response onto the closed error set, parsing the body as JSON on
/// success.
async fn check(response: Response) -> Result<Value, RemoteError> {
    let status = response.status();
    let url = response.url().to_string();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::BAD_REQUEST => Err(RemoteError::BadRequest {
            reason: server_reason(&body),
        }),
        StatusCode::FORBIDDEN => Err(RemoteError::Forbidden { url }),
        StatusCode::CONFLICT => Err(RemoteError::Conflict { url }),
        _ => Err(RemoteError::Other {
            status: status.as_u16(),
            body,
        }),
    }
}

/// Pulls the server-reported reason out of an error body, falling back to
/// the raw text.
fn server_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
