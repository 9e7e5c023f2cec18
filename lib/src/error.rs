//! Error types for the cozy-admin library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the fixture importer.
///
/// Every variant is fatal for the import run: the serial creation chain
/// stops at the first failure and nothing is retried or rolled back.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The load-time template pass failed to render.
    #[error("template render failed: {0}")]
    Render(#[from] handlebars::RenderError),

    /// The rendered template text is not valid JSON.
    #[error("rendered template is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The rendered template is not a doctype-to-documents mapping.
    #[error("template must render to an object mapping each doctype to an array of documents")]
    NotADocumentSet,

    /// A metadata placeholder referenced a document that has not been
    /// created yet (or never will be).
    #[error("no metadata recorded for {doctype}[{index}]")]
    MissingReference {
        /// Doctype addressed by the placeholder.
        doctype: String,
        /// Zero-based creation index addressed by the placeholder.
        index: usize,
    },

    /// A file document was missing `__SRC__` or `__DEST__`.
    #[error("file document needs both __SRC__ and __DEST__")]
    MissingSrcDest,

    /// The `__SRC__` path did not resolve to a file tree.
    #[error("no file tree at {0}")]
    FileTree(PathBuf),

    /// Reading the template or a file to upload failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors returned by the remote document store.
///
/// The recognized HTTP statuses form a closed set so callers can match
/// exhaustively and print a tailored hint for each.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store URL did not parse.
    #[error("invalid store url: {url}")]
    BadUrl {
        /// The offending URL as given.
        url: String,
    },

    /// 400: the server rejected the request body.
    #[error("bad request: {reason}")]
    BadRequest {
        /// Server-reported reason.
        reason: String,
    },

    /// 403: the token is stale or lacks a permission.
    #[error("forbidden: {url}")]
    Forbidden {
        /// The URL that was refused.
        url: String,
    },

    /// 409: document update conflict.
    #[error("document update conflict: {url}")]
    Conflict {
        /// The URL of the conflicting write.
        url: String,
    },

    /// Any other non-success status.
    #[error("remote call failed with status {status}: {body}")]
    Other {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors surfaced by the one-off data migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// No migration is registered under the given name.
    #[error("unknown migration: {0}")]
    Unknown(String),

    /// A fetch or write against the store failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
