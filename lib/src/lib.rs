//! Admin library for a Cozy-style document store.
//!
//! Everything here drives the store through its HTTP client API, strictly
//! sequentially. Two command families share the library:
//!
//! ## Fixture import
//!
//! - [`import_file`] / [`import_data`] - render a templated JSON description
//!   of documents and create them one at a time, in template order
//! - [`Renderer`] - the load-time template pass (fixture helpers plus the
//!   deferred `dir` and `metadata` directives)
//! - [`MetadataStore`] - creation results recorded during a run, addressed
//!   by doctype and creation index from `metadata` placeholders
//! - [`run_serially`] - the ordering guarantee the index addressing relies on
//!
//! ## Data migrations
//!
//! - [`Migration`] - the closed set of one-off migrations, each with a
//!   dry-run mode that prints a diff instead of writing
//!
//! ## Shared plumbing
//!
//! - [`CozyClient`] - authenticated HTTP wrapper for one store instance
//! - [`ImportError`] / [`MigrationError`] / [`RemoteError`] - the error
//!   taxonomy; remote failures are a closed set matched exhaustively

pub mod client;
pub mod error;
pub mod files;
pub mod import;
pub mod metadata;
pub mod migrations;
pub mod serial;
pub mod template;

pub use client::CozyClient;
pub use error::{ImportError, MigrationError, RemoteError};
pub use files::{FileTree, upload_tree};
pub use import::{
    DocumentSet, FILE_DOCTYPE, create_document, import_data, import_file, parse_document_set,
};
pub use metadata::MetadataStore;
pub use migrations::{
    Migration, MigrationReport, find_duplicate_accounts_with_no_operations,
};
pub use serial::run_serially;
pub use template::{HelperConfig, Renderer, ResolveContext, resolve_document};
