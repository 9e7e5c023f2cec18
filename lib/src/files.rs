//! File trees for file-backed documents.
//!
//! A document of the file doctype names a local source path (`__SRC__`) and
//! a remote destination (`__DEST__`). The source is walked into a tree
//! description up front so a bad path fails before any remote call, then the
//! tree is uploaded directory-first so parents always exist.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::client::CozyClient;
use crate::error::ImportError;

/// A walked source path: directories and files as paths relative to `root`,
/// in name order with parents before children.
#[derive(Debug, PartialEq, Eq)]
pub struct FileTree {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl FileTree {
    /// Walks `root` into a tree description.
    ///
    /// A single file yields a tree with just that file. Fails with
    /// [`ImportError::FileTree`] when the path does not exist.
    pub fn walk(root: &Path) -> Result<Self, ImportError> {
        if !root.exists() {
            return Err(ImportError::FileTree(root.to_path_buf()));
        }
        if root.is_file() {
            let parent = root.parent().unwrap_or(Path::new("")).to_path_buf();
            let name = root.file_name().map(PathBuf::from).unwrap_or_default();
            return Ok(Self {
                root: parent,
                dirs: Vec::new(),
                files: vec![name],
            });
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            if relative.as_os_str().is_empty() {
                continue;
            }
            if entry.file_type().is_dir() {
                dirs.push(relative);
            } else {
                files.push(relative);
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            dirs,
            files,
        })
    }

    /// Local directory the relative paths are anchored to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative directory paths, parents before children.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Relative file paths.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Uploads `tree` under `dest`, creating directories before the files that
/// live in them. Returns the per-file upload results.
pub async fn upload_tree(
    client: &CozyClient,
    tree: &FileTree,
    dest: &str,
) -> Result<Value, ImportError> {
    if !dest.is_empty() {
        client.create_directory(dest).await?;
    }
    for dir in &tree.dirs {
        client.create_directory(&remote_path(dest, dir)).await?;
    }

    let mut results = Vec::new();
    for file in &tree.files {
        let local = tree.root.join(file);
        debug!(path = %local.display(), "uploading");
        let bytes = tokio::fs::read(&local).await?;
        results.push(client.upload_file(&remote_path(dest, file), bytes).await?);
    }
    Ok(Value::Array(results))
}

/// Joins a destination prefix and a relative path with forward slashes.
fn remote_path(dest: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if dest.is_empty() {
        relative
    } else {
        format!("{}/{}", dest.trim_end_matches('/'), relative)
    }
}
