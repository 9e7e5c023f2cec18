//! Creation results recorded during an import run.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ImportError;

/// Append-ordered record of creation results, keyed by doctype.
///
/// The i-th entry for a doctype corresponds exactly to the i-th document of
/// that doctype in the source template, so a
/// `{{ metadata 'doctype' index 'field' }}` placeholder can address the
/// result of an earlier creation by position. Owned by a single import run
/// and discarded with it; never a process-wide singleton.
#[derive(Debug, Default)]
pub struct MetadataStore {
    results: HashMap<String, Vec<Value>>,
}

impl MetadataStore {
    /// Creates an empty store for one import run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the creation result for `doctype`.
    pub fn save(&mut self, doctype: &str, result: Value) {
        self.results
            .entry(doctype.to_string())
            .or_default()
            .push(result);
    }

    /// Returns `field` of the `index`-th result saved for `doctype`.
    ///
    /// Fails with [`ImportError::MissingReference`] when nothing has been
    /// recorded at `index` (the template references a document that has not
    /// been created) or when the recorded result has no such field. Never
    /// silently produces a null.
    pub fn get(&self, doctype: &str, index: usize, field: &str) -> Result<Value, ImportError> {
        self.results
            .get(doctype)
            .and_then(|entries| entries.get(index))
            .and_then(|entry| entry.get(field))
            .cloned()
            .ok_or_else(|| ImportError::MissingReference {
                doctype: doctype.to_string(),
                index,
            })
    }

    /// Number of results recorded for `doctype`.
    pub fn count(&self, doctype: &str) -> usize {
        self.results.get(doctype).map_or(0, Vec::len)
    }
}
