//! Declarative helper overrides.
//!
//! The importer accepts an optional JSON config file whose entries are
//! merged over the built-in template helpers, last write wins. Each entry
//! maps a helper name to either a fixed string or a list of strings; list
//! helpers pick one entry at random per invocation:
//!
//! ```json
//! {
//!   "bankLabel": "Checking account",
//!   "category": ["groceries", "rent", "salary"]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
};
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::ImportError;

/// Helper overrides loaded from a JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HelperConfig {
    helpers: BTreeMap<String, HelperSpec>,
}

/// One override: a fixed replacement or a pick-one list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HelperSpec {
    /// Always renders this exact string.
    Fixed(String),
    /// Renders one of these strings, chosen at random per invocation.
    OneOf(Vec<String>),
}

impl HelperConfig {
    /// Loads overrides from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Registers every override on `registry`, shadowing any helper already
    /// registered under the same name.
    pub(crate) fn register(&self, registry: &mut Handlebars<'static>) {
        for (name, spec) in &self.helpers {
            registry.register_helper(name, Box::new(Override { spec: spec.clone() }));
        }
    }
}

struct Override {
    spec: HelperSpec,
}

impl HelperDef for Override {
    fn call<'reg: 'rc, 'rc>(
        &self,
        _: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        match &self.spec {
            HelperSpec::Fixed(value) => out.write(value)?,
            HelperSpec::OneOf(values) => {
                if let Some(choice) = values.choose(&mut rand::thread_rng()) {
                    out.write(choice)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_fixed_and_list_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "label": "fixed", "tags": ["a", "b"] }}"#).unwrap();

        let config = HelperConfig::load(file.path()).unwrap();
        assert!(matches!(config.helpers.get("label"), Some(HelperSpec::Fixed(v)) if v == "fixed"));
        assert!(matches!(config.helpers.get("tags"), Some(HelperSpec::OneOf(v)) if v.len() == 2));
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = HelperConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }
}
