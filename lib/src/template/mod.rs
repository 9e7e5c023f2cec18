//! Two-pass template rendering for fixture files.
//!
//! A fixture template is rendered twice over the lifetime of one import:
//!
//! 1. **Load-time pass** ([`Renderer::render_template`]): fixture helpers
//!    (`repeat`, `int`, `firstName`, ...) expand into literal JSON once for
//!    the whole file, while the deferred `dir` and `metadata` directives
//!    re-emit themselves verbatim so the next pass can still find them.
//! 2. **Per-document pass** ([`resolve::resolve_document`]): just before a
//!    document is created, its remaining placeholders are parsed into a
//!    typed representation and substituted with the template's directory and
//!    live lookups into the metadata store.
//!
//! Splitting the passes lets bulk fixture generation happen once globally
//! while each document can still reference the concrete creation results of
//! the documents inserted immediately before it.

mod config;
mod fixtures;
pub mod resolve;

pub use config::{HelperConfig, HelperSpec};
pub use resolve::{ResolveContext, resolve_document};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, no_escape,
};
use serde_json::Value;

use crate::error::ImportError;

/// Load-time template renderer.
///
/// Carries a Handlebars registry with the fixture helpers, the two built-in
/// passthrough directives (`dir`, `metadata`) and any user overrides merged
/// on top, last write wins.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Renderer with the built-in helpers only.
    pub fn new() -> Self {
        Self::with_overrides(&HelperConfig::default())
    }

    /// Renderer with `overrides` merged over the built-in helpers.
    ///
    /// Overrides are registered last, so a config entry named like a
    /// built-in (including `dir` or `metadata`) shadows it.
    pub fn with_overrides(overrides: &HelperConfig) -> Self {
        let mut registry = Handlebars::new();
        // The output is JSON, not HTML.
        registry.register_escape_fn(no_escape);
        fixtures::register(&mut registry);
        registry.register_helper("dir", Box::new(Passthrough { name: "dir" }));
        registry.register_helper("metadata", Box::new(Passthrough { name: "metadata" }));
        overrides.register(&mut registry);
        Self { registry }
    }

    /// Load-time pass: expands fixture directives into literal JSON text.
    ///
    /// `dir` and `metadata` directives survive this pass unevaluated; the
    /// per-document pass resolves them against the template directory and
    /// the metadata store.
    pub fn render_template(&self, text: &str) -> Result<String, ImportError> {
        Ok(self.registry.render_template(text, &Value::Null)?)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-emits its own invocation, single-quoting string parameters, so the
/// directive comes out of the load-time pass byte-identical to its input
/// form and the per-document pass can still parse it.
struct Passthrough {
    name: &'static str,
}

impl HelperDef for Passthrough {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let mut emitted = format!("{{{{ {}", self.name);
        for param in h.params() {
            emitted.push(' ');
            match param.value() {
                Value::String(s) => {
                    emitted.push('\'');
                    emitted.push_str(s);
                    emitted.push('\'');
                }
                value => emitted.push_str(&value.to_string()),
            }
        }
        emitted.push_str(" }}");
        out.write(&emitted)?;
        Ok(())
    }
}
