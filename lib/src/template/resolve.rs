//! Per-document placeholder resolution.
//!
//! The load-time pass leaves `{{ dir }}` and `{{ metadata ... }}` directives
//! in the rendered JSON. Just before a document is created, its strings are
//! parsed into typed segments and substituted against the template directory
//! and the live [`MetadataStore`] — no second textual render.

use serde_json::Value;

use crate::error::ImportError;
use crate::metadata::MetadataStore;

/// Bindings for one per-document resolution pass.
pub struct ResolveContext<'a> {
    /// Absolute directory containing the template file.
    pub dir: &'a str,
    /// Creation results recorded so far in this import run.
    pub metadata: &'a MetadataStore,
}

/// One piece of a string after placeholder parsing.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    /// Literal text, emitted as-is.
    Text(String),
    /// `{{ dir }}`: the template file's containing directory.
    Dir,
    /// `{{ metadata 'doctype' index 'field' }}`: a field of an earlier
    /// creation result, addressed by doctype and creation index.
    Metadata {
        doctype: String,
        index: usize,
        field: String,
    },
}

/// Resolves every placeholder in `value`, walking objects and arrays.
///
/// Key order is preserved. A string that consists of exactly one metadata
/// placeholder takes the referenced value with its JSON type intact; mixed
/// text concatenates display forms. Spans that look like directives but do
/// not parse as one stay literal, so a typo is visible in the created
/// document instead of rendering empty.
pub fn resolve_document(value: &Value, ctx: &ResolveContext<'_>) -> Result<Value, ImportError> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_document(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_document(item, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(raw: &str, ctx: &ResolveContext<'_>) -> Result<Value, ImportError> {
    let segments = parse_segments(raw);
    if let [only] = segments.as_slice() {
        return match only {
            Segment::Text(text) => Ok(Value::String(text.clone())),
            Segment::Dir => Ok(Value::String(ctx.dir.to_string())),
            Segment::Metadata {
                doctype,
                index,
                field,
            } => ctx.metadata.get(doctype, *index, field),
        };
    }

    let mut rendered = String::new();
    for segment in &segments {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Dir => rendered.push_str(ctx.dir),
            Segment::Metadata {
                doctype,
                index,
                field,
            } => match ctx.metadata.get(doctype, *index, field)? {
                Value::String(s) => rendered.push_str(&s),
                other => rendered.push_str(&other.to_string()),
            },
        }
    }
    Ok(Value::String(rendered))
}

/// Splits a string into literal text and recognized placeholders.
fn parse_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        let (before, tail) = rest.split_at(start);
        literal.push_str(before);
        let Some(end) = tail.find("}}") else {
            // Unterminated braces stay literal.
            literal.push_str(tail);
            rest = "";
            break;
        };
        match parse_placeholder(&tail[2..end]) {
            Some(segment) => {
                if !literal.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            None => literal.push_str(&tail[..end + 2]),
        }
        rest = &tail[end + 2..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    segments
}

fn parse_placeholder(inner: &str) -> Option<Segment> {
    let tokens = tokenize(inner)?;
    match tokens.split_first()? {
        (name, []) if name.as_str() == "dir" => Some(Segment::Dir),
        (name, [doctype, index, field]) if name.as_str() == "metadata" => Some(Segment::Metadata {
            doctype: doctype.clone(),
            index: index.parse().ok()?,
            field: field.clone(),
        }),
        _ => None,
    }
}

/// Whitespace-separated tokens; single- or double-quoted tokens may contain
/// whitespace and come back unquoted. `None` on an unterminated quote.
fn tokenize(inner: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = inner.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some(ch) if ch == c => break,
                    Some(ch) => token.push(ch),
                    None => return None,
                }
            }
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
            tokens.push(token);
        }
    }
    Some(tokens)
}
