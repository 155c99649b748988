//! Document loading.
//!
//! The root document is parsed eagerly; external documents referenced by
//! `$ref` are fetched lazily through an [`ExternalResolver`] and cached per
//! location. Resolution is synchronous; the resolver receives a cancellation
//! handle and may stop early by returning an error, which the pipeline
//! propagates unchanged.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::error::{ParseError, ResolveError};
use crate::location::OffsetIndex;

/// Cooperative cancellation handle passed to external resolvers.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fetches external documents by location.
pub trait ExternalResolver {
    fn resolve(&self, location: &str, cancel: &Cancellation) -> Result<Vec<u8>, ResolveError>;
}

/// Default resolver: external references are disabled.
#[derive(Debug, Default)]
pub struct NoExternal;

impl ExternalResolver for NoExternal {
    fn resolve(&self, _location: &str, _cancel: &Cancellation) -> Result<Vec<u8>, ResolveError> {
        Err(ResolveError::ExternalDisabled)
    }
}

/// In-memory resolver over a fixed location → bytes map. Used by tests and
/// by callers that prefetch their documents.
#[derive(Debug, Default)]
pub struct MapResolver {
    documents: HashMap<String, Vec<u8>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, location: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(location.into(), body.into());
        self
    }
}

impl ExternalResolver for MapResolver {
    fn resolve(&self, location: &str, _cancel: &Cancellation) -> Result<Vec<u8>, ResolveError> {
        self.documents
            .get(location)
            .cloned()
            .ok_or_else(|| ResolveError::External {
                url: location.to_string(),
                message: "not found".to_string(),
            })
    }
}

/// Resolver reading documents from the file system, relative to a base
/// directory.
#[derive(Debug)]
pub struct FileResolver {
    base: std::path::PathBuf,
}

impl FileResolver {
    pub fn new(base: impl Into<std::path::PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ExternalResolver for FileResolver {
    fn resolve(&self, location: &str, cancel: &Cancellation) -> Result<Vec<u8>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::External {
                url: location.to_string(),
                message: "cancelled".to_string(),
            });
        }
        std::fs::read(self.base.join(location)).map_err(|e| ResolveError::External {
            url: location.to_string(),
            message: e.to_string(),
        })
    }
}

/// A parsed document: raw tree plus (for JSON inputs) a position index.
#[derive(Debug)]
pub struct Document {
    pub file: String,
    pub text: String,
    pub value: Value,
    pub index: Option<OffsetIndex>,
}

impl Document {
    /// Parse a document, auto-detecting JSON vs. YAML.
    pub fn parse(file: impl Into<String>, text: impl Into<String>) -> Result<Self, ParseError> {
        let file = file.into();
        let text = text.into();
        let json = file.ends_with(".json")
            || matches!(text.trim_start().as_bytes().first(), Some(b'{') | Some(b'['));
        let (value, index) = if json {
            let value: Value = serde_json::from_str(&text)?;
            let index = OffsetIndex::of_json(&text);
            (value, Some(index))
        } else {
            let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(&text)?;
            (yaml_to_json(yaml)?, None)
        };
        Ok(Self {
            file,
            text,
            value,
            index,
        })
    }
}

/// Convert a YAML tree to JSON, rejecting non-string keys. Duplicate mapping
/// keys are already rejected by the YAML deserializer.
fn yaml_to_json(value: serde_yaml_ng::Value) -> Result<Value, ParseError> {
    use serde_yaml_ng::Value as Y;
    Ok(match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            // Round-trip through serde_json's arbitrary-precision number.
            let text = n.to_string();
            serde_json::from_str(&text)
                .map_err(|_| ParseError::InvalidDocument(format!("invalid number {text:?}")))?
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(seq) => Value::Array(
            seq.into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Y::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Y::String(s) => s,
                    other => {
                        return Err(ParseError::InvalidDocument(format!(
                            "mapping key must be a string, got {other:?}"
                        )));
                    }
                };
                out.insert(key, yaml_to_json(v)?);
            }
            Value::Object(out)
        }
        Y::Tagged(tagged) => {
            return Err(ParseError::InvalidDocument(format!(
                "unexpected YAML tag {}",
                tagged.tag
            )));
        }
    })
}

/// Root document plus a lazy cache of external documents.
pub struct DocumentSource {
    pub root: Document,
    resolver: Box<dyn ExternalResolver>,
    cancel: Cancellation,
    cache: HashMap<String, Document>,
}

impl DocumentSource {
    pub fn new(root: Document, resolver: Box<dyn ExternalResolver>) -> Self {
        Self {
            root,
            resolver,
            cancel: Cancellation::default(),
            cache: HashMap::new(),
        }
    }

    /// Root document with external references disabled.
    pub fn local(root: Document) -> Self {
        Self::new(root, Box::new(NoExternal))
    }

    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Document at `location`; empty location means the root. External
    /// documents are fetched once and cached.
    pub fn document(&mut self, location: &str) -> Result<&Document, ResolveError> {
        if location.is_empty() {
            return Ok(&self.root);
        }
        if !self.cache.contains_key(location) {
            let bytes = self.resolver.resolve(location, &self.cancel)?;
            let text = String::from_utf8(bytes).map_err(|e| ResolveError::External {
                url: location.to_string(),
                message: e.to_string(),
            })?;
            let doc =
                Document::parse(location, text).map_err(|e| ResolveError::External {
                    url: location.to_string(),
                    message: e.to_string(),
                })?;
            self.cache.insert(location.to_string(), doc);
        }
        Ok(&self.cache[location])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_by_extension_and_body() {
        let doc = Document::parse("spec.json", r#"{"openapi": "3.0.3"}"#).unwrap();
        assert!(doc.index.is_some());
        let doc = Document::parse("spec", r#"{"openapi": "3.0.3"}"#).unwrap();
        assert!(doc.index.is_some());
        let doc = Document::parse("spec.yaml", "openapi: 3.0.3\n").unwrap();
        assert!(doc.index.is_none());
        assert_eq!(doc.value["openapi"], "3.0.3");
    }

    #[test]
    fn rejects_non_string_keys() {
        let err = Document::parse("spec.yaml", "1: value\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument(_)));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = Document::parse("spec.yaml", "a: 1\na: 2\n");
        assert!(err.is_err());
    }

    #[test]
    fn external_disabled_by_default() {
        let root = Document::parse("spec.yaml", "openapi: 3.0.3\n").unwrap();
        let mut source = DocumentSource::local(root);
        let err = source.document("other.yaml").unwrap_err();
        assert!(matches!(err, ResolveError::ExternalDisabled));
    }

    #[test]
    fn map_resolver_caches() {
        let root = Document::parse("spec.yaml", "openapi: 3.0.3\n").unwrap();
        let resolver = MapResolver::new().insert("pet.json", r#"{"Pet": {}}"#);
        let mut source = DocumentSource::new(root, Box::new(resolver));
        assert!(source.document("pet.json").is_ok());
        assert!(source.document("pet.json").is_ok());
        assert!(source.document("missing.json").is_err());
    }
}
