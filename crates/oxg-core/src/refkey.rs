//! Reference identity and resolution context.
//!
//! A [`RefKey`] is the canonical identity of a referenced component: the
//! absolute location of its document (empty for the root document) plus the
//! JSON pointer fragment. Two `$ref` strings denote the same component iff
//! their keys are equal after resolving relative locations against the
//! current base.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use url::Url;

use crate::error::ResolveError;

/// Canonical identity of a `$ref` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefKey {
    /// Document location; empty for the root document.
    pub loc: String,
    /// JSON pointer within the document, without the leading `#`.
    pub ptr: String,
}

impl RefKey {
    pub fn local(ptr: impl Into<String>) -> Self {
        Self {
            loc: String::new(),
            ptr: ptr.into(),
        }
    }

    /// Whether this key points into the root document.
    pub fn is_local(&self) -> bool {
        self.loc.is_empty()
    }

    /// The last pointer segment, unescaped. Used as the component short name.
    pub fn short_name(&self) -> Option<String> {
        let token = self.ptr.rsplit('/').next()?;
        if token.is_empty() && self.ptr.is_empty() {
            return None;
        }
        Some(token.replace("~1", "/").replace("~0", "~"))
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.loc, self.ptr)
    }
}

/// Parse a `$ref` string against a base location.
///
/// Pure-fragment refs (`#/...`) stay in the current document. Relative
/// locations are resolved against the base: with a URL base via RFC 3986
/// joining, with a plain file base by path joining.
pub fn key(reference: &str, base: &str) -> Result<RefKey, ResolveError> {
    let bad = || ResolveError::BadReference(reference.to_string());

    let (loc_part, frag) = match reference.split_once('#') {
        Some((l, f)) => (l, f),
        None => (reference, ""),
    };
    if !frag.is_empty() && !frag.starts_with('/') {
        return Err(bad());
    }
    if loc_part.is_empty() && frag.is_empty() {
        return Err(bad());
    }

    let loc = if loc_part.is_empty() {
        base.to_string()
    } else {
        resolve_location(loc_part, base).ok_or_else(bad)?
    };

    Ok(RefKey {
        loc,
        ptr: frag.to_string(),
    })
}

fn resolve_location(loc: &str, base: &str) -> Option<String> {
    if let Ok(url) = Url::parse(loc) {
        return Some(url.to_string());
    }
    if let Ok(base_url) = Url::parse(base) {
        return Some(base_url.join(loc).ok()?.to_string());
    }
    // Plain relative file paths: join against the base's directory.
    let dir = match base.rfind('/') {
        Some(i) => &base[..=i],
        None => "",
    };
    Some(normalize_path(&format!("{dir}{loc}")))
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolution context: a stack of visited keys bounded by a depth limit.
///
/// Every resolver MUST call [`ResolveCtx::enter`] before recursing into a
/// reference target and [`ResolveCtx::leave`] on every exit path.
#[derive(Debug)]
pub struct ResolveCtx {
    depth_limit: usize,
    stack: Vec<RefKey>,
    visited: HashSet<RefKey>,
}

impl ResolveCtx {
    pub fn new(depth_limit: usize) -> Self {
        Self {
            depth_limit,
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Resolve `reference` against the current base location.
    pub fn key(&self, reference: &str) -> Result<RefKey, ResolveError> {
        key(reference, self.current_file())
    }

    pub fn enter(&mut self, key: RefKey) -> Result<(), ResolveError> {
        if self.visited.contains(&key) {
            return Err(ResolveError::InfiniteRecursion(key.to_string()));
        }
        if self.stack.len() >= self.depth_limit {
            return Err(ResolveError::DepthExceeded(self.depth_limit));
        }
        self.visited.insert(key.clone());
        self.stack.push(key);
        Ok(())
    }

    pub fn leave(&mut self, key: &RefKey) {
        if let Some(top) = self.stack.pop() {
            debug_assert_eq!(&top, key, "unbalanced enter/leave");
        }
        self.visited.remove(key);
    }

    /// Location of the document currently being resolved; empty for the root.
    pub fn current_file(&self) -> &str {
        self.stack.last().map(|k| k.loc.as_str()).unwrap_or("")
    }

    /// Whether a key is on the current resolution path. Used to detect
    /// cycle-closing back-edges without failing.
    pub fn in_progress(&self, key: &RefKey) -> bool {
        self.visited.contains(key)
    }
}

/// Evaluate an RFC 6901 JSON pointer against a raw tree.
pub fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for token in pointer.strip_prefix('/')?.split('/') {
        let token = token.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
