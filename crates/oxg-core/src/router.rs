//! Per-method routing trees built over parsed operation paths.
//!
//! Literal runs are merged radix-style so a shared prefix appears exactly
//! once per tree. Each node carries at most one parameter edge; literal
//! edges shadow it at dispatch.

use indexmap::IndexMap;

use crate::error::IrError;
use crate::openapi::{Path, PathSegment};

/// One node of a method tree.
#[derive(Debug, Default)]
pub struct Node {
    /// Literal edges, sorted by label. Labels are prefix-free: splitting on
    /// insert guarantees no two share a leading byte.
    literals: Vec<(String, Node)>,
    /// The single parameter edge, shared by all placeholders at this
    /// position regardless of their names.
    param: Option<Box<Node>>,
    /// Terminal operation name.
    operation: Option<String>,
}

impl Node {
    pub fn literal_children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.literals.iter().map(|(label, node)| (label.as_str(), node))
    }

    pub fn param_child(&self) -> Option<&Node> {
        self.param.as_deref()
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    fn insert(
        &mut self,
        segments: &[PathSegment],
        operation: &str,
        method: &'static str,
        path: &str,
    ) -> Result<(), IrError> {
        match segments.split_first() {
            None => {
                if self.operation.is_some() {
                    return Err(IrError::DuplicateRoute {
                        method,
                        path: path.to_string(),
                    });
                }
                self.operation = Some(operation.to_string());
                Ok(())
            }
            Some((PathSegment::Param(_), rest)) => self
                .param
                .get_or_insert_with(Default::default)
                .insert(rest, operation, method, path),
            Some((PathSegment::Literal(text), rest)) => {
                self.insert_literal(text, rest, operation, method, path)
            }
        }
    }

    fn insert_literal(
        &mut self,
        text: &str,
        rest: &[PathSegment],
        operation: &str,
        method: &'static str,
        path: &str,
    ) -> Result<(), IrError> {
        for i in 0..self.literals.len() {
            let shared = common_prefix(&self.literals[i].0, text);
            if shared == 0 {
                continue;
            }
            if shared < self.literals[i].0.len() {
                // Split the edge at the shared prefix.
                let (label, child) = self.literals.remove(i);
                let mut mid = Node::default();
                mid.literals.push((label[shared..].to_string(), child));
                self.literals.push((label[..shared].to_string(), mid));
                self.literals.sort_by(|a, b| a.0.cmp(&b.0));
                return self.insert_literal(text, rest, operation, method, path);
            }
            let node = &mut self.literals[i].1;
            if shared == text.len() {
                return node.insert(rest, operation, method, path);
            }
            return node.insert_literal(&text[shared..], rest, operation, method, path);
        }
        let mut child = Node::default();
        child.insert(rest, operation, method, path)?;
        self.literals.push((text.to_string(), child));
        self.literals.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(())
    }

    /// Match a concrete target, collecting parameter captures. Literals are
    /// tried first; a parameter capture never spans `/` and backtracks from
    /// the longest candidate down.
    fn find<'a, 'b>(
        &'a self,
        target: &'b str,
        captures: &mut Vec<&'b str>,
    ) -> Option<&'a str> {
        if target.is_empty() {
            return self.operation.as_deref();
        }
        for (label, child) in &self.literals {
            if let Some(rest) = target.strip_prefix(label.as_str()) {
                if let Some(found) = child.find(rest, captures) {
                    return Some(found);
                }
            }
        }
        if let Some(child) = &self.param {
            let run = target.find('/').unwrap_or(target.len());
            for end in (1..=run).rev() {
                if !target.is_char_boundary(end) {
                    continue;
                }
                captures.push(&target[..end]);
                if let Some(found) = child.find(&target[end..], captures) {
                    return Some(found);
                }
                captures.pop();
            }
        }
        None
    }
}

/// Routing trees, one per HTTP method.
#[derive(Debug, Default)]
pub struct Router {
    methods: IndexMap<&'static str, Node>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation's route. Duplicate terminals for one method are
    /// fatal.
    pub fn add(
        &mut self,
        method: &'static str,
        path: &Path,
        operation: &str,
    ) -> Result<(), IrError> {
        self.methods
            .entry(method)
            .or_default()
            .insert(&path.segments, operation, method, &path.raw)
    }

    pub fn method(&self, method: &str) -> Option<&Node> {
        self.methods.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&'static str, &Node)> {
        self.methods.iter().map(|(m, n)| (*m, n))
    }

    /// Dispatch a concrete request target, returning the operation name and
    /// captured parameter values in path order.
    pub fn find<'a, 'b>(&'a self, method: &str, target: &'b str) -> Option<(&'a str, Vec<&'b str>)> {
        let tree = self.methods.get(method)?;
        let mut captures = Vec::new();
        let operation = tree.find(target, &mut captures)?;
        Some((operation, captures))
    }
}

fn common_prefix(a: &str, b: &str) -> usize {
    let mut len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while len > 0 && !(a.is_char_boundary(len) && b.is_char_boundary(len)) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::path::parse_path;

    fn path(template: &str, params: &[&str]) -> Path {
        parse_path(template, |name| params.contains(&name)).unwrap()
    }

    #[test]
    fn shared_prefix_is_stored_once() {
        let mut router = Router::new();
        router.add("GET", &path("/pets", &[]), "listPets").unwrap();
        router
            .add("GET", &path("/pets/{id}", &["id"]), "getPet")
            .unwrap();

        let root = router.method("GET").unwrap();
        let children: Vec<_> = root.literal_children().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, "/pets");

        assert_eq!(router.find("GET", "/pets"), Some(("listPets", vec![])));
        assert_eq!(
            router.find("GET", "/pets/42"),
            Some(("getPet", vec!["42"]))
        );
        assert_eq!(router.find("GET", "/pets/42/extra"), None);
        assert_eq!(router.find("POST", "/pets"), None);
    }

    #[test]
    fn duplicate_terminal_is_fatal() {
        let mut router = Router::new();
        router.add("GET", &path("/pets", &[]), "listPets").unwrap();
        let err = router
            .add("GET", &path("/pets", &[]), "listPetsAgain")
            .unwrap_err();
        assert!(matches!(err, IrError::DuplicateRoute { method: "GET", .. }));
    }

    #[test]
    fn percent_encoding_routes_are_distinct() {
        let mut router = Router::new();
        router.add("GET", &path("/user/get", &[]), "userGet").unwrap();
        router
            .add("GET", &path("/user%2Fget", &[]), "userSlashGet")
            .unwrap();

        assert_eq!(router.find("GET", "/user/get"), Some(("userGet", vec![])));
        assert_eq!(
            router.find("GET", "/user%2Fget"),
            Some(("userSlashGet", vec![]))
        );
    }

    #[test]
    fn literals_shadow_parameters() {
        let mut router = Router::new();
        router
            .add("GET", &path("/pets/{id}", &["id"]), "getPet")
            .unwrap();
        router
            .add("GET", &path("/pets/special", &[]), "getSpecialPet")
            .unwrap();

        assert_eq!(
            router.find("GET", "/pets/special"),
            Some(("getSpecialPet", vec![]))
        );
        assert_eq!(
            router.find("GET", "/pets/ordinary"),
            Some(("getPet", vec!["ordinary"]))
        );
    }

    #[test]
    fn multi_segment_templates() {
        let mut router = Router::new();
        router
            .add(
                "GET",
                &path("/foo.{bar}.{baz}abc/def", &["bar", "baz"]),
                "fooOp",
            )
            .unwrap();

        assert_eq!(
            router.find("GET", "/foo.one.twoabc/def"),
            Some(("fooOp", vec!["one", "two"]))
        );
        assert_eq!(router.find("GET", "/foo.one.two/def"), None);
    }

    #[test]
    fn shared_parameter_edge() {
        let mut router = Router::new();
        router
            .add("GET", &path("/a/{x}/left", &["x"]), "leftOp")
            .unwrap();
        router
            .add("GET", &path("/a/{y}/right", &["y"]), "rightOp")
            .unwrap();

        let root = router.method("GET").unwrap();
        let (_, a) = root.literal_children().next().unwrap();
        assert!(a.param_child().is_some());
        assert_eq!(
            router.find("GET", "/a/v/right"),
            Some(("rightOp", vec!["v"]))
        );
    }
}
