use serde::Deserialize;

/// Generator options controlling the front-end pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Infer `type` from present facets (`properties` ⇒ object, `items` ⇒
    /// array, `minimum` ⇒ number, `pattern` ⇒ string) when it is absent.
    pub infer_types: bool,

    /// Keep facets that do not apply to the declared type (e.g. `pattern` on
    /// an integer) instead of failing. Such facets are preserved on the
    /// resolved schema but never enforced.
    pub allow_cross_type_constraints: bool,

    /// Maximum reference recursion depth.
    pub depth_limit: usize,

    /// `NotImplemented` reasons that skip the offending operation instead of
    /// failing the run.
    pub ignore_not_implemented: Vec<String>,

    /// Restrict generation to a single path. Used by tests.
    pub specific_operation_path: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            infer_types: false,
            allow_cross_type_constraints: true,
            depth_limit: 1000,
            ignore_not_implemented: Vec::new(),
            specific_operation_path: None,
        }
    }
}

impl Options {
    /// Whether a `NotImplemented` reason is downgraded to "skip operation".
    pub fn is_ignored(&self, reason: &str) -> bool {
        self.ignore_not_implemented.iter().any(|r| r == reason || r == "all")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.depth_limit, 1000);
        assert!(!opts.infer_types);
        assert!(opts.allow_cross_type_constraints);
        assert!(opts.ignore_not_implemented.is_empty());
    }

    #[test]
    fn parse_yaml() {
        let yaml = r#"
infer_types: true
depth_limit: 32
ignore_not_implemented:
  - complex parameter types
"#;
        let opts: Options = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(opts.infer_types);
        assert_eq!(opts.depth_limit, 32);
        assert!(opts.is_ignored("complex parameter types"));
        assert!(!opts.is_ignored("oneOf parameters"));
    }

    #[test]
    fn ignore_all() {
        let opts = Options {
            ignore_not_implemented: vec!["all".into()],
            ..Options::default()
        };
        assert!(opts.is_ignored("anything"));
    }
}
