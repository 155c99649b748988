//! Path template and server URL template parsing.
//!
//! A template splits into ordered segments: raw literal runs (which may span
//! `/`) and `{name}` parameter references. Percent-encoded characters are
//! preserved as literal bytes, so two paths differing only in encoding are
//! distinct and `render()` reproduces the input byte-for-byte.

use crate::error::OperationError;
use crate::raw::server::{Server, ServerVariable};

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Literal run; may contain `/`.
    Literal(String),
    /// `{name}` placeholder referencing a declared parameter.
    Param(String),
}

/// A parsed path template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    pub raw: String,
    pub segments: Vec<PathSegment>,
}

impl Path {
    /// Reassemble the template. Inverse of parsing, byte-for-byte.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                PathSegment::Literal(lit) => out.push_str(lit),
                PathSegment::Param(name) => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Parameter names referenced by the template, in order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PathSegment::Param(name) => Some(name.as_str()),
            PathSegment::Literal(_) => None,
        })
    }
}

/// Parse an operation path template against the declared path parameters.
pub fn parse_path(
    path: &str,
    declared: impl Fn(&str) -> bool,
) -> Result<Path, OperationError> {
    let invalid = |message: &str| OperationError::InvalidPath {
        path: path.to_string(),
        message: message.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must begin with a forward slash"));
    }
    if path.contains('?') {
        return Err(invalid("must not contain a query string"));
    }
    if path.contains("://") {
        return Err(invalid("must not contain a scheme or authority"));
    }

    let segments = parse_template(path).map_err(|m| invalid(&m))?;

    let mut seen: Vec<&str> = Vec::new();
    let mut last_was_param = false;
    for segment in &segments {
        match segment {
            PathSegment::Param(name) => {
                if last_was_param {
                    return Err(invalid("placeholders must be separated by a literal"));
                }
                if seen.contains(&name.as_str()) {
                    return Err(invalid(&format!(
                        "parameter {name:?} referenced multiple times"
                    )));
                }
                if !declared(name) {
                    return Err(OperationError::MissingPathParameter(name.clone()));
                }
                seen.push(name);
                last_was_param = true;
            }
            PathSegment::Literal(_) => last_was_param = false,
        }
    }

    Ok(Path {
        raw: path.to_string(),
        segments,
    })
}

/// A parsed server URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTemplate {
    pub url: String,
    pub description: Option<String>,
    pub segments: Vec<PathSegment>,
}

/// Parse a server URL template, validating its variables: every placeholder
/// must be declared with a non-empty default; a variable `enum` must contain
/// the default and no duplicates.
pub fn parse_server(server: &Server) -> Result<ServerTemplate, OperationError> {
    let invalid = |message: String| OperationError::InvalidServerTemplate(message);

    for (name, variable) in &server.variables {
        validate_variable(name, variable)?;
    }

    let segments = parse_template(&server.url)
        .map_err(|m| invalid(format!("{}: {m}", server.url)))?;
    for segment in &segments {
        if let PathSegment::Param(name) = segment {
            if !server.variables.contains_key(name) {
                return Err(invalid(format!("variable {name:?} is not declared")));
            }
        }
    }

    Ok(ServerTemplate {
        url: server.url.clone(),
        description: server.description.clone(),
        segments,
    })
}

fn validate_variable(name: &str, variable: &ServerVariable) -> Result<(), OperationError> {
    let invalid = |message: String| OperationError::InvalidServerTemplate(message);
    if variable.default.is_empty() {
        return Err(invalid(format!("variable {name:?} must have a default")));
    }
    if !variable.enum_values.is_empty() {
        if !variable.enum_values.contains(&variable.default) {
            return Err(invalid(format!(
                "variable {name:?}: enum must contain the default {:?}",
                variable.default
            )));
        }
        for (i, value) in variable.enum_values.iter().enumerate() {
            if variable.enum_values[..i].contains(value) {
                return Err(invalid(format!(
                    "variable {name:?}: duplicate enum value {value:?}"
                )));
            }
        }
    }
    Ok(())
}

/// Split a template into literal and `{name}` segments. Nested or unbalanced
/// braces are errors.
fn parse_template(input: &str) -> Result<Vec<PathSegment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut param: Option<String> = None;

    for ch in input.chars() {
        match ch {
            '{' => {
                if param.is_some() {
                    return Err("unexpected '{'".to_string());
                }
                if !literal.is_empty() {
                    segments.push(PathSegment::Literal(std::mem::take(&mut literal)));
                }
                param = Some(String::new());
            }
            '}' => match param.take() {
                Some(name) if !name.is_empty() => segments.push(PathSegment::Param(name)),
                Some(_) => return Err("empty placeholder".to_string()),
                None => return Err("unexpected '}'".to_string()),
            },
            _ => match &mut param {
                Some(name) => name.push(ch),
                None => literal.push(ch),
            },
        }
    }

    if param.is_some() {
        return Err("expected '}'".to_string());
    }
    if !literal.is_empty() {
        segments.push(PathSegment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(_: &str) -> bool {
        true
    }

    #[test]
    fn splits_mixed_literals_and_params() {
        let path = parse_path("/foo.{bar}.{baz}abc/def", any).unwrap();
        assert_eq!(
            path.segments,
            vec![
                PathSegment::Literal("/foo.".into()),
                PathSegment::Param("bar".into()),
                PathSegment::Literal(".".into()),
                PathSegment::Param("baz".into()),
                PathSegment::Literal("abc/def".into()),
            ]
        );
    }

    #[test]
    fn render_is_byte_exact() {
        for raw in [
            "/pets",
            "/pets/{petId}",
            "/foo.{bar}.{baz}abc/def",
            "/user%2Fget",
            "/user/get",
        ] {
            let path = parse_path(raw, any).unwrap();
            assert_eq!(path.render(), raw);
        }
    }

    #[test]
    fn percent_encoding_is_literal() {
        let a = parse_path("/user/get", any).unwrap();
        let b = parse_path("/user%2Fget", any).unwrap();
        assert_ne!(a.segments, b.segments);
    }

    #[test]
    fn rejects_bad_templates() {
        assert!(parse_path("pets", any).is_err());
        assert!(parse_path("/pets?x=1", any).is_err());
        assert!(parse_path("https://x/pets", any).is_err());
        assert!(parse_path("/{a}{b}", any).is_err());
        assert!(parse_path("/{a{b}}", any).is_err());
        assert!(parse_path("/{}", any).is_err());
        assert!(parse_path("/{a}/{a}", any).is_err());
    }

    #[test]
    fn undeclared_parameter() {
        let err = parse_path("/pets/{petId}", |_| false).unwrap_err();
        assert!(matches!(err, OperationError::MissingPathParameter(_)));
    }

    #[test]
    fn server_template_variables() {
        let server: Server = serde_yaml_ng::from_str(
            r#"
url: "https://{region}.api.example.com/{basePath}"
variables:
  region:
    default: us-east-1
    enum: [us-east-1, eu-west-1]
  basePath:
    default: v2
"#,
        )
        .unwrap();
        let template = parse_server(&server).unwrap();
        assert_eq!(
            template.segments[1],
            PathSegment::Param("region".into())
        );
    }

    #[test]
    fn server_variable_validation() {
        let missing_default: Server =
            serde_yaml_ng::from_str("url: \"https://{x}.example.com\"\nvariables:\n  x:\n    default: \"\"\n")
                .unwrap();
        assert!(parse_server(&missing_default).is_err());

        let undeclared: Server =
            serde_yaml_ng::from_str("url: \"https://{x}.example.com\"\n").unwrap();
        assert!(parse_server(&undeclared).is_err());

        let bad_enum: Server = serde_yaml_ng::from_str(
            "url: \"https://{x}.example.com\"\nvariables:\n  x:\n    default: a\n    enum: [b]\n",
        )
        .unwrap();
        assert!(parse_server(&bad_enum).is_err());

        let dup_enum: Server = serde_yaml_ng::from_str(
            "url: \"https://{x}.example.com\"\nvariables:\n  x:\n    default: a\n    enum: [a, a]\n",
        )
        .unwrap();
        assert!(parse_server(&dup_enum).is_err());
    }
}
