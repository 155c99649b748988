//! Raw serde model of OpenAPI documents.
//!
//! These types mirror the document shape; nothing here is resolved or
//! validated beyond what serde enforces. The schema parser and OpenAPI
//! parser lower this model into the resolved graph and API model.

pub mod components;
pub mod media_type;
pub mod operation;
pub mod parameter;
pub mod request_body;
pub mod response;
pub mod schema;
pub mod security;
pub mod server;
pub mod spec;

use std::fmt;

use crate::error::ParseError;
use crate::source::Document;
use spec::OpenApiSpec;

/// Parsed `openapi` version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parts = text.split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u32>().ok())
                .ok_or_else(|| ParseError::UnsupportedVersion(text.to_string()))
        };
        let version = Version {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(ParseError::UnsupportedVersion(text.to_string()));
        }
        Ok(version)
    }

    /// Accepted versions are 3.0.x and 3.1.x.
    pub fn supported(&self) -> bool {
        self.major == 3 && self.minor <= 1
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Decode the typed raw spec out of a parsed document and gate the version.
pub fn decode(document: &Document) -> Result<(OpenApiSpec, Version), ParseError> {
    let spec: OpenApiSpec = serde_json::from_value(document.value.clone())?;
    let version = Version::parse(&spec.openapi)?;
    if !version.supported() {
        return Err(ParseError::UnsupportedVersion(spec.openapi.clone()));
    }
    Ok((spec, version))
}

/// Parse an OpenAPI spec from YAML text.
pub fn from_yaml(input: &str) -> Result<OpenApiSpec, ParseError> {
    let document = Document::parse("spec.yaml", input)?;
    Ok(decode(&document)?.0)
}

/// Parse an OpenAPI spec from JSON text.
pub fn from_json(input: &str) -> Result<OpenApiSpec, ParseError> {
    let document = Document::parse("spec.json", input)?;
    Ok(decode(&document)?.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing() {
        let v = Version::parse("3.0.3").unwrap();
        assert!(v.supported());
        assert!(!v.at_least(3, 1));
        let v = Version::parse("3.1.0").unwrap();
        assert!(v.supported());
        assert!(v.at_least(3, 1));
        assert!(!Version::parse("3.2.0").unwrap().supported());
        assert!(!Version::parse("2.0.0").unwrap().supported());
        assert!(Version::parse("3.0").is_err());
        assert!(Version::parse("three").is_err());
    }

    #[test]
    fn rejects_swagger() {
        let err = from_yaml("openapi: \"2.0.0\"\ninfo:\n  title: T\n  version: \"1\"\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedVersion(_)));
    }
}
