use thiserror::Error;

use crate::location::Location;

/// Errors raised while loading or decoding a document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),

    #[error("{feature} requires OpenAPI {minimum}, document declares {actual}")]
    FeatureVersion {
        feature: &'static str,
        minimum: &'static str,
        actual: String,
    },
}

/// Errors raised while resolving `$ref` pointers.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("bad reference {0:?}")]
    BadReference(String),

    #[error("infinite recursion through {0}")]
    InfiniteRecursion(String),

    #[error("reference depth limit exceeded ({0})")]
    DepthExceeded(usize),

    #[error("reference target not found: {0}")]
    TargetNotFound(String),

    #[error("external references are disabled")]
    ExternalDisabled,

    #[error("failed to fetch external document {url}: {message}")]
    External { url: String, message: String },
}

/// Errors raised while lowering raw schemas into the resolved graph.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unexpected type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    #[error("invalid format {format:?} for type {ty}")]
    InvalidFormat { format: String, ty: String },

    #[error("invalid facet {facet}: {message}")]
    InvalidFacet {
        facet: &'static str,
        message: String,
    },

    #[error("duplicate enum value {0}")]
    DuplicateEnum(String),

    #[error("{0} is null, but schema is not nullable")]
    NullableRequired(&'static str),

    #[error("invalid pattern {pattern:?}: {message}")]
    BadPattern { pattern: String, message: String },

    #[error("unknown discriminator mapping target {0:?}")]
    UnknownMappingTarget(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while parsing paths, operations, and components.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("duplicate operationId {0:?}")]
    DuplicateOperationId(String),

    #[error("unknown status code key {0:?}")]
    UnknownStatus(String),

    #[error("unknown parameter location {0:?}")]
    UnknownParameterLocation(String),

    #[error("style {style:?} is not allowed for {location} parameters")]
    InvalidStyle { style: String, location: String },

    #[error("path parameter {0:?} is not declared")]
    MissingPathParameter(String),

    #[error("path parameter {0:?} must be required")]
    PathParameterNotRequired(String),

    #[error("invalid path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    #[error("invalid server URL template: {0}")]
    InvalidServerTemplate(String),

    #[error("parameter {0:?} must have either schema or content")]
    ParameterSchemaXorContent(String),

    #[error("{0}")]
    Invalid(String),
}

/// Errors raised while validating security schemes and requirements.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unknown security scheme {0:?}")]
    UnknownScheme(String),

    #[error("invalid security scheme {name:?}: {message}")]
    InvalidScheme { name: String, message: String },

    #[error("scope {scope:?} is not defined by scheme {scheme:?}")]
    UnknownScope { scheme: String, scope: String },
}

/// Errors raised while building the IR.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("name conflict: type {0:?} is already registered")]
    NameConflict(String),

    #[error("reference conflict: {0} is already bound to a type")]
    RefConflict(String),

    #[error("duplicate route: {method} {path}")]
    DuplicateRoute { method: &'static str, path: String },
}

/// Any failure the pipeline can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Located(#[from] Box<LocationError>),
}

impl Error {
    /// Bind this error to a source location, unless it already carries one
    /// for the same document subtree.
    pub fn at(self, location: Location) -> Error {
        match self {
            // Keep the innermost location: it points at the exact node.
            Error::Located(inner) if inner.location.file == location.file => {
                Error::Located(inner)
            }
            other => Error::Located(Box::new(LocationError {
                location,
                inner: other,
            })),
        }
    }

    /// The innermost location attached to this error, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Located(e) => Some(e.inner.location().unwrap_or(&e.location)),
            _ => None,
        }
    }

    /// Walks the chain to the first `NotImplemented` reason, if any.
    pub fn not_implemented_reason(&self) -> Option<&str> {
        match self {
            Error::Ir(IrError::NotImplemented(reason)) => Some(reason),
            Error::Located(e) => e.inner.not_implemented_reason(),
            _ => None,
        }
    }
}

/// An error bound to the document node it was raised at.
#[derive(Debug, Error)]
#[error("{location}: {inner}")]
pub struct LocationError {
    pub location: Location,
    pub inner: Error,
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
