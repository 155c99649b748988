//! Resolved API model: operations, parameters, bodies, responses, security.

pub mod parameter;
pub mod parser;
pub mod path;
pub mod security;

use indexmap::IndexMap;
use serde_json::Value;

use crate::location::Location;
use crate::raw::Version;
use crate::raw::security::SecurityScheme;
use crate::raw::spec::Info;
use crate::schema::SchemaId;

pub use parameter::{Parameter, ParameterLocation, Style};
pub use parser::ApiParser;
pub use path::{Path, PathSegment, ServerTemplate};

/// Status-code bucket of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKey {
    /// A specific code, 100–599.
    Code(u16),
    /// A `1XX`…`5XX` range.
    Range(u8),
    /// The `default` bucket.
    Default,
}

impl std::fmt::Display for StatusKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusKey::Code(code) => write!(f, "{code}"),
            StatusKey::Range(n) => write!(f, "{n}XX"),
            StatusKey::Default => write!(f, "default"),
        }
    }
}

/// A resolved media type entry.
#[derive(Debug, Clone)]
pub struct MediaType {
    pub schema: Option<SchemaId>,
    pub examples: Vec<Value>,
    /// Field name → content type, for multipart/form encodings.
    pub encoding: IndexMap<String, Option<String>>,
}

/// A resolved request body.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub description: Option<String>,
    pub required: bool,
    /// Content-type keys preserved verbatim, in document order.
    pub content: IndexMap<String, MediaType>,
}

/// A response header: a parameter with name and location fixed to header.
#[derive(Debug, Clone)]
pub struct Header {
    pub description: Option<String>,
    pub required: bool,
    pub schema: Option<SchemaId>,
    pub content: Option<(String, MediaType)>,
}

/// A resolved response.
#[derive(Debug, Clone)]
pub struct Response {
    pub description: String,
    pub content: IndexMap<String, MediaType>,
    pub headers: IndexMap<String, Header>,
}

/// A named requirement set: scheme name → required scopes.
#[derive(Debug, Clone, Default)]
pub struct SecurityRequirement {
    pub schemes: IndexMap<String, Vec<String>>,
}

/// A resolved API operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique at API scope; `None` when derived from the route.
    pub operation_id: Option<String>,
    /// operationId, or a route-derived fallback.
    pub name: String,
    /// Upper-case HTTP method.
    pub method: &'static str,
    pub path: Path,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<StatusKey, Response>,
    pub security: Vec<SecurityRequirement>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub location: Location,
}

impl Operation {
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }
}

/// The parsed API: the OpenAPI parser's output and the IR builder's input.
#[derive(Debug)]
pub struct Api {
    pub version: Version,
    pub info: Info,
    pub servers: Vec<ServerTemplate>,
    /// Ordered by path, then method.
    pub operations: Vec<Operation>,
    /// Component schemas by short name.
    pub schemas: IndexMap<String, SchemaId>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    /// 3.1 only: webhook name → operations.
    pub webhooks: IndexMap<String, Vec<Operation>>,
}
