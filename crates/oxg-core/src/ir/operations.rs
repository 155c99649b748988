//! Operation-level IR: parameters grouped by location, request and
//! response types with interface devirtualization already applied.

use indexmap::IndexMap;

use crate::openapi::{Parameter, Path, SecurityRequirement, StatusKey};

use super::{NormalizedName, TypeId};

/// A parameter with its lowered type.
#[derive(Debug, Clone)]
pub struct ParamIr {
    pub name: NormalizedName,
    /// Resolved document-side parameter: location, style, explode, schema.
    pub spec: Parameter,
    pub ty: TypeId,
}

/// A lowered request body.
#[derive(Debug, Clone)]
pub struct RequestIr {
    pub required: bool,
    /// The single content type, or the request interface when several exist.
    pub ty: TypeId,
    /// Content type → lowered type, in document order.
    pub contents: IndexMap<String, TypeId>,
}

/// A lowered response bucket.
#[derive(Debug, Clone)]
pub struct ResponseIr {
    pub description: String,
    /// The single content type, or `None` for an empty body, or the
    /// response interface when several exist.
    pub ty: Option<TypeId>,
    pub contents: IndexMap<String, TypeId>,
    /// Header name → lowered type.
    pub headers: IndexMap<String, TypeId>,
}

/// One lowered operation.
#[derive(Debug, Clone)]
pub struct OperationIr {
    pub name: NormalizedName,
    pub method: &'static str,
    pub path: Path,
    /// Document order, path-item inherited parameters last.
    pub params: Vec<ParamIr>,
    pub request: Option<RequestIr>,
    pub responses: IndexMap<StatusKey, ResponseIr>,
    /// Combined response type across statuses: the one body type when all
    /// responses agree (or only one carries a body), the `{name}Res`
    /// interface when several distinct types are returned, `None` when no
    /// response has a body.
    pub response_ty: Option<TypeId>,
    pub security: Vec<SecurityRequirement>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
}

impl OperationIr {
    /// Parameters at one location, preserving order.
    pub fn params_in(
        &self,
        location: crate::openapi::ParameterLocation,
    ) -> impl Iterator<Item = &ParamIr> {
        self.params.iter().filter(move |p| p.spec.location == location)
    }
}
