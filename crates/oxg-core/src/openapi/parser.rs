//! OpenAPI document parser: lowers the raw serde model into the resolved
//! `Api`, pulling every schema through the schema parser along the way.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::config::Options;
use crate::error::{Error, OperationError, ParseError, ResolveError, Result, SecurityError};
use crate::ir::names::route_to_name;
use crate::location::Location;
use crate::raw::media_type::MediaType as RawMediaType;
use crate::raw::operation::{Operation as RawOperation, PathItem};
use crate::raw::parameter::{Header as RawHeader, HeaderOrRef, Parameter as RawParameter, ParameterOrRef};
use crate::raw::request_body::RequestBodyOrRef;
use crate::raw::response::ResponseOrRef;
use crate::raw::schema::SchemaOrRef;
use crate::raw::security::{SecurityRequirement as RawSecurityRequirement, SecurityScheme};
use crate::raw;
use crate::refkey::{resolve_pointer, RefKey, ResolveCtx};
use crate::schema::{SchemaArena, SchemaId, SchemaParser};
use crate::source::DocumentSource;

use super::path::{parse_path, parse_server};
use super::security::{validate_scheme, validate_scopes};
use super::{
    Api, Header, MediaType, Operation, Parameter, ParameterLocation, Path, PathSegment,
    RequestBody, Response, SecurityRequirement, StatusKey, Style,
};

/// Parses one root document (plus any documents it references) into an
/// [`Api`] and the schema graph backing it.
pub struct ApiParser<'a> {
    options: &'a Options,
    source: DocumentSource,
    schemas: SchemaParser<'a>,
    ctx: ResolveCtx,
    parameters: HashMap<RefKey, Parameter>,
    bodies: HashMap<RefKey, RequestBody>,
    responses: HashMap<RefKey, Response>,
    headers: HashMap<RefKey, Header>,
    operation_ids: HashSet<String>,
}

impl<'a> ApiParser<'a> {
    pub fn new(options: &'a Options, source: DocumentSource) -> Self {
        Self {
            options,
            source,
            schemas: SchemaParser::new(options),
            ctx: ResolveCtx::new(options.depth_limit),
            parameters: HashMap::new(),
            bodies: HashMap::new(),
            responses: HashMap::new(),
            headers: HashMap::new(),
            operation_ids: HashSet::new(),
        }
    }

    /// Consume the parser, producing the API model and the schema arena.
    pub fn parse(mut self) -> Result<(Api, SchemaArena)> {
        let root = Location::root(self.source.root.file.clone());
        let (spec, version) =
            raw::decode(&self.source.root).map_err(|e| Error::from(e).at(self.at(&root)))?;

        if !version.at_least(3, 1) {
            if !spec.webhooks.is_empty() {
                return Err(self.fail(
                    ParseError::FeatureVersion {
                        feature: "webhooks",
                        minimum: "3.1",
                        actual: spec.openapi.clone(),
                    },
                    &root.key("webhooks"),
                ));
            }
            if spec
                .components
                .as_ref()
                .is_some_and(|c| !c.path_items.is_empty())
            {
                return Err(self.fail(
                    ParseError::FeatureVersion {
                        feature: "components.pathItems",
                        minimum: "3.1",
                        actual: spec.openapi.clone(),
                    },
                    &root.key("components").key("pathItems"),
                ));
            }
        }

        let components_loc = root.key("components");

        // Every declared security scheme is validated up front so that
        // requirement resolution can trust the table.
        let mut security_schemes: IndexMap<String, SecurityScheme> = IndexMap::new();
        if let Some(components) = &spec.components {
            let schemes_loc = components_loc.key("securitySchemes");
            for (name, scheme) in &components.security_schemes {
                validate_scheme(name, scheme).map_err(|e| self.fail(e, &schemes_loc.key(name)))?;
                security_schemes.insert(name.clone(), scheme.clone());
            }
        }

        // Component schemas are parsed eagerly, through their canonical
        // reference so later `$ref`s hit the same arena node.
        let mut schemas: IndexMap<String, SchemaId> = IndexMap::new();
        if let Some(components) = &spec.components {
            let schemas_loc = components_loc.key("schemas");
            for name in components.schemas.keys() {
                let loc = schemas_loc.key(name);
                let reference = SchemaOrRef::Ref {
                    ref_path: format!("#/components/schemas/{}", escape_token(name)),
                };
                let id = self.schemas.parse(&mut self.source, &reference, &loc)?;
                schemas.insert(name.clone(), id);
            }
        }

        let doc_security = match &spec.security {
            Some(reqs) => {
                self.security_requirements(reqs, &security_schemes, &root.key("security"))?
            }
            None => Vec::new(),
        };

        let mut servers = Vec::new();
        let servers_loc = root.key("servers");
        for (i, server) in spec.servers.iter().enumerate() {
            let template =
                parse_server(server).map_err(|e| self.fail(e, &servers_loc.index(i)))?;
            servers.push(template);
        }

        let mut operations = Vec::new();
        let paths_loc = root.key("paths");
        for (template, item) in &spec.paths {
            if let Some(only) = &self.options.specific_operation_path {
                if only != template {
                    continue;
                }
            }
            let item_loc = paths_loc.key(template);
            self.path_item(
                template,
                item,
                &item_loc,
                &security_schemes,
                &doc_security,
                &mut operations,
            )?;
        }
        operations.sort_by(|a, b| {
            (a.path.raw.as_str(), a.method).cmp(&(b.path.raw.as_str(), b.method))
        });

        let mut webhooks: IndexMap<String, Vec<Operation>> = IndexMap::new();
        if version.at_least(3, 1) {
            let hooks_loc = root.key("webhooks");
            for (name, item) in &spec.webhooks {
                let item_loc = hooks_loc.key(name);
                let mut ops = Vec::new();
                self.webhook_item(name, item, &item_loc, &security_schemes, &doc_security, &mut ops)?;
                webhooks.insert(name.clone(), ops);
            }
        }

        let api = Api {
            version,
            info: spec.info,
            servers,
            operations,
            schemas,
            security_schemes,
            webhooks,
        };
        Ok((api, self.schemas.into_arena()))
    }

    fn path_item(
        &mut self,
        template: &str,
        item: &PathItem,
        item_loc: &Location,
        schemes: &IndexMap<String, SecurityScheme>,
        doc_security: &[SecurityRequirement],
        out: &mut Vec<Operation>,
    ) -> Result<()> {
        if item.ref_path.is_some() {
            return Err(self.fail(
                OperationError::Invalid("path item $ref is not supported".into()),
                &item_loc.key("$ref"),
            ));
        }

        let item_params = self.parameter_list(&item.parameters, &item_loc.key("parameters"))?;

        for (method, op) in item.operations() {
            let op_loc = item_loc.key(&method.to_ascii_lowercase());
            let operation = self.operation(
                method,
                Some(template),
                None,
                op,
                &item_params,
                &op_loc,
                schemes,
                doc_security,
            )?;
            out.push(operation);
        }
        Ok(())
    }

    fn webhook_item(
        &mut self,
        name: &str,
        item: &PathItem,
        item_loc: &Location,
        schemes: &IndexMap<String, SecurityScheme>,
        doc_security: &[SecurityRequirement],
        out: &mut Vec<Operation>,
    ) -> Result<()> {
        if item.ref_path.is_some() {
            return Err(self.fail(
                OperationError::Invalid("webhook $ref is not supported".into()),
                &item_loc.key("$ref"),
            ));
        }

        // Webhooks have no route of their own; their name stands in as a
        // single literal segment.
        let fallback = Path {
            raw: format!("/{name}"),
            segments: vec![PathSegment::Literal(format!("/{name}"))],
        };

        let item_params = self.parameter_list(&item.parameters, &item_loc.key("parameters"))?;
        for (method, op) in item.operations() {
            let op_loc = item_loc.key(&method.to_ascii_lowercase());
            let operation = self.operation(
                method,
                None,
                Some(&fallback),
                op,
                &item_params,
                &op_loc,
                schemes,
                doc_security,
            )?;
            out.push(operation);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn operation(
        &mut self,
        method: &'static str,
        template: Option<&str>,
        fallback: Option<&Path>,
        op: &RawOperation,
        item_params: &[Parameter],
        op_loc: &Location,
        schemes: &IndexMap<String, SecurityScheme>,
        doc_security: &[SecurityRequirement],
    ) -> Result<Operation> {
        // Operation parameters first; a (name, location) pair declared here
        // shadows the path-item one.
        let mut parameters = self.parameter_list(&op.parameters, &op_loc.key("parameters"))?;
        for inherited in item_params {
            let shadowed = parameters
                .iter()
                .any(|p| p.name == inherited.name && p.location == inherited.location);
            if !shadowed {
                parameters.push(inherited.clone());
            }
        }

        let path = match template {
            Some(template) => parse_path(template, |name| {
                parameters
                    .iter()
                    .any(|p| p.location == ParameterLocation::Path && p.name == name)
            })
            .map_err(|e| self.fail(e, op_loc))?,
            None => fallback.cloned().unwrap_or_default(),
        };

        let request_body = match &op.request_body {
            Some(body) => Some(self.request_body(body, &op_loc.key("requestBody"))?),
            None => None,
        };

        let responses_loc = op_loc.key("responses");
        if op.responses.is_empty() {
            return Err(self.fail(
                OperationError::Invalid("at least one response is required".into()),
                &responses_loc,
            ));
        }
        let mut responses = IndexMap::new();
        for (key, raw) in &op.responses {
            let key_loc = responses_loc.key(key);
            let status = status_key(key).map_err(|e| self.fail(e, &key_loc))?;
            let response = self.response(raw, &key_loc)?;
            responses.insert(status, response);
        }

        let security = match &op.security {
            Some(reqs) => self.security_requirements(reqs, schemes, &op_loc.key("security"))?,
            None => doc_security.to_vec(),
        };

        if let Some(id) = &op.operation_id {
            if !self.operation_ids.insert(id.clone()) {
                return Err(self.fail(
                    OperationError::DuplicateOperationId(id.clone()),
                    &op_loc.key("operationId"),
                ));
            }
        }
        let name = match &op.operation_id {
            Some(id) => id.clone(),
            None => route_to_name(method, &path),
        };

        Ok(Operation {
            operation_id: op.operation_id.clone(),
            name,
            method,
            path,
            parameters,
            request_body,
            responses,
            security,
            summary: op.summary.clone(),
            description: op.description.clone(),
            tags: op.tags.clone(),
            deprecated: op.deprecated.unwrap_or(false),
            location: self.at(op_loc),
        })
    }

    fn parameter_list(
        &mut self,
        raw: &[ParameterOrRef],
        loc: &Location,
    ) -> Result<Vec<Parameter>> {
        let mut out = Vec::with_capacity(raw.len());
        for (i, entry) in raw.iter().enumerate() {
            out.push(self.parameter(entry, &loc.index(i))?);
        }
        Ok(out)
    }

    fn parameter(&mut self, raw: &ParameterOrRef, loc: &Location) -> Result<Parameter> {
        match raw {
            ParameterOrRef::Ref { ref_path } => {
                let key = self.ctx.key(ref_path).map_err(|e| self.fail(e, loc))?;
                if let Some(cached) = self.parameters.get(&key) {
                    return Ok(cached.clone());
                }
                self.ctx
                    .enter(key.clone())
                    .map_err(|e| self.fail(e, loc))?;
                let result = self.parameter_target(&key);
                self.ctx.leave(&key);
                result
            }
            ParameterOrRef::Parameter(parameter) => self.inline_parameter(parameter, loc),
        }
    }

    fn parameter_target(&mut self, key: &RefKey) -> Result<Parameter> {
        let (target, target_loc): (ParameterOrRef, Location) = self.lookup(key)?;
        let parameter = self.parameter(&target, &target_loc)?;
        self.parameters.insert(key.clone(), parameter.clone());
        Ok(parameter)
    }

    fn inline_parameter(&mut self, raw: &RawParameter, loc: &Location) -> Result<Parameter> {
        let location =
            ParameterLocation::parse(&raw.location).map_err(|e| self.fail(e, &loc.key("in")))?;
        if location == ParameterLocation::Path && !raw.required {
            return Err(self.fail(
                OperationError::PathParameterNotRequired(raw.name.clone()),
                loc,
            ));
        }
        let style = match &raw.style {
            Some(name) => {
                Style::parse(name, location).map_err(|e| self.fail(e, &loc.key("style")))?
            }
            None => Style::default_for(location),
        };
        let explode = raw.explode.unwrap_or_else(|| style.default_explode());
        let (schema, content) =
            self.schema_xor_content(&raw.name, raw.schema.as_ref(), &raw.content, loc)?;

        Ok(Parameter {
            name: raw.name.clone(),
            location,
            description: raw.description.clone(),
            required: raw.required,
            deprecated: raw.deprecated.unwrap_or(false),
            schema,
            content,
            style,
            explode,
            allow_reserved: raw.allow_reserved.unwrap_or(false),
        })
    }

    /// Exactly one of `schema` and `content`; `content` must hold a single
    /// content-type entry.
    fn schema_xor_content(
        &mut self,
        name: &str,
        schema: Option<&SchemaOrRef>,
        content: &IndexMap<String, RawMediaType>,
        loc: &Location,
    ) -> Result<(Option<SchemaId>, Option<(String, MediaType)>)> {
        match (schema, content.first()) {
            (Some(raw), None) => {
                let id = self.schemas.parse(&mut self.source, raw, &loc.key("schema"))?;
                Ok((Some(id), None))
            }
            (None, Some((content_type, raw))) if content.len() == 1 => {
                let media = self.media_type(raw, &loc.key("content").key(content_type))?;
                Ok((None, Some((content_type.clone(), media))))
            }
            _ => Err(self.fail(
                OperationError::ParameterSchemaXorContent(name.to_string()),
                loc,
            )),
        }
    }

    fn media_type(&mut self, raw: &RawMediaType, loc: &Location) -> Result<MediaType> {
        let schema = match &raw.schema {
            Some(schema) => Some(self.schemas.parse(&mut self.source, schema, &loc.key("schema"))?),
            None => None,
        };
        let mut examples = Vec::new();
        if let Some(example) = &raw.example {
            examples.push(example.clone());
        }
        examples.extend(raw.examples.values().cloned());
        let encoding = raw
            .encoding
            .iter()
            .map(|(field, enc)| (field.clone(), enc.content_type.clone()))
            .collect();
        Ok(MediaType {
            schema,
            examples,
            encoding,
        })
    }

    fn request_body(&mut self, raw: &RequestBodyOrRef, loc: &Location) -> Result<RequestBody> {
        match raw {
            RequestBodyOrRef::Ref { ref_path } => {
                let key = self.ctx.key(ref_path).map_err(|e| self.fail(e, loc))?;
                if let Some(cached) = self.bodies.get(&key) {
                    return Ok(cached.clone());
                }
                self.ctx
                    .enter(key.clone())
                    .map_err(|e| self.fail(e, loc))?;
                let result = self.request_body_target(&key);
                self.ctx.leave(&key);
                result
            }
            RequestBodyOrRef::RequestBody(body) => {
                if body.content.is_empty() {
                    return Err(self.fail(
                        OperationError::Invalid(
                            "request body must declare at least one content entry".into(),
                        ),
                        &loc.key("content"),
                    ));
                }
                let mut content = IndexMap::new();
                let content_loc = loc.key("content");
                for (content_type, media) in &body.content {
                    let media = self.media_type(media, &content_loc.key(content_type))?;
                    content.insert(content_type.clone(), media);
                }
                Ok(RequestBody {
                    description: body.description.clone(),
                    required: body.required,
                    content,
                })
            }
        }
    }

    fn request_body_target(&mut self, key: &RefKey) -> Result<RequestBody> {
        let (target, target_loc): (RequestBodyOrRef, Location) = self.lookup(key)?;
        let body = self.request_body(&target, &target_loc)?;
        self.bodies.insert(key.clone(), body.clone());
        Ok(body)
    }

    fn response(&mut self, raw: &ResponseOrRef, loc: &Location) -> Result<Response> {
        match raw {
            ResponseOrRef::Ref { ref_path } => {
                let key = self.ctx.key(ref_path).map_err(|e| self.fail(e, loc))?;
                if let Some(cached) = self.responses.get(&key) {
                    return Ok(cached.clone());
                }
                self.ctx
                    .enter(key.clone())
                    .map_err(|e| self.fail(e, loc))?;
                let result = self.response_target(&key);
                self.ctx.leave(&key);
                result
            }
            ResponseOrRef::Response(response) => {
                let mut content = IndexMap::new();
                let content_loc = loc.key("content");
                for (content_type, media) in &response.content {
                    let media = self.media_type(media, &content_loc.key(content_type))?;
                    content.insert(content_type.clone(), media);
                }
                let mut headers = IndexMap::new();
                let headers_loc = loc.key("headers");
                for (name, header) in &response.headers {
                    let header = self.header(header, name, &headers_loc.key(name))?;
                    headers.insert(name.clone(), header);
                }
                Ok(Response {
                    description: response.description.clone(),
                    content,
                    headers,
                })
            }
        }
    }

    fn response_target(&mut self, key: &RefKey) -> Result<Response> {
        let (target, target_loc): (ResponseOrRef, Location) = self.lookup(key)?;
        let response = self.response(&target, &target_loc)?;
        self.responses.insert(key.clone(), response.clone());
        Ok(response)
    }

    fn header(&mut self, raw: &HeaderOrRef, name: &str, loc: &Location) -> Result<Header> {
        match raw {
            HeaderOrRef::Ref { ref_path } => {
                let key = self.ctx.key(ref_path).map_err(|e| self.fail(e, loc))?;
                if let Some(cached) = self.headers.get(&key) {
                    return Ok(cached.clone());
                }
                self.ctx
                    .enter(key.clone())
                    .map_err(|e| self.fail(e, loc))?;
                let result = self.header_target(&key, name);
                self.ctx.leave(&key);
                result
            }
            HeaderOrRef::Header(header) => self.inline_header(header, name, loc),
        }
    }

    fn header_target(&mut self, key: &RefKey, name: &str) -> Result<Header> {
        let (target, target_loc): (HeaderOrRef, Location) = self.lookup(key)?;
        let header = self.header(&target, name, &target_loc)?;
        self.headers.insert(key.clone(), header.clone());
        Ok(header)
    }

    fn inline_header(&mut self, raw: &RawHeader, name: &str, loc: &Location) -> Result<Header> {
        if raw.name.is_some() || raw.location.is_some() {
            return Err(self.fail(
                OperationError::Invalid(format!(
                    "header {name:?} must not redeclare name or in"
                )),
                loc,
            ));
        }
        if let Some(style) = &raw.style {
            Style::parse(style, ParameterLocation::Header)
                .map_err(|e| self.fail(e, &loc.key("style")))?;
        }
        let (schema, content) =
            self.schema_xor_content(name, raw.schema.as_ref(), &raw.content, loc)?;
        Ok(Header {
            description: raw.description.clone(),
            required: raw.required,
            schema,
            content,
        })
    }

    fn security_requirements(
        &mut self,
        raw: &[RawSecurityRequirement],
        schemes: &IndexMap<String, SecurityScheme>,
        loc: &Location,
    ) -> Result<Vec<SecurityRequirement>> {
        let mut out = Vec::with_capacity(raw.len());
        for (i, requirement) in raw.iter().enumerate() {
            let req_loc = loc.index(i);
            let mut resolved = SecurityRequirement::default();
            for (name, scopes) in requirement {
                let scheme = schemes.get(name).ok_or_else(|| {
                    self.fail(SecurityError::UnknownScheme(name.clone()), &req_loc)
                })?;
                validate_scopes(name, scheme, scopes)
                    .map_err(|e| self.fail(e, &req_loc.key(name)))?;
                resolved.schemes.insert(name.clone(), scopes.clone());
            }
            out.push(resolved);
        }
        Ok(out)
    }

    /// Fetch and decode a referenced component, returning its location in
    /// the owning document.
    fn lookup<T: DeserializeOwned>(&mut self, key: &RefKey) -> Result<(T, Location)> {
        let doc = self.source.document(&key.loc).map_err(Error::from)?;
        let value = resolve_pointer(&doc.value, &key.ptr)
            .ok_or_else(|| Error::from(ResolveError::TargetNotFound(key.to_string())))?;
        let mut loc = Location::new(&doc.file, &key.ptr);
        if let Some(index) = &doc.index {
            loc = loc.positioned(index);
        }
        let target = serde_json::from_value(value.clone())
            .map_err(|e| Error::from(ParseError::from(e)).at(loc.clone()))?;
        Ok((target, loc))
    }

    /// Attach line/column information from the root document's offset index
    /// when the location points into it.
    fn at(&self, loc: &Location) -> Location {
        match &self.source.root.index {
            Some(index) if loc.file == self.source.root.file => loc.clone().positioned(index),
            _ => loc.clone(),
        }
    }

    fn fail(&self, error: impl Into<Error>, loc: &Location) -> Error {
        error.into().at(self.at(loc))
    }
}

/// Normalize a raw status-code key.
fn status_key(key: &str) -> Result<StatusKey, OperationError> {
    if key == "default" {
        return Ok(StatusKey::Default);
    }
    let bytes = key.as_bytes();
    if bytes.len() == 3 && &bytes[1..] == b"XX" {
        let class = bytes[0].wrapping_sub(b'0');
        if (1..=5).contains(&class) {
            return Ok(StatusKey::Range(class));
        }
        return Err(OperationError::UnknownStatus(key.to_string()));
    }
    // Exactly three digits: no sign, no leading-zero forms like "0200".
    if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(OperationError::UnknownStatus(key.to_string()));
    }
    match key.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(StatusKey::Code(code)),
        _ => Err(OperationError::UnknownStatus(key.to_string())),
    }
}

/// RFC 6901 token escaping for names embedded in a pointer.
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keys_normalize() {
        assert_eq!(status_key("default").unwrap(), StatusKey::Default);
        assert_eq!(status_key("200").unwrap(), StatusKey::Code(200));
        assert_eq!(status_key("4XX").unwrap(), StatusKey::Range(4));
        assert!(matches!(
            status_key("6XX"),
            Err(OperationError::UnknownStatus(_))
        ));
        assert!(matches!(
            status_key("99"),
            Err(OperationError::UnknownStatus(_))
        ));
        assert!(matches!(
            status_key("2xx"),
            Err(OperationError::UnknownStatus(_))
        ));
        assert!(matches!(
            status_key("0200"),
            Err(OperationError::UnknownStatus(_))
        ));
        assert!(matches!(
            status_key("+20"),
            Err(OperationError::UnknownStatus(_))
        ));
    }

    #[test]
    fn pointer_tokens_escape() {
        assert_eq!(escape_token("a/b~c"), "a~1b~0c");
    }
}
