//! Lowers the resolved schema graph and API model into the typed IR.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::warn;

use crate::config::Options;
use crate::error::{Error, IrError, Result};
use crate::openapi::{
    Api, Header, MediaType, Operation, Parameter, RequestBody, Response, StatusKey,
};
use crate::router::Router;
use crate::schema::{AdditionalProps, Property, Schema, SchemaArena, SchemaId, SchemaKind};

use super::names::normalize_name;
use super::operations::{OperationIr, ParamIr, RequestIr, ResponseIr};
use super::{
    Field, GenericVariant, Ir, NilSemantic, PrimitiveKind, SumDiscriminator, Type, TypeId,
    TypeKind, TypeRegistry,
};

/// Lowers schemas to types. Owns both registries for the run; nothing else
/// writes to them.
pub struct IrBuilder<'a> {
    options: &'a Options,
    arena: &'a SchemaArena,
    registry: TypeRegistry,
    /// Completed lowerings.
    lowered: HashMap<SchemaId, TypeId>,
    /// Schemas on the lowering stack, with their reserved slots. A hit here
    /// is a cycle-closing back-edge.
    in_progress: HashMap<SchemaId, TypeId>,
    any: Option<TypeId>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(options: &'a Options, arena: &'a SchemaArena) -> Self {
        Self {
            options,
            arena,
            registry: TypeRegistry::new(),
            lowered: HashMap::new(),
            in_progress: HashMap::new(),
            any: None,
        }
    }

    /// Build the complete IR for a parsed API.
    pub fn build(options: &'a Options, api: &Api, arena: &'a SchemaArena) -> Result<Ir> {
        let mut builder = Self::new(options, arena);

        // Component schemas first, so every named type exists before
        // operations reference them.
        for (name, &id) in &api.schemas {
            builder.lower(id, name)?;
        }

        let mut operations = Vec::new();
        let mut router = Router::new();
        for op in &api.operations {
            match builder.operation(op) {
                Ok(ir) => {
                    router
                        .add(op.method, &op.path, &op.name)
                        .map_err(|e| Error::from(e).at(op.location.clone()))?;
                    operations.push(ir);
                }
                Err(err) => builder.skip_or_fail(err, op)?,
            }
        }

        let mut webhooks = IndexMap::new();
        for (name, ops) in &api.webhooks {
            let mut lowered = Vec::new();
            for op in ops {
                match builder.operation(op) {
                    Ok(ir) => lowered.push(ir),
                    Err(err) => builder.skip_or_fail(err, op)?,
                }
            }
            webhooks.insert(name.clone(), lowered);
        }

        Ok(Ir {
            types: builder.registry,
            operations,
            webhooks,
            router,
        })
    }

    /// Apply the configured `NotImplemented` downgrade: a listed reason
    /// drops the one operation, anything else is fatal.
    fn skip_or_fail(&self, err: Error, op: &Operation) -> Result<()> {
        if let Some(reason) = err.not_implemented_reason() {
            if self.options.is_ignored(reason) {
                warn!(
                    "skipping {} {}: not implemented: {reason}",
                    op.method, op.path.raw
                );
                return Ok(());
            }
        }
        Err(err.at(op.location.clone()))
    }

    /// Lower one schema node, reusing the result for every later reference.
    fn lower(&mut self, id: SchemaId, hint: &str) -> Result<TypeId> {
        if let Some(&ty) = self.lowered.get(&id) {
            return Ok(ty);
        }
        if let Some(&slot) = self.in_progress.get(&id) {
            // Back-edge into a type still being built: break the cycle with
            // an explicit indirection.
            return Ok(self.registry.insert(Type::anonymous(TypeKind::Pointer {
                to: slot,
                semantic: NilSemantic::Invalid,
            })));
        }

        let arena = self.arena;
        let schema = &arena[id];
        let name = schema.short_name();
        let label = name.clone().unwrap_or_else(|| hint.to_string());

        let slot = self.registry.insert(Type::anonymous(TypeKind::Any));
        self.in_progress.insert(id, slot);
        let built = self.lower_kind(schema, &label);
        self.in_progress.remove(&id);
        let kind = built.map_err(|e| e.at(schema.location.clone()))?;

        *self.registry.get_mut(slot) = Type {
            name: None,
            kind,
            schema: Some(id),
            ref_key: schema.ref_key.clone(),
            description: schema.description.clone(),
            implements: Vec::new(),
        };
        if let Some(name) = &name {
            self.registry
                .register(normalize_name(name), slot)
                .map_err(|e| Error::from(e).at(schema.location.clone()))?;
        }
        if let Some(key) = &schema.ref_key {
            self.registry
                .bind_ref(key.clone(), slot)
                .map_err(|e| Error::from(e).at(schema.location.clone()))?;
        }
        self.lowered.insert(id, slot);
        Ok(slot)
    }

    fn lower_kind(&mut self, schema: &'a Schema, name: &str) -> Result<TypeKind> {
        if !schema.one_of.is_empty() || !schema.any_of.is_empty() {
            return self.lower_sum(schema, name);
        }
        if !schema.all_of.is_empty() {
            return self.lower_all_of(schema, name);
        }
        if !schema.enum_values.is_empty() {
            return Ok(TypeKind::Enum {
                base: enum_base(schema)?,
                values: schema.enum_values.clone(),
            });
        }
        match schema.kind {
            SchemaKind::String => Ok(self.lower_string(schema)),
            SchemaKind::Integer => Ok(TypeKind::Primitive {
                kind: match schema.format.as_deref() {
                    Some("int32") => PrimitiveKind::Int32,
                    Some("int64") => PrimitiveKind::Int64,
                    _ => PrimitiveKind::Int,
                },
                format: schema.format.clone(),
            }),
            SchemaKind::Number => Ok(TypeKind::Primitive {
                kind: match schema.format.as_deref() {
                    Some("float") => PrimitiveKind::Float32,
                    Some("double") => PrimitiveKind::Float64,
                    _ => PrimitiveKind::Float,
                },
                format: schema.format.clone(),
            }),
            SchemaKind::Boolean => Ok(TypeKind::Primitive {
                kind: PrimitiveKind::Bool,
                format: None,
            }),
            SchemaKind::Array => {
                let item = match schema.item {
                    Some(item) => self.lower(item, &format!("{name}Item"))?,
                    None => self.any(),
                };
                Ok(TypeKind::Array { item })
            }
            SchemaKind::Object => self.lower_object(schema, name),
            SchemaKind::Null | SchemaKind::Empty => Ok(TypeKind::Any),
        }
    }

    fn lower_string(&mut self, schema: &Schema) -> TypeKind {
        let format = schema.format.clone();
        let kind = match schema.format.as_deref() {
            Some("byte") => {
                // base64 payloads decode to byte arrays
                let item = self.registry.insert(Type::anonymous(TypeKind::Primitive {
                    kind: PrimitiveKind::Byte,
                    format: None,
                }));
                return TypeKind::Array { item };
            }
            Some("date" | "date-time" | "time") => PrimitiveKind::Time,
            Some("uuid") => PrimitiveKind::Uuid,
            Some("duration") => PrimitiveKind::Duration,
            Some("uri") => PrimitiveKind::Url,
            Some("ip" | "ipv4" | "ipv6") => PrimitiveKind::Ip,
            _ => PrimitiveKind::String,
        };
        TypeKind::Primitive { kind, format }
    }

    fn lower_object(&mut self, schema: &'a Schema, name: &str) -> Result<TypeKind> {
        if schema.properties.is_empty() {
            if let AdditionalProps::Allowed(value) = schema.additional {
                let value = match value {
                    Some(id) => Some(self.lower(id, &format!("{name}Value"))?),
                    None => None,
                };
                return Ok(TypeKind::Map { value });
            }
        }

        let mut fields = Vec::with_capacity(schema.properties.len());
        for prop in &schema.properties {
            fields.push(self.field(prop, name)?);
        }
        if let AdditionalProps::Allowed(value) = schema.additional {
            // catch-all for keys outside the declared property set
            let value = match value {
                Some(id) => Some(self.lower(id, &format!("{name}Value"))?),
                None => None,
            };
            let map = self.registry.insert(Type::anonymous(TypeKind::Map { value }));
            fields.push(Field {
                name: normalize_name("additionalProperties"),
                json_name: String::new(),
                ty: map,
                required: true,
                description: None,
                schema: None,
            });
        }
        Ok(TypeKind::Struct { fields })
    }

    fn field(&mut self, prop: &Property, owner: &str) -> Result<Field> {
        let hint = format!("{owner}{}", normalize_name(&prop.name).pascal_case);
        let inner = self.lower(prop.schema, &hint)?;
        let nullable = self.arena[prop.schema].nullable;
        let ty = self.wrap(inner, !prop.required, nullable)?;
        Ok(Field {
            name: normalize_name(&prop.name),
            json_name: prop.name.clone(),
            ty,
            required: prop.required,
            description: prop.description.clone(),
            schema: Some(prop.schema),
        })
    }

    /// Apply optional/nullable semantics to a field or item type.
    fn wrap(&mut self, inner: TypeId, optional: bool, nullable: bool) -> Result<TypeId> {
        if !optional && !nullable {
            return Ok(inner);
        }
        let ty = self.registry.get(inner);
        if ty.can_generic_wrap() {
            let variant = match (optional, nullable) {
                (true, false) => GenericVariant::Optional,
                (false, true) => GenericVariant::Nullable,
                _ => GenericVariant::OptionalNullable,
            };
            return self.generic(inner, variant);
        }
        if optional && nullable {
            let reason = if matches!(ty.kind, TypeKind::Array { .. }) {
                "optional nullable array".to_string()
            } else {
                format!("optional nullable {}", self.type_label(inner).to_lowercase())
            };
            return Err(IrError::NotImplemented(reason).into());
        }
        let semantic = if optional {
            NilSemantic::Optional
        } else {
            NilSemantic::Null
        };
        Ok(self.registry.insert(Type::anonymous(TypeKind::Pointer {
            to: inner,
            semantic,
        })))
    }

    /// Fetch or create the named generic wrapper for `(inner, variant)`.
    ///
    /// Every schema node lowers to its own id, so two inline `string`
    /// properties do not share an inner `TypeId`; wrapper reuse therefore
    /// compares value shapes, not ids.
    fn generic(&mut self, inner: TypeId, variant: GenericVariant) -> Result<TypeId> {
        let name = normalize_name(&format!("{}{}", variant.prefix(), self.type_label(inner)));
        if let Some(existing) = self.registry.lookup_name(&name.pascal_case) {
            if let TypeKind::Generic {
                inner: have_inner,
                variant: have_variant,
            } = self.registry.get(existing).kind
            {
                if have_variant == variant && self.same_shape(have_inner, inner) {
                    return Ok(existing);
                }
            }
            return Err(IrError::NameConflict(name.pascal_case).into());
        }
        let id = self
            .registry
            .insert(Type::anonymous(TypeKind::Generic { inner, variant }));
        self.registry.register(name, id).map_err(Error::from)?;
        Ok(id)
    }

    /// Structural equivalence for wrapper sharing. Named types are nominal
    /// and only equal to themselves; anonymous values compare by shape, with
    /// primitives folding on kind since each kind has one runtime
    /// representation regardless of format.
    fn same_shape(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let (ta, tb) = (self.registry.get(a), self.registry.get(b));
        if ta.name.is_some() || tb.name.is_some() {
            return false;
        }
        match (&ta.kind, &tb.kind) {
            (TypeKind::Primitive { kind: ka, .. }, TypeKind::Primitive { kind: kb, .. }) => {
                ka == kb
            }
            (TypeKind::Array { item: ia }, TypeKind::Array { item: ib }) => {
                self.same_shape(*ia, *ib)
            }
            (TypeKind::Map { value: va }, TypeKind::Map { value: vb }) => match (va, vb) {
                (Some(va), Some(vb)) => self.same_shape(*va, *vb),
                (None, None) => true,
                _ => false,
            },
            (TypeKind::Alias { inner: ia }, TypeKind::Alias { inner: ib }) => {
                self.same_shape(*ia, *ib)
            }
            (TypeKind::Any, TypeKind::Any) => true,
            _ => false,
        }
    }

    fn lower_all_of(&mut self, schema: &'a Schema, name: &str) -> Result<TypeKind> {
        let arena = self.arena;
        let mut fields: Vec<Field> = Vec::new();

        for &member in &schema.all_of {
            let member_schema = &arena[member];
            if member_schema.kind != SchemaKind::Object || member_schema.is_composite() {
                return Err(IrError::NotImplemented(
                    "allOf of non-object schemas".to_string(),
                )
                .into());
            }
            for prop in &member_schema.properties {
                self.merge_field(&mut fields, prop, name)?;
            }
        }
        // sibling properties on the composite schema itself
        for prop in &schema.properties {
            self.merge_field(&mut fields, prop, name)?;
        }
        Ok(TypeKind::Struct { fields })
    }

    /// Merge one `allOf` member property into the combined field set. A
    /// repeated name is tolerated only when both sides share a schema.
    fn merge_field(
        &mut self,
        fields: &mut Vec<Field>,
        prop: &Property,
        owner: &str,
    ) -> Result<()> {
        if let Some(i) = fields.iter().position(|f| f.json_name == prop.name) {
            if fields[i].schema != Some(prop.schema) {
                return Err(IrError::NotImplemented(format!(
                    "conflicting allOf property {:?}",
                    prop.name
                ))
                .into());
            }
            fields[i].required |= prop.required;
            return Ok(());
        }
        fields.push(self.field(prop, owner)?);
        Ok(())
    }

    fn lower_sum(&mut self, schema: &'a Schema, name: &str) -> Result<TypeKind> {
        let members: &[SchemaId] = if !schema.one_of.is_empty() {
            &schema.one_of
        } else {
            &schema.any_of
        };

        let mut variants = Vec::with_capacity(members.len());
        let mut by_member: HashMap<SchemaId, TypeId> = HashMap::new();
        for (i, &member) in members.iter().enumerate() {
            let lowered = self.lower(member, &format!("{name}{i}"))?;
            let variant = self.sum_variant(lowered, name)?;
            by_member.insert(member, variant);
            variants.push(variant);
        }

        let discriminator = match &schema.discriminator {
            Some(d) => {
                let mut mapping = IndexMap::new();
                for (value, target) in &d.mapping {
                    let ty = match by_member.get(target) {
                        Some(&ty) => ty,
                        None => self.lower(*target, name)?,
                    };
                    mapping.insert(value.clone(), ty);
                }
                Some(SumDiscriminator {
                    property: d.property_name.clone(),
                    mapping,
                })
            }
            None => None,
        };

        Ok(TypeKind::Sum {
            variants,
            discriminator,
        })
    }

    /// Sum variants must be able to carry the marker methods; primitives,
    /// arrays, and untyped members get a named alias.
    fn sum_variant(&mut self, ty: TypeId, sum_name: &str) -> Result<TypeId> {
        let needs_alias = self.registry.get(ty).name.is_none()
            && matches!(
                self.registry.get(ty).kind,
                TypeKind::Primitive { .. }
                    | TypeKind::Array { .. }
                    | TypeKind::Map { .. }
                    | TypeKind::Any
            );
        if !needs_alias {
            return Ok(ty);
        }
        let name = normalize_name(&format!("{sum_name}{}", self.type_label(ty)));
        let alias = self
            .registry
            .insert(Type::anonymous(TypeKind::Alias { inner: ty }));
        self.registry.register(name, alias).map_err(Error::from)?;
        Ok(alias)
    }

    fn operation(&mut self, op: &Operation) -> Result<OperationIr> {
        let name = normalize_name(&op.name);
        let ctx = name.pascal_case.clone();

        let mut params = Vec::with_capacity(op.parameters.len());
        for parameter in &op.parameters {
            params.push(self.param(parameter, &ctx)?);
        }

        let request = match &op.request_body {
            Some(body) => Some(self.request(body, &ctx)?),
            None => None,
        };

        let mut responses = IndexMap::new();
        for (status, response) in &op.responses {
            responses.insert(*status, self.response(*status, response, &ctx)?);
        }
        let response_ty = self.response_union(&ctx, &responses)?;

        Ok(OperationIr {
            name,
            method: op.method,
            path: op.path.clone(),
            params,
            request,
            responses,
            response_ty,
            security: op.security.clone(),
            summary: op.summary.clone(),
            description: op.description.clone(),
            tags: op.tags.clone(),
            deprecated: op.deprecated,
        })
    }

    fn param(&mut self, parameter: &Parameter, ctx: &str) -> Result<ParamIr> {
        let name = normalize_name(&parameter.name);
        let ty = match (parameter.schema, &parameter.content) {
            (Some(schema), _) => {
                let hint = format!("{ctx}{}", name.pascal_case);
                let ty = self.lower(schema, &hint)?;
                if !self.is_simple(ty) {
                    // only document-typed (`content:`) parameters may carry
                    // structured payloads
                    return Err(
                        IrError::NotImplemented("complex parameter types".to_string()).into(),
                    );
                }
                ty
            }
            (None, Some((_, media))) => self.media(media, &format!("{ctx}{}", name.pascal_case))?,
            (None, None) => self.any(),
        };
        Ok(ParamIr {
            name,
            spec: parameter.clone(),
            ty,
        })
    }

    fn media(&mut self, media: &MediaType, hint: &str) -> Result<TypeId> {
        match media.schema {
            Some(id) => self.lower(id, hint),
            None => Ok(self.any()),
        }
    }

    fn request(&mut self, body: &RequestBody, ctx: &str) -> Result<RequestIr> {
        let mut contents = IndexMap::new();
        for (content_type, media) in &body.content {
            let hint = format!("{ctx}Req{}", normalize_name(content_type).pascal_case);
            let ty = self.media(media, &hint)?;
            contents.insert(content_type.clone(), ty);
        }
        let ty = if contents.len() == 1 {
            contents[0]
        } else {
            self.interface(&format!("{ctx}Req"), &mut contents)?
        };
        Ok(RequestIr {
            required: body.required,
            ty,
            contents,
        })
    }

    /// The one response type shared by every bodied status, or the `{ctx}Res`
    /// marker interface when statuses return distinct types. Bodiless
    /// operations have no combined type at all.
    fn response_union(
        &mut self,
        ctx: &str,
        responses: &IndexMap<StatusKey, ResponseIr>,
    ) -> Result<Option<TypeId>> {
        let mut members: IndexMap<String, TypeId> = IndexMap::new();
        for (status, response) in responses {
            if let Some(ty) = response.ty {
                if !members.values().any(|&have| have == ty) {
                    members.insert(status_label(*status), ty);
                }
            }
        }
        match members.len() {
            0 => Ok(None),
            1 => Ok(Some(members[0])),
            _ => Ok(Some(self.interface(&format!("{ctx}Res"), &mut members)?)),
        }
    }

    fn response(
        &mut self,
        status: StatusKey,
        response: &Response,
        ctx: &str,
    ) -> Result<ResponseIr> {
        let status_label = status_label(status);

        let mut contents = IndexMap::new();
        for (content_type, media) in &response.content {
            let hint = format!(
                "{ctx}{status_label}{}",
                normalize_name(content_type).pascal_case
            );
            let ty = self.media(media, &hint)?;
            contents.insert(content_type.clone(), ty);
        }
        let ty = match contents.len() {
            0 => None,
            1 => Some(contents[0]),
            _ => Some(self.interface(&format!("{ctx}{status_label}Res"), &mut contents)?),
        };

        let mut headers = IndexMap::new();
        for (header_name, header) in &response.headers {
            let ty = self.header(header, ctx, header_name)?;
            headers.insert(header_name.clone(), ty);
        }

        Ok(ResponseIr {
            description: response.description.clone(),
            ty,
            contents,
            headers,
        })
    }

    fn header(&mut self, header: &Header, ctx: &str, name: &str) -> Result<TypeId> {
        let hint = format!("{ctx}{}", normalize_name(name).pascal_case);
        match (header.schema, &header.content) {
            (Some(schema), _) => self.lower(schema, &hint),
            (None, Some((_, media))) => self.media(media, &hint),
            (None, None) => Ok(self.any()),
        }
    }

    /// Create a marker interface over `members`, alias-wrapping unnamed
    /// members so each can carry the marker.
    fn interface(
        &mut self,
        name: &str,
        members: &mut IndexMap<String, TypeId>,
    ) -> Result<TypeId> {
        let normalized = normalize_name(name);
        let marker = format!("is{}", normalized.pascal_case);
        let iface = self
            .registry
            .insert(Type::anonymous(TypeKind::Interface { marker }));
        self.registry.register(normalized, iface).map_err(Error::from)?;

        for (content_type, ty) in members.iter_mut() {
            let concrete = if self.registry.get(*ty).name.is_some() {
                *ty
            } else {
                let alias_name =
                    normalize_name(&format!("{name}{}", normalize_name(content_type).pascal_case));
                let alias = self
                    .registry
                    .insert(Type::anonymous(TypeKind::Alias { inner: *ty }));
                self.registry.register(alias_name, alias).map_err(Error::from)?;
                alias
            };
            *ty = concrete;
            let implements = &mut self.registry.get_mut(concrete).implements;
            if !implements.contains(&iface) {
                implements.push(iface);
            }
        }
        Ok(iface)
    }

    /// Whether a parameter can be serialized without a document codec.
    fn is_simple(&self, id: TypeId) -> bool {
        match &self.registry.get(id).kind {
            TypeKind::Primitive { .. } | TypeKind::Enum { .. } => true,
            TypeKind::Alias { inner } => self.is_simple(*inner),
            TypeKind::Generic { inner, .. } => self.is_simple(*inner),
            TypeKind::Array { item } => self.is_simple(*item),
            _ => false,
        }
    }

    /// Pascal-case label for a type, for derived wrapper names.
    fn type_label(&self, id: TypeId) -> String {
        let ty = self.registry.get(id);
        if let Some(name) = &ty.name {
            return name.pascal_case.clone();
        }
        match &ty.kind {
            TypeKind::Primitive { kind, .. } => kind.label().to_string(),
            TypeKind::Alias { inner } => self.type_label(*inner),
            TypeKind::Array { item } => format!("{}Array", self.type_label(*item)),
            TypeKind::Map { .. } => "Map".to_string(),
            TypeKind::Generic { inner, variant } => {
                format!("{}{}", variant.prefix(), self.type_label(*inner))
            }
            TypeKind::Pointer { to, .. } => self.type_label(*to),
            TypeKind::Any => "Any".to_string(),
            TypeKind::Enum { .. }
            | TypeKind::Struct { .. }
            | TypeKind::Sum { .. }
            | TypeKind::Interface { .. } => "Value".to_string(),
        }
    }

    fn any(&mut self) -> TypeId {
        match self.any {
            Some(id) => id,
            None => {
                let id = self.registry.insert(Type::anonymous(TypeKind::Any));
                self.any = Some(id);
                id
            }
        }
    }
}

fn status_label(status: StatusKey) -> String {
    match status {
        StatusKey::Code(code) => code.to_string(),
        StatusKey::Range(class) => format!("{class}XX"),
        StatusKey::Default => "Default".to_string(),
    }
}

fn enum_base(schema: &Schema) -> Result<PrimitiveKind> {
    match schema.kind {
        SchemaKind::String => Ok(PrimitiveKind::String),
        SchemaKind::Integer => Ok(PrimitiveKind::Int),
        SchemaKind::Number => Ok(PrimitiveKind::Float),
        SchemaKind::Boolean => Ok(PrimitiveKind::Bool),
        _ => Err(IrError::NotImplemented("enum of non-primitive values".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn arena_with(schemas: Vec<Schema>) -> (SchemaArena, Vec<SchemaId>) {
        let mut arena = SchemaArena::new();
        let ids = schemas.into_iter().map(|s| arena.alloc(s)).collect();
        (arena, ids)
    }

    #[test]
    fn generic_wrappers_are_shared() {
        let string = Schema {
            kind: SchemaKind::String,
            ..Default::default()
        };
        let (arena, ids) = arena_with(vec![string]);
        let options = Options::default();
        let mut builder = IrBuilder::new(&options, &arena);

        let inner = builder.lower(ids[0], "S").unwrap();
        let a = builder.wrap(inner, true, false).unwrap();
        let b = builder.wrap(inner, true, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            builder.registry.get(a).name.as_ref().unwrap().pascal_case,
            "OptString"
        );
    }

    #[test]
    fn wrappers_shared_across_schema_nodes() {
        let string = || Schema {
            kind: SchemaKind::String,
            ..Default::default()
        };
        let (arena, ids) = arena_with(vec![string(), string()]);
        let options = Options::default();
        let mut builder = IrBuilder::new(&options, &arena);

        // Two inline properties lower to distinct ids for the same shape.
        let first = builder.lower(ids[0], "A").unwrap();
        let second = builder.lower(ids[1], "B").unwrap();
        assert_ne!(first, second);

        let a = builder.wrap(first, true, false).unwrap();
        let b = builder.wrap(second, true, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn optional_nullable_array_is_rejected() {
        let item = Schema {
            kind: SchemaKind::String,
            ..Default::default()
        };
        let (mut arena, ids) = arena_with(vec![item]);
        let array = arena.alloc(Schema {
            kind: SchemaKind::Array,
            item: Some(ids[0]),
            ..Default::default()
        });
        let options = Options::default();
        let mut builder = IrBuilder::new(&options, &arena);

        let inner = builder.lower(array, "Tags").unwrap();
        let err = builder.wrap(inner, true, true).unwrap_err();
        assert_eq!(
            err.not_implemented_reason(),
            Some("optional nullable array")
        );
    }

    #[test]
    fn byte_format_becomes_byte_array() {
        let bytes = Schema {
            kind: SchemaKind::String,
            format: Some("byte".to_string()),
            ..Default::default()
        };
        let (arena, ids) = arena_with(vec![bytes]);
        let options = Options::default();
        let mut builder = IrBuilder::new(&options, &arena);

        let ty = builder.lower(ids[0], "Blob").unwrap();
        match &builder.registry.get(ty).kind {
            TypeKind::Array { item } => match &builder.registry.get(*item).kind {
                TypeKind::Primitive { kind, .. } => assert_eq!(*kind, PrimitiveKind::Byte),
                other => panic!("unexpected item kind: {other:?}"),
            },
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
