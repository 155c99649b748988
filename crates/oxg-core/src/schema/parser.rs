//! Lowers raw schemas into the resolved arena.
//!
//! Named components are memoized per [`RefKey`] (local and external caches
//! are kept separate), so every referencing site shares one handle.
//! Recursive schemas are permitted: a back-reference returns the
//! already-registered handle and marks the target `recursive`; the IR
//! builder later breaks the cycle with a pointer.

use std::collections::{HashMap, HashSet};

use heck::ToLowerCamelCase;
use regex::Regex;

use super::enum_values::{check_default, check_enum, value_kind};
use super::{
    AdditionalProps, ArrayFacets, Discriminator, NumericFacets, ObjectFacets, PatternProperty,
    Property, Schema, SchemaArena, SchemaId, SchemaKind, StringFacets,
};
use crate::config::Options;
use crate::error::{Error, ResolveError, Result, SchemaError};
use crate::location::Location;
use crate::raw::schema::{
    AdditionalProperties, Exclusive, RawSchema, SchemaOrRef, SchemaType, TypeSet,
};
use crate::refkey::{RefKey, ResolveCtx, resolve_pointer};
use crate::source::DocumentSource;

pub struct SchemaParser<'a> {
    options: &'a Options,
    arena: SchemaArena,
    ctx: ResolveCtx,
    local: HashMap<RefKey, SchemaId>,
    external: HashMap<RefKey, SchemaId>,
    recursive: HashSet<SchemaId>,
}

impl<'a> SchemaParser<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self {
            options,
            arena: SchemaArena::new(),
            ctx: ResolveCtx::new(options.depth_limit),
            local: HashMap::new(),
            external: HashMap::new(),
            recursive: HashSet::new(),
        }
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn into_arena(mut self) -> SchemaArena {
        for id in std::mem::take(&mut self.recursive) {
            self.arena.mark_recursive(id);
        }
        self.arena
    }

    /// Parse a schema-or-ref at `loc`. Inline schemas allocate fresh nodes;
    /// references resolve through the caches.
    pub fn parse(
        &mut self,
        source: &mut DocumentSource,
        raw: &SchemaOrRef,
        loc: &Location,
    ) -> Result<SchemaId> {
        match raw {
            SchemaOrRef::Ref { ref_path } => self.parse_ref(source, ref_path, loc),
            SchemaOrRef::Schema(schema) => self.parse_schema(source, schema, None, loc.clone()),
        }
    }

    fn parse_ref(
        &mut self,
        source: &mut DocumentSource,
        reference: &str,
        loc: &Location,
    ) -> Result<SchemaId> {
        let key = self
            .ctx
            .key(reference)
            .map_err(|e| Error::from(SchemaError::from(e)).at(loc.clone()))?;

        if let Some(&id) = self.cached(&key) {
            if self.ctx.in_progress(&key) {
                // Cycle-closing back-edge.
                self.recursive.insert(id);
            }
            return Ok(id);
        }

        self.ctx
            .enter(key.clone())
            .map_err(|e| Error::from(SchemaError::from(e)).at(loc.clone()))?;
        let result = self.parse_ref_target(source, &key);
        self.ctx.leave(&key);
        result
    }

    fn parse_ref_target(
        &mut self,
        source: &mut DocumentSource,
        key: &RefKey,
    ) -> Result<SchemaId> {
        let (raw, target_loc) = self.lookup_raw(source, key)?;
        match raw {
            // A component that is purely a reference aliases its target; a
            // loop of such refs has no content and dies in `ctx.enter`.
            SchemaOrRef::Ref { ref_path } => {
                let id = self.parse_ref(source, &ref_path, &target_loc)?;
                self.cache_insert(key.clone(), id);
                Ok(id)
            }
            SchemaOrRef::Schema(schema) => {
                let id = self.arena.placeholder();
                self.cache_insert(key.clone(), id);
                let node = self.build(source, &schema, Some(key.clone()), target_loc)?;
                self.arena.fill(id, node);
                if self.recursive.contains(&id) {
                    self.arena.mark_recursive(id);
                }
                Ok(id)
            }
        }
    }

    fn parse_schema(
        &mut self,
        source: &mut DocumentSource,
        raw: &RawSchema,
        ref_key: Option<RefKey>,
        loc: Location,
    ) -> Result<SchemaId> {
        let node = self.build(source, raw, ref_key, loc)?;
        Ok(self.arena.alloc(node))
    }

    fn cached(&self, key: &RefKey) -> Option<&SchemaId> {
        if key.is_local() {
            self.local.get(key)
        } else {
            self.external.get(key)
        }
    }

    fn cache_insert(&mut self, key: RefKey, id: SchemaId) {
        if key.is_local() {
            self.local.insert(key, id);
        } else {
            self.external.insert(key, id);
        }
    }

    /// Load the raw schema a key points at, with its location.
    fn lookup_raw(
        &mut self,
        source: &mut DocumentSource,
        key: &RefKey,
    ) -> Result<(SchemaOrRef, Location)> {
        let document = source
            .document(&key.loc)
            .map_err(|e| Error::from(SchemaError::from(e)))?;
        let file = document.file.clone();
        let value = resolve_pointer(&document.value, &key.ptr).ok_or_else(|| {
            Error::from(SchemaError::from(ResolveError::TargetNotFound(
                key.to_string(),
            )))
            .at(Location::root(file.clone()))
        })?;
        let raw: SchemaOrRef = serde_json::from_value(value.clone()).map_err(|e| {
            Error::from(SchemaError::from(ResolveError::BadReference(format!(
                "{key}: {e}"
            ))))
        })?;
        let mut loc = Location::new(file, key.ptr.clone());
        if let Some(index) = &document.index {
            loc = loc.positioned(index);
        }
        Ok((raw, loc))
    }

    /// Lower one raw schema object into a resolved node.
    fn build(
        &mut self,
        source: &mut DocumentSource,
        raw: &RawSchema,
        ref_key: Option<RefKey>,
        loc: Location,
    ) -> Result<Schema> {
        let at = |e: SchemaError| Error::from(e).at(loc.clone());

        let (kind, nullable) = self.determine_kind(raw).map_err(at)?;
        self.check_facet_applicability(raw, kind).map_err(at)?;

        let mut schema = Schema {
            kind,
            name: raw
                .name_annotation()
                .map(str::to_string)
                .or_else(|| ref_key.as_ref().and_then(|k| k.short_name())),
            ref_key,
            description: raw.description.clone(),
            format: raw.format.clone(),
            nullable,
            deprecated: raw.deprecated.unwrap_or(false),
            content_encoding: raw.content_encoding.clone(),
            content_media_type: raw.content_media_type.clone(),
            location: loc.clone(),
            ..Schema::default()
        };

        // Facets, normalized per declared kind.
        schema.numeric = self.numeric_facets(raw).map_err(at)?;
        schema.string = self.string_facets(raw).map_err(at)?;
        schema.array = ArrayFacets {
            min_items: raw.min_items,
            max_items: raw.max_items,
            unique_items: raw.unique_items.unwrap_or(false),
        };
        schema.object = ObjectFacets {
            min_properties: raw.min_properties,
            max_properties: raw.max_properties,
        };

        // Children.
        for (name, prop) in &raw.properties {
            let prop_loc = loc.key("properties").key(name);
            let id = self.parse(source, prop, &prop_loc)?;
            let description = match prop {
                SchemaOrRef::Schema(s) => s.description.clone(),
                SchemaOrRef::Ref { .. } => None,
            };
            schema.properties.push(Property {
                name: name.clone(),
                schema: id,
                required: raw.required.iter().any(|r| r == name),
                description,
            });
        }

        if let Some(items) = &raw.items {
            let id = self.parse(source, items, &loc.key("items"))?;
            schema.item = Some(id);
        }

        schema.additional = match &raw.additional_properties {
            None => AdditionalProps::Absent,
            Some(AdditionalProperties::Bool(false)) => AdditionalProps::Forbidden,
            Some(AdditionalProperties::Bool(true)) => AdditionalProps::Allowed(None),
            Some(AdditionalProperties::Schema(s)) => {
                let id = self.parse(source, s, &loc.key("additionalProperties"))?;
                AdditionalProps::Allowed(Some(id))
            }
        };

        for (pattern, prop) in &raw.pattern_properties {
            let regex = Regex::new(pattern).map_err(|e| {
                at(SchemaError::BadPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })?;
            let id = self.parse(source, prop, &loc.key("patternProperties").key(pattern))?;
            schema.pattern_properties.push(PatternProperty {
                pattern: regex,
                schema: id,
            });
        }

        schema.all_of = self.parse_members(source, &raw.all_of, &loc.key("allOf"))?;
        schema.one_of = self.parse_members(source, &raw.one_of, &loc.key("oneOf"))?;
        schema.any_of = self.parse_members(source, &raw.any_of, &loc.key("anyOf"))?;

        if let Some(disc) = &raw.discriminator {
            let members = if !schema.one_of.is_empty() {
                schema.one_of.clone()
            } else {
                schema.any_of.clone()
            };
            schema.discriminator =
                Some(self.parse_discriminator(source, disc, &members, &loc).map_err(|e| {
                    match e {
                        Error::Located(_) => e,
                        other => other.at(loc.key("discriminator")),
                    }
                })?);
        }

        // Values.
        if !raw.enum_values.is_empty() {
            // Enum entries carry the declared type; without one, the type is
            // inferred from the first entry (null entries defer to the next).
            let enum_kind = if kind == SchemaKind::Empty {
                raw.enum_values
                    .iter()
                    .find(|v| !v.is_null())
                    .map(value_kind)
                    .unwrap_or(SchemaKind::Empty)
            } else {
                kind
            };
            schema.enum_values =
                check_enum(&raw.enum_values, enum_kind, nullable).map_err(at)?;
        }

        if let Some(default) = &raw.default_value {
            check_default(default, kind, nullable).map_err(at)?;
            schema.default_value = Some(default.clone());
        }

        // Examples append; `example` never replaces `examples`.
        if let Some(example) = &raw.example {
            schema.examples.push(example.clone());
        }
        schema.examples.extend(raw.examples.iter().cloned());

        Ok(schema)
    }

    fn parse_members(
        &mut self,
        source: &mut DocumentSource,
        members: &[SchemaOrRef],
        loc: &Location,
    ) -> Result<Vec<SchemaId>> {
        members
            .iter()
            .enumerate()
            .map(|(i, m)| self.parse(source, m, &loc.index(i)))
            .collect()
    }

    /// Resolve explicit mapping entries and add implicit short-name entries
    /// for unmapped members. Every mapping target must be a member of the
    /// composition.
    fn parse_discriminator(
        &mut self,
        source: &mut DocumentSource,
        raw: &crate::raw::schema::Discriminator,
        members: &[SchemaId],
        loc: &Location,
    ) -> Result<Discriminator> {
        let mut discriminator = Discriminator {
            property_name: raw.property_name.clone(),
            mapping: Default::default(),
        };

        let mut mapped: HashSet<SchemaId> = HashSet::new();
        for (value, target) in &raw.mapping {
            // Mapping values are either full refs or component short names.
            let reference = if target.contains('/') || target.contains('#') {
                target.clone()
            } else {
                format!("#/components/schemas/{target}")
            };
            let id = self.parse_ref(source, &reference, loc)?;
            if !members.contains(&id) {
                return Err(Error::from(SchemaError::UnknownMappingTarget(
                    target.clone(),
                ))
                .at(loc.key("discriminator").key("mapping").key(value)));
            }
            mapped.insert(id);
            discriminator.mapping.insert(value.clone(), id);
        }

        // Implicit entries for unmapped members, keyed by the lowerCamel of
        // the component short name ("Dog" encodes as "dog").
        for &member in members {
            if mapped.contains(&member) {
                continue;
            }
            if let Some(short) = self.arena[member].short_name() {
                discriminator
                    .mapping
                    .entry(short.to_lower_camel_case())
                    .or_insert(member);
            }
        }

        Ok(discriminator)
    }

    /// Decide the schema kind and nullability from `type` (or infer when
    /// enabled and `type` is absent).
    fn determine_kind(&self, raw: &RawSchema) -> Result<(SchemaKind, bool), SchemaError> {
        let explicit_nullable = raw.nullable.unwrap_or(false);

        let (kind, type_nullable) = match &raw.schema_type {
            Some(TypeSet::Single(t)) => (schema_type_kind(*t), *t == SchemaType::Null),
            Some(TypeSet::Multiple(types)) => {
                let mut nullable = false;
                let mut kinds: Vec<SchemaKind> = Vec::new();
                for t in types {
                    if *t == SchemaType::Null {
                        nullable = true;
                    } else {
                        kinds.push(schema_type_kind(*t));
                    }
                }
                kinds.dedup();
                match kinds.as_slice() {
                    [] => (SchemaKind::Null, true),
                    [one] => (*one, nullable),
                    many => {
                        return Err(SchemaError::UnexpectedType {
                            expected: "a single type (plus optional null)".to_string(),
                            actual: format!("{} types", many.len()),
                        });
                    }
                }
            }
            None if self.options.infer_types => (infer_kind(raw), false),
            None => (SchemaKind::Empty, false),
        };

        Ok((kind, explicit_nullable || type_nullable))
    }

    /// Structural invariants are fatal; scalar facets on the wrong type are
    /// tolerated (preserved, not enforced) unless cross-type constraints are
    /// disallowed.
    fn check_facet_applicability(
        &self,
        raw: &RawSchema,
        kind: SchemaKind,
    ) -> Result<(), SchemaError> {
        if kind == SchemaKind::Object && raw.items.is_some() {
            return Err(SchemaError::InvalidFacet {
                facet: "items",
                message: "object schema must not set items".to_string(),
            });
        }
        if kind == SchemaKind::Array && !raw.properties.is_empty() {
            return Err(SchemaError::InvalidFacet {
                facet: "properties",
                message: "array schema must not set properties".to_string(),
            });
        }

        let mut misplaced: Vec<&'static str> = Vec::new();
        let numeric = matches!(
            kind,
            SchemaKind::Integer | SchemaKind::Number | SchemaKind::Empty
        );
        let stringy = matches!(kind, SchemaKind::String | SchemaKind::Empty);
        if !numeric
            && (raw.minimum.is_some() || raw.maximum.is_some() || raw.multiple_of.is_some())
        {
            misplaced.push("numeric bounds");
        }
        if !stringy
            && (raw.pattern.is_some() || raw.min_length.is_some() || raw.max_length.is_some())
        {
            misplaced.push("string facets");
        }

        for facet in misplaced {
            if !self.options.allow_cross_type_constraints {
                return Err(SchemaError::InvalidFacet {
                    facet: "type",
                    message: format!("{} do not apply to {}", facet, kind.as_str()),
                });
            }
            log::warn!(
                "{} on a {} schema are preserved but not enforced",
                facet,
                kind.as_str()
            );
        }
        Ok(())
    }

    fn numeric_facets(&self, raw: &RawSchema) -> Result<NumericFacets, SchemaError> {
        let mut facets = NumericFacets {
            minimum: raw.minimum.clone(),
            maximum: raw.maximum.clone(),
            ..NumericFacets::default()
        };

        // 3.0 boolean flags qualify min/max; 3.1 numeric forms are the bound.
        match &raw.exclusive_minimum {
            Some(Exclusive::Flag(flag)) => facets.exclusive_minimum = *flag,
            Some(Exclusive::Bound(n)) => {
                facets.minimum = Some(n.clone());
                facets.exclusive_minimum = true;
            }
            None => {}
        }
        match &raw.exclusive_maximum {
            Some(Exclusive::Flag(flag)) => facets.exclusive_maximum = *flag,
            Some(Exclusive::Bound(n)) => {
                facets.maximum = Some(n.clone());
                facets.exclusive_maximum = true;
            }
            None => {}
        }

        if let Some(multiple) = &raw.multiple_of {
            if multiple.as_f64().map(|v| v <= 0.0).unwrap_or(false) {
                return Err(SchemaError::InvalidFacet {
                    facet: "multipleOf",
                    message: format!("must be greater than 0, got {multiple}"),
                });
            }
            facets.multiple_of = Some(multiple.clone());
        }

        Ok(facets)
    }

    fn string_facets(&self, raw: &RawSchema) -> Result<StringFacets, SchemaError> {
        let pattern = match &raw.pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| SchemaError::BadPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?),
            None => None,
        };
        Ok(StringFacets {
            min_length: raw.min_length,
            max_length: raw.max_length,
            pattern,
        })
    }
}

fn schema_type_kind(t: SchemaType) -> SchemaKind {
    match t {
        SchemaType::String => SchemaKind::String,
        SchemaType::Number => SchemaKind::Number,
        SchemaType::Integer => SchemaKind::Integer,
        SchemaType::Boolean => SchemaKind::Boolean,
        SchemaType::Array => SchemaKind::Array,
        SchemaType::Object => SchemaKind::Object,
        SchemaType::Null => SchemaKind::Null,
    }
}

/// Infer a kind from the facets present, in the order object ⇒ array ⇒
/// number ⇒ string.
fn infer_kind(raw: &RawSchema) -> SchemaKind {
    if !raw.properties.is_empty()
        || raw.additional_properties.is_some()
        || !raw.pattern_properties.is_empty()
        || !raw.required.is_empty()
        || raw.min_properties.is_some()
        || raw.max_properties.is_some()
    {
        SchemaKind::Object
    } else if raw.items.is_some()
        || raw.min_items.is_some()
        || raw.max_items.is_some()
        || raw.unique_items.is_some()
    {
        SchemaKind::Array
    } else if raw.minimum.is_some()
        || raw.maximum.is_some()
        || raw.multiple_of.is_some()
        || raw.exclusive_minimum.is_some()
        || raw.exclusive_maximum.is_some()
    {
        SchemaKind::Number
    } else if raw.pattern.is_some() || raw.min_length.is_some() || raw.max_length.is_some() {
        SchemaKind::String
    } else {
        SchemaKind::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Document;

    fn parse_one(yaml: &str, options: &Options) -> Result<(SchemaArena, SchemaId)> {
        let doc = Document::parse("schema.yaml", yaml).unwrap();
        let raw: SchemaOrRef = serde_json::from_value(doc.value.clone()).unwrap();
        let mut source = DocumentSource::local(doc);
        let mut parser = SchemaParser::new(options);
        let id = parser.parse(&mut source, &raw, &Location::root("schema.yaml"))?;
        Ok((parser.into_arena(), id))
    }

    #[test]
    fn object_with_items_is_fatal() {
        let err = parse_one("type: object\nitems:\n  type: string\n", &Options::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Located(_) | Error::Schema(SchemaError::InvalidFacet { .. })
        ));
    }

    #[test]
    fn multiple_of_must_be_positive() {
        let result = parse_one("type: integer\nmultipleOf: 0\n", &Options::default());
        assert!(result.is_err());
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let result = parse_one("type: string\npattern: \"[\"\n", &Options::default());
        assert!(result.is_err());
    }

    #[test]
    fn nullable_type_array() {
        let (arena, id) =
            parse_one("type: [string, \"null\"]\n", &Options::default()).unwrap();
        assert_eq!(arena[id].kind, SchemaKind::String);
        assert!(arena[id].nullable);
    }

    #[test]
    fn inference_is_gated() {
        let (arena, id) = parse_one("properties:\n  a:\n    type: string\n", &Options::default())
            .unwrap();
        assert_eq!(arena[id].kind, SchemaKind::Empty);

        let options = Options {
            infer_types: true,
            ..Options::default()
        };
        let (arena, id) = parse_one("properties:\n  a:\n    type: string\n", &options).unwrap();
        assert_eq!(arena[id].kind, SchemaKind::Object);
    }

    #[test]
    fn cross_type_facets_tolerated_by_default() {
        let yaml = "type: integer\npattern: \"^a$\"\n";
        assert!(parse_one(yaml, &Options::default()).is_ok());

        let strict = Options {
            allow_cross_type_constraints: false,
            ..Options::default()
        };
        assert!(parse_one(yaml, &strict).is_err());
    }

    #[test]
    fn exclusive_bound_normalization() {
        let (arena, id) =
            parse_one("type: number\nexclusiveMinimum: 3\n", &Options::default()).unwrap();
        let facets = &arena[id].numeric;
        assert!(facets.exclusive_minimum);
        assert_eq!(facets.minimum.as_ref().unwrap().as_f64(), Some(3.0));
    }
}
