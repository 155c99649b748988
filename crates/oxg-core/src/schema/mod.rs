//! Resolved schema graph.
//!
//! Schemas live in a [`SchemaArena`]; every edge between schemas is a
//! [`SchemaId`] handle, never an owning link, so cyclic graphs are
//! representable. Named components are registered by [`RefKey`] and parsed
//! exactly once; every referencing site shares the same handle.

pub mod enum_values;
pub mod parser;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::location::Location;
use crate::refkey::RefKey;

pub use parser::SchemaParser;

/// Handle to a schema node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

/// The shape of a resolved schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
    /// No type constraint: matches any value.
    Empty,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Object => "object",
            SchemaKind::Array => "array",
            SchemaKind::String => "string",
            SchemaKind::Integer => "integer",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Null => "null",
            SchemaKind::Empty => "empty",
        }
    }
}

/// A property on an object schema.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub schema: SchemaId,
    pub required: bool,
    pub description: Option<String>,
}

/// A compiled `patternProperties` entry.
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub pattern: Regex,
    pub schema: SchemaId,
}

/// Tri-state `additionalProperties`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdditionalProps {
    #[default]
    Absent,
    /// `additionalProperties: false`.
    Forbidden,
    /// `true` or a schema; `None` means any value.
    Allowed(Option<SchemaId>),
}

/// A resolved discriminator: property name plus value → variant mapping.
/// Implicit entries (component short names) are merged into `mapping`.
#[derive(Debug, Clone, Default)]
pub struct Discriminator {
    pub property_name: String,
    pub mapping: IndexMap<String, SchemaId>,
}

/// Validation facets that apply to numbers.
#[derive(Debug, Clone, Default)]
pub struct NumericFacets {
    pub minimum: Option<serde_json::Number>,
    pub maximum: Option<serde_json::Number>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<serde_json::Number>,
}

impl NumericFacets {
    pub fn is_empty(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none() && self.multiple_of.is_none()
    }
}

/// Validation facets that apply to strings.
#[derive(Debug, Clone, Default)]
pub struct StringFacets {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Regex>,
}

/// Validation facets that apply to arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayFacets {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

/// Validation facets that apply to object sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectFacets {
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
}

/// A node in the resolved schema graph.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub kind: SchemaKind,
    /// Explicit name annotation or the enclosing component name.
    pub name: Option<String>,
    /// Originating reference; `None` for inline schemas.
    pub ref_key: Option<RefKey>,
    pub description: Option<String>,
    pub format: Option<String>,
    pub nullable: bool,

    pub properties: Vec<Property>,
    pub item: Option<SchemaId>,
    pub additional: AdditionalProps,
    pub pattern_properties: Vec<PatternProperty>,

    pub all_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub discriminator: Option<Discriminator>,

    pub enum_values: Vec<Value>,
    pub default_value: Option<Value>,
    pub examples: Vec<Value>,

    pub numeric: NumericFacets,
    pub string: StringFacets,
    pub array: ArrayFacets,
    pub object: ObjectFacets,

    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
    pub deprecated: bool,

    /// Reachable from itself through properties/items.
    pub recursive: bool,
    pub location: Location,
}

impl Default for SchemaKind {
    fn default() -> Self {
        SchemaKind::Empty
    }
}

impl Schema {
    /// Component short name, from the annotation or the originating ref.
    pub fn short_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        self.ref_key.as_ref().and_then(|k| k.short_name())
    }

    pub fn is_composite(&self) -> bool {
        !self.all_of.is_empty() || !self.one_of.is_empty() || !self.any_of.is_empty()
    }
}

/// Arena of schema nodes. Handles are stable for the lifetime of a run.
#[derive(Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<Schema>,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, schema: Schema) -> SchemaId {
        let id = SchemaId(self.nodes.len());
        self.nodes.push(schema);
        id
    }

    /// Reserve a slot to be filled later. Used while parsing a component so
    /// that back-references inside it can obtain its handle.
    pub fn placeholder(&mut self) -> SchemaId {
        self.alloc(Schema::default())
    }

    pub fn fill(&mut self, id: SchemaId, schema: Schema) {
        self.nodes[id.0] = schema;
    }

    pub fn mark_recursive(&mut self, id: SchemaId) {
        self.nodes[id.0].recursive = true;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.nodes.iter().enumerate().map(|(i, s)| (SchemaId(i), s))
    }
}

impl std::ops::Index<SchemaId> for SchemaArena {
    type Output = Schema;

    fn index(&self, id: SchemaId) -> &Schema {
        &self.nodes[id.0]
    }
}

impl std::ops::IndexMut<SchemaId> for SchemaArena {
    fn index_mut(&mut self, id: SchemaId) -> &mut Schema {
        &mut self.nodes[id.0]
    }
}
