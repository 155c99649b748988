//! Typed intermediate representation: the language-neutral output the
//! backend templates consume.

pub mod builder;
pub mod names;
pub mod operations;

use std::collections::HashMap;
use std::ops::Index;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::IrError;
use crate::refkey::RefKey;
use crate::router::Router;
use crate::schema::SchemaId;

pub use builder::IrBuilder;
pub use names::{normalize_name, route_to_name, NormalizedName};
pub use operations::{OperationIr, ParamIr, RequestIr, ResponseIr};

/// Handle into the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

/// What a missing or null value means for an indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NilSemantic {
    /// Absent from the document.
    Optional,
    /// Present and explicitly null.
    Null,
    /// Cycle-breaking placeholder; never a valid wire state.
    Invalid,
}

/// Wrapper flavor of a generic container type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericVariant {
    Optional,
    Nullable,
    OptionalNullable,
}

impl GenericVariant {
    /// Name prefix of the wrapper type.
    pub fn prefix(&self) -> &'static str {
        match self {
            GenericVariant::Optional => "Opt",
            GenericVariant::Nullable => "Nil",
            GenericVariant::OptionalNullable => "OptNil",
        }
    }
}

/// Scalar kinds after format folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Bool,
    Int,
    Int32,
    Int64,
    Float,
    Float32,
    Float64,
    Byte,
    Time,
    Uuid,
    Duration,
    Url,
    Ip,
}

impl PrimitiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Float32 => "Float32",
            PrimitiveKind::Float64 => "Float64",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Time => "Time",
            PrimitiveKind::Uuid => "Uuid",
            PrimitiveKind::Duration => "Duration",
            PrimitiveKind::Url => "Url",
            PrimitiveKind::Ip => "Ip",
        }
    }
}

/// One struct field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: NormalizedName,
    /// Wire tag; empty for an inline catch-all field.
    pub json_name: String,
    pub ty: TypeId,
    pub required: bool,
    pub description: Option<String>,
    /// Source schema, kept for validation facets.
    pub schema: Option<SchemaId>,
}

/// Discriminator of a sum: property name plus the complete encode mapping.
#[derive(Debug, Clone)]
pub struct SumDiscriminator {
    pub property: String,
    /// Encode value → variant. Explicit and implicit entries combined.
    pub mapping: IndexMap<String, TypeId>,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive {
        kind: PrimitiveKind,
        format: Option<String>,
    },
    /// A named rename of another type.
    Alias { inner: TypeId },
    Enum {
        base: PrimitiveKind,
        values: Vec<Value>,
    },
    Struct { fields: Vec<Field> },
    /// String-keyed map; `None` value means untyped.
    Map { value: Option<TypeId> },
    Array { item: TypeId },
    /// An `Opt`/`Nil`/`OptNil` container around a wrappable type.
    Generic {
        inner: TypeId,
        variant: GenericVariant,
    },
    /// Explicit indirection; carries the meaning of its nil state.
    Pointer { to: TypeId, semantic: NilSemantic },
    Sum {
        variants: Vec<TypeId>,
        discriminator: Option<SumDiscriminator>,
    },
    /// Sealed marker interface over its implementing types.
    Interface { marker: String },
    /// Free-form JSON.
    Any,
}

/// One IR type.
#[derive(Debug, Clone)]
pub struct Type {
    /// Present on registry-named types; anonymous wrappers have none.
    pub name: Option<NormalizedName>,
    pub kind: TypeKind,
    pub schema: Option<SchemaId>,
    pub ref_key: Option<RefKey>,
    pub description: Option<String>,
    /// Interfaces whose marker this type carries.
    pub implements: Vec<TypeId>,
}

impl Type {
    pub fn anonymous(kind: TypeKind) -> Self {
        Type {
            name: None,
            kind,
            schema: None,
            ref_key: None,
            description: None,
            implements: Vec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface { .. })
    }

    /// Whether an `Opt`/`Nil` generic can wrap this type. Arrays, pointers,
    /// interfaces, and untyped values take pointer semantics instead.
    pub fn can_generic_wrap(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Primitive { .. }
                | TypeKind::Alias { .. }
                | TypeKind::Enum { .. }
                | TypeKind::Struct { .. }
                | TypeKind::Map { .. }
                | TypeKind::Sum { .. }
        )
    }
}

/// All IR types, with name and reference indexes.
///
/// The registry is owned by the builder for the duration of a run; nothing
/// else inserts into it.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<Type>,
    by_name: IndexMap<String, TypeId>,
    by_ref: HashMap<RefKey, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0]
    }

    /// Insert an anonymous type.
    pub fn insert(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(ty);
        id
    }

    /// Register an existing type under a name. A second registration of the
    /// same name is fatal unless both sides are the same logical generic
    /// wrapper, in which case the already-registered id wins.
    pub fn register(&mut self, name: NormalizedName, id: TypeId) -> Result<TypeId, IrError> {
        if let Some(&existing) = self.by_name.get(&name.pascal_case) {
            if existing == id {
                return Ok(existing);
            }
            if let (
                TypeKind::Generic { inner, variant },
                TypeKind::Generic {
                    inner: have_inner,
                    variant: have_variant,
                },
            ) = (&self.types[id.0].kind, &self.types[existing.0].kind)
            {
                if inner == have_inner && variant == have_variant {
                    return Ok(existing);
                }
            }
            return Err(IrError::NameConflict(name.pascal_case));
        }
        self.types[id.0].name = Some(name.clone());
        self.by_name.insert(name.pascal_case, id);
        Ok(id)
    }

    /// Bind a reference to a type; a second binding is fatal.
    pub fn bind_ref(&mut self, key: RefKey, id: TypeId) -> Result<(), IrError> {
        if self.by_ref.contains_key(&key) {
            return Err(IrError::RefConflict(key.to_string()));
        }
        self.by_ref.insert(key, id);
        Ok(())
    }

    pub fn lookup_ref(&self, key: &RefKey) -> Option<TypeId> {
        self.by_ref.get(key).copied()
    }

    pub fn lookup_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Named types in insertion order.
    pub fn named(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Named interface types.
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.by_name
            .iter()
            .filter(|(_, id)| self.types[id.0].is_interface())
            .map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Index<TypeId> for TypeRegistry {
    type Output = Type;

    fn index(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }
}

/// The complete IR: the read-only view handed to the template stage.
#[derive(Debug)]
pub struct Ir {
    pub types: TypeRegistry,
    /// Ordered by path, then method.
    pub operations: Vec<OperationIr>,
    /// 3.1 webhooks, keyed by name. Not routed.
    pub webhooks: IndexMap<String, Vec<OperationIr>>,
    pub router: Router,
}

impl Ir {
    pub fn interfaces(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.types.interfaces()
    }
}
