//! The type registry: descriptions of the shapes the mapper can bind.
//!
//! There is no runtime reflection to lean on, so every type taking part in a
//! mapping is registered up front. Primitive types have fixed keys. Records
//! can be declared before they are defined, which is how recursive and
//! mutually recursive shapes are written.

use std::fmt;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::events::ScalarStyle;
use crate::graph::Value;

/// Identity of a registered type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u32);

impl TypeKey {
    pub const ANY: TypeKey = TypeKey(0);
    pub const BOOL: TypeKey = TypeKey(1);
    pub const I8: TypeKey = TypeKey(2);
    pub const I16: TypeKey = TypeKey(3);
    pub const I32: TypeKey = TypeKey(4);
    pub const I64: TypeKey = TypeKey(5);
    pub const U8: TypeKey = TypeKey(6);
    pub const U16: TypeKey = TypeKey(7);
    pub const U32: TypeKey = TypeKey(8);
    pub const U64: TypeKey = TypeKey(9);
    pub const F32: TypeKey = TypeKey(10);
    pub const F64: TypeKey = TypeKey(11);
    pub const CHAR: TypeKey = TypeKey(12);
    pub const STRING: TypeKey = TypeKey(13);
    pub const GUID: TypeKey = TypeKey(14);
    pub const BYTES: TypeKey = TypeKey(15);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    Guid,
    Bytes,
}

impl PrimitiveKind {
    const ALL: [PrimitiveKind; 15] = [
        PrimitiveKind::Bool,
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
        PrimitiveKind::Char,
        PrimitiveKind::String,
        PrimitiveKind::Guid,
        PrimitiveKind::Bytes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "string",
            PrimitiveKind::Guid => "guid",
            PrimitiveKind::Bytes => "bytes",
        }
    }

    /// The value an unset member of this type holds. Strings and byte
    /// buffers are references and start out null.
    pub fn zero(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64 => Value::Int(0),
            PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64 => Value::UInt(0),
            PrimitiveKind::F32 => Value::Float32(0.0),
            PrimitiveKind::F64 => Value::Float(0.0),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::Guid => Value::Guid(uuid::Uuid::nil()),
            PrimitiveKind::String | PrimitiveKind::Bytes => Value::Null,
        }
    }
}

/// One declared member of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub(crate) name: String,
    pub(crate) ty: TypeKey,
    pub(crate) public: bool,
    pub(crate) alias: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) default: Option<Value>,
    pub(crate) scalar_style: Option<ScalarStyle>,
    pub(crate) apply_naming: bool,
    pub(crate) order: Option<i32>,
    pub(crate) serialize_as: Option<TypeKey>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeKey) -> Self {
        Self {
            name: name.into(),
            ty,
            public: true,
            alias: None,
            ignore: false,
            default: None,
            scalar_style: None,
            apply_naming: true,
            order: None,
            serialize_as: None,
        }
    }

    /// Serialize under this name instead of the (converted) member name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn non_public(mut self) -> Self {
        self.public = false;
        self
    }

    /// The declared default, used for omit-defaults and for fresh instances.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn scalar_style(mut self, style: ScalarStyle) -> Self {
        self.scalar_style = Some(style);
        self
    }

    pub fn without_naming_convention(mut self) -> Self {
        self.apply_naming = false;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Write the value as if it had this static type (typically a base record).
    pub fn serialize_as(mut self, ty: TypeKey) -> Self {
        self.serialize_as = Some(ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn is_public(&self) -> bool {
        self.public
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordDescriptor {
    pub(crate) base: Option<TypeKey>,
    pub(crate) members: Vec<Member>,
    pub(crate) is_abstract: bool,
    pub(crate) constructible: bool,
}

impl RecordDescriptor {
    pub fn new() -> Self {
        Self {
            constructible: true,
            ..Self::default()
        }
    }

    /// Inherit from a base record; base members come first.
    pub fn extends(mut self, base: TypeKey) -> Self {
        self.base = Some(base);
        self
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// An interface-like record: never instantiated by the default factory.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// No default constructor: only a custom factory or converter can build it.
    pub fn without_default_constructor(mut self) -> Self {
        self.constructible = false;
        self
    }

    pub fn base(&self) -> Option<TypeKey> {
        self.base
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_constructible(&self) -> bool {
        self.constructible && !self.is_abstract
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub(crate) variants: Vec<(String, u64)>,
    pub(crate) flags: bool,
}

impl EnumDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flags enumeration: values combine bitwise and are written as
    /// comma-separated variant names.
    pub fn flags() -> Self {
        Self {
            variants: Vec::new(),
            flags: true,
        }
    }

    pub fn variant(mut self, name: impl Into<String>, value: u64) -> Self {
        self.variants.push((name.into(), value));
        self
    }

    pub fn is_flags(&self) -> bool {
        self.flags
    }

    pub fn variants(&self) -> impl Iterator<Item = (&str, u64)> {
        self.variants.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    /// Dynamic "object": the node decides what gets built.
    Any,
    Primitive(PrimitiveKind),
    /// Nullable wrapper around another type.
    Optional(TypeKey),
    Sequence { item: TypeKey },
    Mapping { key: TypeKey, value: TypeKey },
    Record(RecordDescriptor),
    Enum(EnumDescriptor),
    /// Declared but without a structure: needs a converter (or a later `define`).
    Opaque,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    /// Interned container or optional built by the registry itself. These
    /// have no name a reader could resolve, so they are never tagged.
    pub(crate) anonymous: bool,
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn as_record(&self) -> Option<&RecordDescriptor> {
        match &self.kind {
            TypeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match &self.kind {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// Owner of all type descriptors used by one mapper.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: AHashMap<String, TypeKey>,
    sequences: AHashMap<TypeKey, TypeKey>,
    mappings: AHashMap<(TypeKey, TypeKey), TypeKey>,
    optionals: AHashMap<TypeKey, TypeKey>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            by_name: AHashMap::new(),
            sequences: AHashMap::new(),
            mappings: AHashMap::new(),
            optionals: AHashMap::new(),
        };
        registry.push("any", TypeKind::Any);
        for kind in PrimitiveKind::ALL {
            registry.push(kind.name(), TypeKind::Primitive(kind));
        }
        registry
    }

    fn push(&mut self, name: impl Into<String>, kind: TypeKind) -> TypeKey {
        let name = name.into();
        let key = TypeKey(self.types.len() as u32);
        self.by_name.entry(name.clone()).or_insert(key);
        self.types.push(TypeDescriptor {
            name,
            kind,
            anonymous: false,
        });
        key
    }

    fn push_anonymous(&mut self, name: String, kind: TypeKind) -> TypeKey {
        let key = self.push(name, kind);
        self.types[key.index()].anonymous = true;
        key
    }

    /// Reserve a key for a named type to be defined later. Declaring an
    /// existing name returns its key.
    pub fn declare(&mut self, name: impl Into<String>) -> TypeKey {
        let name = name.into();
        if let Some(&key) = self.by_name.get(&name) {
            return key;
        }
        self.push(name, TypeKind::Opaque)
    }

    /// Give a declared type its structure.
    pub fn define(&mut self, key: TypeKey, kind: TypeKind) -> Result<()> {
        let descriptor = self
            .types
            .get_mut(key.index())
            .ok_or_else(|| Error::config(format!("type {key} is not registered")))?;
        if descriptor.kind != TypeKind::Opaque {
            return Err(Error::config(format!(
                "type `{}` is already defined",
                descriptor.name
            )));
        }
        descriptor.kind = kind;
        Ok(())
    }

    /// Declare and define a record in one step.
    pub fn record(&mut self, name: impl Into<String>, record: RecordDescriptor) -> Result<TypeKey> {
        let key = self.declare(name);
        self.define(key, TypeKind::Record(record))?;
        Ok(key)
    }

    pub fn enumeration(&mut self, name: impl Into<String>, descriptor: EnumDescriptor) -> Result<TypeKey> {
        let key = self.declare(name);
        self.define(key, TypeKind::Enum(descriptor))?;
        Ok(key)
    }

    /// The anonymous sequence type for `item`, shared by every caller.
    pub fn sequence_of(&mut self, item: TypeKey) -> TypeKey {
        if let Some(&key) = self.sequences.get(&item) {
            return key;
        }
        let name = format!("[{}]", self.name_of(item));
        let key = self.push_anonymous(name, TypeKind::Sequence { item });
        self.sequences.insert(item, key);
        key
    }

    pub fn mapping_of(&mut self, key: TypeKey, value: TypeKey) -> TypeKey {
        if let Some(&existing) = self.mappings.get(&(key, value)) {
            return existing;
        }
        let name = format!("{{{}: {}}}", self.name_of(key), self.name_of(value));
        let ty = self.push_anonymous(name, TypeKind::Mapping { key, value });
        self.mappings.insert((key, value), ty);
        ty
    }

    pub fn optional(&mut self, inner: TypeKey) -> TypeKey {
        if let Some(&key) = self.optionals.get(&inner) {
            return key;
        }
        let name = format!("{}?", self.name_of(inner));
        let key = self.push_anonymous(name, TypeKind::Optional(inner));
        self.optionals.insert(inner, key);
        key
    }

    /// A user container type with sequence behavior (distinct from `sequence_of`).
    pub fn named_sequence(&mut self, name: impl Into<String>, item: TypeKey) -> Result<TypeKey> {
        let key = self.declare(name);
        self.define(key, TypeKind::Sequence { item })?;
        Ok(key)
    }

    pub fn named_mapping(&mut self, name: impl Into<String>, key: TypeKey, value: TypeKey) -> Result<TypeKey> {
        let ty = self.declare(name);
        self.define(ty, TypeKind::Mapping { key, value })?;
        Ok(ty)
    }

    pub fn get(&self, key: TypeKey) -> Option<&TypeDescriptor> {
        self.types.get(key.index())
    }

    /// Keys reaching here were checked when the mapper was built.
    pub(crate) fn descriptor(&self, key: TypeKey) -> &TypeDescriptor {
        &self.types[key.index()]
    }

    pub fn by_name(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, key: TypeKey) -> &str {
        self.get(key).map_or("<unregistered>", |d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeKey, &TypeDescriptor)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeKey(i as u32), d))
    }

    /// Whether record `ty` is `ancestor` or inherits from it.
    pub fn derives_from(&self, ty: TypeKey, ancestor: TypeKey) -> bool {
        let mut current = Some(ty);
        let mut steps = 0;
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.types.len() {
                return false;
            }
            current = self.get(key).and_then(TypeDescriptor::as_record).and_then(|r| r.base);
        }
        false
    }

    /// Strip optional wrappers.
    pub fn unwrap_optional(&self, mut ty: TypeKey) -> TypeKey {
        while let Some(TypeKind::Optional(inner)) = self.get(ty).map(|d| &d.kind) {
            ty = *inner;
        }
        ty
    }

    /// Whether a value whose runtime type is `runtime` fits a slot of static type `slot`.
    pub fn is_assignable(&self, runtime: TypeKey, slot: TypeKey) -> bool {
        let slot = self.unwrap_optional(slot);
        if slot == TypeKey::ANY || self.derives_from(runtime, slot) {
            return true;
        }
        matches!(
            (self.get(runtime).map(|d| &d.kind), self.get(slot).map(|d| &d.kind)),
            (Some(TypeKind::Sequence { .. }), Some(TypeKind::Sequence { .. }))
                | (Some(TypeKind::Mapping { .. }), Some(TypeKind::Mapping { .. }))
        )
    }

    /// The value an unset slot of type `ty` holds.
    pub fn zero_value(&self, ty: TypeKey) -> Value {
        match self.get(ty).map(|d| &d.kind) {
            Some(TypeKind::Primitive(kind)) => kind.zero(),
            Some(TypeKind::Enum(_)) => Value::Enum { ty, bits: 0 },
            _ => Value::Null,
        }
    }

    /// `ty` followed by its base records, most derived first. Fails on a
    /// type that is not a record or an inheritance loop.
    pub fn record_chain(&self, ty: TypeKey) -> Result<Vec<TypeKey>> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(key) = current {
            if chain.contains(&key) {
                return Err(Error::config(format!(
                    "record `{}` inherits from itself",
                    self.name_of(ty)
                )));
            }
            let record = self
                .get(key)
                .and_then(TypeDescriptor::as_record)
                .ok_or_else(|| Error::config(format!("`{}` is not a record", self.name_of(key))))?;
            chain.push(key);
            current = record.base;
        }
        Ok(chain)
    }

    /// Every member of a record, base members first.
    pub fn flattened_members(&self, ty: TypeKey) -> Result<Vec<&Member>> {
        Ok(self
            .record_chain(ty)?
            .iter()
            .rev()
            .flat_map(|&key| self.descriptor(key).as_record().map_or(&[][..], |r| &r.members[..]))
            .collect())
    }
}
