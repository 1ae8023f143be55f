//! The object graph: an arena of shared objects plus the values that point into it.

use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::types::TypeKey;

/// Identity of an object in a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0);
    }
}

impl nohash_hasher::IsEnabled for ObjectId {}

/// A value held in a slot. Sequences, mappings and records live in the graph
/// and are referenced by [`Value::Ref`], which is what gives them identity.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Float32(f32),
    Char(char),
    Str(String),
    Guid(Uuid),
    Bytes(Vec<u8>),
    Enum { ty: TypeKey, bits: u64 },
    Ref(ObjectId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Float32(f) => Some(*f as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Equality that treats floats by bit pattern, so `NaN` equals itself
    /// and `0.0` differs from `-0.0`.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) | Value::Float32(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Guid(_) => "guid",
            Value::Bytes(_) => "bytes",
            Value::Enum { .. } => "enum",
            Value::Ref(_) => "object",
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from!(
    bool => Bool,
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => UInt, u16 => UInt, u32 => UInt, u64 => UInt,
    f64 => Float, f32 => Float32,
    char => Char,
    String => Str, &str => Str,
    Uuid => Guid,
    Vec<u8> => Bytes,
    ObjectId => Ref,
);

#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Sequence { ty: TypeKey, items: Vec<Value> },
    Mapping { ty: TypeKey, entries: Vec<(Value, Value)> },
    /// One field per flattened member of the record type, in declaration order.
    Record { ty: TypeKey, fields: Vec<Value> },
}

impl Object {
    pub fn type_key(&self) -> TypeKey {
        match self {
            Object::Sequence { ty, .. } | Object::Mapping { ty, .. } | Object::Record { ty, .. } => *ty,
        }
    }
}

/// Where a value sits inside the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotPlace {
    Item(usize),
    Key(usize),
    Value(usize),
    Field(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Root,
    In(ObjectId, SlotPlace),
    /// A value handed back to a caller rather than stored; it cannot wait
    /// for a forward alias.
    Detached,
    /// A value read only for its anchors and then dropped.
    Discard,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    objects: Vec<Object>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn sequence(&mut self, ty: TypeKey, items: Vec<Value>) -> ObjectId {
        self.alloc(Object::Sequence { ty, items })
    }

    pub fn mapping(&mut self, ty: TypeKey, entries: Vec<(Value, Value)>) -> ObjectId {
        self.alloc(Object::Mapping { ty, entries })
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn items(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id)? {
            Object::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self, id: ObjectId) -> Option<&[(Value, Value)]> {
        match self.get(id)? {
            Object::Mapping { entries, .. } => Some(entries),
            _ => None,
        }
    }

    pub fn fields(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id)? {
            Object::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Look up a mapping entry by a string key.
    pub fn lookup(&self, id: ObjectId, key: &str) -> Option<&Value> {
        self.entries(id)?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Follow a `Ref` value to its object.
    pub fn deref(&self, value: &Value) -> Option<&Object> {
        self.get(value.as_object()?)
    }

    pub(crate) fn slot_mut(&mut self, id: ObjectId, place: SlotPlace) -> Option<&mut Value> {
        match (self.objects.get_mut(id.index())?, place) {
            (Object::Sequence { items, .. }, SlotPlace::Item(i)) => items.get_mut(i),
            (Object::Mapping { entries, .. }, SlotPlace::Key(i)) => entries.get_mut(i).map(|e| &mut e.0),
            (Object::Mapping { entries, .. }, SlotPlace::Value(i)) => entries.get_mut(i).map(|e| &mut e.1),
            (Object::Record { fields, .. }, SlotPlace::Field(i)) => fields.get_mut(i),
            _ => None,
        }
    }

    pub(crate) fn push_item(&mut self, id: ObjectId) -> Option<SlotPlace> {
        match self.objects.get_mut(id.index())? {
            Object::Sequence { items, .. } => {
                items.push(Value::Null);
                Some(SlotPlace::Item(items.len() - 1))
            }
            _ => None,
        }
    }

    pub(crate) fn push_entry(&mut self, id: ObjectId) -> Option<(SlotPlace, SlotPlace)> {
        match self.objects.get_mut(id.index())? {
            Object::Mapping { entries, .. } => {
                entries.push((Value::Null, Value::Null));
                let i = entries.len() - 1;
                Some((SlotPlace::Key(i), SlotPlace::Value(i)))
            }
            _ => None,
        }
    }

    /// Drop the last entry of a mapping (a duplicate key that lost).
    pub(crate) fn pop_entry(&mut self, id: ObjectId) {
        if let Some(Object::Mapping { entries, .. }) = self.objects.get_mut(id.index()) {
            entries.pop();
        }
    }
}
