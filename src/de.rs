//! Read path: one composed document into an object graph.
//!
//! Every node is visited with the static type of the slot it lands in. The
//! tag (if any) may replace that type, then the capability of the resulting
//! type decides how the node is turned into a value. Collections and records
//! are allocated and registered under their anchor *before* their children
//! are visited, which is what lets a child alias its own ancestor.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::anchors::{AnchorTable, PendingAlias};
use crate::binding::{Capability, MemberTable};
use crate::convert::ConverterReader;
use crate::error::{Error, ScalarError, Result};
use crate::events::ScalarStyle;
use crate::graph::{Graph, Object, ObjectId, Slot, SlotPlace, Value};
use crate::mapper::{Document, Mapper};
use crate::merge;
use crate::node::{ComposedDocument, Node, NodeId, NodeKind};
use crate::options::DuplicateKeyPolicy;
use crate::scalars::{self, Inferred};
use crate::tag::CoreTag;
use crate::types::{EnumDescriptor, PrimitiveKind, TypeKey};

pub(crate) struct DocumentReader<'d> {
    pub(crate) mapper: &'d Mapper,
    pub(crate) doc: &'d ComposedDocument,
    pub(crate) graph: Graph,
    anchors: AnchorTable,
    depth: usize,
    root: Value,
    /// Anchored nodes being built for an alias that came after them.
    building: Vec<NodeId>,
}

/// Map one composed document onto `ty`.
pub(crate) fn read_document(mapper: &Mapper, doc: &ComposedDocument, ty: TypeKey) -> Result<Document> {
    let mut reader = DocumentReader {
        mapper,
        doc,
        graph: Graph::new(),
        anchors: AnchorTable::new(),
        depth: 0,
        root: Value::Null,
        building: Vec::new(),
    };
    let root = reader.visit(ComposedDocument::ROOT, ty, Slot::Root)?;
    reader.root = root;
    // Forward aliases whose definition was never reached by the walk above
    // (it only appears inside a merge source) get it built now.
    while let Some((def, expected)) = reader.anchors.unbuilt() {
        reader.visit(def, expected, Slot::Detached)?;
        if reader.anchors.lookup(def).is_none() {
            break;
        }
    }
    reader.anchors.finish()?;
    tracing::debug!(objects = reader.graph.len(), "document read");
    Ok(Document {
        graph: reader.graph,
        root: reader.root,
    })
}

/// Plain null spellings, or an explicit `!!null`.
fn is_null_node(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Scalar { value, style } => {
            if node.tag.core() == Some(CoreTag::Null) {
                return true;
            }
            node.tag.is_non_specific() && *style == ScalarStyle::Plain && scalars::is_null(value)
        }
        _ => false,
    }
}

/// Mapping keys compared for the duplicate policy. Objects compare by identity.
fn fingerprint(value: &Value) -> String {
    format!("{value:?}")
}

impl<'d> DocumentReader<'d> {
    /// Visit node `id` as a value of static type `ty` headed for `slot`.
    pub(crate) fn visit(&mut self, id: NodeId, ty: TypeKey, slot: Slot) -> Result<Value> {
        let doc = self.doc;
        let node = doc.node(id);
        if self.depth >= self.mapper.options().max_depth {
            return Err(Error::recursion(self.mapper.options().max_depth).with_location(node.location));
        }
        self.depth += 1;
        let result = match &node.kind {
            NodeKind::Alias(name) => self.visit_alias(id, name, ty, slot),
            // An anchored node reached again (through a merge, a skipped key
            // or an alias) is the object already built for it.
            _ if matches!(self.anchors.lookup(id), Some(Value::Ref(_))) => {
                let value = self.anchors.lookup(id).cloned().unwrap_or(Value::Null);
                self.check_assignable(&value, ty).map(|()| value)
            }
            _ => self
                .effective_type(node, ty)
                .and_then(|ty| self.build(id, node, ty, slot)),
        };
        self.depth -= 1;
        result.map_err(|err| err.or_location(node.location))
    }

    fn visit_alias(&mut self, id: NodeId, name: &str, ty: TypeKey, slot: Slot) -> Result<Value> {
        let doc = self.doc;
        let target = doc.anchored(name, id);
        if let Some(def) = target {
            if let NodeKind::Scalar { .. } = doc.node(def).kind {
                // Scalars are values: re-read the anchored text for this slot's type.
                return self.visit(def, ty, slot);
            }
            if let Some(value) = self.anchors.lookup(def) {
                let value = value.clone();
                self.check_assignable(&value, ty)?;
                return Ok(value);
            }
            // Defined earlier but never built: it sits in a merge source, or in
            // an entry that was overridden or skipped.
            if def < id && !matches!(slot, Slot::Discard) && !self.building.contains(&def) {
                tracing::trace!(alias = %name, node = def, "building anchored node on first alias");
                self.building.push(def);
                let value = self.visit(def, ty, slot);
                self.building.pop();
                return value;
            }
        }
        match slot {
            Slot::Discard => Ok(Value::Null),
            Slot::Detached => Err(Error::AnchorNotFound {
                name: name.to_owned(),
                location: doc.node(id).location,
            }),
            Slot::Root | Slot::In(..) => {
                self.anchors.defer(PendingAlias {
                    name: name.to_owned(),
                    target,
                    slot,
                    expected: ty,
                    location: doc.node(id).location,
                });
                Ok(Value::Null)
            }
        }
    }

    fn check_assignable(&self, value: &Value, ty: TypeKey) -> Result<()> {
        let Some(object) = self.graph.deref(value) else {
            return Ok(());
        };
        let registry = self.mapper.registry();
        if registry.is_assignable(object.type_key(), ty) {
            Ok(())
        } else {
            Err(Error::conversion(format!(
                "alias of a `{}` cannot be used as `{}`",
                registry.name_of(object.type_key()),
                registry.name_of(ty)
            )))
        }
    }

    /// Remember an anchored node's value and fill the aliases waiting for it.
    fn register(&mut self, id: NodeId, value: &Value) -> Result<()> {
        let doc = self.doc;
        let Some(anchor) = &doc.node(id).anchor else {
            return Ok(());
        };
        tracing::trace!(anchor = %anchor, node = id, "anchor registered");
        for alias in self.anchors.register(id, value.clone()) {
            self.check_assignable(value, alias.expected)
                .map_err(|err| err.or_location(alias.location))?;
            tracing::trace!(alias = %alias.name, "forward alias resolved");
            self.write(alias.slot, value.clone());
        }
        Ok(())
    }

    fn write(&mut self, slot: Slot, value: Value) {
        match slot {
            Slot::Root => self.root = value,
            Slot::In(object, place) => {
                if let Some(target) = self.graph.slot_mut(object, place) {
                    *target = value;
                }
            }
            Slot::Detached | Slot::Discard => {}
        }
    }

    /// The type to build: a bound tag wins over the static type, a local
    /// `!Name` tag selects a registered type of that name.
    fn effective_type(&self, node: &Node, ty: TypeKey) -> Result<TypeKey> {
        if node.tag.is_non_specific() {
            return Ok(ty);
        }
        let registry = self.mapper.registry();
        let unknown = || {
            Error::conversion(format!(
                "tag `{}` does not name a type assignable to `{}`",
                node.tag,
                registry.name_of(ty)
            ))
        };
        if let Some(bound) = self.mapper.type_for_tag(&node.tag) {
            if !registry.is_assignable(bound, ty) {
                return Err(unknown());
            }
            return Ok(bound);
        }
        if node.tag.core().is_some() {
            return Ok(ty);
        }
        let named = node
            .tag
            .as_str()
            .and_then(|t| t.strip_prefix('!'))
            .and_then(|name| registry.by_name(name));
        match named {
            Some(named) if registry.is_assignable(named, ty) => Ok(named),
            Some(_) => Err(unknown()),
            // Tags nothing is bound to are ignored when the slot type decides anyway.
            None if registry.unwrap_optional(ty) != TypeKey::ANY => Ok(ty),
            None => Err(unknown()),
        }
    }

    fn build(&mut self, id: NodeId, node: &Node, ty: TypeKey, slot: Slot) -> Result<Value> {
        let mapper = self.mapper;
        match mapper.capability(ty) {
            Capability::Converter(index) => {
                let converter = mapper.converter(*index);
                let value = converter.read(&mut ConverterReader::new(self, id, ty))?;
                self.register(id, &value)?;
                Ok(value)
            }
            Capability::Optional(inner) => {
                if is_null_node(node) {
                    Ok(Value::Null)
                } else {
                    self.build(id, node, *inner, slot)
                }
            }
            Capability::Dynamic => self.build_dynamic(id, node),
            Capability::Scalar(kind) => self.build_primitive(node, *kind),
            Capability::Enum => {
                let registry = mapper.registry();
                match registry.get(ty).and_then(|d| d.as_enum()) {
                    Some(descriptor) => self.build_enum(node, ty, descriptor),
                    None => Err(Error::conversion(format!("`{}` is not an enumeration", registry.name_of(ty)))),
                }
            }
            Capability::Sequence { item } => self.build_sequence(id, node, ty, *item),
            Capability::Mapping { key, value } => self.build_mapping(id, node, ty, *key, *value),
            Capability::Structural(_) => self.build_record(id, node, ty),
            Capability::Unsupported => Err(Error::conversion(format!(
                "no converter or structural mapping for `{}`",
                mapper.registry().name_of(ty)
            ))),
        }
    }

    fn scalar_text<'n>(&self, node: &'n Node, ty: TypeKey) -> Result<&'n str> {
        node.scalar_text().ok_or_else(|| {
            Error::conversion(format!(
                "expected a scalar for `{}`, found a {}",
                self.mapper.registry().name_of(ty),
                node.describe()
            ))
        })
    }

    fn build_dynamic(&mut self, id: NodeId, node: &Node) -> Result<Value> {
        match &node.kind {
            NodeKind::Scalar { value, style } => self.infer_scalar(node, value, *style),
            NodeKind::Sequence(_) => {
                let ty = self.mapper.any_sequence();
                self.build_sequence(id, node, ty, TypeKey::ANY)
            }
            NodeKind::Mapping(_) => {
                let ty = self.mapper.any_mapping();
                self.build_mapping(id, node, ty, TypeKey::ANY, TypeKey::ANY)
            }
            NodeKind::Alias(_) => Err(Error::unexpected("node")),
        }
    }

    /// A scalar with nothing but its tag and text to go on.
    fn infer_scalar(&self, node: &Node, text: &str, style: ScalarStyle) -> Result<Value> {
        let strict = self.mapper.options().strict_booleans;
        if let Some(core) = node.tag.core() {
            return match core {
                CoreTag::Null => Ok(Value::Null),
                CoreTag::Bool => scalars::parse_bool(text, strict)
                    .map(Value::Bool)
                    .map_err(|e| Error::scalar("bool", text, e)),
                CoreTag::Int => scalars::parse_int(text)
                    .map_err(|e| Error::scalar("int", text, e))
                    .and_then(|i| {
                        int_value(i).ok_or_else(|| {
                            Error::scalar("int", text, ScalarError::IntOverflow { target: "u64" })
                        })
                    }),
                CoreTag::Float => scalars::parse_f64(text)
                    .map(Value::Float)
                    .map_err(|e| Error::scalar("float", text, e)),
                CoreTag::Binary => scalars::decode_binary(text)
                    .map(Value::Bytes)
                    .map_err(|e| Error::scalar("binary", text, e)),
                CoreTag::Str | CoreTag::Timestamp => Ok(Value::Str(text.to_owned())),
                CoreTag::Seq | CoreTag::Map | CoreTag::Merge => Err(Error::conversion(format!(
                    "tag `{}` cannot be applied to a scalar",
                    node.tag
                ))),
            };
        }
        if !node.tag.is_non_specific() || !style.is_plain() {
            return Ok(Value::Str(text.to_owned()));
        }
        Ok(match scalars::infer(text, strict) {
            Inferred::Null => Value::Null,
            Inferred::Bool(b) => Value::Bool(b),
            Inferred::Int(i) => int_value(i).unwrap_or_else(|| Value::Str(text.to_owned())),
            Inferred::Float(f) => Value::Float(f),
            Inferred::Str => Value::Str(text.to_owned()),
        })
    }

    fn build_primitive(&self, node: &Node, kind: PrimitiveKind) -> Result<Value> {
        let text = node.scalar_text().ok_or_else(|| {
            Error::conversion(format!("expected a scalar for `{}`, found a {}", kind.name(), node.describe()))
        })?;
        if is_null_node(node) {
            return match kind {
                PrimitiveKind::String | PrimitiveKind::Bytes => Ok(Value::Null),
                _ => Err(Error::scalar(kind.name(), text, ScalarError::NullNotAllowed)),
            };
        }
        let fail = |cause| Error::scalar(kind.name(), text, cause);
        let int = || scalars::parse_int(text).map_err(fail);
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(scalars::parse_bool(text, self.mapper.options().strict_booleans).map_err(fail)?),
            PrimitiveKind::I8 => Value::Int(scalars::narrow::<i8>(int()?, "i8").map_err(fail)?.into()),
            PrimitiveKind::I16 => Value::Int(scalars::narrow::<i16>(int()?, "i16").map_err(fail)?.into()),
            PrimitiveKind::I32 => Value::Int(scalars::narrow::<i32>(int()?, "i32").map_err(fail)?.into()),
            PrimitiveKind::I64 => Value::Int(scalars::narrow::<i64>(int()?, "i64").map_err(fail)?),
            PrimitiveKind::U8 => Value::UInt(scalars::narrow::<u8>(int()?, "u8").map_err(fail)?.into()),
            PrimitiveKind::U16 => Value::UInt(scalars::narrow::<u16>(int()?, "u16").map_err(fail)?.into()),
            PrimitiveKind::U32 => Value::UInt(scalars::narrow::<u32>(int()?, "u32").map_err(fail)?.into()),
            PrimitiveKind::U64 => Value::UInt(scalars::narrow::<u64>(int()?, "u64").map_err(fail)?),
            PrimitiveKind::F32 => Value::Float32(scalars::parse_f32(text).map_err(fail)?),
            PrimitiveKind::F64 => Value::Float(scalars::parse_f64(text).map_err(fail)?),
            PrimitiveKind::Char => Value::Char(scalars::parse_char(text).map_err(fail)?),
            PrimitiveKind::Guid => Value::Guid(scalars::parse_guid(text).map_err(fail)?),
            PrimitiveKind::Bytes => Value::Bytes(scalars::decode_binary(text).map_err(fail)?),
            PrimitiveKind::String if node.tag.core() == Some(CoreTag::Binary) => {
                let bytes = scalars::decode_binary(text).map_err(fail)?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| Error::conversion("!!binary content is not valid UTF-8 text"))?;
                Value::Str(text)
            }
            PrimitiveKind::String => Value::Str(text.to_owned()),
        })
    }

    fn build_enum(&self, node: &Node, ty: TypeKey, descriptor: &EnumDescriptor) -> Result<Value> {
        let name = self.mapper.registry().name_of(ty);
        let text = self.scalar_text(node, ty)?;
        if is_null_node(node) {
            return Err(Error::scalar(name, text, ScalarError::NullNotAllowed));
        }
        let lookup = |part: &str| -> Result<u64> {
            descriptor
                .variants()
                .find(|&(n, _)| n == part)
                .or_else(|| descriptor.variants().find(|&(n, _)| n.eq_ignore_ascii_case(part)))
                .map(|(_, v)| v)
                .or_else(|| scalars::parse_int(part).ok().and_then(|i| u64::try_from(i).ok()))
                .ok_or_else(|| {
                    Error::scalar(name, text, ScalarError::UnknownVariant { name: part.to_owned() })
                })
        };
        let bits = if descriptor.is_flags() {
            let mut bits = 0;
            for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                bits |= lookup(part)?;
            }
            bits
        } else {
            lookup(text.trim())?
        };
        Ok(Value::Enum { ty, bits })
    }

    fn build_sequence(&mut self, id: NodeId, node: &Node, ty: TypeKey, item: TypeKey) -> Result<Value> {
        let items = match &node.kind {
            NodeKind::Sequence(items) => items,
            _ if is_null_node(node) => return Ok(Value::Null),
            _ => return Err(self.shape_error(node, ty, "sequence")),
        };
        let object = self.graph.sequence(ty, Vec::with_capacity(items.len()));
        self.register(id, &Value::Ref(object))?;
        for &child in items {
            let Some(place) = self.graph.push_item(object) else {
                return Err(Error::unexpected("sequence object"));
            };
            let value = self.visit(child, item, Slot::In(object, place))?;
            self.write(Slot::In(object, place), value);
        }
        Ok(Value::Ref(object))
    }

    fn build_mapping(
        &mut self,
        id: NodeId,
        node: &Node,
        ty: TypeKey,
        key_ty: TypeKey,
        value_ty: TypeKey,
    ) -> Result<Value> {
        match &node.kind {
            NodeKind::Mapping(_) => {}
            _ if is_null_node(node) => return Ok(Value::Null),
            _ => return Err(self.shape_error(node, ty, "mapping")),
        }
        let object = self.graph.mapping(ty, Vec::new());
        self.register(id, &Value::Ref(object))?;
        let entries = merge::expand(self.doc, id, self.mapper.options().max_depth)?;
        let policy = self.mapper.options().duplicate_keys;
        let mut seen: AHashMap<String, SlotPlace> = AHashMap::new();

        for entry in &entries {
            let Some((key_place, value_place)) = self.graph.push_entry(object) else {
                return Err(Error::unexpected("mapping object"));
            };
            let pending_before = self.anchors.pending_len();
            let key = self.visit(entry.key, key_ty, Slot::In(object, key_place))?;
            let key_pending = self.anchors.pending_len() > pending_before;
            self.write(Slot::In(object, key_place), key.clone());

            let mut target = value_place;
            if !key_pending && !entry.merged {
                let print = fingerprint(&key);
                if let Some(&earlier) = seen.get(&print) {
                    let location = self.doc.node(entry.key).location;
                    match policy {
                        DuplicateKeyPolicy::Error => {
                            return Err(Error::conversion(format!("duplicate mapping key {key:?}"))
                                .with_location(location));
                        }
                        DuplicateKeyPolicy::FirstWins => {
                            self.graph.pop_entry(object);
                            self.skip_node(entry.value)?;
                            continue;
                        }
                        DuplicateKeyPolicy::LastWins => {
                            self.graph.pop_entry(object);
                            target = earlier;
                        }
                    }
                } else {
                    seen.insert(print, value_place);
                }
            }
            let value = self.visit(entry.value, value_ty, Slot::In(object, target))?;
            self.write(Slot::In(object, target), value);
        }
        Ok(Value::Ref(object))
    }

    fn build_record(&mut self, id: NodeId, node: &Node, ty: TypeKey) -> Result<Value> {
        let mapper = self.mapper;
        let registry = mapper.registry();
        match &node.kind {
            NodeKind::Mapping(_) => {}
            _ if is_null_node(node) => return Ok(Value::Null),
            _ => return Err(self.shape_error(node, ty, "mapping")),
        }

        let construction = |msg: String, name: &str| Error::Construction {
            type_name: name.to_owned(),
            msg,
            location: node.location,
        };
        let concrete = mapper
            .factory()
            .create(ty, registry)
            .map_err(|msg| construction(msg, registry.name_of(ty)))?;
        if !registry.derives_from(concrete, ty) {
            return Err(construction(
                format!("object factory produced `{}`, which does not derive from it", registry.name_of(concrete)),
                registry.name_of(ty),
            ));
        }
        let Some(table) = mapper.member_table(concrete) else {
            return Err(construction(
                "object factory produced a type that is not a record".to_owned(),
                registry.name_of(concrete),
            ));
        };

        let object = self.graph.alloc(Object::Record {
            ty: concrete,
            fields: table.initial.clone(),
        });
        self.register(id, &Value::Ref(object))?;
        self.bind_members(object, id, concrete, table)?;
        Ok(Value::Ref(object))
    }

    fn bind_members(&mut self, object: ObjectId, id: NodeId, ty: TypeKey, table: &MemberTable) -> Result<()> {
        let doc = self.doc;
        let mapper = self.mapper;
        let options = mapper.options();
        let mut assigned: SmallVec<[bool; 16]> = SmallVec::from_elem(false, table.initial.len());

        for entry in merge::expand(doc, id, options.max_depth)? {
            let key = doc.node(entry.key);
            let name = self.member_name(entry.key)?;
            let Some(member) = table.find(name) else {
                if options.ignore_unmatched_properties {
                    tracing::trace!(key = name, "ignoring unmatched key");
                    self.skip_node(entry.value)?;
                    continue;
                }
                return Err(Error::UnknownMember {
                    key: name.to_owned(),
                    type_name: mapper.registry().name_of(ty).to_owned(),
                    location: key.location,
                });
            };
            if assigned[member.field] {
                match options.duplicate_keys {
                    DuplicateKeyPolicy::Error => {
                        return Err(Error::conversion(format!("duplicate member `{name}`")).with_location(key.location));
                    }
                    DuplicateKeyPolicy::FirstWins => {
                        self.skip_node(entry.value)?;
                        continue;
                    }
                    DuplicateKeyPolicy::LastWins => {}
                }
            }
            assigned[member.field] = true;
            let slot = Slot::In(object, SlotPlace::Field(member.field));
            let value = self.visit(entry.value, member.ty, slot)?;
            self.write(slot, value);
        }
        Ok(())
    }

    /// The text a member key selects by. An alias key must refer to a scalar
    /// defined before it.
    fn member_name(&self, key: NodeId) -> Result<&'d str> {
        let doc = self.doc;
        let node = doc.node(key);
        match &node.kind {
            NodeKind::Scalar { value, .. } => Ok(value),
            NodeKind::Alias(name) => match doc.anchored(name, key) {
                Some(def) if def < key => doc.node(def).scalar_text().ok_or_else(|| {
                    Error::conversion(format!("alias `*{name}` used as a member name does not refer to a scalar"))
                        .with_location(node.location)
                }),
                _ => Err(Error::conversion(format!("alias `*{name}` used as a member name is not resolved yet"))
                    .with_location(node.location)),
            },
            _ => Err(Error::conversion(format!("record member names must be scalars, found a {}", node.describe()))
                .with_location(node.location)),
        }
    }

    /// Read past a node nobody binds. Its anchors still have to be
    /// materialized for aliases elsewhere in the document.
    fn skip_node(&mut self, id: NodeId) -> Result<()> {
        if self.doc.has_anchor_within(id) {
            self.visit(id, TypeKey::ANY, Slot::Discard)?;
        }
        Ok(())
    }

    fn shape_error(&self, node: &Node, ty: TypeKey, expected: &str) -> Error {
        Error::conversion(format!(
            "expected a {expected} for `{}`, found a {}",
            self.mapper.registry().name_of(ty),
            node.describe()
        ))
    }
}

/// Integers read without a width go to `Int` when they fit, else `UInt`.
fn int_value(i: i128) -> Option<Value> {
    i64::try_from(i)
        .map(Value::Int)
        .ok()
        .or_else(|| u64::try_from(i).ok().map(Value::UInt))
}
