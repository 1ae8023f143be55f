//! The mapper: configuration, precomputed bindings and the public entry points.

use std::sync::OnceLock;

use ahash::AHashMap;

use crate::binding::{
    build_member_table, capability_of, Capability, DefaultObjectFactory, MemberOverride, MemberTable,
    ObjectFactory,
};
use crate::convert::TypeConverter;
use crate::de::read_document;
use crate::emitter::YamlEmitter;
use crate::error::{Error, Result};
use crate::events::{Emitter, Event, Events};
use crate::graph::{Graph, Object, ObjectId, Value};
use crate::live_events::LiveEvents;
use crate::naming::{NamingConvention, NullNamingConvention};
use crate::node::compose_document;
use crate::options::Options;
use crate::ser::write_document;
use crate::tag::Tag;
use crate::types::{TypeKey, TypeKind, TypeRegistry};

/// One decoded document: the objects it produced and its root value.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub graph: Graph,
    pub root: Value,
}

/// Maps YAML events to object graphs and back.
///
/// Built once with [`MapperBuilder`]; immutable afterwards and reusable for
/// any number of documents.
///
/// ```rust
/// use saphyr_graph::{Mapper, Member, RecordDescriptor, TypeKey, TypeRegistry, Value};
///
/// let mut registry = TypeRegistry::new();
/// let point = registry
///     .record(
///         "Point",
///         RecordDescriptor::new()
///             .member(Member::new("x", TypeKey::I32))
///             .member(Member::new("y", TypeKey::I32)),
///     )
///     .unwrap();
/// let mapper = Mapper::builder(registry).build().unwrap();
/// let doc = mapper.from_str("x: 3\ny: -4\n", point).unwrap();
/// let id = doc.root.as_object().unwrap();
/// assert_eq!(mapper.field(&doc.graph, id, "y"), Some(&Value::Int(-4)));
/// assert_eq!(mapper.to_string(&doc.graph, &doc.root, point).unwrap(), "x: 3\ny: -4\n");
/// ```
pub struct Mapper {
    registry: TypeRegistry,
    options: Options,
    converters: Vec<Box<dyn TypeConverter>>,
    factory: Box<dyn ObjectFactory>,
    tags: AHashMap<Tag, TypeKey>,
    tags_by_type: AHashMap<TypeKey, Tag>,
    capabilities: Vec<Capability>,
    any_sequence: TypeKey,
    any_mapping: TypeKey,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("types", &self.registry.len())
            .field("options", &self.options)
            .field("converters", &self.converters.len())
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

static UNSUPPORTED: Capability = Capability::Unsupported;

impl Mapper {
    pub fn builder(registry: TypeRegistry) -> MapperBuilder {
        MapperBuilder::new(registry)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn capability(&self, ty: TypeKey) -> &Capability {
        self.capabilities.get(ty.index()).unwrap_or(&UNSUPPORTED)
    }

    pub(crate) fn converter(&self, index: usize) -> &dyn TypeConverter {
        self.converters[index].as_ref()
    }

    pub(crate) fn factory(&self) -> &dyn ObjectFactory {
        self.factory.as_ref()
    }

    pub(crate) fn member_table(&self, ty: TypeKey) -> Option<&MemberTable> {
        match self.capability(ty) {
            Capability::Structural(table) => Some(table),
            _ => None,
        }
    }

    pub(crate) fn type_for_tag(&self, tag: &Tag) -> Option<TypeKey> {
        self.tags.get(tag).copied()
    }

    pub(crate) fn tag_for_type(&self, ty: TypeKey) -> Option<&Tag> {
        self.tags_by_type.get(&ty)
    }

    pub(crate) fn any_sequence(&self) -> TypeKey {
        self.any_sequence
    }

    pub(crate) fn any_mapping(&self) -> TypeKey {
        self.any_mapping
    }

    /// Read the next document from `events` as a value of type `ty`.
    /// Returns `None` once the stream holds no more documents.
    pub fn deserialize(&self, events: &mut dyn Events, ty: TypeKey) -> Result<Option<Document>> {
        let Some(doc) = compose_document(events, self.options.max_depth)? else {
            return Ok(None);
        };
        tracing::debug!(nodes = doc.len(), ty = self.registry.name_of(ty), "reading document");
        read_document(self, &doc, ty).map(Some)
    }

    /// Read every remaining document of the stream.
    pub fn deserialize_all(&self, events: &mut dyn Events, ty: TypeKey) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        while let Some(document) = self.deserialize(events, ty)? {
            documents.push(document);
        }
        Ok(documents)
    }

    /// Read exactly one document from YAML text. Empty input yields a null root;
    /// a second document is an error.
    pub fn from_str(&self, yaml: &str, ty: TypeKey) -> Result<Document> {
        let mut events = LiveEvents::new(yaml);
        let document = self.deserialize(&mut events, ty)?.unwrap_or(Document {
            graph: Graph::new(),
            root: Value::Null,
        });
        if let Some(ev) = events.peek()? {
            if matches!(ev.event, Event::DocumentStart { .. }) {
                return Err(Error::MultipleDocuments { location: ev.location });
            }
        }
        Ok(document)
    }

    pub fn from_str_multiple(&self, yaml: &str, ty: TypeKey) -> Result<Vec<Document>> {
        self.deserialize_all(&mut LiveEvents::new(yaml), ty)
    }

    /// Write `root` (held in `graph`, of static type `ty`) as a complete
    /// stream with one document.
    pub fn serialize(&self, emitter: &mut dyn Emitter, graph: &Graph, root: &Value, ty: TypeKey) -> Result<()> {
        emitter.emit(Event::StreamStart)?;
        self.serialize_document(emitter, graph, root, ty)?;
        emitter.emit(Event::StreamEnd)
    }

    /// Write one document without stream framing, for multi-document output.
    pub fn serialize_document(
        &self,
        emitter: &mut dyn Emitter,
        graph: &Graph,
        root: &Value,
        ty: TypeKey,
    ) -> Result<()> {
        write_document(self, graph, root, ty, emitter)
    }

    pub fn to_string(&self, graph: &Graph, root: &Value, ty: TypeKey) -> Result<String> {
        let mut emitter = if self.options.json_compatible {
            YamlEmitter::json(String::new())
        } else {
            YamlEmitter::with_indent(String::new(), self.options.indent_step)
        };
        self.serialize(&mut emitter, graph, root, ty)?;
        Ok(emitter.into_inner())
    }

    /// Allocate a fresh record of type `ty` (as chosen by the object factory),
    /// with every field at its default.
    pub fn instantiate(&self, graph: &mut Graph, ty: TypeKey) -> Result<ObjectId> {
        let construction = |msg: String| Error::Construction {
            type_name: self.registry.name_of(ty).to_owned(),
            msg,
            location: crate::error::Location::UNKNOWN,
        };
        let concrete = self.factory.create(ty, &self.registry).map_err(construction)?;
        let table = self
            .member_table(concrete)
            .ok_or_else(|| construction("not a record type".to_owned()))?;
        Ok(graph.alloc(Object::Record {
            ty: concrete,
            fields: table.initial.clone(),
        }))
    }

    /// A record field by declared member name.
    pub fn field<'g>(&self, graph: &'g Graph, id: ObjectId, name: &str) -> Option<&'g Value> {
        let Object::Record { ty, fields } = graph.get(id)? else {
            return None;
        };
        let index = self.member_table(*ty)?.field_index(name)?;
        fields.get(index)
    }

    pub fn set_field(&self, graph: &mut Graph, id: ObjectId, name: &str, value: impl Into<Value>) -> Result<()> {
        let ty = match graph.get(id) {
            Some(Object::Record { ty, .. }) => *ty,
            _ => return Err(Error::conversion(format!("object {} is not a record", id.index()))),
        };
        let index = self
            .member_table(ty)
            .and_then(|table| table.field_index(name))
            .ok_or_else(|| Error::UnknownMember {
                key: name.to_owned(),
                type_name: self.registry.name_of(ty).to_owned(),
                location: crate::error::Location::UNKNOWN,
            })?;
        if let Some(Object::Record { fields, .. }) = graph.get_mut(id) {
            fields[index] = value.into();
        }
        Ok(())
    }
}

/// Configures a [`Mapper`]. Every check happens in [`MapperBuilder::build`].
pub struct MapperBuilder {
    registry: TypeRegistry,
    options: Options,
    naming: Box<dyn NamingConvention>,
    converters: Vec<Box<dyn TypeConverter>>,
    factory: Box<dyn ObjectFactory>,
    tags: Vec<(Tag, TypeKey)>,
    overrides: Vec<(TypeKey, String, MemberOverride)>,
}

impl MapperBuilder {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            options: Options::default(),
            naming: Box::new(NullNamingConvention),
            converters: Vec::new(),
            factory: Box::new(DefaultObjectFactory),
            tags: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Write JSON-compatible output (see [`Options::json_compatible`]). Call
    /// after [`with_options`](Self::with_options), which replaces every option.
    pub fn json_compatible(mut self) -> Self {
        self.options.json_compatible = true;
        self
    }

    pub fn with_naming_convention(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    /// Converters are consulted in registration order; the first accepting a type owns it.
    pub fn with_type_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converters.push(Box::new(converter));
        self
    }

    /// Bind `tag` to `ty` both ways: the tag selects the type on read, and
    /// values of the type are written with the tag.
    pub fn with_tag_mapping(mut self, tag: Tag, ty: TypeKey) -> Self {
        self.tags.push((tag, ty));
        self
    }

    pub fn with_attribute_override(mut self, ty: TypeKey, member: impl Into<String>, over: MemberOverride) -> Self {
        self.overrides.push((ty, member.into(), over));
        self
    }

    pub fn with_object_factory(mut self, factory: impl ObjectFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn build(self) -> Result<Mapper> {
        let MapperBuilder {
            mut registry,
            options,
            naming,
            converters,
            factory,
            tags: tag_list,
            overrides: override_list,
        } = self;

        let any_sequence = registry.sequence_of(TypeKey::ANY);
        let any_mapping = registry.mapping_of(TypeKey::ANY, TypeKey::ANY);
        validate_references(&registry)?;

        let mut tags = AHashMap::new();
        let mut tags_by_type = AHashMap::new();
        for (tag, ty) in tag_list {
            if tag.is_non_specific() {
                return Err(Error::config("the non-specific tag cannot be mapped to a type"));
            }
            if registry.get(ty).is_none() {
                return Err(Error::config(format!("tag `{tag}` is mapped to unregistered type {ty}")));
            }
            if tags.contains_key(&tag) {
                return Err(Error::config(format!("tag `{tag}` is mapped more than once")));
            }
            tags_by_type.entry(ty).or_insert_with(|| tag.clone());
            tags.insert(tag, ty);
        }

        let mut overrides = AHashMap::new();
        for (ty, member, over) in override_list {
            let declared = registry
                .flattened_members(ty)
                .map_err(|_| Error::config(format!("override target {ty} is not a record")))?
                .iter()
                .any(|m| m.name() == member);
            if !declared {
                return Err(Error::config(format!(
                    "override names `{member}`, which `{}` does not declare",
                    registry.name_of(ty)
                )));
            }
            overrides.insert((ty, member), over);
        }

        let mut capabilities = Vec::with_capacity(registry.len());
        for (ty, descriptor) in registry.iter() {
            let converter = converters.iter().position(|c| c.accepts(descriptor, ty));
            let capability = capability_of(&registry, ty, converter, || {
                build_member_table(&registry, ty, &options, naming.as_ref(), &overrides)
            })?;
            capabilities.push(capability);
        }

        tracing::debug!(
            types = registry.len(),
            converters = converters.len(),
            tags = tags.len(),
            overrides = overrides.len(),
            "mapper built"
        );
        Ok(Mapper {
            registry,
            options,
            converters,
            factory,
            tags,
            tags_by_type,
            capabilities,
            any_sequence,
            any_mapping,
        })
    }
}

/// Every type a descriptor refers to must be registered.
fn validate_references(registry: &TypeRegistry) -> Result<()> {
    let check = |owner: &str, ty: TypeKey| {
        if registry.get(ty).is_some() {
            Ok(())
        } else {
            Err(Error::config(format!("`{owner}` refers to unregistered type {ty}")))
        }
    };
    for (_, descriptor) in registry.iter() {
        let owner = descriptor.name();
        match descriptor.kind() {
            TypeKind::Optional(inner) | TypeKind::Sequence { item: inner } => check(owner, *inner)?,
            TypeKind::Mapping { key, value } => {
                check(owner, *key)?;
                check(owner, *value)?;
            }
            TypeKind::Record(record) => {
                if let Some(base) = record.base() {
                    check(owner, base)?;
                }
                for member in record.members() {
                    check(owner, member.ty())?;
                    if let Some(ty) = member.serialize_as {
                        check(owner, ty)?;
                    }
                }
            }
            TypeKind::Any | TypeKind::Primitive(_) | TypeKind::Enum(_) | TypeKind::Opaque => {}
        }
    }
    Ok(())
}

impl Default for Mapper {
    fn default() -> Self {
        // A bare registry has no references and no overrides to reject.
        match MapperBuilder::new(TypeRegistry::new()).build() {
            Ok(mapper) => mapper,
            Err(err) => unreachable!("default mapper: {err}"),
        }
    }
}

/// The mapper behind the crate-level conveniences: no registered records,
/// default options.
pub(crate) fn default_mapper() -> &'static Mapper {
    static MAPPER: OnceLock<Mapper> = OnceLock::new();
    MAPPER.get_or_init(Mapper::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Member, RecordDescriptor};

    #[test]
    fn build_rejects_bad_configuration() {
        let mut registry = TypeRegistry::new();
        let person = registry
            .record("Person", RecordDescriptor::new().member(Member::new("name", TypeKey::STRING)))
            .unwrap();

        let err = Mapper::builder(registry.clone())
            .with_attribute_override(person, "age", MemberOverride::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let tag = Tag::new("!person").unwrap();
        let err = Mapper::builder(registry.clone())
            .with_tag_mapping(tag.clone(), person)
            .with_tag_mapping(tag, TypeKey::STRING)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = Mapper::builder(registry)
            .with_tag_mapping(Tag::NON_SPECIFIC, person)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn dangling_member_type_is_rejected() {
        let mut other = TypeRegistry::new();
        for i in 0..8 {
            other.declare(format!("T{i}"));
        }
        let far = other.declare("Far");

        let mut registry = TypeRegistry::new();
        registry
            .record("Holder", RecordDescriptor::new().member(Member::new("x", far)))
            .unwrap();
        assert!(matches!(Mapper::builder(registry).build(), Err(Error::Config { .. })));
    }

    #[test]
    fn instantiate_and_fields() {
        let mut registry = TypeRegistry::new();
        let item = registry
            .record(
                "Item",
                RecordDescriptor::new()
                    .member(Member::new("name", TypeKey::STRING))
                    .member(Member::new("count", TypeKey::I32).default_value(5)),
            )
            .unwrap();
        let mapper = Mapper::builder(registry).build().unwrap();
        let mut graph = Graph::new();
        let id = mapper.instantiate(&mut graph, item).unwrap();
        assert_eq!(mapper.field(&graph, id, "count"), Some(&Value::Int(5)));
        assert_eq!(mapper.field(&graph, id, "name"), Some(&Value::Null));
        mapper.set_field(&mut graph, id, "name", "widget").unwrap();
        assert_eq!(mapper.field(&graph, id, "name"), Some(&Value::from("widget")));
        assert!(mapper.set_field(&mut graph, id, "missing", 1).is_err());
        assert!(mapper.instantiate(&mut graph, TypeKey::I32).is_err());
    }

    #[test]
    fn from_str_rejects_a_second_document() {
        let mapper = Mapper::default();
        let err = mapper.from_str("a: 1\n---\nb: 2\n", TypeKey::ANY).unwrap_err();
        assert!(matches!(err, Error::MultipleDocuments { .. }));
        assert_eq!(mapper.from_str("", TypeKey::ANY).unwrap().root, Value::Null);
        assert_eq!(mapper.from_str_multiple("1\n---\n2\n", TypeKey::I32).unwrap().len(), 2);
    }
}
