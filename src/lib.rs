pub use binding::{DefaultObjectFactory, MemberOverride, ObjectFactory};
pub use convert::{ConverterReader, ConverterWriter, TypeConverter};
pub use emitter::YamlEmitter;
pub use error::{Error, Location, Result, ScalarError};
pub use events::{skip_to_next_document, Emitter, Ev, Event, EventBuffer, Events, ScalarStyle};
pub use graph::{Graph, Object, ObjectId, Value};
pub use live_events::LiveEvents;
pub use mapper::{Document, Mapper, MapperBuilder};
pub use naming::{
    CamelCaseNamingConvention, HyphenatedNamingConvention, NamingConvention, NullNamingConvention,
    PascalCaseNamingConvention, UnderscoredNamingConvention,
};
pub use options::{DefaultValuesHandling, DuplicateKeyPolicy, Options};
pub use tag::{CoreTag, Tag};
pub use types::{
    EnumDescriptor, Member, PrimitiveKind, RecordDescriptor, TypeDescriptor, TypeKey, TypeKind, TypeRegistry,
};

mod anchors;
mod binding;
mod convert;
mod de;
mod emitter;
mod error;
mod events;
mod graph;
mod live_events;
#[macro_use]
mod macros;
mod mapper;
mod merge;
pub mod naming;
mod node;
pub mod options;
pub mod scalars;
mod ser;
mod ser_quoting;
mod tag;
mod types;

/// Read one document of YAML text as a dynamic value graph.
///
/// ```rust
/// let doc = saphyr_graph::from_str("[1, two, 3.5]").unwrap();
/// let items = doc.graph.items(doc.root.as_object().unwrap()).unwrap();
/// assert_eq!(items[1], saphyr_graph::Value::from("two"));
/// ```
pub fn from_str(yaml: &str) -> Result<Document> {
    mapper::default_mapper().from_str(yaml, TypeKey::ANY)
}

/// Write a dynamic value graph as YAML text.
pub fn to_string(graph: &Graph, root: &Value) -> Result<String> {
    mapper::default_mapper().to_string(graph, root, TypeKey::ANY)
}
