//! Custom type converters.
//!
//! A converter takes over a type completely: the structural binder never
//! looks at a type a converter accepts. On read it sees the node as a small
//! event stream ([`ConverterReader`]); on write it produces events
//! ([`ConverterWriter`]). Both sides can hand nested values back to the
//! mapper.

use crate::de::DocumentReader;
use crate::error::{Error, Location, Result};
use crate::events::{Emitter, Ev, Event, Events, ScalarStyle};
use crate::graph::{Graph, Slot, Value};
use crate::node::{ComposedDocument, NodeId, NodeKind};
use crate::ser::GraphWalker;
use crate::types::{TypeDescriptor, TypeKey, TypeRegistry};

/// Mappers are shared across threads, so converters must be too.
pub trait TypeConverter: Send + Sync {
    /// Whether this converter handles `ty`. Asked once per type when the
    /// mapper is built; the first accepting converter wins.
    fn accepts(&self, descriptor: &TypeDescriptor, ty: TypeKey) -> bool;

    /// Build a value from the node the reader is positioned on.
    fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value>;

    /// Write `value` as events.
    fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()>;
}

struct NodeEvent {
    ev: Ev,
    /// The node a start (or scalar/alias) event opens.
    node: Option<NodeId>,
    /// Index just past this node's last event.
    end: usize,
}

fn flatten(doc: &ComposedDocument, id: NodeId, out: &mut Vec<NodeEvent>) {
    let node = doc.node(id);
    let at = out.len();
    let (event, close) = match &node.kind {
        NodeKind::Scalar { value, style } => (
            Event::Scalar {
                value: value.clone(),
                style: *style,
                tag: node.tag.clone(),
                anchor: node.anchor.clone(),
            },
            None,
        ),
        NodeKind::Alias(name) => (Event::Alias { name: name.clone() }, None),
        NodeKind::Sequence(_) => (
            Event::SequenceStart {
                tag: node.tag.clone(),
                anchor: node.anchor.clone(),
            },
            Some(Event::SequenceEnd),
        ),
        NodeKind::Mapping(_) => (
            Event::MappingStart {
                tag: node.tag.clone(),
                anchor: node.anchor.clone(),
            },
            Some(Event::MappingEnd),
        ),
    };
    out.push(NodeEvent {
        ev: Ev {
            event,
            location: node.location,
        },
        node: Some(id),
        end: at + 1,
    });
    let Some(close) = close else {
        return;
    };
    match &node.kind {
        NodeKind::Sequence(items) => {
            for &item in items {
                flatten(doc, item, out);
            }
        }
        NodeKind::Mapping(entries) => {
            for &(key, value) in entries {
                flatten(doc, key, out);
                flatten(doc, value, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Alias(_) => {}
    }
    out.push(NodeEvent {
        ev: Ev {
            event: close,
            location: node.location,
        },
        node: None,
        end: out.len() + 1,
    });
    out[at].end = out.len();
}

/// The node handed to [`TypeConverter::read`], as events.
///
/// Implements [`Events`]: pull events with `next`/`peek`, or let the mapper
/// read the next node with [`ConverterReader::deserialize`].
pub struct ConverterReader<'r, 'd> {
    reader: &'r mut DocumentReader<'d>,
    events: Vec<NodeEvent>,
    pos: usize,
    target: TypeKey,
    last_location: Location,
}

impl<'r, 'd> ConverterReader<'r, 'd> {
    pub(crate) fn new(reader: &'r mut DocumentReader<'d>, id: NodeId, target: TypeKey) -> Self {
        let mut events = Vec::new();
        flatten(reader.doc, id, &mut events);
        let last_location = reader.doc.node(id).location;
        Self {
            reader,
            events,
            pos: 0,
            target,
            last_location,
        }
    }

    /// The type being read.
    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.reader.mapper.registry()
    }

    /// Graph of the document being read, for allocating objects.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.reader.graph
    }

    /// Location of the converted node.
    pub fn location(&self) -> Location {
        self.events
            .first()
            .map_or(Location::UNKNOWN, |e| e.ev.location)
    }

    /// Consume a scalar event and return its text.
    pub fn expect_scalar(&mut self) -> Result<String> {
        match self.next()? {
            Some(Ev {
                event: Event::Scalar { value, .. },
                ..
            }) => Ok(value),
            Some(ev) => Err(Error::unexpected("scalar").with_location(ev.location)),
            None => Err(Error::eof().with_location(self.last_location)),
        }
    }

    /// Skip the next node, with everything inside it.
    pub fn skip(&mut self) -> Result<()> {
        let entry = self.node_at_cursor()?;
        self.pos = entry.1;
        Ok(())
    }

    /// Read the next node as a value of type `ty`, through the mapper.
    pub fn deserialize(&mut self, ty: TypeKey) -> Result<Value> {
        let (node, end) = self.node_at_cursor()?;
        self.pos = end;
        self.last_location = self.reader.doc.node(node).location;
        self.reader.visit(node, ty, Slot::Detached)
    }

    fn node_at_cursor(&self) -> Result<(NodeId, usize)> {
        match self.events.get(self.pos) {
            Some(NodeEvent {
                node: Some(node),
                end,
                ..
            }) => Ok((*node, *end)),
            Some(other) => Err(Error::unexpected("node").with_location(other.ev.location)),
            None => Err(Error::eof().with_location(self.last_location)),
        }
    }
}

impl Events for ConverterReader<'_, '_> {
    fn next(&mut self) -> Result<Option<Ev>> {
        let Some(entry) = self.events.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        self.last_location = entry.ev.location;
        Ok(Some(entry.ev.clone()))
    }

    fn peek(&mut self) -> Result<Option<&Ev>> {
        Ok(self.events.get(self.pos).map(|e| &e.ev))
    }

    fn last_location(&self) -> Location {
        self.last_location
    }
}

/// The sink handed to [`TypeConverter::write`].
///
/// The anchor (and tag) the mapper decided on for the value is attached to
/// the first node event the converter emits.
pub struct ConverterWriter<'w, 'm> {
    walker: &'w mut GraphWalker<'m>,
    out: &'w mut dyn Emitter,
}

impl<'w, 'm> ConverterWriter<'w, 'm> {
    pub(crate) fn new(walker: &'w mut GraphWalker<'m>, out: &'w mut dyn Emitter) -> Self {
        Self { walker, out }
    }

    pub fn emit(&mut self, event: Event) -> Result<()> {
        let event = self.walker.decorate(event);
        self.out.emit(event)
    }

    /// Emit a scalar and let the emitter pick its style.
    pub fn scalar(&mut self, value: impl Into<String>) -> Result<()> {
        self.emit(Event::styled_scalar(value, ScalarStyle::Any))
    }

    /// Write a nested value through the mapper.
    pub fn serialize(&mut self, value: &Value, ty: TypeKey) -> Result<()> {
        self.walker.walk(value, ty, &mut *self.out)
    }

    pub fn graph(&self) -> &Graph {
        self.walker.graph()
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.walker.registry()
    }
}
