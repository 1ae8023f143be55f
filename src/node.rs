//! Composition of one document's events into a node arena.
//!
//! Nodes are numbered in document order (pre-order), so "precedes in the
//! document" is simply "has a smaller id". Aliases stay unresolved here; the
//! anchor index lets later stages find definitions on either side of a use.

use ahash::AHashMap;

use crate::error::{Error, Location, Result};
use crate::events::{Ev, Event, Events, ScalarStyle};
use crate::tag::Tag;

pub(crate) type NodeId = usize;

#[derive(Debug)]
pub(crate) enum NodeKind {
    Scalar { value: String, style: ScalarStyle },
    Sequence(Vec<NodeId>),
    Mapping(Vec<(NodeId, NodeId)>),
    Alias(String),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub tag: Tag,
    pub anchor: Option<String>,
    pub location: Location,
}

impl Node {
    pub fn scalar_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self.kind {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Alias(_) => "alias",
        }
    }
}

#[derive(Debug)]
pub(crate) struct ComposedDocument {
    nodes: Vec<Node>,
    /// Anchor name to every node defining it, in document order.
    anchors: AHashMap<String, Vec<NodeId>>,
    pub explicit_start: bool,
}

impl ComposedDocument {
    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The definition an alias at `at` refers to: the latest definition
    /// before it, or failing that the first one after it.
    pub fn anchored(&self, name: &str, at: NodeId) -> Option<NodeId> {
        let defs = self.anchors.get(name)?;
        let after = defs.partition_point(|&id| id < at);
        if after > 0 {
            Some(defs[after - 1])
        } else {
            defs.get(after).copied()
        }
    }

    /// Follow an alias to its definition, or return the node itself.
    pub fn resolve(&self, id: NodeId) -> Option<NodeId> {
        match &self.nodes[id].kind {
            NodeKind::Alias(name) => self.anchored(name, id),
            _ => Some(id),
        }
    }

    /// Whether any node in the subtree at `id` defines an anchor.
    pub fn has_anchor_within(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.anchor.is_some() {
                return true;
            }
            match &node.kind {
                NodeKind::Sequence(items) => stack.extend(items.iter().copied()),
                NodeKind::Mapping(entries) => {
                    stack.extend(entries.iter().flat_map(|&(k, v)| [k, v]));
                }
                NodeKind::Scalar { .. } | NodeKind::Alias(_) => {}
            }
        }
        false
    }
}

enum Frame {
    Sequence(NodeId),
    Mapping { id: NodeId, key: Option<NodeId> },
}

/// Read the next document, leaving the cursor at the following document
/// start or stream end. Returns `None` when no document is left.
pub(crate) fn compose_document(
    events: &mut dyn Events,
    max_depth: usize,
) -> Result<Option<ComposedDocument>> {
    let explicit_start = loop {
        let Some(ev) = events.peek()? else {
            return Ok(None);
        };
        match ev.event {
            Event::StreamStart => {
                events.next()?;
            }
            Event::StreamEnd => return Ok(None),
            Event::DocumentStart { explicit } => {
                events.next()?;
                break explicit;
            }
            // Hand-built streams may omit the document frame.
            _ => break false,
        }
    };

    let mut doc = ComposedDocument {
        nodes: Vec::new(),
        anchors: AHashMap::new(),
        explicit_start,
    };
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let Some(Ev { event, location }) = events.next()? else {
            return Err(Error::eof().with_location(events.last_location()));
        };
        let id = doc.nodes.len();
        let (kind, tag, anchor, opens) = match event {
            Event::Scalar {
                value,
                style,
                tag,
                anchor,
            } => (NodeKind::Scalar { value, style }, tag, anchor, None),
            Event::Alias { name } => (NodeKind::Alias(name), Tag::NON_SPECIFIC, None, None),
            Event::SequenceStart { tag, anchor } => (
                NodeKind::Sequence(Vec::new()),
                tag,
                anchor,
                Some(Frame::Sequence(id)),
            ),
            Event::MappingStart { tag, anchor } => (
                NodeKind::Mapping(Vec::new()),
                tag,
                anchor,
                Some(Frame::Mapping { id, key: None }),
            ),
            Event::SequenceEnd => match stack.pop() {
                Some(Frame::Sequence(_)) => {
                    if stack.is_empty() {
                        break;
                    }
                    continue;
                }
                _ => return Err(Error::unexpected("node or mapping end").with_location(location)),
            },
            Event::MappingEnd => match stack.pop() {
                Some(Frame::Mapping { key: None, .. }) => {
                    if stack.is_empty() {
                        break;
                    }
                    continue;
                }
                _ => return Err(Error::unexpected("node or sequence end").with_location(location)),
            },
            Event::DocumentEnd if doc.nodes.is_empty() => {
                // `---` with no content: an empty plain scalar, i.e. null.
                doc.nodes.push(Node {
                    kind: NodeKind::Scalar {
                        value: String::new(),
                        style: ScalarStyle::Plain,
                    },
                    tag: Tag::NON_SPECIFIC,
                    anchor: None,
                    location,
                });
                return Ok(Some(doc));
            }
            Event::StreamStart | Event::StreamEnd | Event::DocumentStart { .. } | Event::DocumentEnd => {
                return Err(Error::unexpected("node").with_location(location));
            }
        };

        if let Some(name) = &anchor {
            doc.anchors.entry(name.clone()).or_default().push(id);
        }
        doc.nodes.push(Node {
            kind,
            tag,
            anchor,
            location,
        });
        attach(&mut doc.nodes, stack.last_mut(), id);

        match opens {
            Some(frame) => {
                if stack.len() >= max_depth {
                    return Err(Error::recursion(max_depth).with_location(location));
                }
                stack.push(frame);
            }
            None if stack.is_empty() => break,
            None => {}
        }
    }

    // Consume the closing document marker if present; a following document
    // start or stream end is left for the next call.
    if let Some(ev) = events.peek()? {
        if ev.event == Event::DocumentEnd {
            events.next()?;
        }
    }
    Ok(Some(doc))
}

fn attach(nodes: &mut [Node], parent: Option<&mut Frame>, child: NodeId) {
    match parent {
        None => {}
        Some(Frame::Sequence(id)) => {
            if let NodeKind::Sequence(items) = &mut nodes[*id].kind {
                items.push(child);
            }
        }
        Some(Frame::Mapping { id, key }) => match key.take() {
            None => *key = Some(child),
            Some(k) => {
                if let NodeKind::Mapping(entries) = &mut nodes[*id].kind {
                    entries.push((k, child));
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBuffer;

    fn buffer(events: Vec<Event>) -> EventBuffer {
        events.into_iter().collect()
    }

    #[test]
    fn composes_nested_document_and_stops_at_next() {
        let mut events = buffer(vec![
            Event::StreamStart,
            Event::DocumentStart { explicit: false },
            Event::mapping_start(),
            Event::scalar("a"),
            Event::sequence_start().with_anchor("s"),
            Event::scalar("1"),
            Event::SequenceEnd,
            Event::MappingEnd,
            Event::DocumentEnd,
            Event::DocumentStart { explicit: true },
            Event::scalar("next"),
            Event::DocumentEnd,
            Event::StreamEnd,
        ]);
        let doc = compose_document(&mut events, 16).unwrap().unwrap();
        assert_eq!(doc.len(), 4);
        match &doc.node(ComposedDocument::ROOT).kind {
            NodeKind::Mapping(entries) => assert_eq!(entries, &vec![(1, 2)]),
            other => panic!("unexpected root {other:?}"),
        }
        assert_eq!(doc.anchored("s", 3), Some(2));
        assert!(matches!(
            events.peek().unwrap().map(|ev| &ev.event),
            Some(Event::DocumentStart { explicit: true })
        ));
        let second = compose_document(&mut events, 16).unwrap().unwrap();
        assert_eq!(second.node(0).scalar_text(), Some("next"));
        assert!(compose_document(&mut events, 16).unwrap().is_none());
    }

    #[test]
    fn anchored_prefers_preceding_then_following() {
        let mut events = buffer(vec![
            Event::sequence_start(),
            Event::alias("x"),
            Event::scalar("1").with_anchor("x"),
            Event::alias("x"),
            Event::scalar("2").with_anchor("x"),
            Event::alias("x"),
            Event::SequenceEnd,
        ]);
        let doc = compose_document(&mut events, 16).unwrap().unwrap();
        assert_eq!(doc.anchored("x", 1), Some(2));
        assert_eq!(doc.anchored("x", 3), Some(2));
        assert_eq!(doc.anchored("x", 5), Some(4));
        assert_eq!(doc.anchored("y", 5), None);
    }

    #[test]
    fn depth_is_limited() {
        let mut events = buffer(vec![
            Event::sequence_start(),
            Event::sequence_start(),
            Event::sequence_start(),
            Event::SequenceEnd,
            Event::SequenceEnd,
            Event::SequenceEnd,
        ]);
        let err = compose_document(&mut events, 2).unwrap_err();
        assert!(matches!(err, Error::MaximumRecursionExceeded { limit: 2, .. }));
    }

    #[test]
    fn empty_document_is_null_scalar() {
        let mut events = buffer(vec![
            Event::StreamStart,
            Event::DocumentStart { explicit: true },
            Event::DocumentEnd,
            Event::StreamEnd,
        ]);
        let doc = compose_document(&mut events, 16).unwrap().unwrap();
        assert_eq!(doc.node(0).scalar_text(), Some(""));
        assert!(compose_document(&mut events, 16).unwrap().is_none());
    }

    #[test]
    fn truncated_stream_is_eof() {
        let mut events = buffer(vec![Event::mapping_start(), Event::scalar("a")]);
        assert!(matches!(
            compose_document(&mut events, 16),
            Err(Error::Eof { .. })
        ));
    }
}
