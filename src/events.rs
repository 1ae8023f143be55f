//! The event model shared by the read and write paths.
//!
//! The mapper never looks at YAML text directly: the read path pulls [`Ev`]
//! values from something implementing [`Events`], and the write path pushes
//! [`Event`] values into an [`Emitter`]. [`crate::LiveEvents`] adapts the
//! saphyr parser, [`crate::YamlEmitter`] renders text, and [`EventBuffer`]
//! implements both sides in memory.

use std::collections::VecDeque;

use crate::error::{Location, Result};
use crate::tag::Tag;

/// How a scalar is written in the text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    /// Let the emitter decide; only meaningful on the write path.
    #[default]
    Any,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl ScalarStyle {
    /// Plain scalars are the only ones subject to implicit typing.
    pub fn is_plain(self) -> bool {
        matches!(self, ScalarStyle::Plain | ScalarStyle::Any)
    }
}

/// One event of a YAML stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StreamStart,
    StreamEnd,
    DocumentStart {
        explicit: bool,
    },
    DocumentEnd,
    Scalar {
        value: String,
        style: ScalarStyle,
        tag: Tag,
        anchor: Option<String>,
    },
    SequenceStart {
        tag: Tag,
        anchor: Option<String>,
    },
    SequenceEnd,
    MappingStart {
        tag: Tag,
        anchor: Option<String>,
    },
    MappingEnd,
    Alias {
        name: String,
    },
}

impl Event {
    /// A plain, untagged, unanchored scalar.
    pub fn scalar(value: impl Into<String>) -> Self {
        Event::Scalar {
            value: value.into(),
            style: ScalarStyle::Plain,
            tag: Tag::NON_SPECIFIC,
            anchor: None,
        }
    }

    pub fn styled_scalar(value: impl Into<String>, style: ScalarStyle) -> Self {
        Event::Scalar {
            value: value.into(),
            style,
            tag: Tag::NON_SPECIFIC,
            anchor: None,
        }
    }

    pub fn sequence_start() -> Self {
        Event::SequenceStart {
            tag: Tag::NON_SPECIFIC,
            anchor: None,
        }
    }

    pub fn mapping_start() -> Self {
        Event::MappingStart {
            tag: Tag::NON_SPECIFIC,
            anchor: None,
        }
    }

    pub fn alias(name: impl Into<String>) -> Self {
        Event::Alias { name: name.into() }
    }

    /// Set the anchor of a scalar or collection start. Other events are returned unchanged.
    pub fn with_anchor(mut self, name: impl Into<String>) -> Self {
        if let Event::Scalar { anchor, .. }
        | Event::SequenceStart { anchor, .. }
        | Event::MappingStart { anchor, .. } = &mut self
        {
            *anchor = Some(name.into());
        }
        self
    }

    /// Set the tag of a scalar or collection start. Other events are returned unchanged.
    pub fn with_tag(mut self, value: Tag) -> Self {
        if let Event::Scalar { tag, .. }
        | Event::SequenceStart { tag, .. }
        | Event::MappingStart { tag, .. } = &mut self
        {
            *tag = value;
        }
        self
    }

    /// Short human-readable name, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Event::StreamStart => "stream start",
            Event::StreamEnd => "stream end",
            Event::DocumentStart { .. } => "document start",
            Event::DocumentEnd => "document end",
            Event::Scalar { .. } => "scalar",
            Event::SequenceStart { .. } => "sequence start",
            Event::SequenceEnd => "sequence end",
            Event::MappingStart { .. } => "mapping start",
            Event::MappingEnd => "mapping end",
            Event::Alias { .. } => "alias",
        }
    }
}

/// An event together with where it starts in the source.
#[derive(Clone, Debug, PartialEq)]
pub struct Ev {
    pub event: Event,
    pub location: Location,
}

/// A pull source of events with one event of lookahead.
pub trait Events {
    /// Consume and return the next event, `None` once the source is exhausted.
    fn next(&mut self) -> Result<Option<Ev>>;

    /// Look at the next event without consuming it.
    fn peek(&mut self) -> Result<Option<&Ev>>;

    /// Location of the last consumed event, for error reporting.
    fn last_location(&self) -> Location;
}

/// A push sink of events.
pub trait Emitter {
    fn emit(&mut self, event: Event) -> Result<()>;
}

/// Skip the remainder of a broken document so the next read starts at the
/// following document (or at stream end). The boundary event is not consumed.
pub fn skip_to_next_document(events: &mut dyn Events) -> Result<()> {
    loop {
        match events.peek()? {
            None => return Ok(()),
            Some(ev) if matches!(ev.event, Event::DocumentStart { .. } | Event::StreamEnd) => {
                return Ok(());
            }
            Some(_) => {}
        }
        events.next()?;
    }
}

/// Events held in memory. Works as a source ([`Events`]) and a sink ([`Emitter`]),
/// which makes it handy for building streams by hand and for capturing output.
#[derive(Clone, Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<Ev>,
    last_location: Location,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.push_at(event, Location::UNKNOWN);
    }

    pub fn push_at(&mut self, event: Event, location: Location) {
        self.events.push_back(Ev { event, location });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Events not consumed yet, in order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|ev| &ev.event)
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events.into_iter().map(|ev| ev.event).collect()
    }
}

impl FromIterator<Event> for EventBuffer {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut buffer = EventBuffer::new();
        for event in iter {
            buffer.push(event);
        }
        buffer
    }
}

impl Events for EventBuffer {
    fn next(&mut self) -> Result<Option<Ev>> {
        let ev = self.events.pop_front();
        if let Some(ev) = &ev {
            self.last_location = ev.location;
        }
        Ok(ev)
    }

    fn peek(&mut self) -> Result<Option<&Ev>> {
        Ok(self.events.front())
    }

    fn last_location(&self) -> Location {
        self.last_location
    }
}

impl Emitter for EventBuffer {
    fn emit(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
