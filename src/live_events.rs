//! Live events: the [`Events`] adapter over `saphyr_parser::Parser`.
//!
//! The parser identifies anchors by numeric id, counting from 1 across the
//! whole stream, and refuses an alias it has not seen an anchor for. The
//! mapper wants source names and resolves forward aliases itself, so the
//! text is tokenized once up front: anchor tokens give the name of every id
//! and alias tokens give the name behind an "unknown anchor" refusal, which
//! is turned back into an alias event.

use std::borrow::Cow;

use ahash::AHashMap;
use saphyr_parser::{
    Event as RawEvent, Parser, ScalarStyle as RawStyle, ScanError, Scanner, StrInput, TokenType,
};

use crate::error::{location_from_span, Error, Location, Result};
use crate::events::{Ev, Event, Events, ScalarStyle};
use crate::tag::Tag;

const UNKNOWN_ANCHOR: &str = "while parsing node, found unknown anchor";

/// Anchor and alias names as written in the source.
#[derive(Debug, Default)]
struct SourceNames {
    /// Name of anchor id `i + 1`.
    anchors: Vec<String>,
    /// Alias name by the character index it starts at.
    aliases: AHashMap<usize, String>,
}

impl SourceNames {
    fn scan(input: &str) -> Self {
        let mut names = SourceNames::default();
        for token in Scanner::new(StrInput::new(input)) {
            match token.1 {
                TokenType::Anchor(name) => names.anchors.push(name.into_owned()),
                TokenType::Alias(name) => {
                    names.aliases.insert(token.0.start.index(), name.into_owned());
                }
                _ => {}
            }
        }
        names
    }

    fn anchor(&self, anchor_id: usize) -> Option<String> {
        if anchor_id == 0 {
            return None;
        }
        Some(
            self.anchors
                .get(anchor_id - 1)
                .cloned()
                .unwrap_or_else(|| anchor_id.to_string()),
        )
    }

    /// The alias a parser refusal points at, if it is an unknown-anchor one.
    fn unknown_alias(&self, err: &ScanError) -> Option<String> {
        if err.info() != UNKNOWN_ANCHOR {
            return None;
        }
        self.aliases.get(&err.marker().index()).cloned()
    }
}

/// Event source reading YAML text through saphyr.
pub struct LiveEvents<'a> {
    parser: Parser<'a, StrInput<'a>>,
    names: SourceNames,
    /// Single-item lookahead.
    look: Option<Ev>,
    last_location: Location,
    finished: bool,
}

impl<'a> LiveEvents<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            parser: Parser::new_from_str(input),
            names: SourceNames::scan(input),
            look: None,
            last_location: Location::UNKNOWN,
            finished: false,
        }
    }

    fn pull(&mut self) -> Result<Option<Ev>> {
        if self.finished {
            return Ok(None);
        }
        while let Some(item) = self.parser.next() {
            let (raw, span) = match item {
                Ok(pair) => pair,
                Err(err) => match self.names.unknown_alias(&err) {
                    // The parser has consumed the alias token and can go on.
                    Some(name) => {
                        let mark = err.marker();
                        let location = Location::new(mark.line(), mark.col() + 1);
                        return Ok(Some(Ev {
                            event: Event::Alias { name },
                            location,
                        }));
                    }
                    None => return Err(Error::from_scan_error(err)),
                },
            };
            let location = location_from_span(&span);
            if let Some(event) = translate(raw, &self.names) {
                if event == Event::StreamEnd {
                    self.finished = true;
                }
                return Ok(Some(Ev { event, location }));
            }
        }
        self.finished = true;
        Ok(None)
    }
}

impl Events for LiveEvents<'_> {
    fn next(&mut self) -> Result<Option<Ev>> {
        let ev = match self.look.take() {
            Some(ev) => Some(ev),
            None => self.pull()?,
        };
        if let Some(ev) = &ev {
            self.last_location = ev.location;
        }
        Ok(ev)
    }

    fn peek(&mut self) -> Result<Option<&Ev>> {
        if self.look.is_none() {
            self.look = self.pull()?;
        }
        Ok(self.look.as_ref())
    }

    fn last_location(&self) -> Location {
        self.last_location
    }
}

fn tag_of<T: ToString>(tag: Option<T>) -> Tag {
    tag.and_then(|t| Tag::new(t.to_string()).ok())
        .unwrap_or(Tag::NON_SPECIFIC)
}

fn style_of(style: RawStyle) -> ScalarStyle {
    #[allow(unreachable_patterns)]
    match style {
        RawStyle::Plain => ScalarStyle::Plain,
        RawStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        RawStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        RawStyle::Literal => ScalarStyle::Literal,
        RawStyle::Folded => ScalarStyle::Folded,
        _ => ScalarStyle::Plain,
    }
}

fn translate(raw: RawEvent<'_>, names: &SourceNames) -> Option<Event> {
    Some(match raw {
        RawEvent::Nothing => return None,
        RawEvent::StreamStart => Event::StreamStart,
        RawEvent::StreamEnd => Event::StreamEnd,
        RawEvent::DocumentStart(explicit) => Event::DocumentStart { explicit },
        RawEvent::DocumentEnd => Event::DocumentEnd,
        RawEvent::Alias(anchor_id) => Event::Alias {
            name: names.anchor(anchor_id).unwrap_or_default(),
        },
        RawEvent::Scalar(value, style, anchor_id, tag) => Event::Scalar {
            value: match value {
                Cow::Borrowed(v) => v.to_owned(),
                Cow::Owned(v) => v,
            },
            style: style_of(style),
            tag: tag_of(tag),
            anchor: names.anchor(anchor_id),
        },
        RawEvent::SequenceStart(anchor_id, tag) => Event::SequenceStart {
            tag: tag_of(tag),
            anchor: names.anchor(anchor_id),
        },
        RawEvent::SequenceEnd => Event::SequenceEnd,
        RawEvent::MappingStart(anchor_id, tag) => Event::MappingStart {
            tag: tag_of(tag),
            anchor: names.anchor(anchor_id),
        },
        RawEvent::MappingEnd => Event::MappingEnd,
    })
}
