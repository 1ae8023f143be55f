//! Write path: an object graph into events.
//!
//! With aliases enabled the graph is walked twice: a dry run into a
//! discarding sink finds the objects reachable more than once, then the real
//! run gives those an anchor at their first occurrence and writes an alias
//! everywhere else. Without aliases, shared objects are written out in full
//! each time and a cycle is an error. JSON-compatible output always works
//! without aliases and tags, and writes every text as a double-quoted scalar.

use crate::anchors::{IdentityTracker, Visit};
use crate::binding::{BoundMember, Capability};
use crate::convert::ConverterWriter;
use crate::error::{Error, Result};
use crate::events::{Emitter, Event, ScalarStyle};
use crate::graph::{Graph, Object, ObjectId, Value};
use crate::mapper::Mapper;
use crate::options::DefaultValuesHandling;
use crate::scalars;
use crate::tag::{CoreTag, Tag};
use crate::types::{EnumDescriptor, TypeKey, TypeRegistry};

/// Sink of the scan pass.
struct Discard;

impl Emitter for Discard {
    fn emit(&mut self, _event: Event) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Hints {
    /// Write a record with the member table of the static type, untagged.
    force_static: bool,
    style: Option<ScalarStyle>,
}

pub(crate) struct GraphWalker<'m> {
    mapper: &'m Mapper,
    graph: &'m Graph,
    tracker: IdentityTracker,
    depth: usize,
    pending_anchor: Option<String>,
    pending_tag: Option<Tag>,
}

/// Emit one document (start and end events included) for `root` of static type `ty`.
pub(crate) fn write_document(
    mapper: &Mapper,
    graph: &Graph,
    root: &Value,
    ty: TypeKey,
    out: &mut dyn Emitter,
) -> Result<()> {
    let options = mapper.options();
    let aliases = options.emit_aliases && !options.json_compatible;
    let tracker = if aliases {
        IdentityTracker::scanning(&options.anchor_prefix, options.max_depth)
    } else {
        IdentityTracker::expanding(options.max_depth)
    };
    let mut walker = GraphWalker {
        mapper,
        graph,
        tracker,
        depth: 0,
        pending_anchor: None,
        pending_tag: None,
    };
    if aliases {
        walker.walk(root, ty, &mut Discard)?;
        walker.tracker.finish_scan();
    }
    out.emit(Event::DocumentStart { explicit: false })?;
    walker.walk(root, ty, out)?;
    out.emit(Event::DocumentEnd)?;
    tracing::debug!(objects = graph.len(), "document written");
    Ok(())
}

impl<'m> GraphWalker<'m> {
    pub(crate) fn graph(&self) -> &'m Graph {
        self.graph
    }

    pub(crate) fn registry(&self) -> &'m TypeRegistry {
        self.mapper.registry()
    }

    /// Attach the pending anchor and tag to the next node event.
    pub(crate) fn decorate(&mut self, event: Event) -> Event {
        if !matches!(
            event,
            Event::Scalar { .. } | Event::SequenceStart { .. } | Event::MappingStart { .. }
        ) {
            return event;
        }
        let mut event = event;
        if let Some(anchor) = self.pending_anchor.take() {
            event = event.with_anchor(anchor);
        }
        if let Some(tag) = self.pending_tag.take() {
            event = event.with_tag(tag);
        }
        event
    }

    fn emit(&mut self, out: &mut dyn Emitter, event: Event) -> Result<()> {
        let event = self.decorate(event);
        out.emit(event)
    }

    pub(crate) fn walk(&mut self, value: &Value, ty: TypeKey, out: &mut dyn Emitter) -> Result<()> {
        self.walk_with(value, ty, Hints::default(), out)
    }

    fn walk_with(&mut self, value: &Value, ty: TypeKey, hints: Hints, out: &mut dyn Emitter) -> Result<()> {
        let limit = self.mapper.options().max_depth;
        if self.depth >= limit {
            return Err(Error::recursion(limit));
        }
        self.depth += 1;
        let result = self.walk_inner(value, ty, hints, out);
        self.depth -= 1;
        result
    }

    fn walk_inner(&mut self, value: &Value, ty: TypeKey, hints: Hints, out: &mut dyn Emitter) -> Result<()> {
        let mapper = self.mapper;
        let registry = mapper.registry();
        let static_ty = registry.unwrap_optional(ty);

        let Value::Ref(id) = value else {
            let concrete = match value {
                Value::Enum { ty, .. } => *ty,
                _ => static_ty,
            };
            if let Capability::Converter(index) = mapper.capability(concrete) {
                self.pending_tag = self.tag_for(concrete, static_ty);
                return self.convert(*index, value, out);
            }
            return self.write_scalar(value, static_ty, hints.style, out);
        };

        let graph = self.graph;
        let object = graph
            .get(*id)
            .ok_or_else(|| Error::conversion(format!("dangling object reference {}", id.index())))?;
        match self.tracker.visit(*id)? {
            Visit::Alias(name) => return self.emit(out, Event::alias(name)),
            Visit::First { anchor } => self.pending_anchor = anchor,
        }
        let result = self.walk_object(*id, object, static_ty, hints, out);
        self.tracker.leave(*id);
        result
    }

    fn convert(&mut self, index: usize, value: &Value, out: &mut dyn Emitter) -> Result<()> {
        let converter = self.mapper.converter(index);
        let result = converter.write(value, &mut ConverterWriter::new(self, out));
        self.pending_anchor = None;
        self.pending_tag = None;
        result
    }

    fn walk_object(
        &mut self,
        id: ObjectId,
        object: &Object,
        static_ty: TypeKey,
        hints: Hints,
        out: &mut dyn Emitter,
    ) -> Result<()> {
        let mapper = self.mapper;
        let runtime = object.type_key();
        if let Capability::Converter(index) = mapper.capability(runtime) {
            self.pending_tag = self.tag_for(runtime, static_ty);
            return self.convert(*index, &Value::Ref(id), out);
        }

        match object {
            Object::Sequence { items, .. } => {
                let item_ty = match mapper.capability(runtime) {
                    Capability::Sequence { item } => *item,
                    _ => TypeKey::ANY,
                };
                self.pending_tag = self.tag_for(runtime, static_ty);
                self.emit(out, Event::sequence_start())?;
                for item in items {
                    self.walk(item, item_ty, out)?;
                }
                out.emit(Event::SequenceEnd)
            }
            Object::Mapping { entries, .. } => {
                let (key_ty, value_ty) = match mapper.capability(runtime) {
                    Capability::Mapping { key, value } => (*key, *value),
                    _ => (TypeKey::ANY, TypeKey::ANY),
                };
                self.pending_tag = self.tag_for(runtime, static_ty);
                self.emit(out, Event::mapping_start())?;
                for (key, value) in entries {
                    self.walk(key, key_ty, out)?;
                    self.walk(value, value_ty, out)?;
                }
                out.emit(Event::MappingEnd)
            }
            Object::Record { fields, .. } => {
                let registry = mapper.registry();
                let layout = if hints.force_static && registry.derives_from(runtime, static_ty) {
                    static_ty
                } else {
                    runtime
                };
                let Some(table) = mapper.member_table(layout) else {
                    return Err(Error::conversion(format!(
                        "`{}` has no member table",
                        registry.name_of(layout)
                    )));
                };
                self.pending_tag = self.tag_for(layout, static_ty);
                self.emit(out, Event::mapping_start())?;
                for member in &table.bound {
                    let value = fields.get(member.field).unwrap_or(&Value::Null);
                    if self.omit(member, value) {
                        continue;
                    }
                    let key = Event::styled_scalar(member.serialized.as_str(), self.text_style(&member.serialized, None));
                    out.emit(key)?;
                    let hints = Hints {
                        force_static: member.write_as.is_some(),
                        style: member.scalar_style,
                    };
                    self.walk_with(value, member.write_as.unwrap_or(member.ty), hints, out)?;
                }
                out.emit(Event::MappingEnd)
            }
        }
    }

    /// Whether a record member is left out under the default-values policy.
    fn omit(&self, member: &BoundMember, value: &Value) -> bool {
        let options = self.mapper.options();
        if options.json_compatible && value.is_null() {
            return false;
        }
        match options.default_values {
            DefaultValuesHandling::Preserve => false,
            DefaultValuesHandling::OmitNull => value.is_null(),
            DefaultValuesHandling::OmitDefaults => value.is_null() || value.same(&member.default),
            DefaultValuesHandling::OmitEmptyCollections => match value {
                Value::Ref(id) => match self.graph.get(*id) {
                    Some(Object::Sequence { items, .. }) => items.is_empty(),
                    Some(Object::Mapping { entries, .. }) => entries.is_empty(),
                    _ => false,
                },
                _ => false,
            },
        }
    }

    /// Style of a text scalar: always double-quoted in JSON-compatible output.
    fn text_style(&self, text: &str, hint: Option<ScalarStyle>) -> ScalarStyle {
        if self.mapper.options().json_compatible {
            ScalarStyle::DoubleQuoted
        } else {
            string_style(text, hint)
        }
    }

    /// The tag to put on a value of `runtime` type written into a slot of
    /// `static_ty`: a mapped tag always, else `!Name` when the types differ.
    fn tag_for(&self, runtime: TypeKey, static_ty: TypeKey) -> Option<Tag> {
        if self.mapper.options().json_compatible {
            return None;
        }
        if let Some(tag) = self.mapper.tag_for_type(runtime) {
            return Some(tag.clone());
        }
        if runtime == static_ty || !self.mapper.options().emit_tags_for_polymorphic_values {
            return None;
        }
        let descriptor = self.registry().get(runtime)?;
        if descriptor.is_anonymous() {
            return None;
        }
        Tag::new(format!("!{}", descriptor.name())).ok()
    }

    fn write_scalar(
        &mut self,
        value: &Value,
        static_ty: TypeKey,
        style: Option<ScalarStyle>,
        out: &mut dyn Emitter,
    ) -> Result<()> {
        let plain = |text: String| Event::styled_scalar(text, ScalarStyle::Plain);
        let json = self.mapper.options().json_compatible;
        // Guids and base64 never need quoting in YAML; JSON wants them as strings.
        let encoded = if json { ScalarStyle::DoubleQuoted } else { ScalarStyle::Plain };
        let event = match value {
            Value::Null => plain("null".to_owned()),
            Value::Bool(b) => plain(b.to_string()),
            Value::Int(i) => plain(i.to_string()),
            Value::UInt(u) => plain(u.to_string()),
            Value::Float(f) => plain(scalars::format_float(*f)),
            Value::Float32(f) => plain(scalars::format_float(*f)),
            Value::Char(c) => {
                let text = c.to_string();
                let style = self.text_style(&text, style);
                Event::styled_scalar(text, style)
            }
            Value::Str(s) => Event::styled_scalar(s.as_str(), self.text_style(s, style)),
            Value::Guid(g) => Event::styled_scalar(g.hyphenated().to_string(), encoded),
            Value::Bytes(bytes) => {
                let event = Event::styled_scalar(scalars::encode_binary(bytes), encoded);
                if static_ty == TypeKey::BYTES || json {
                    event
                } else {
                    event.with_tag(Tag::core_tag(CoreTag::Binary))
                }
            }
            Value::Enum { ty, bits } => {
                let registry = self.registry();
                let text = match registry.get(*ty).and_then(|d| d.as_enum()) {
                    Some(descriptor) => format_enum(descriptor, *bits),
                    None => bits.to_string(),
                };
                let style = self.text_style(&text, style);
                let event = Event::styled_scalar(text, style);
                match self.tag_for(*ty, static_ty) {
                    Some(tag) => event.with_tag(tag),
                    None => event,
                }
            }
            Value::Ref(_) => return Err(Error::unexpected("scalar value")),
        };
        self.emit(out, event)
    }
}

/// Style for a string scalar: quoted whenever the plain form would read
/// back as something else, a literal block for multi-line text.
fn string_style(text: &str, hint: Option<ScalarStyle>) -> ScalarStyle {
    if hint.is_none() && text.contains('\n') {
        return ScalarStyle::Literal;
    }
    if scalars::needs_quotes(text) {
        return match hint {
            Some(style) if !style.is_plain() => style,
            _ => ScalarStyle::DoubleQuoted,
        };
    }
    hint.unwrap_or(ScalarStyle::Any)
}

/// Text of an enumeration value. Flags are written as the names of the set
/// bits, largest first, joined by `, `; anything not expressible by names is
/// written as a number.
fn format_enum(descriptor: &EnumDescriptor, bits: u64) -> String {
    if let Some((name, _)) = descriptor.variants().find(|&(_, v)| v == bits) {
        return name.to_owned();
    }
    if !descriptor.is_flags() || bits == 0 {
        return bits.to_string();
    }
    let mut flags: Vec<(&str, u64)> = descriptor.variants().filter(|&(_, v)| v != 0).collect();
    flags.sort_by(|a, b| b.1.cmp(&a.1));
    let mut remaining = bits;
    let mut names = Vec::new();
    for (name, value) in flags {
        if remaining & value == value {
            names.push(name);
            remaining &= !value;
        }
    }
    if remaining != 0 {
        return bits.to_string();
    }
    names.reverse();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_that_look_typed_are_quoted() {
        for text in ["true", "yes", "null", "", "~", "12", "0x1F", "1.5", ".inf", " padded"] {
            assert_eq!(string_style(text, None), ScalarStyle::DoubleQuoted, "{text:?}");
        }
        assert_eq!(string_style("hello", None), ScalarStyle::Any);
        assert_eq!(string_style("a\nb", None), ScalarStyle::Literal);
        assert_eq!(string_style("a\nb\n", None), ScalarStyle::Literal);
        assert_eq!(string_style("Test", Some(ScalarStyle::Literal)), ScalarStyle::Literal);
        assert_eq!(string_style("on", Some(ScalarStyle::SingleQuoted)), ScalarStyle::SingleQuoted);
        assert_eq!(string_style("on", Some(ScalarStyle::Plain)), ScalarStyle::DoubleQuoted);
    }

    #[test]
    fn flags_compose_from_variant_names() {
        let access = EnumDescriptor::flags()
            .variant("None", 0)
            .variant("Read", 1)
            .variant("Write", 2)
            .variant("Execute", 4)
            .variant("ReadWrite", 3);
        assert_eq!(format_enum(&access, 3), "ReadWrite");
        assert_eq!(format_enum(&access, 5), "Read, Execute");
        assert_eq!(format_enum(&access, 7), "ReadWrite, Execute");
        assert_eq!(format_enum(&access, 0), "None");
        assert_eq!(format_enum(&access, 8), "8");
        let plain = EnumDescriptor::new().variant("A", 1);
        assert_eq!(format_enum(&plain, 2), "2");
    }
}
