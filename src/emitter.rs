//! Block-style YAML text output for an event stream.
//!
//! Each document is buffered until its end event, composed into a node tree
//! and then rendered top-down. This keeps the layout decisions (inline vs.
//! nested, `[]` for empty collections, `?` for complex keys) local to the
//! node being written.
//!
//! The JSON-compatible flavour writes every document as one flow collection
//! that a JSON parser accepts as well: keys and non-numeric scalars are JSON
//! strings, properties are dropped, and aliases are refused.

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::events::{Event, EventBuffer, Emitter, ScalarStyle};
use crate::node::{compose_document, ComposedDocument, Node, NodeId, NodeKind};
use crate::ser_quoting::{
    is_json_number, is_literal_safe, is_plain_safe, is_single_quote_safe, write_double_quoted,
    write_json_string, write_single_quoted,
};
use crate::tag::{Tag, YAML_TAG_PREFIX};

/// Renders events as YAML text into any `fmt::Write`.
pub struct YamlEmitter<W: Write> {
    out: W,
    pending: EventBuffer,
    in_document: bool,
    documents: usize,
    indent_step: usize,
    json: bool,
}

impl<W: Write> YamlEmitter<W> {
    pub fn new(out: W) -> Self {
        Self::with_indent(out, 2)
    }

    pub fn with_indent(out: W, indent_step: usize) -> Self {
        Self {
            out,
            pending: EventBuffer::new(),
            in_document: false,
            documents: 0,
            indent_step: indent_step.max(1),
            json: false,
        }
    }

    /// An emitter writing JSON-compatible flow documents.
    pub fn json(out: W) -> Self {
        Self {
            json: true,
            ..Self::new(out)
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_document(&mut self) -> Result<()> {
        let doc = compose_document(&mut self.pending, usize::MAX)?
            .ok_or_else(|| Error::unexpected("document content"))?;
        self.pending.clear();
        self.in_document = false;
        if self.documents > 0 {
            self.out.write_str("---\n")?;
        }
        self.documents += 1;
        if self.json {
            let mut line = String::new();
            JsonRenderer { doc: &doc, out: &mut line }.node(ComposedDocument::ROOT)?;
            line.push('\n');
            self.out.write_str(&line)?;
            return Ok(());
        }
        let mut renderer = Renderer {
            doc: &doc,
            out: &mut self.out,
            step: self.indent_step,
        };
        renderer.root()
    }
}

impl<W: Write> Emitter for YamlEmitter<W> {
    fn emit(&mut self, event: Event) -> Result<()> {
        match event {
            Event::StreamStart | Event::StreamEnd => Ok(()),
            Event::DocumentStart { .. } => {
                self.pending.clear();
                self.pending.push(event);
                self.in_document = true;
                Ok(())
            }
            Event::DocumentEnd => {
                self.pending.push(event);
                self.flush_document()
            }
            other => {
                if !self.in_document {
                    self.pending.push(Event::DocumentStart { explicit: false });
                    self.in_document = true;
                }
                self.pending.push(other);
                Ok(())
            }
        }
    }
}

/// Tag text as written: `!!x` for the core schema, `!x` for local tags,
/// `!<uri>` otherwise.
fn tag_text(tag: &Tag) -> Option<String> {
    let text = tag.as_str()?;
    let is_uri_safe = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "-#;/?:@&=+$_.~*'()%".contains(c))
    };
    Some(if let Some(rest) = text.strip_prefix(YAML_TAG_PREFIX) {
        if is_uri_safe(rest) {
            format!("!!{rest}")
        } else {
            format!("!<{text}>")
        }
    } else if let Some(rest) = text.strip_prefix('!') {
        if rest.is_empty() || is_uri_safe(rest) {
            text.to_owned()
        } else {
            format!("!<{text}>")
        }
    } else {
        format!("!<{text}>")
    })
}

struct Renderer<'a, W: Write> {
    doc: &'a ComposedDocument,
    out: &'a mut W,
    step: usize,
}

enum Resolved {
    Plain,
    Single,
    Double,
    Literal,
    Folded,
}

impl<W: Write> Renderer<'_, W> {
    fn indent(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.out.write_char(' ')?;
        }
        Ok(())
    }

    fn props(&self, node: &Node) -> String {
        let mut props = String::new();
        if let Some(anchor) = &node.anchor {
            props.push('&');
            props.push_str(anchor);
        }
        if let Some(tag) = tag_text(&node.tag) {
            if !props.is_empty() {
                props.push(' ');
            }
            props.push_str(&tag);
        }
        props
    }

    fn is_block(node: &Node) -> bool {
        match &node.kind {
            NodeKind::Sequence(items) => !items.is_empty(),
            NodeKind::Mapping(entries) => !entries.is_empty(),
            _ => false,
        }
    }

    fn root(&mut self) -> Result<()> {
        let node = self.doc.node(ComposedDocument::ROOT);
        if Self::is_block(node) {
            let props = self.props(node);
            if !props.is_empty() {
                self.out.write_str(&props)?;
                self.out.write_char('\n')?;
            }
            self.block(ComposedDocument::ROOT, 0, false)
        } else {
            self.inline(ComposedDocument::ROOT, self.step, false)
        }
    }

    /// Write a non-block node (scalar, alias, empty collection) with its
    /// properties, ending the line. `body` is the indentation of block scalar content.
    fn inline(&mut self, id: NodeId, body: usize, is_key: bool) -> Result<()> {
        let node = self.doc.node(id);
        let mut parts = self.props(node);
        let mut rendered = String::new();
        match &node.kind {
            NodeKind::Alias(name) => {
                rendered.push('*');
                rendered.push_str(name);
            }
            NodeKind::Sequence(_) => rendered.push_str("[]"),
            NodeKind::Mapping(_) => rendered.push_str("{}"),
            NodeKind::Scalar { value, style } => self.scalar(&mut rendered, value, *style, body, is_key)?,
        }
        if !rendered.is_empty() {
            if !parts.is_empty() {
                parts.push(' ');
            }
            parts.push_str(&rendered);
        }
        self.out.write_str(&parts)?;
        if !parts.ends_with('\n') {
            self.out.write_char('\n')?;
        }
        Ok(())
    }

    fn resolve_style(value: &str, style: ScalarStyle, is_key: bool) -> Resolved {
        let multi_line = value.trim_end_matches('\n').contains('\n');
        match style {
            ScalarStyle::Any | ScalarStyle::Plain if is_plain_safe(value, is_key) => Resolved::Plain,
            ScalarStyle::SingleQuoted if is_single_quote_safe(value) => Resolved::Single,
            ScalarStyle::Folded if !is_key && !multi_line && is_literal_safe(value) => Resolved::Folded,
            ScalarStyle::Literal | ScalarStyle::Folded if !is_key && is_literal_safe(value) => Resolved::Literal,
            _ => Resolved::Double,
        }
    }

    fn scalar(&mut self, rendered: &mut String, value: &str, style: ScalarStyle, body: usize, is_key: bool) -> Result<()> {
        // An empty plain scalar is null; write nothing rather than `""`.
        if value.is_empty() && style == ScalarStyle::Plain && !is_key {
            return Ok(());
        }
        match Self::resolve_style(value, style, is_key) {
            Resolved::Plain => rendered.push_str(value),
            Resolved::Single => write_single_quoted(rendered, value)?,
            Resolved::Double => write_double_quoted(rendered, value)?,
            Resolved::Literal | Resolved::Folded => {
                let folded = matches!(Self::resolve_style(value, style, is_key), Resolved::Folded);
                let content = value.trim_end_matches('\n');
                let trailing = value.len() - content.len();
                rendered.push(if folded { '>' } else { '|' });
                rendered.push_str(match trailing {
                    0 => "-",
                    1 => "",
                    _ => "+",
                });
                rendered.push('\n');
                for line in content.split('\n') {
                    if !line.is_empty() {
                        rendered.extend(std::iter::repeat_n(' ', body));
                        rendered.push_str(line);
                    }
                    rendered.push('\n');
                }
                for _ in 1..trailing {
                    rendered.push('\n');
                }
            }
        }
        Ok(())
    }

    /// Write the entries of a non-empty collection at column `n`. With
    /// `compact`, the first entry continues the current line (after `- `).
    fn block(&mut self, id: NodeId, n: usize, compact: bool) -> Result<()> {
        let doc = self.doc;
        match &doc.node(id).kind {
            NodeKind::Sequence(items) => {
                for (i, &item) in items.iter().enumerate() {
                    if !(compact && i == 0) {
                        self.indent(n)?;
                    }
                    self.out.write_char('-')?;
                    self.after_indicator(item, n)?;
                }
            }
            NodeKind::Mapping(entries) => {
                for (i, &(key, value)) in entries.iter().enumerate() {
                    if !(compact && i == 0) {
                        self.indent(n)?;
                    }
                    self.key(key, n)?;
                    self.after_key(value, n)?;
                }
            }
            NodeKind::Scalar { .. } | NodeKind::Alias(_) => self.inline(id, n + self.step, false)?,
        }
        Ok(())
    }

    /// After `-` or `?` at column `n`.
    fn after_indicator(&mut self, id: NodeId, n: usize) -> Result<()> {
        let node = self.doc.node(id);
        if !Self::is_block(node) {
            self.out.write_char(' ')?;
            return self.inline(id, n + self.step, false);
        }
        let props = self.props(node);
        if props.is_empty() {
            // `- a: 1` / `- - x`: nested entries line up after the indicator.
            self.out.write_char(' ')?;
            self.block(id, n + 2, true)
        } else {
            self.out.write_char(' ')?;
            self.out.write_str(&props)?;
            self.out.write_char('\n')?;
            self.block(id, n + self.step, false)
        }
    }

    /// After `key:` at column `n`.
    fn after_key(&mut self, id: NodeId, n: usize) -> Result<()> {
        let node = self.doc.node(id);
        if !Self::is_block(node) {
            let mut line = String::new();
            let mut probe = Renderer {
                doc: self.doc,
                out: &mut line,
                step: self.step,
            };
            probe.inline(id, n + self.step, false)?;
            if line != "\n" {
                self.out.write_char(' ')?;
            }
            self.out.write_str(&line)?;
            return Ok(());
        }
        let props = self.props(node);
        if !props.is_empty() {
            self.out.write_char(' ')?;
            self.out.write_str(&props)?;
        }
        self.out.write_char('\n')?;
        self.block(id, n + self.step, false)
    }

    /// Write a mapping key (and the `:`), using `? ` when it cannot be implicit.
    fn key(&mut self, id: NodeId, n: usize) -> Result<()> {
        let node = self.doc.node(id);
        let simple = match &node.kind {
            NodeKind::Alias(_) => true,
            NodeKind::Scalar { value, style } => {
                value.len() <= 1024
                    && !matches!(Self::resolve_style(value, *style, true), Resolved::Literal | Resolved::Folded)
            }
            NodeKind::Sequence(_) | NodeKind::Mapping(_) => !Self::is_block(node),
        };
        if simple {
            let mut line = String::new();
            let mut probe = Renderer {
                doc: self.doc,
                out: &mut line,
                step: self.step,
            };
            probe.inline(id, n + self.step, true)?;
            let text = line.trim_end_matches('\n');
            self.out.write_str(text)?;
            // `*a:` would read the colon as part of the alias name.
            if matches!(node.kind, NodeKind::Alias(_)) || text.is_empty() {
                self.out.write_char(' ')?;
            }
            self.out.write_char(':')?;
            return Ok(());
        }
        self.out.write_char('?')?;
        self.after_indicator(id, n)?;
        self.indent(n)?;
        self.out.write_char(':')?;
        Ok(())
    }
}

/// Flow rendering of one document in the JSON subset of YAML.
struct JsonRenderer<'a> {
    doc: &'a ComposedDocument,
    out: &'a mut String,
}

impl JsonRenderer<'_> {
    fn node(&mut self, id: NodeId) -> Result<()> {
        let doc = self.doc;
        match &doc.node(id).kind {
            NodeKind::Scalar { value, style } => self.scalar(value, *style),
            NodeKind::Alias(name) => Err(Error::conversion(format!(
                "alias `*{name}` cannot be written as JSON"
            ))),
            NodeKind::Sequence(items) => {
                self.out.push('[');
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.node(item)?;
                }
                self.out.push(']');
                Ok(())
            }
            NodeKind::Mapping(entries) => {
                self.out.push('{');
                for (i, &(key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.key(key)?;
                    self.out.push_str(": ");
                    self.node(value)?;
                }
                self.out.push('}');
                Ok(())
            }
        }
    }

    fn scalar(&mut self, value: &str, style: ScalarStyle) -> Result<()> {
        let bare = match style {
            ScalarStyle::Any | ScalarStyle::Plain => {
                matches!(value, "null" | "true" | "false") || is_json_number(value)
            }
            _ => false,
        };
        if bare {
            self.out.push_str(value);
        } else if value.is_empty() && style == ScalarStyle::Plain {
            self.out.push_str("null");
        } else {
            write_json_string(self.out, value)?;
        }
        Ok(())
    }

    /// Object keys are always strings, however long.
    fn key(&mut self, id: NodeId) -> Result<()> {
        let node = self.doc.node(id);
        match &node.kind {
            NodeKind::Scalar { value, .. } => Ok(write_json_string(self.out, value)?),
            _ => Err(Error::conversion(format!(
                "a {} key cannot be written as JSON",
                node.describe()
            ))),
        }
    }
}
