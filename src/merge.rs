//! `<<` merge keys.
//!
//! A mapping's entries are listed with every merge key replaced by the
//! entries of the mappings it refers to. Merged entries come first, in the
//! order the sources are listed; explicit keys of the mapping itself always
//! win, and among sources the first one listing a key wins. Merging copies
//! entries (node ids), never the identity of the merged mapping.

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::node::{ComposedDocument, NodeId, NodeKind};
use crate::tag::CoreTag;

/// One key/value pair of an expanded mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: NodeId,
    pub value: NodeId,
    /// Came in through a merge key rather than being written in this mapping.
    pub merged: bool,
}

fn is_merge_key(doc: &ComposedDocument, key: NodeId) -> bool {
    let node = doc.node(key);
    match &node.kind {
        NodeKind::Scalar { value, style } => {
            value == "<<"
                && style.is_plain()
                && (node.tag.is_non_specific() || node.tag.core() == Some(CoreTag::Merge))
        }
        _ => false,
    }
}

/// Text identifying a key for precedence purposes. Only scalar keys (or
/// aliases of scalars) take part; complex keys never collide.
fn key_text(doc: &ComposedDocument, key: NodeId) -> Option<&str> {
    doc.resolve(key).and_then(|id| doc.node(id).scalar_text())
}

/// The entries of mapping `id` with merge keys expanded.
pub(crate) fn expand(doc: &ComposedDocument, id: NodeId, max_depth: usize) -> Result<Vec<Entry>> {
    let mut stack = SmallVec::<[NodeId; 8]>::new();
    expand_inner(doc, id, max_depth, &mut stack)
}

fn expand_inner(
    doc: &ComposedDocument,
    id: NodeId,
    max_depth: usize,
    stack: &mut SmallVec<[NodeId; 8]>,
) -> Result<Vec<Entry>> {
    let NodeKind::Mapping(pairs) = &doc.node(id).kind else {
        return Ok(Vec::new());
    };
    if !pairs.iter().any(|&(k, _)| is_merge_key(doc, k)) {
        return Ok(pairs
            .iter()
            .map(|&(key, value)| Entry {
                key,
                value,
                merged: false,
            })
            .collect());
    }

    if stack.contains(&id) {
        return Err(Error::conversion("merge key includes the mapping it belongs to")
            .with_location(doc.node(id).location));
    }
    if stack.len() >= max_depth {
        return Err(Error::recursion(max_depth).with_location(doc.node(id).location));
    }
    stack.push(id);

    let mut explicit = Vec::new();
    let mut sources = Vec::new();
    for &(key, value) in pairs {
        if is_merge_key(doc, key) {
            collect_sources(doc, value, &mut sources)?;
        } else {
            explicit.push(Entry {
                key,
                value,
                merged: false,
            });
        }
    }

    let mut seen: AHashSet<&str> = explicit
        .iter()
        .filter_map(|e| key_text(doc, e.key))
        .collect();
    let mut entries = Vec::new();
    for source in sources {
        for entry in expand_inner(doc, source, max_depth, stack)? {
            if let Some(text) = key_text(doc, entry.key) {
                if !seen.insert(text) {
                    continue;
                }
            }
            entries.push(Entry {
                merged: true,
                ..entry
            });
        }
    }
    stack.pop();

    tracing::trace!(
        mapping = id,
        merged = entries.len(),
        explicit = explicit.len(),
        "expanded merge keys"
    );
    entries.extend(explicit);
    Ok(entries)
}

/// Mappings a merge value refers to: a mapping, an alias of one, or a
/// sequence of those.
fn collect_sources(doc: &ComposedDocument, value: NodeId, sources: &mut Vec<NodeId>) -> Result<()> {
    let target = resolve_source(doc, value)?;
    match &doc.node(target).kind {
        NodeKind::Mapping(_) => sources.push(target),
        NodeKind::Sequence(items) => {
            for &item in items {
                let item = resolve_source(doc, item)?;
                if !matches!(doc.node(item).kind, NodeKind::Mapping(_)) {
                    return Err(not_a_mapping(doc, item));
                }
                sources.push(item);
            }
        }
        _ => return Err(not_a_mapping(doc, target)),
    }
    Ok(())
}

fn resolve_source(doc: &ComposedDocument, id: NodeId) -> Result<NodeId> {
    let node = doc.node(id);
    match &node.kind {
        NodeKind::Alias(name) => doc.resolve(id).ok_or_else(|| Error::AnchorNotFound {
            name: name.clone(),
            location: node.location,
        }),
        _ => Ok(id),
    }
}

fn not_a_mapping(doc: &ComposedDocument, id: NodeId) -> Error {
    let node = doc.node(id);
    Error::conversion(format!(
        "merge value must be a mapping or a sequence of mappings, found a {}",
        node.describe()
    ))
    .with_location(node.location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_events::LiveEvents;
    use crate::node::compose_document;
    use indoc::indoc;

    fn compose(yaml: &str) -> ComposedDocument {
        compose_document(&mut LiveEvents::new(yaml), 64).unwrap().unwrap()
    }

    /// Expanded `key: value` texts of the mapping under top-level key `at`.
    fn expanded(doc: &ComposedDocument, at: &str) -> Vec<(String, String)> {
        let NodeKind::Mapping(top) = &doc.node(ComposedDocument::ROOT).kind else {
            panic!("root is not a mapping");
        };
        let &(_, id) = top
            .iter()
            .find(|&&(k, _)| doc.node(k).scalar_text() == Some(at))
            .unwrap();
        expand(doc, id, 64)
            .unwrap()
            .into_iter()
            .map(|e| {
                let k = key_text(doc, e.key).unwrap().to_owned();
                let v = key_text(doc, e.value).unwrap_or("<node>").to_owned();
                (k, v)
            })
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    #[test]
    fn explicit_keys_win_over_merged() {
        let doc = compose(indoc! {"
            a: &a { k: v1, j: vj }
            b:
              <<: *a
              k: v2
        "});
        assert_eq!(expanded(&doc, "b"), pairs(&[("j", "vj"), ("k", "v2")]));
    }

    #[test]
    fn first_listed_source_wins() {
        let doc = compose(indoc! {"
            x: &x { k: from_x, only_x: 1 }
            y: &y { k: from_y, only_y: 2 }
            m:
              <<: [*x, *y]
        "});
        assert_eq!(
            expanded(&doc, "m"),
            pairs(&[("k", "from_x"), ("only_x", "1"), ("only_y", "2")])
        );
    }

    #[test]
    fn nested_merges_resolve_first() {
        let doc = compose(indoc! {"
            base: &base { a: 1 }
            mid: &mid { <<: *base, b: 2 }
            top:
              <<: *mid
              c: 3
        "});
        assert_eq!(expanded(&doc, "top"), pairs(&[("a", "1"), ("b", "2"), ("c", "3")]));
    }

    #[test]
    fn quoted_merge_key_is_an_ordinary_key() {
        let doc = compose(indoc! {r#"
            a: &a { k: 1 }
            b: { "<<": *a }
        "#});
        assert_eq!(expanded(&doc, "b"), pairs(&[("<<", "<node>")]));
    }

    #[test]
    fn scalar_merge_source_is_rejected() {
        let doc = compose(indoc! {"
            a: &a text
            b:
              <<: *a
        "});
        let NodeKind::Mapping(top) = &doc.node(ComposedDocument::ROOT).kind else {
            panic!("root is not a mapping");
        };
        let err = expand(&doc, top[1].1, 64).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));
        assert_eq!(err.location().map(|l| l.line()), Some(1));
    }
}
