//! Anchor bookkeeping for both directions.
//!
//! Read side: [`AnchorTable`] keeps the value materialized for every anchored
//! node of the current document, plus the aliases still waiting for one.
//! Definitions are keyed by node rather than by name: which definition an
//! alias means is decided positionally when the document is composed
//! (see [`crate::node`]), so a redefined name never disturbs aliases that
//! were already bound.
//!
//! Write side: [`IdentityTracker`] finds objects reachable more than once and
//! hands out anchor names on first visit, so that later visits (including
//! ones reached through a cycle) can be written as aliases.

use ahash::AHashMap;
use nohash_hasher::{IntMap, IntSet};

use crate::error::{Error, Location, Result};
use crate::graph::{ObjectId, Slot, Value};
use crate::node::NodeId;
use crate::types::TypeKey;

/// An alias seen before its definition was materialized.
#[derive(Clone, Debug)]
pub(crate) struct PendingAlias {
    pub name: String,
    /// The defining node, if the document has one for this alias.
    pub target: Option<NodeId>,
    /// Where the value goes once known.
    pub slot: Slot,
    /// Static type of that slot.
    pub expected: TypeKey,
    pub location: Location,
}

/// Per-document anchor table. Created at document start, dropped at its end.
#[derive(Debug, Default)]
pub(crate) struct AnchorTable {
    resolved: AHashMap<NodeId, Value>,
    pending: Vec<PendingAlias>,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, def: NodeId) -> Option<&Value> {
        self.resolved.get(&def)
    }

    /// Record the value of an anchored node and return the aliases that
    /// were waiting for it. A node visited again (through a merge, or a
    /// scalar re-read for another type) keeps its first value.
    pub fn register(&mut self, def: NodeId, value: Value) -> Vec<PendingAlias> {
        if self.resolved.contains_key(&def) {
            return Vec::new();
        }
        self.resolved.insert(def, value);
        if self.pending.is_empty() {
            return Vec::new();
        }
        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|alias| alias.target == Some(def));
        self.pending = waiting;
        ready
    }

    pub fn defer(&mut self, alias: PendingAlias) {
        tracing::trace!(alias = %alias.name, slot = ?alias.slot, "deferring forward alias");
        self.pending.push(alias);
    }

    /// Definition and expected type of the first waiting alias whose
    /// anchored node exists but has no value yet.
    pub fn unbuilt(&self) -> Option<(NodeId, TypeKey)> {
        self.pending.iter().find_map(|alias| {
            alias
                .target
                .filter(|def| !self.resolved.contains_key(def))
                .map(|def| (def, alias.expected))
        })
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Fail on the first alias (in document order) that never got a value.
    pub fn finish(self) -> Result<()> {
        match self.pending.into_iter().next() {
            Some(alias) => Err(Error::AnchorNotFound {
                name: alias.name,
                location: alias.location,
            }),
            None => Ok(()),
        }
    }
}

/// What the walker should do with an object it reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Visit {
    /// Write the object in full, with this anchor if it is shared.
    First { anchor: Option<String> },
    /// Already written: write an alias instead.
    Alias(String),
}

#[derive(Debug)]
enum Mode {
    /// Dry run counting how often each object is reached.
    Scan(IntMap<ObjectId, u32>),
    /// Real run with aliases for shared objects.
    Emit {
        shared: IntSet<ObjectId>,
        anchors: IntMap<ObjectId, String>,
        next: usize,
    },
    /// Aliases disabled: only the active path is tracked, to catch cycles.
    Expand,
}

/// Per-document identity table of the write path.
#[derive(Debug)]
pub(crate) struct IdentityTracker {
    mode: Mode,
    active: IntSet<ObjectId>,
    prefix: String,
    max_depth: usize,
}

impl IdentityTracker {
    /// A tracker for a scan pass (aliases on), to be followed by [`IdentityTracker::finish_scan`].
    pub fn scanning(prefix: &str, max_depth: usize) -> Self {
        Self {
            mode: Mode::Scan(IntMap::default()),
            active: IntSet::default(),
            prefix: prefix.to_owned(),
            max_depth,
        }
    }

    /// A tracker that never aliases and rejects cycles.
    pub fn expanding(max_depth: usize) -> Self {
        Self {
            mode: Mode::Expand,
            active: IntSet::default(),
            prefix: String::new(),
            max_depth,
        }
    }

    /// Switch from the scan pass to emission, keeping the objects reached more than once.
    pub fn finish_scan(&mut self) {
        if let Mode::Scan(counts) = &mut self.mode {
            let shared: IntSet<ObjectId> = counts
                .iter()
                .filter(|&(_, &count)| count > 1)
                .map(|(&id, _)| id)
                .collect();
            tracing::debug!(shared = shared.len(), "identity scan complete");
            self.mode = Mode::Emit {
                shared,
                anchors: IntMap::default(),
                next: 0,
            };
        }
        self.active.clear();
    }

    pub fn visit(&mut self, id: ObjectId) -> Result<Visit> {
        match &mut self.mode {
            Mode::Scan(counts) => {
                let count = counts.entry(id).or_insert(0);
                *count += 1;
                if *count > 1 {
                    return Ok(Visit::Alias(String::new()));
                }
            }
            Mode::Emit { shared, anchors, next } => {
                if let Some(name) = anchors.get(&id) {
                    return Ok(Visit::Alias(name.clone()));
                }
                if shared.contains(&id) {
                    *next += 1;
                    let name = format!("{}{}", self.prefix, next);
                    tracing::trace!(object = id.index(), anchor = %name, "assigning anchor");
                    anchors.insert(id, name.clone());
                    self.active.insert(id);
                    return Ok(Visit::First { anchor: Some(name) });
                }
            }
            Mode::Expand => {
                if self.active.contains(&id) {
                    tracing::debug!(object = id.index(), "cycle found with aliases disabled");
                    return Err(Error::recursion(self.max_depth));
                }
                // Reached again off the active path: written out in full again.
                self.active.insert(id);
                return Ok(Visit::First { anchor: None });
            }
        }
        self.active.insert(id);
        Ok(Visit::First { anchor: None })
    }

    /// Leave an object entered with [`Visit::First`].
    pub fn leave(&mut self, id: ObjectId) {
        self.active.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, SlotPlace};

    fn pending(name: &str, target: Option<NodeId>, slot: Slot) -> PendingAlias {
        PendingAlias {
            name: name.to_owned(),
            target,
            slot,
            expected: TypeKey::ANY,
            location: Location::new(3, 7),
        }
    }

    #[test]
    fn register_releases_waiting_aliases() {
        let mut graph = Graph::new();
        let seq = graph.sequence(TypeKey::ANY, vec![Value::Null, Value::Null]);
        let mut table = AnchorTable::new();
        table.defer(pending("x", Some(5), Slot::In(seq, SlotPlace::Item(0))));
        table.defer(pending("y", Some(9), Slot::In(seq, SlotPlace::Item(1))));
        let ready = table.register(5, Value::Int(1));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].name, "x");
        assert_eq!(table.pending_len(), 1);
        // A second materialization of the same node is ignored.
        assert!(table.register(5, Value::Int(2)).is_empty());
        assert_eq!(table.lookup(5), Some(&Value::Int(1)));
    }

    #[test]
    fn unbuilt_skips_aliases_without_a_definition() {
        let mut table = AnchorTable::new();
        table.defer(pending("gone", None, Slot::Root));
        assert_eq!(table.unbuilt(), None);
        table.defer(pending("later", Some(4), Slot::Root));
        assert_eq!(table.unbuilt(), Some((4, TypeKey::ANY)));
        assert_eq!(table.register(4, Value::Int(1)).len(), 1);
        assert_eq!(table.unbuilt(), None);
    }

    #[test]
    fn unresolved_alias_is_reported_with_location() {
        let mut table = AnchorTable::new();
        table.defer(pending("missing", None, Slot::Root));
        match table.finish() {
            Err(Error::AnchorNotFound { name, location }) => {
                assert_eq!(name, "missing");
                assert_eq!(location, Location::new(3, 7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shared_objects_get_anchors_in_visit_order() {
        let mut graph = Graph::new();
        let shared = graph.sequence(TypeKey::ANY, vec![]);
        let single = graph.sequence(TypeKey::ANY, vec![]);
        let mut tracker = IdentityTracker::scanning("id", 8);
        for id in [single, shared, shared] {
            tracker.visit(id).unwrap();
            tracker.leave(id);
        }
        tracker.finish_scan();
        assert_eq!(tracker.visit(single).unwrap(), Visit::First { anchor: None });
        assert_eq!(
            tracker.visit(shared).unwrap(),
            Visit::First {
                anchor: Some("id1".into())
            }
        );
        assert_eq!(tracker.visit(shared).unwrap(), Visit::Alias("id1".into()));
    }

    #[test]
    fn expanding_repeats_but_rejects_cycles() {
        let mut graph = Graph::new();
        let id = graph.sequence(TypeKey::ANY, vec![]);
        let mut tracker = IdentityTracker::expanding(4);
        assert_eq!(tracker.visit(id).unwrap(), Visit::First { anchor: None });
        assert!(matches!(
            tracker.visit(id),
            Err(Error::MaximumRecursionExceeded { limit: 4, .. })
        ));
        tracker.leave(id);
        assert_eq!(tracker.visit(id).unwrap(), Visit::First { anchor: None });
    }
}
