use indoc::indoc;
use regex::Regex;
use saphyr_graph::{
    skip_to_next_document, Emitter, Error, Event, EventBuffer, Graph, LiveEvents, Mapper, Member, RecordDescriptor,
    TypeKey, TypeRegistry, Value, YamlEmitter,
};

fn point_mapper() -> (Mapper, TypeKey) {
    let mut registry = TypeRegistry::new();
    let point = registry
        .record(
            "Point",
            RecordDescriptor::new()
                .member(Member::new("x", TypeKey::I32))
                .member(Member::new("y", TypeKey::I32)),
        )
        .unwrap();
    (Mapper::builder(registry).build().unwrap(), point)
}

fn x_of(mapper: &Mapper, root: &Value, graph: &Graph) -> Option<i64> {
    mapper.field(graph, root.as_object()?, "x")?.as_i64()
}

#[test]
fn every_document_is_read() {
    let (mapper, point) = point_mapper();
    let docs = mapper
        .from_str_multiple(
            indoc! {"
                x: 1
                ---
                x: 2
                y: 5
                ...
                --- { x: 3 }
            "},
            point,
        )
        .unwrap();
    let xs: Vec<_> = docs.iter().map(|d| x_of(&mapper, &d.root, &d.graph)).collect();
    assert_eq!(xs, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn documents_are_pulled_one_at_a_time() {
    let mapper = Mapper::default();
    let mut events = LiveEvents::new("a\n---\nb\n");
    let first = mapper.deserialize(&mut events, TypeKey::ANY).unwrap().unwrap();
    assert_eq!(first.root, Value::from("a"));
    let second = mapper.deserialize(&mut events, TypeKey::ANY).unwrap().unwrap();
    assert_eq!(second.root, Value::from("b"));
    assert!(mapper.deserialize(&mut events, TypeKey::ANY).unwrap().is_none());
}

#[test]
fn empty_documents_read_as_null() {
    assert_eq!(saphyr_graph::from_str("").unwrap().root, Value::Null);
    assert_eq!(saphyr_graph::from_str("---\n").unwrap().root, Value::Null);
    assert_eq!(saphyr_graph::from_str("# only a comment\n").unwrap().root, Value::Null);
}

#[test]
fn single_document_reader_rejects_more() {
    let err = saphyr_graph::from_str("a\n---\nb\n").unwrap_err();
    assert!(matches!(err, Error::MultipleDocuments { .. }));
    assert_eq!(err.location().map(|l| l.line()), Some(2));
}

#[test]
fn a_bad_document_does_not_stop_the_stream() {
    let (mapper, point) = point_mapper();
    let mut events = LiveEvents::new(indoc! {"
        x: 1
        ---
        x: not a number
        ---
        x: 3
    "});
    let mut good = Vec::new();
    let mut failures = 0;
    loop {
        match mapper.deserialize(&mut events, point) {
            Ok(Some(doc)) => good.push(x_of(&mapper, &doc.root, &doc.graph)),
            Ok(None) => break,
            Err(err) => {
                assert!(matches!(err, Error::ScalarFormat { .. }), "{err:?}");
                failures += 1;
                skip_to_next_document(&mut events).unwrap();
            }
        }
    }
    assert_eq!(good, vec![Some(1), Some(3)]);
    assert_eq!(failures, 1);
}

#[test]
fn recovery_from_a_malformed_event_stream() {
    let mut events: EventBuffer = [
        Event::StreamStart,
        Event::DocumentStart { explicit: false },
        Event::mapping_start(),
        Event::scalar("a"),
        Event::SequenceEnd,
        Event::scalar("left over"),
        Event::DocumentEnd,
        Event::DocumentStart { explicit: true },
        Event::scalar("fine"),
        Event::DocumentEnd,
        Event::StreamEnd,
    ]
    .into_iter()
    .collect();
    let mapper = Mapper::default();
    assert!(matches!(
        mapper.deserialize(&mut events, TypeKey::ANY),
        Err(Error::Unexpected { .. })
    ));
    skip_to_next_document(&mut events).unwrap();
    let doc = mapper.deserialize(&mut events, TypeKey::ANY).unwrap().unwrap();
    assert_eq!(doc.root, Value::from("fine"));
}

#[test]
fn several_documents_in_one_stream() {
    let (mapper, point) = point_mapper();
    let mut graph = Graph::new();
    let mut roots = Vec::new();
    for x in 1..=2 {
        let id = mapper.instantiate(&mut graph, point).unwrap();
        mapper.set_field(&mut graph, id, "x", x).unwrap();
        roots.push(Value::Ref(id));
    }
    let mut emitter = YamlEmitter::new(String::new());
    emitter.emit(Event::StreamStart).unwrap();
    for root in &roots {
        mapper.serialize_document(&mut emitter, &graph, root, point).unwrap();
    }
    emitter.emit(Event::StreamEnd).unwrap();
    let yaml = emitter.into_inner();
    assert_eq!(yaml, "x: 1\ny: 0\n---\nx: 2\ny: 0\n");

    let back = mapper.from_str_multiple(&yaml, point).unwrap();
    assert_eq!(back.len(), 2);
}

#[test]
fn anchors_restart_in_every_document() {
    let mapper = Mapper::default();
    let mut graph = Graph::new();
    let shared = graph.sequence(TypeKey::ANY, vec![Value::Int(1)]);
    let root = graph.sequence(TypeKey::ANY, vec![Value::Ref(shared), Value::Ref(shared)]);
    let mut emitter = YamlEmitter::new(String::new());
    for _ in 0..2 {
        mapper
            .serialize_document(&mut emitter, &graph, &Value::Ref(root), TypeKey::ANY)
            .unwrap();
    }
    let yaml = emitter.into_inner();
    let anchors: Vec<&str> = Regex::new(r"&a\d+")
        .unwrap()
        .find_iter(&yaml)
        .map(|m| m.as_str())
        .collect();
    assert_eq!(anchors, vec!["&a1", "&a1"], "{yaml}");
}
