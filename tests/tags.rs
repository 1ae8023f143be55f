use indoc::indoc;
use saphyr_graph::{
    options, EnumDescriptor, Error, Graph, Mapper, Member, RecordDescriptor, Tag, TypeKey, TypeRegistry, Value,
};

struct Shapes {
    mapper: Mapper,
    point: TypeKey,
    shape: TypeKey,
    circle: TypeKey,
    shapes: TypeKey,
}

fn shapes(emit_tags: bool) -> Shapes {
    let mut registry = TypeRegistry::new();
    let point = registry
        .record(
            "Point",
            RecordDescriptor::new()
                .member(Member::new("x", TypeKey::I32))
                .member(Member::new("y", TypeKey::I32)),
        )
        .unwrap();
    let shape = registry
        .record("Shape", RecordDescriptor::new().member(Member::new("name", TypeKey::STRING)))
        .unwrap();
    let circle = registry
        .record(
            "Circle",
            RecordDescriptor::new()
                .extends(shape)
                .member(Member::new("radius", TypeKey::I32)),
        )
        .unwrap();
    let shapes = registry.sequence_of(shape);
    let mapper = Mapper::builder(registry)
        .with_options(options! { emit_tags_for_polymorphic_values: emit_tags })
        .with_tag_mapping(Tag::new("!point").unwrap(), point)
        .build()
        .unwrap();
    Shapes {
        mapper,
        point,
        shape,
        circle,
        shapes,
    }
}

#[test]
fn mapped_tag_selects_the_type_on_read() {
    let s = shapes(true);
    let doc = s.mapper.from_str("!point { x: 1, y: 2 }", TypeKey::ANY).unwrap();
    let id = doc.root.as_object().unwrap();
    assert_eq!(doc.graph.get(id).unwrap().type_key(), s.point);
    assert_eq!(s.mapper.field(&doc.graph, id, "y"), Some(&Value::Int(2)));
}

#[test]
fn mapped_tag_is_always_written() {
    let s = shapes(true);
    let mut graph = Graph::new();
    let id = s.mapper.instantiate(&mut graph, s.point).unwrap();
    s.mapper.set_field(&mut graph, id, "x", 1).unwrap();
    let expected = indoc! {"
        !point
        x: 1
        y: 0
    "};
    assert_eq!(s.mapper.to_string(&graph, &Value::Ref(id), s.point).unwrap(), expected);
    assert_eq!(s.mapper.to_string(&graph, &Value::Ref(id), TypeKey::ANY).unwrap(), expected);
}

#[test]
fn tag_must_fit_the_slot() {
    let s = shapes(true);
    let err = s.mapper.from_str("!point { x: 1 }", s.shape).unwrap_err();
    assert!(matches!(err, Error::TypeConversion { .. }), "{err:?}");
    assert!(err.to_string().contains("!point"));
}

#[test]
fn unknown_tags() {
    let s = shapes(true);
    assert!(matches!(
        s.mapper.from_str("!nope 5", TypeKey::ANY),
        Err(Error::TypeConversion { .. })
    ));
    // A typed slot decides by itself.
    assert_eq!(s.mapper.from_str("!nope 5", TypeKey::I32).unwrap().root, Value::Int(5));
}

#[test]
fn derived_types_are_written_with_their_name() {
    let s = shapes(true);
    let mut graph = Graph::new();
    let base = s.mapper.instantiate(&mut graph, s.shape).unwrap();
    s.mapper.set_field(&mut graph, base, "name", "plain").unwrap();
    let round = s.mapper.instantiate(&mut graph, s.circle).unwrap();
    s.mapper.set_field(&mut graph, round, "name", "round").unwrap();
    s.mapper.set_field(&mut graph, round, "radius", 3).unwrap();
    let root = graph.sequence(s.shapes, vec![Value::Ref(base), Value::Ref(round)]);

    let yaml = s.mapper.to_string(&graph, &Value::Ref(root), s.shapes).unwrap();
    assert_eq!(
        yaml,
        indoc! {"
            - name: plain
            - !Circle
              name: round
              radius: 3
        "}
    );
    let doc = s.mapper.from_str(&yaml, s.shapes).unwrap();
    let items = doc.graph.items(doc.root.as_object().unwrap()).unwrap();
    let kinds: Vec<TypeKey> = items
        .iter()
        .map(|v| doc.graph.deref(v).unwrap().type_key())
        .collect();
    assert_eq!(kinds, vec![s.shape, s.circle]);
}

#[test]
fn polymorphic_tags_can_be_turned_off() {
    let s = shapes(false);
    let mut graph = Graph::new();
    let round = s.mapper.instantiate(&mut graph, s.circle).unwrap();
    let root = graph.sequence(s.shapes, vec![Value::Ref(round)]);
    let yaml = s.mapper.to_string(&graph, &Value::Ref(root), s.shapes).unwrap();
    assert!(!yaml.contains('!'), "{yaml}");
    assert!(yaml.contains("radius: 0"));
}

#[test]
fn enumerations_in_untyped_slots_carry_their_type() {
    let mut registry = TypeRegistry::new();
    let color = registry
        .enumeration("Color", EnumDescriptor::new().variant("Red", 0).variant("Green", 1))
        .unwrap();
    let mapper = Mapper::builder(registry).build().unwrap();
    let value = Value::Enum { ty: color, bits: 1 };
    let yaml = mapper.to_string(&Graph::new(), &value, TypeKey::ANY).unwrap();
    assert_eq!(yaml, "!Color Green\n");
    assert_eq!(mapper.from_str(&yaml, TypeKey::ANY).unwrap().root, value);
}

#[test]
fn core_tags_override_inference() {
    let doc = saphyr_graph::from_str(indoc! {r#"
        - !!int "12"
        - !!bool "yes"
        - !!null ""
        - !!str true
    "#})
    .unwrap();
    let items = doc.graph.items(doc.root.as_object().unwrap()).unwrap();
    assert_eq!(
        items,
        &[Value::Int(12), Value::Bool(true), Value::Null, Value::from("true")]
    );
}

#[test]
fn builder_rejects_bad_tag_mappings() {
    let mut registry = TypeRegistry::new();
    let point = registry.record("Point", RecordDescriptor::new()).unwrap();
    assert!(matches!(Tag::new(""), Err(Error::InvalidTag)));
    assert!(matches!(Tag::NON_SPECIFIC.value(), Err(Error::NonSpecificTag)));
    let twice = Mapper::builder(registry)
        .with_tag_mapping(Tag::new("!p").unwrap(), point)
        .with_tag_mapping(Tag::new("!p").unwrap(), TypeKey::STRING)
        .build();
    assert!(matches!(twice, Err(Error::Config { .. })));
}
