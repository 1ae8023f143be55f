use indoc::indoc;
use saphyr_graph::{
    ConverterReader, ConverterWriter, Error, Ev, Event, Events, Graph, Mapper, Member, Object, RecordDescriptor,
    Result, TypeConverter, TypeDescriptor, TypeKey, TypeRegistry, Value,
};

/// `1.2.3` <-> a three-field object.
struct VersionConverter;

impl TypeConverter for VersionConverter {
    fn accepts(&self, descriptor: &TypeDescriptor, _ty: TypeKey) -> bool {
        descriptor.name() == "Version"
    }

    fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value> {
        let text = reader.expect_scalar()?;
        let parts = text
            .split('.')
            .map(|p| p.parse::<i64>().map(Value::Int))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::conversion(format!("`{text}` is not a version")))?;
        if parts.len() != 3 {
            return Err(Error::conversion(format!("`{text}` is not a version")));
        }
        let ty = reader.target();
        Ok(Value::Ref(reader.graph_mut().alloc(Object::Record { ty, fields: parts })))
    }

    fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()> {
        let Some(Object::Record { fields, .. }) = writer.graph().deref(value) else {
            return Err(Error::conversion("version expected"));
        };
        let text = fields
            .iter()
            .map(|f| f.as_i64().unwrap_or(0).to_string())
            .collect::<Vec<_>>()
            .join(".");
        writer.scalar(text)
    }
}

/// `[start, end]` for a record that would otherwise be a mapping.
struct RangeConverter;

impl TypeConverter for RangeConverter {
    fn accepts(&self, descriptor: &TypeDescriptor, _ty: TypeKey) -> bool {
        descriptor.name() == "Range"
    }

    fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value> {
        match reader.next()? {
            Some(Ev {
                event: Event::SequenceStart { .. },
                ..
            }) => {}
            _ => return Err(Error::conversion("a range is written as [start, end]")),
        }
        let start = reader.deserialize(TypeKey::I32)?;
        let end = reader.deserialize(TypeKey::I32)?;
        if !matches!(reader.peek()?, Some(Ev { event: Event::SequenceEnd, .. })) {
            return Err(Error::conversion("a range has exactly two bounds"));
        }
        reader.next()?;
        let ty = reader.target();
        Ok(Value::Ref(reader.graph_mut().alloc(Object::Record {
            ty,
            fields: vec![start, end],
        })))
    }

    fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()> {
        let Some(Object::Record { fields, .. }) = writer.graph().deref(value) else {
            return Err(Error::conversion("range expected"));
        };
        let fields = fields.clone();
        writer.emit(Event::sequence_start())?;
        for bound in &fields {
            writer.serialize(bound, TypeKey::I32)?;
        }
        writer.emit(Event::SequenceEnd)
    }
}

/// Booleans as `Y` / `N`.
struct YesNo;

impl TypeConverter for YesNo {
    fn accepts(&self, _descriptor: &TypeDescriptor, ty: TypeKey) -> bool {
        ty == TypeKey::BOOL
    }

    fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value> {
        match reader.expect_scalar()?.as_str() {
            "Y" => Ok(Value::Bool(true)),
            "N" => Ok(Value::Bool(false)),
            other => Err(Error::conversion(format!("`{other}` is neither Y nor N"))),
        }
    }

    fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()> {
        writer.scalar(if value.as_bool() == Some(true) { "Y" } else { "N" })
    }
}

struct Fixture {
    mapper: Mapper,
    version: TypeKey,
    release: TypeKey,
    versions: TypeKey,
}

fn fixture() -> Fixture {
    let mut registry = TypeRegistry::new();
    let version = registry.declare("Version");
    let range = registry
        .record(
            "Range",
            RecordDescriptor::new()
                .member(Member::new("start", TypeKey::I32))
                .member(Member::new("end", TypeKey::I32)),
        )
        .unwrap();
    let release = registry
        .record(
            "Release",
            RecordDescriptor::new()
                .member(Member::new("version", version))
                .member(Member::new("window", range))
                .member(Member::new("stable", TypeKey::BOOL)),
        )
        .unwrap();
    let versions = registry.sequence_of(version);
    let mapper = Mapper::builder(registry)
        .with_type_converter(VersionConverter)
        .with_type_converter(RangeConverter)
        .with_type_converter(YesNo)
        .build()
        .unwrap();
    Fixture {
        mapper,
        version,
        release,
        versions,
    }
}

#[test]
fn converters_read_and_write_their_types() {
    let f = fixture();
    let yaml = indoc! {"
        version: 1.2.3
        window:
          - 4
          - 9
        stable: Y
    "};
    let doc = f.mapper.from_str(yaml, f.release).unwrap();
    let release = doc.root.as_object().unwrap();

    let version = f.mapper.field(&doc.graph, release, "version").unwrap();
    let version_obj = doc.graph.deref(version).unwrap();
    assert_eq!(version_obj.type_key(), f.version);
    assert_eq!(
        doc.graph.fields(version.as_object().unwrap()).unwrap(),
        &[Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    let window = f.mapper.field(&doc.graph, release, "window").unwrap();
    assert_eq!(
        doc.graph.fields(window.as_object().unwrap()).unwrap(),
        &[Value::Int(4), Value::Int(9)]
    );
    assert_eq!(f.mapper.field(&doc.graph, release, "stable"), Some(&Value::Bool(true)));

    assert_eq!(f.mapper.to_string(&doc.graph, &doc.root, f.release).unwrap(), yaml);
}

#[test]
fn converter_errors_carry_the_node_location() {
    let f = fixture();
    let err = f
        .mapper
        .from_str("stable: N\nversion: 1.x\n", f.release)
        .unwrap_err();
    assert!(matches!(err, Error::TypeConversion { ref msg, .. } if msg.contains("1.x")), "{err:?}");
    assert_eq!(err.location().map(|l| l.line()), Some(2));

    let err = f.mapper.from_str("window: [1, 2, 3]\n", f.release).unwrap_err();
    assert!(err.to_string().contains("two bounds"), "{err}");
}

#[test]
fn converted_objects_keep_their_identity() {
    let f = fixture();
    let mut graph = Graph::new();
    let v = graph.alloc(Object::Record {
        ty: f.version,
        fields: vec![Value::Int(2), Value::Int(0), Value::Int(1)],
    });
    let root = graph.sequence(f.versions, vec![Value::Ref(v), Value::Ref(v)]);
    let yaml = f.mapper.to_string(&graph, &Value::Ref(root), f.versions).unwrap();
    assert_eq!(yaml, "- &a1 2.0.1\n- *a1\n");

    let doc = f.mapper.from_str(&yaml, f.versions).unwrap();
    let items = doc.graph.items(doc.root.as_object().unwrap()).unwrap();
    assert!(matches!(items[0], Value::Ref(_)));
    assert_eq!(items[0], items[1]);
    assert_eq!(doc.graph.len(), 2);
}

#[test]
fn first_registered_converter_wins() {
    struct Shout;
    impl TypeConverter for Shout {
        fn accepts(&self, _descriptor: &TypeDescriptor, ty: TypeKey) -> bool {
            ty == TypeKey::STRING
        }
        fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value> {
            Ok(Value::Str(reader.expect_scalar()?.to_uppercase()))
        }
        fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()> {
            writer.scalar(value.as_str().unwrap_or_default().to_uppercase())
        }
    }
    struct Whisper;
    impl TypeConverter for Whisper {
        fn accepts(&self, _descriptor: &TypeDescriptor, ty: TypeKey) -> bool {
            ty == TypeKey::STRING
        }
        fn read(&self, reader: &mut ConverterReader<'_, '_>) -> Result<Value> {
            Ok(Value::Str(reader.expect_scalar()?.to_lowercase()))
        }
        fn write(&self, value: &Value, writer: &mut ConverterWriter<'_, '_>) -> Result<()> {
            writer.scalar(value.as_str().unwrap_or_default().to_lowercase())
        }
    }

    let mapper = Mapper::builder(TypeRegistry::new())
        .with_type_converter(Shout)
        .with_type_converter(Whisper)
        .build()
        .unwrap();
    assert_eq!(mapper.from_str("Hello", TypeKey::STRING).unwrap().root, Value::from("HELLO"));
    assert_eq!(
        mapper.to_string(&Graph::new(), &Value::from("Hello"), TypeKey::STRING).unwrap(),
        "HELLO\n"
    );
}
