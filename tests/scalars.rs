use std::error::Error as _;

use saphyr_graph::{options, Error, Graph, Mapper, ScalarError, TypeKey, TypeRegistry, Value};

fn read(yaml: &str, ty: TypeKey) -> Result<Value, Error> {
    Mapper::default().from_str(yaml, ty).map(|doc| doc.root)
}

fn write(value: Value, ty: TypeKey) -> String {
    Mapper::default()
        .to_string(&Graph::new(), &value, ty)
        .expect("scalar must serialize")
}

#[test]
fn integers_in_every_radix() {
    assert_eq!(read("-0b1_0010_1001_0010", TypeKey::I32).unwrap(), Value::Int(-4754));
    assert_eq!(read("+071_352", TypeKey::I32).unwrap(), Value::Int(29418));
    assert_eq!(
        read("99_:_58:47:3:6_2:10", TypeKey::I64).unwrap(),
        Value::Int(77744246530)
    );
    assert_eq!(read("0x_1F", TypeKey::U8).unwrap(), Value::UInt(31));
    assert_eq!(read("0o17", TypeKey::I16).unwrap(), Value::Int(15));
    assert_eq!(read("1_000", TypeKey::U64).unwrap(), Value::UInt(1000));
}

#[test]
fn integer_overflow_reports_target_width() {
    let err = read("300", TypeKey::U8).unwrap_err();
    match &err {
        Error::ScalarFormat {
            cause: ScalarError::IntOverflow { target },
            location,
            ..
        } => {
            assert_eq!(*target, "u8");
            assert_eq!(location.line(), 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.source().is_some(), "the parse failure must stay reachable");
    assert!(err.to_string().contains("scalar conversion failed"));
}

#[test]
fn every_boolean_spelling() {
    let truthy = ["true", "True", "TRUE", "yes", "Yes", "YES", "y", "Y", "on", "On", "ON"];
    let falsy = ["false", "False", "FALSE", "no", "No", "NO", "n", "N", "off", "Off", "OFF"];
    for text in truthy {
        assert_eq!(read(text, TypeKey::BOOL).unwrap(), Value::Bool(true), "{text}");
    }
    for text in falsy {
        assert_eq!(read(text, TypeKey::BOOL).unwrap(), Value::Bool(false), "{text}");
    }
    for text in ["yess", "truee", "1", "t", "nope"] {
        assert!(
            matches!(
                read(text, TypeKey::BOOL),
                Err(Error::ScalarFormat {
                    cause: ScalarError::InvalidBool,
                    ..
                })
            ),
            "{text} must be rejected"
        );
    }
}

#[test]
fn strict_booleans_only_accept_true_and_false() {
    let mapper = Mapper::builder(TypeRegistry::new())
        .with_options(options! { strict_booleans: true })
        .build()
        .unwrap();
    assert_eq!(mapper.from_str("true", TypeKey::BOOL).unwrap().root, Value::Bool(true));
    assert!(mapper.from_str("yes", TypeKey::BOOL).is_err());
    assert_eq!(mapper.from_str("yes", TypeKey::ANY).unwrap().root, Value::from("yes"));
    assert_eq!(read("yes", TypeKey::ANY).unwrap(), Value::Bool(true));
}

#[test]
fn doubles_round_trip_bit_for_bit() {
    let samples = [
        0.1,
        1.0 / 3.0,
        -2.5e-8,
        1e300,
        f64::MAX,
        f64::MIN_POSITIVE,
        5e-324,
        -0.0,
        123456789.125,
        f64::INFINITY,
        f64::NEG_INFINITY,
    ];
    for x in samples {
        let text = write(Value::Float(x), TypeKey::F64);
        let Value::Float(back) = read(&text, TypeKey::F64).unwrap() else {
            panic!("{text} did not read back as a double");
        };
        assert_eq!(back.to_bits(), x.to_bits(), "{text}");
    }
    let text = write(Value::Float(f64::NAN), TypeKey::F64);
    assert_eq!(text, ".nan\n");
    assert!(read(&text, TypeKey::F64).unwrap().as_f64().unwrap().is_nan());
}

#[test]
fn singles_round_trip_bit_for_bit() {
    for x in [0.1f32, 1.0 / 3.0, f32::MAX, f32::MIN_POSITIVE, 1e-45, -7.25] {
        let text = write(Value::Float32(x), TypeKey::F32);
        let Value::Float32(back) = read(&text, TypeKey::F32).unwrap() else {
            panic!("{text} did not read back as a single");
        };
        assert_eq!(back.to_bits(), x.to_bits(), "{text}");
    }
}

#[test]
fn whole_floats_stay_floats_when_untyped() {
    assert_eq!(write(Value::Float(1.0), TypeKey::ANY), "1.0\n");
    assert_eq!(read("1.0", TypeKey::ANY).unwrap(), Value::Float(1.0));
    let sexagesimal = read("190:20:30.15", TypeKey::F64).unwrap().as_f64().unwrap();
    assert!((sexagesimal - 685230.15).abs() < 1e-6, "{sexagesimal}");
}

#[test]
fn strings_that_look_typed_round_trip_as_strings() {
    for text in ["true", "null", "123", "1.5", "~", "", " padded", "0x10", ".inf", "no"] {
        let yaml = write(Value::from(text), TypeKey::ANY);
        assert_eq!(read(&yaml, TypeKey::ANY).unwrap(), Value::from(text), "{yaml}");
    }
}

#[test]
fn quoted_scalars_are_never_inferred() {
    assert_eq!(read("'42'", TypeKey::ANY).unwrap(), Value::from("42"));
    assert_eq!(read("\"true\"", TypeKey::ANY).unwrap(), Value::from("true"));
    assert_eq!(read("42", TypeKey::ANY).unwrap(), Value::Int(42));
    assert_eq!(read("!!str 42", TypeKey::ANY).unwrap(), Value::from("42"));
    assert_eq!(read("!!float 3", TypeKey::ANY).unwrap(), Value::Float(3.0));
}

#[test]
fn nulls_need_a_nullable_target() {
    let mut registry = TypeRegistry::new();
    let maybe_int = registry.optional(TypeKey::I32);
    let mapper = Mapper::builder(registry).build().unwrap();

    assert!(matches!(
        mapper.from_str("~", TypeKey::I32),
        Err(Error::ScalarFormat {
            cause: ScalarError::NullNotAllowed,
            ..
        })
    ));
    assert_eq!(mapper.from_str("~", maybe_int).unwrap().root, Value::Null);
    assert_eq!(mapper.from_str("null", maybe_int).unwrap().root, Value::Null);
    assert_eq!(mapper.from_str("7", maybe_int).unwrap().root, Value::Int(7));
    assert_eq!(mapper.from_str("~", TypeKey::STRING).unwrap().root, Value::Null);
    assert_eq!(mapper.from_str("'~'", TypeKey::STRING).unwrap().root, Value::from("~"));
}

#[test]
fn guids_chars_and_binary() {
    let guid = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let text = write(Value::Guid(guid), TypeKey::GUID);
    assert_eq!(text, "67e55044-10b1-426f-9247-bb680e5fe0c8\n");
    assert_eq!(read(&text, TypeKey::GUID).unwrap(), Value::Guid(guid));
    assert_eq!(
        read("67e5504410b1426f9247bb680e5fe0c8", TypeKey::GUID).unwrap(),
        Value::Guid(guid)
    );

    assert_eq!(read("x", TypeKey::CHAR).unwrap(), Value::Char('x'));
    assert!(read("xy", TypeKey::CHAR).is_err());

    assert_eq!(read("!!binary AQID", TypeKey::ANY).unwrap(), Value::Bytes(vec![1, 2, 3]));
    assert_eq!(read("AQID", TypeKey::BYTES).unwrap(), Value::Bytes(vec![1, 2, 3]));
    assert_eq!(write(Value::Bytes(vec![1, 2, 3]), TypeKey::ANY), "!!binary AQID\n");
    assert_eq!(write(Value::Bytes(vec![1, 2, 3]), TypeKey::BYTES), "AQID\n");
}
