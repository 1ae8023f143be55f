#![no_main]

use libfuzzer_sys::fuzz_target;
use saphyr_graph::{options, DuplicateKeyPolicy, Mapper, Member, RecordDescriptor, TypeKey, TypeRegistry};

// Mappings with intentional duplicate keys, read under every policy into
// dictionaries and records.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let s = String::from_utf8_lossy(data);

    let yaml_top = format!("a: 1\na: 2\nkey: {s}\nkey: {s}\n");
    let yaml_nested = format!("outer:\n  inner: {{x: 1, x: 2}}\n  arr: [{{k: {s}}}, {{k: {s}}}]\n");
    let yaml_flow = format!("{{'{s}': 1, '{s}': 2}}\n");

    for policy in [
        DuplicateKeyPolicy::Error,
        DuplicateKeyPolicy::FirstWins,
        DuplicateKeyPolicy::LastWins,
    ] {
        let mut registry = TypeRegistry::new();
        let doc = registry
            .record(
                "Doc",
                RecordDescriptor::new()
                    .member(Member::new("a", TypeKey::I64))
                    .member(Member::new("key", TypeKey::STRING)),
            )
            .expect("fixed record");
        let Ok(mapper) = Mapper::builder(registry)
            .with_options(options! { duplicate_keys: policy, ignore_unmatched_properties: true })
            .build()
        else {
            return;
        };
        let _ = mapper.from_str(&yaml_top, doc);
        for yaml in [&yaml_top, &yaml_nested, &yaml_flow] {
            let _ = mapper.from_str(yaml, TypeKey::ANY);
        }
    }
});
