#![no_main]

use libfuzzer_sys::fuzz_target;
use saphyr_graph::{Mapper, Member, RecordDescriptor, TypeKey, TypeRegistry};

// Inputs are wrapped into documents full of anchors, aliases and merge keys.
// Whatever reads successfully must also write, and the written text must read
// back.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let s = String::from_utf8_lossy(data);

    let yaml_alias = format!("a: &A {s}\nb: *A\nseq: &S [1, 2, *S]\nseq_alias: *S\n");
    let yaml_merge = format!(
        "base1: &B1 {{k: 1, v: {s}}}\nbase2: &B2 {{k: 2, w: {s}}}\nmerged: {{<<: [*B1, *B2], extra: 3}}\n"
    );

    let mut registry = TypeRegistry::new();
    let base = registry
        .record(
            "Base",
            RecordDescriptor::new()
                .member(Member::new("k", TypeKey::I64))
                .member(Member::new("v", TypeKey::STRING))
                .member(Member::new("w", TypeKey::STRING))
                .member(Member::new("extra", TypeKey::I64)),
        )
        .expect("fixed record");
    let bases = registry.mapping_of(TypeKey::STRING, base);
    let Ok(mapper) = Mapper::builder(registry).build() else {
        return;
    };

    for (yaml, ty) in [(&yaml_alias, TypeKey::ANY), (&yaml_merge, TypeKey::ANY), (&yaml_merge, bases)] {
        if let Ok(doc) = mapper.from_str(yaml, ty) {
            let text = mapper
                .to_string(&doc.graph, &doc.root, ty)
                .expect("a read graph must write");
            let _ = mapper.from_str(&text, ty);
        }
    }
});
