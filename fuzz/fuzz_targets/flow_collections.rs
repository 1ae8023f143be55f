#![no_main]

use libfuzzer_sys::fuzz_target;
use saphyr_graph::{Mapper, TypeKey, TypeRegistry};

// Input wrapped into flow sequences and mappings, read both untyped and as
// typed containers, then written and read again.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let s = String::from_utf8_lossy(data);

    let mut registry = TypeRegistry::new();
    let strings = registry.sequence_of(TypeKey::STRING);
    let dict = registry.mapping_of(TypeKey::STRING, TypeKey::STRING);
    let Ok(mapper) = Mapper::builder(registry).build() else {
        return;
    };

    let yaml_seq = format!("[{s}]");
    let yaml_map = format!("{{{s}}}");
    let yaml_doc = format!("root: {{{s}}}\narray: [{s}]\n");

    for (yaml, ty) in [
        (&yaml_seq, strings),
        (&yaml_map, dict),
        (&yaml_seq, TypeKey::ANY),
        (&yaml_doc, TypeKey::ANY),
    ] {
        if let Ok(doc) = mapper.from_str(yaml, ty) {
            let text = mapper
                .to_string(&doc.graph, &doc.root, ty)
                .expect("a read graph must write");
            mapper.from_str(&text, ty).expect("written text must read back");
        }
    }
});
