#![no_main]

use libfuzzer_sys::fuzz_target;
use saphyr_graph::{Graph, Mapper, TypeKey, Value};

// Large plain and block scalars, read as strings and written back out.
fuzz_target!(|data: &[u8]| {
    if data.len() < 256 {
        return;
    }
    // Cap to 1 MiB generated content.
    let cap: usize = 1 << 20;

    let chunk = String::from_utf8_lossy(data);
    let mut plain = String::new();
    while plain.len() + chunk.len() <= cap {
        plain.push_str(&chunk);
    }

    let yaml_plain = format!("{plain}\n");
    let yaml_block = format!("|\n  {plain}\n  {plain}\n");

    let mapper = Mapper::default();
    for yaml in [&yaml_plain, &yaml_block] {
        let _ = mapper.from_str(yaml, TypeKey::STRING);
    }

    let text = mapper
        .to_string(&Graph::new(), &Value::from(plain.as_str()), TypeKey::STRING)
        .expect("strings always write");
    let back = mapper.from_str(&text, TypeKey::STRING).expect("written text must read back");
    assert_eq!(back.root, Value::from(plain.as_str()));
});
