#![no_main]

use kvsink_connector::mapping::MapperRegistry;
use kvsink_connector::{ChannelConfig, KeyType};
use kvsink_core::SinkRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split point between key and value payloads, the
    // second selects channel options.
    if data.len() < 2 {
        return;
    }
    let split = (data[0] as usize).min(data.len() - 2);
    let flags = data[1];
    let (key, value) = data[2..].split_at(split);

    let record = match SinkRecord::from_json("fuzz", 0, 0, Some(key), value) {
        Ok(r) => r,
        Err(_) => return,
    };

    let mut channel = ChannelConfig::new("ns").with_set("s");
    if flags & 1 != 0 {
        channel = channel.with_key_field("id");
    }
    if flags & 2 != 0 {
        channel = channel.with_set_field("set");
    }
    if flags & 4 != 0 {
        channel = channel.with_key_type(KeyType::Integer);
    }

    let mut registry = MapperRegistry::new();
    if let Ok(mapper) = registry.get_mapper(&record) {
        if let Ok(mapped) = mapper.convert(&record, &channel) {
            assert_eq!(mapped.key.namespace, "ns");
        }
    }
});
