#![no_main]
use libfuzzer_sys::fuzz_target;
use rsdelta::{SignatureConfig, engine};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the block length, second the strong sum length.
    // Short sums can collide and rebuild the wrong bytes, so keep at least 8.
    let block_len = u32::from(data[0] % 64) + 1;
    let strong_len = u32::from(data[1] % 9) + 8;
    let payload = &data[2..];

    let split = payload.len() / 2;
    let (basis, new) = payload.split_at(split);

    let delta = engine::diff(basis, new, SignatureConfig::new(block_len, strong_len)).unwrap();
    let rebuilt = engine::patch(basis, &delta).unwrap();
    assert_eq!(rebuilt, new);
});
