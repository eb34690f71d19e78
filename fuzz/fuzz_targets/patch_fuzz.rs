#![no_main]
use libfuzzer_sys::fuzz_target;
use rsdelta::engine;

fuzz_target!(|data: &[u8]| {
    // Arbitrary deltas must fail cleanly, never panic.
    let _ = engine::patch(&[0u8; 0][..], data);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (basis, delta) = data.split_at(split);
        let _ = engine::patch(basis, delta);
    }
});
