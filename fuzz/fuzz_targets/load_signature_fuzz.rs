#![no_main]
use libfuzzer_sys::fuzz_target;
use rsdelta::{Signature, engine};

fuzz_target!(|data: &[u8]| {
    let streamed = engine::load_signature(data);
    let whole = Signature::from_bytes(data);
    assert_eq!(streamed.is_ok(), whole.is_ok());

    // Whatever loads must be usable for a delta.
    if let Ok(sig) = whole {
        assert_eq!(sig.to_bytes(), data);
        let _ = engine::delta(&sig, data);
    }
});
