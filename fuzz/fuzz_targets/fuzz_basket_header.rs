#![no_main]
use basket_rs::{BasketHeader, Sha256Hasher, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes must decode to an error or a header, never panic
fuzz_target!(|data: &[u8]| {
    let header = match BasketHeader::from_bytes(data) {
        Ok(header) => header,
        Err(_) => return,
    };

    let _ = header.verify(&Sha256Hasher);
    let _ = header.stats();

    // Re-encoding a decoded header is stable
    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), HEADER_SIZE);
    let again = BasketHeader::from_bytes(&bytes).expect("re-encoded header decodes");
    assert_eq!(again.to_bytes(), bytes);
});
