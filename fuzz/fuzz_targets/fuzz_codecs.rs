#![no_main]

use arbitrary::Arbitrary;
use fts::codec::{vbyte, EliasFano, FstBuilder};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    bytes: &'a [u8],
    count: u16,
    keys: Vec<&'a str>,
}

fuzz_target!(|input: Input| {
    let mut out = Vec::new();
    vbyte::decode_many(input.bytes, input.count as usize, &mut out);
    if let Some((ef, _)) = EliasFano::read_from(input.bytes) {
        let _ = ef.iter().count();
        let _ = ef.get(input.count as usize);
    }
    let _ = fts::ffi::parse_batch(input.bytes);

    // Sorted, deduplicated keys always build; every key reads back
    let mut keys = input.keys;
    keys.sort();
    keys.dedup();
    let mut builder = FstBuilder::new();
    for (i, key) in keys.iter().enumerate() {
        builder.insert(key.as_bytes(), i as u64).unwrap();
    }
    let fst = builder.finish();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(fst.get(key.as_bytes()), Some(i as u64));
    }
    let _ = fts::utils::tokenize(std::str::from_utf8(input.bytes).unwrap_or(""));
});
