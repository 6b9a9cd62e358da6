#![no_main]

use fts::index::segment::SegmentTables;
use fts::index::{FtsIndex, Profile, Segment};
use libfuzzer_sys::fuzz_target;
use std::fs;

const DOCS: [&str; 4] = ["hello world", "the quick fox", "a world of text", "hello hello the end"];
const QUERIES: [&str; 4] = ["hello", "world the", "fox a text", "end quick hello"];

fn search_all(segment: &Segment) {
    let _ = segment.stats();
    for query in QUERIES {
        let _ = segment.search(query, 100);
    }
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected or parsed, never panic
    let _ = SegmentTables::parse(data);

    // Overwrite bytes of a valid image so term hashes still resolve and
    // query-time decoding sees the corruption
    let Some((&selector, patch)) = data.split_first() else {
        return;
    };
    let profile = Profile::ALL[selector as usize % Profile::ALL.len()];
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("seg.fts");

    let index = FtsIndex::new(profile);
    let docs: Vec<String> = DOCS.iter().map(|d| d.to_string()).collect();
    if index.add_documents(&docs).is_err() || index.build().is_err() {
        return;
    }
    if index.save_segment(&path).is_err() {
        return;
    }
    let Ok(mut bytes) = fs::read(&path) else {
        return;
    };

    // (offset, value) pairs
    for pair in patch.chunks_exact(3) {
        let at = u16::from_le_bytes([pair[0], pair[1]]) as usize % bytes.len();
        bytes[at] = pair[2];
    }
    if fs::write(&path, &bytes).is_err() {
        return;
    }
    if let Ok(segment) = Segment::open(&path) {
        search_all(&segment);
    }
});
