//! Cross-profile behavior of built indexes and their segment files.

use fts::index::{FtsIndex, Profile, SearchResult, Segment};
use fts::FtsError;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const CORPUS: [&str; 3] = ["hello world", "hello there", "world peace"];

fn built(profile: Profile, docs: &[String]) -> FtsIndex {
    let index = FtsIndex::new(profile);
    index.add_documents(docs).unwrap();
    index.build().unwrap();
    index
}

fn scores(hits: &[SearchResult]) -> BTreeMap<u32, f32> {
    hits.iter().map(|h| (h.doc_id, h.score)).collect()
}

fn assert_same_hits(a: &[SearchResult], b: &[SearchResult]) {
    let (a, b) = (scores(a), scores(b));
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    for (doc, score) in &a {
        assert!((score - b[doc]).abs() < 1e-4, "doc {doc}: {score} vs {}", b[doc]);
    }
}

#[test]
fn every_profile_finds_the_same_documents() {
    let docs: Vec<String> = CORPUS.iter().map(|s| s.to_string()).collect();
    for profile in Profile::ALL {
        let index = built(profile, &docs);
        let hits = index.search("hello", 10).unwrap();
        let mut ids: Vec<_> = hits.iter().map(|h| h.doc_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1], "{profile}");
        assert!(index.search("missing", 10).unwrap().is_empty());
        assert!(index.search("", 10).unwrap().is_empty());
    }
}

#[test]
fn multi_term_scores_sum_per_document() {
    let docs: Vec<String> = CORPUS.iter().map(|s| s.to_string()).collect();
    let index = built(Profile::Speed, &docs);

    let hello = scores(&index.search("hello", 10).unwrap());
    let world = scores(&index.search("world", 10).unwrap());
    let both = index.search("hello world", 10).unwrap();

    // Doc 0 has both terms and ranks first
    assert_eq!(both[0].doc_id, 0);
    assert!((both[0].score - (hello[&0] + world[&0])).abs() < 1e-5);
    assert_eq!(both.len(), 3);
}

#[test]
fn lifecycle_errors() {
    let index = FtsIndex::new(Profile::Compact);
    index.add_document("text").unwrap();
    assert!(matches!(index.search("text", 1), Err(FtsError::NotBuilt)));
    index.build().unwrap();
    assert!(matches!(index.add_document("more"), Err(FtsError::AlreadyBuilt)));
    assert!(matches!(index.build(), Err(FtsError::AlreadyBuilt)));
    index.close();
    assert!(matches!(index.search("text", 1), Err(FtsError::Closed)));
}

#[test]
fn compact_beats_fixed_width_postings() {
    let docs: Vec<String> = (0..500)
        .map(|i| format!("common shared word{} token{} filler", i % 37, i % 11))
        .collect();
    let index = built(Profile::Compact, &docs);
    let stats = index.stats().unwrap();
    assert_eq!(stats.doc_count, 500);
    assert!(stats.bits_per_posting() < 32.0, "{}", stats.bits_per_posting());

    let speed = built(Profile::Speed, &docs).stats().unwrap();
    assert!(stats.postings_bytes < speed.postings_bytes);
}

#[test]
fn segments_reproduce_in_memory_results() {
    let dir = TempDir::new().unwrap();
    let docs: Vec<String> = (0..120)
        .map(|i| format!("alpha{} beta gamma{} delta", i % 7, i % 3))
        .chain(CORPUS.iter().map(|s| s.to_string()))
        .collect();

    for profile in Profile::ALL {
        let index = built(profile, &docs);
        let path = dir.path().join(format!("{profile}.fts"));
        let size = index.save_segment(&path).unwrap();
        assert_eq!(size, fs::metadata(&path).unwrap().len());

        let segment = Segment::open(&path).unwrap();
        assert_eq!(segment.profile(), profile);
        assert_eq!(segment.doc_count(), docs.len() as u32);
        for query in ["beta", "alpha3 gamma1", "hello", "peace world", "absent"] {
            assert_same_hits(&index.search(query, 200).unwrap(), &segment.search(query, 200));
        }
    }
}

#[test]
fn corrupt_segments_are_rejected() {
    let dir = TempDir::new().unwrap();
    let index = built(Profile::Balanced, &["some text".to_string()]);
    let path = dir.path().join("good.fts");
    index.save_segment(&path).unwrap();
    let bytes = fs::read(&path).unwrap();

    let bad_magic = dir.path().join("magic.fts");
    let mut corrupted = bytes.clone();
    corrupted[0] = b'X';
    fs::write(&bad_magic, &corrupted).unwrap();
    assert!(matches!(Segment::open(&bad_magic), Err(FtsError::CorruptSegment { .. })));

    let truncated = dir.path().join("short.fts");
    fs::write(&truncated, &bytes[..20]).unwrap();
    assert!(matches!(Segment::open(&truncated), Err(FtsError::CorruptSegment { .. })));

    let cut = dir.path().join("cut.fts");
    fs::write(&cut, &bytes[..bytes.len() - 1]).unwrap();
    assert!(Segment::open(&cut).is_err());

    let padded = dir.path().join("padded.fts");
    let mut longer = bytes.clone();
    longer.extend_from_slice(b"junk");
    fs::write(&padded, &longer).unwrap();
    assert!(matches!(Segment::open(&padded), Err(FtsError::CorruptSegment { .. })));

    // Term entries start after the 60-byte header, 24 bytes each, doc_freq at +16
    let inflated = dir.path().join("doc_freq.fts");
    let mut corrupted = bytes.clone();
    let term_count = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
    for i in 0..term_count {
        let at = 60 + i * 24 + 16;
        corrupted[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    }
    fs::write(&inflated, &corrupted).unwrap();
    assert!(matches!(Segment::open(&inflated), Err(FtsError::CorruptSegment { .. })));
}

#[test]
fn inflated_doc_freq_is_rejected_for_every_profile() {
    let dir = TempDir::new().unwrap();
    for profile in Profile::ALL {
        let index = built(profile, &["hello world".to_string()]);
        let path = dir.path().join(format!("{profile}.fts"));
        index.save_segment(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let at = 60 + 16;
        bytes[at..at + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        assert!(
            matches!(Segment::open(&path), Err(FtsError::CorruptSegment { .. })),
            "{profile}"
        );
    }
}

fn doc_strategy() -> impl Strategy<Value = String> {
    let word = prop::sample::select(vec!["red", "green", "blue", "cyan", "teal", "gold", "sky"]);
    prop::collection::vec(word, 1..12).prop_map(|words| words.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn profiles_agree(
        docs in prop::collection::vec(doc_strategy(), 1..40),
        query in prop::sample::select(vec!["red", "blue green", "gold sky teal", "violet"]),
    ) {
        let speed = built(Profile::Speed, &docs).search(query, 100).unwrap();
        let balanced = built(Profile::Balanced, &docs).search(query, 100).unwrap();
        let compact = built(Profile::Compact, &docs).search(query, 100).unwrap();

        assert_same_hits(&speed, &balanced);
        assert_same_hits(&speed, &compact);
        prop_assert!(speed.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn limit_caps_results(
        docs in prop::collection::vec(doc_strategy(), 1..40),
        limit in 0usize..10,
    ) {
        let hits = built(Profile::Balanced, &docs).search("red blue", limit).unwrap();
        prop_assert!(hits.len() <= limit);
    }
}
