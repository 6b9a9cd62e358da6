//! Immutable on-disk segments.
//!
//! Layout (little-endian):
//!
//! ```text
//! 0..4    magic "FTSZ"
//! 4..8    u32 version
//! 8       profile id, 9..12 zero
//! 12..16  u32 doc_count
//! 16..20  u32 term_count
//! 20..28  u64 total_tokens
//! 28..36  u64 terms_offset
//! 36..44  u64 postings_offset
//! 44..52  u64 docs_offset
//! 52..60  u64 index_size (== file length)
//! ```
//!
//! The term block holds `term_count` 24-byte records sorted by hash:
//! `u64 hash, u64 posting_offset, u32 doc_freq, 4 zero bytes`. Posting
//! offsets are relative to `postings_offset`; the list encoding depends on
//! the profile. The doc block is one `u32` token count per document.

use crate::error::{FtsError, Result};
use crate::index::balanced::{self, VBytePostings};
use crate::index::compact;
use crate::index::types::*;
use crate::query::{Bm25, PostingSource, TermPostings};
use crate::utils::{hash_term, u32_at, u64_at};
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MAGIC: &[u8; 4] = b"FTSZ";
pub const VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 60;
pub const TERM_ENTRY_SIZE: usize = 24;
/// File extension of segment files
pub const EXTENSION: &str = "fts";

/// Fixed-size segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub profile: Profile,
    pub doc_count: u32,
    pub term_count: u32,
    pub total_tokens: u64,
    pub terms_offset: u64,
    pub postings_offset: u64,
    pub docs_offset: u64,
    pub index_size: u64,
}

impl SegmentHeader {
    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&[self.profile.id(), 0, 0, 0]);
        buf.extend_from_slice(&self.doc_count.to_le_bytes());
        buf.extend_from_slice(&self.term_count.to_le_bytes());
        buf.extend_from_slice(&self.total_tokens.to_le_bytes());
        buf.extend_from_slice(&self.terms_offset.to_le_bytes());
        buf.extend_from_slice(&self.postings_offset.to_le_bytes());
        buf.extend_from_slice(&self.docs_offset.to_le_bytes());
        buf.extend_from_slice(&self.index_size.to_le_bytes());
    }

    /// Parse and bounds-check a header against the full file bytes
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_SIZE {
            return Err(format!("file too small ({} bytes)", bytes.len()));
        }
        if &bytes[0..4] != MAGIC {
            return Err("bad magic".into());
        }
        let version = u32_at(bytes, 4).unwrap_or(0);
        if version != VERSION {
            return Err(format!("unsupported version {}", version));
        }
        let profile =
            Profile::from_id(bytes[8]).ok_or_else(|| format!("unknown profile id {}", bytes[8]))?;

        let field = |offset| u64_at(bytes, offset).unwrap_or(0);
        let header = Self {
            profile,
            doc_count: u32_at(bytes, 12).unwrap_or(0),
            term_count: u32_at(bytes, 16).unwrap_or(0),
            total_tokens: field(20),
            terms_offset: field(28),
            postings_offset: field(36),
            docs_offset: field(44),
            index_size: field(52),
        };

        if header.index_size != bytes.len() as u64 {
            return Err(format!(
                "index_size {} does not match file length {}",
                header.index_size,
                bytes.len()
            ));
        }

        let terms_end = header
            .terms_offset
            .checked_add(header.term_count as u64 * TERM_ENTRY_SIZE as u64);
        let docs_end = header.docs_offset.checked_add(header.doc_count as u64 * 4);
        let ordered = matches!(
            (terms_end, docs_end),
            (Some(terms_end), Some(docs_end))
                if header.terms_offset >= HEADER_SIZE as u64
                    && terms_end <= header.postings_offset
                    && header.postings_offset <= header.docs_offset
                    && docs_end <= header.index_size
        );
        if !ordered {
            return Err("section offsets out of bounds".into());
        }

        Ok(header)
    }

    fn postings_len(&self) -> u64 {
        self.docs_offset - self.postings_offset
    }
}

/// One term's decoded postings, the common input for every profile encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTerm {
    pub hash: u64,
    pub postings: Vec<Posting>,
}

/// Everything a segment file stores, in decoded form
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub profile: Profile,
    pub docs: Vec<DocMeta>,
    pub total_tokens: u64,
    /// Sorted ascending by hash
    pub terms: Vec<SegmentTerm>,
}

impl SegmentData {
    pub fn new(
        profile: Profile,
        docs: Vec<DocMeta>,
        total_tokens: u64,
        mut terms: Vec<SegmentTerm>,
    ) -> Self {
        terms.sort_unstable_by_key(|t| t.hash);
        Self {
            profile,
            docs,
            total_tokens,
            terms,
        }
    }

    /// Serialize into the segment file format
    pub fn encode(&self) -> Vec<u8> {
        let mut postings = Vec::new();
        let mut term_block = Vec::with_capacity(self.terms.len() * TERM_ENTRY_SIZE);

        for term in &self.terms {
            let offset = postings.len() as u64;
            match self.profile {
                Profile::Speed => {
                    for p in &term.postings {
                        postings.extend_from_slice(&p.doc_id.to_le_bytes());
                        postings.extend_from_slice(&(p.freq as u32).to_le_bytes());
                    }
                }
                Profile::Balanced => {
                    balanced::encode_postings(&term.postings, &mut postings);
                }
                Profile::Compact => {
                    compact::encode_postings(&term.postings, &mut postings);
                }
            }
            term_block.extend_from_slice(&term.hash.to_le_bytes());
            term_block.extend_from_slice(&offset.to_le_bytes());
            term_block.extend_from_slice(&(term.postings.len() as u32).to_le_bytes());
            term_block.extend_from_slice(&[0u8; 4]);
        }

        let terms_offset = HEADER_SIZE as u64;
        let postings_offset = terms_offset + term_block.len() as u64;
        let docs_offset = postings_offset + postings.len() as u64;
        let index_size = docs_offset + self.docs.len() as u64 * 4;

        let header = SegmentHeader {
            profile: self.profile,
            doc_count: self.docs.len() as u32,
            term_count: self.terms.len() as u32,
            total_tokens: self.total_tokens,
            terms_offset,
            postings_offset,
            docs_offset,
            index_size,
        };

        let mut buf = Vec::with_capacity(index_size as usize);
        header.write_to(&mut buf);
        buf.extend_from_slice(&term_block);
        buf.extend_from_slice(&postings);
        for doc in &self.docs {
            buf.extend_from_slice(&doc.length.to_le_bytes());
        }
        buf
    }
}

/// Write a segment atomically (temp file + rename). Returns the file size.
pub fn write_segment(path: &Path, data: &SegmentData) -> Result<u64> {
    let bytes = data.encode();
    let tmp = path.with_extension("fts.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        profile = %data.profile,
        "segment written"
    );
    Ok(bytes.len() as u64)
}

/// Fewest bytes one posting can occupy in each profile's encoding
fn min_posting_bytes(profile: Profile) -> u64 {
    match profile {
        Profile::Speed => 8,
        // one VByte doc-id delta plus one VByte frequency
        Profile::Balanced => 2,
        // one frequency byte, excluding the Elias-Fano block
        Profile::Compact => 1,
    }
}

#[derive(Debug, Clone, Copy)]
struct TermEntry {
    offset: usize,
    doc_freq: u32,
    idf: f32,
}

/// Lookup tables built by walking a segment's bytes
#[derive(Debug)]
pub struct SegmentTables {
    pub header: SegmentHeader,
    terms: FxHashMap<u64, TermEntry>,
    doc_lengths: Vec<u32>,
}

impl SegmentTables {
    /// Validate a whole segment image and build its term map and doc lengths
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let header = SegmentHeader::parse(bytes)?;
        let bm25 = Bm25::with_defaults(header.doc_count, header.total_tokens);
        let postings_len = header.postings_len();

        let mut terms =
            FxHashMap::with_capacity_and_hasher(header.term_count as usize, Default::default());
        let base = header.terms_offset as usize;
        for i in 0..header.term_count as usize {
            let at = base + i * TERM_ENTRY_SIZE;
            let (Some(hash), Some(offset), Some(doc_freq)) =
                (u64_at(bytes, at), u64_at(bytes, at + 8), u32_at(bytes, at + 16))
            else {
                return Err(format!("term entry {} truncated", i));
            };
            if offset > postings_len {
                return Err(format!("term entry {} points past the postings block", i));
            }
            if doc_freq as u64 * min_posting_bytes(header.profile) > postings_len - offset {
                return Err(format!("term entry {} overruns the postings block", i));
            }
            terms.insert(
                hash,
                TermEntry {
                    offset: offset as usize,
                    doc_freq,
                    idf: bm25.idf(doc_freq),
                },
            );
        }

        let docs = header.docs_offset as usize;
        let doc_lengths = (0..header.doc_count as usize)
            .map(|i| u32_at(bytes, docs + i * 4))
            .collect::<Option<Vec<_>>>()
            .ok_or("doc block truncated")?;

        Ok(Self {
            header,
            terms,
            doc_lengths,
        })
    }
}

/// A memory-mapped, read-only segment
pub struct Segment {
    path: PathBuf,
    mmap: Mmap,
    tables: SegmentTables,
    scorer: Bm25,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("path", &self.path)
            .field("header", &self.tables.header)
            .finish()
    }
}

impl Segment {
    /// Map and validate a segment file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Segments are never modified after the rename that publishes them
        let mmap = unsafe { Mmap::map(&file)? };

        let tables = match SegmentTables::parse(&mmap) {
            Ok(tables) => tables,
            Err(reason) => {
                warn!(path = %path.display(), %reason, "rejecting segment");
                return Err(FtsError::corrupt(path, reason));
            }
        };
        let scorer = Bm25::with_defaults(tables.header.doc_count, tables.header.total_tokens);

        debug!(
            path = %path.display(),
            profile = %tables.header.profile,
            docs = tables.header.doc_count,
            terms = tables.header.term_count,
            "segment opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            tables,
            scorer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.tables.header
    }

    pub fn profile(&self) -> Profile {
        self.tables.header.profile
    }

    pub fn doc_count(&self) -> u32 {
        self.tables.header.doc_count
    }

    pub fn term_count(&self) -> u32 {
        self.tables.header.term_count
    }

    pub fn size_bytes(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        crate::query::execute(self, query, limit)
    }

    /// Resident footprint: the mapping plus the lookup tables
    pub fn memory_bytes(&self) -> u64 {
        let entry = 8 + std::mem::size_of::<TermEntry>();
        (self.mmap.len() + self.tables.terms.capacity() * entry + self.tables.doc_lengths.len() * 4)
            as u64
    }

    pub fn stats(&self) -> IndexStats {
        let header = &self.tables.header;
        IndexStats {
            profile: header.profile,
            doc_count: header.doc_count,
            term_count: header.term_count,
            posting_count: self.tables.terms.values().map(|t| t.doc_freq as u64).sum(),
            total_tokens: header.total_tokens,
            memory_bytes: self.memory_bytes(),
            postings_bytes: header.postings_len(),
        }
    }

    fn postings_block(&self) -> &[u8] {
        let header = &self.tables.header;
        &self.mmap[header.postings_offset as usize..header.docs_offset as usize]
    }

    fn decode<'a>(&'a self, entry: &TermEntry) -> Option<SegmentPostings<'a>> {
        let bytes = &self.postings_block()[entry.offset..];
        let count = entry.doc_freq as usize;
        match self.profile() {
            Profile::Speed => Some(SegmentPostings::Fixed(
                bytes[..count * 8].chunks_exact(8),
            )),
            Profile::Balanced => Some(SegmentPostings::VByte(VBytePostings::new(bytes, count))),
            Profile::Compact => {
                let (ef, freqs) = compact::decode_postings(bytes, count)?;
                Some(SegmentPostings::Compact {
                    doc_ids: ef.iter().collect::<Vec<_>>().into_iter(),
                    freqs: freqs.iter(),
                })
            }
        }
    }
}

/// Posting walk over mapped bytes, per profile encoding
pub enum SegmentPostings<'a> {
    Fixed(std::slice::ChunksExact<'a, u8>),
    VByte(VBytePostings<'a>),
    Compact {
        doc_ids: std::vec::IntoIter<u32>,
        freqs: std::slice::Iter<'a, u8>,
    },
}

impl Iterator for SegmentPostings<'_> {
    type Item = (DocId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SegmentPostings::Fixed(chunks) => {
                let chunk = chunks.next()?;
                Some((u32_at(chunk, 0)?, u32_at(chunk, 4)?))
            }
            SegmentPostings::VByte(postings) => postings.next(),
            SegmentPostings::Compact { doc_ids, freqs } => {
                let doc_id = doc_ids.next()?;
                Some((doc_id, *freqs.next()? as u32))
            }
        }
    }
}

impl PostingSource for Segment {
    type Postings<'a> = SegmentPostings<'a>;

    fn scorer(&self) -> &Bm25 {
        &self.scorer
    }

    #[inline]
    fn doc_length(&self, doc_id: DocId) -> u32 {
        self.tables.doc_lengths.get(doc_id as usize).copied().unwrap_or(0)
    }

    fn postings<'a>(&'a self, term: &str) -> Option<TermPostings<SegmentPostings<'a>>> {
        let entry = self.tables.terms.get(&hash_term(term))?;
        let Some(postings) = self.decode(entry) else {
            warn!(path = %self.path.display(), term, "undecodable posting list");
            return None;
        };
        Some(TermPostings {
            doc_freq: entry.doc_freq,
            idf: entry.idf,
            postings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{balanced::BalancedBuilder, compact::CompactBuilder, speed::SpeedBuilder};
    use tempfile::TempDir;

    const DOCS: [&str; 4] = ["hello world", "hello there", "world peace", "a quiet world"];

    fn segment_data(profile: Profile) -> SegmentData {
        match profile {
            Profile::Speed => {
                let mut b = SpeedBuilder::new();
                DOCS.iter().for_each(|d| {
                    b.add_document(d).unwrap();
                });
                b.build().to_segment_data()
            }
            Profile::Balanced => {
                let mut b = BalancedBuilder::new();
                DOCS.iter().for_each(|d| {
                    b.add_document(d).unwrap();
                });
                b.build().to_segment_data()
            }
            Profile::Compact => {
                let mut b = CompactBuilder::new();
                DOCS.iter().for_each(|d| {
                    b.add_document(d).unwrap();
                });
                b.build().unwrap().to_segment_data()
            }
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = segment_data(Profile::Balanced).encode();
        assert_eq!(&bytes[0..4], b"FTSZ");
        assert_eq!(u32_at(&bytes, 4), Some(1));
        assert_eq!(bytes[8], Profile::Balanced.id());
        assert_eq!(&bytes[9..12], &[0, 0, 0]);
        assert_eq!(u32_at(&bytes, 12), Some(4));
        assert_eq!(u64_at(&bytes, 52), Some(bytes.len() as u64));

        let header = SegmentHeader::parse(&bytes).unwrap();
        assert_eq!(header.terms_offset, HEADER_SIZE as u64);
        assert_eq!(header.total_tokens, 9);
    }

    #[test]
    fn test_terms_sorted_by_hash() {
        let data = segment_data(Profile::Speed);
        assert!(data.terms.windows(2).all(|w| w[0].hash < w[1].hash));
    }

    #[test]
    fn test_every_profile_round_trips() {
        let dir = TempDir::new().unwrap();
        for profile in Profile::ALL {
            let path = dir.path().join(format!("{}.fts", profile));
            let size = write_segment(&path, &segment_data(profile)).unwrap();

            let segment = Segment::open(&path).unwrap();
            assert_eq!(segment.size_bytes(), size);
            assert_eq!(segment.profile(), profile);
            assert_eq!(segment.doc_count(), 4);

            let mut hits: Vec<_> = segment.search("world", 10).iter().map(|h| h.doc_id).collect();
            hits.sort();
            assert_eq!(hits, vec![0, 2, 3], "{profile}");
            assert!(segment.search("absent", 10).is_empty());
        }
    }

    #[test]
    fn test_scores_match_in_memory_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg.fts");
        let mut builder = SpeedBuilder::new();
        for doc in DOCS {
            builder.add_document(doc).unwrap();
        }
        let index = builder.build();
        write_segment(&path, &index.to_segment_data()).unwrap();
        let segment = Segment::open(&path).unwrap();

        let a = index.search("hello world", 10);
        let b = segment.search("hello world", 10);
        assert_eq!(a.len(), b.len());
        assert!((a[0].score - b[0].score).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_corruption() {
        let good = segment_data(Profile::Compact).encode();

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert_eq!(SegmentTables::parse(&bad_magic).unwrap_err(), "bad magic");

        assert!(SegmentTables::parse(&good[..HEADER_SIZE - 1]).is_err());
        assert!(SegmentTables::parse(&good[..good.len() - 1]).is_err());

        let mut bad_profile = good.clone();
        bad_profile[8] = 7;
        assert!(SegmentTables::parse(&bad_profile).is_err());

        let mut bad_offset = good.clone();
        let postings = u64_at(&good, 36).unwrap();
        bad_offset[44..52].copy_from_slice(&(postings - 1).to_le_bytes());
        assert!(SegmentTables::parse(&bad_offset).is_err());
    }

    #[test]
    fn test_rejects_oversized_doc_freq() {
        for profile in Profile::ALL {
            let mut bytes = segment_data(profile).encode();
            let at = HEADER_SIZE + 16;
            bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
            let err = SegmentTables::parse(&bytes).unwrap_err();
            assert!(err.contains("overruns"), "{profile}: {err}");
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = segment_data(Profile::Speed).encode();
        bytes.push(0);
        assert!(SegmentTables::parse(&bytes).unwrap_err().contains("does not match"));
    }

    #[test]
    fn test_open_corrupt_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.fts");
        fs::write(&path, b"not a segment at all, but long enough to hold a header....").unwrap();
        match Segment::open(&path) {
            Err(FtsError::CorruptSegment { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected corrupt segment, got {:?}", other),
        }
    }
}
