//! Balanced profile: VByte delta-coded posting lists in one contiguous block.
//!
//! Each term's list is `encode_many(doc_ids)` followed by one VByte per
//! frequency. The same layout is used for Balanced segment files.

use crate::codec::vbyte;
use crate::error::Result;
use crate::index::accumulator::PostingsAccumulator;
use crate::index::segment::{SegmentData, SegmentTerm};
use crate::index::types::*;
use crate::query::{Bm25, Bm25Params, PostingSource, TermPostings};
use crate::utils::{hash_term, tokenize, TokenizedDoc};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Append the Balanced encoding of one posting list to `buf`
pub fn encode_postings(postings: &[Posting], buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    let doc_ids: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
    vbyte::encode_many(&doc_ids, buf);
    for p in postings {
        vbyte::encode(p.freq as u32, buf);
    }
    buf.len() - start
}

/// Decoder for one Balanced posting list.
///
/// Doc ids are delta-decoded up front (their byte length is only known after
/// decoding); frequencies are decoded lazily in lockstep.
pub struct VBytePostings<'a> {
    doc_ids: std::vec::IntoIter<u32>,
    freqs: &'a [u8],
}

impl<'a> VBytePostings<'a> {
    /// Decode `count` postings starting at the beginning of `bytes`.
    /// Truncated input yields fewer postings, never a panic.
    pub fn new(bytes: &'a [u8], count: usize) -> Self {
        let mut doc_ids = Vec::with_capacity(count.min(bytes.len()));
        let consumed = vbyte::decode_many(bytes, count, &mut doc_ids);
        Self {
            doc_ids: doc_ids.into_iter(),
            freqs: &bytes[consumed..],
        }
    }
}

impl Iterator for VBytePostings<'_> {
    type Item = (DocId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let (freq, used) = vbyte::decode(self.freqs)?;
        let doc_id = self.doc_ids.next()?;
        self.freqs = &self.freqs[used..];
        Some((doc_id, freq))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.doc_ids.len()))
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockRef {
    offset: usize,
    len: usize,
}

/// Mutable Balanced-profile builder
#[derive(Debug, Default)]
pub struct BalancedBuilder {
    acc: PostingsAccumulator,
    params: Bm25Params,
}

impl BalancedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self {
            acc: PostingsAccumulator::new(),
            params,
        }
    }

    pub fn add_document(&mut self, text: &str) -> Result<DocId> {
        self.acc.add(tokenize(text))
    }

    pub fn add_tokenized(&mut self, doc: TokenizedDoc) -> Result<DocId> {
        self.acc.add(doc)
    }

    pub fn doc_count(&self) -> usize {
        self.acc.doc_count()
    }

    pub fn memory_bytes(&self) -> usize {
        self.acc.memory_bytes()
    }

    pub(crate) fn pending(&self) -> &PostingsAccumulator {
        &self.acc
    }

    /// Finalize: encode every list into the shared block and compute IDF
    pub fn build(self) -> BalancedIndex {
        let corpus = self.acc.finish();
        let doc_count = corpus.doc_count();
        let scorer = Bm25::new(self.params, doc_count, corpus.total_tokens);
        let posting_count = corpus.posting_count();

        let mut block = Vec::new();
        let mut terms = FxHashMap::with_capacity_and_hasher(corpus.terms.len(), Default::default());
        for term in &corpus.terms {
            let offset = block.len();
            let len = encode_postings(&term.postings, &mut block);
            let doc_freq = term.postings.len() as u32;
            terms.insert(
                term.hash,
                TermData {
                    doc_freq,
                    idf: scorer.idf(doc_freq),
                    postings: BlockRef { offset, len },
                },
            );
        }
        block.shrink_to_fit();

        debug!(
            docs = doc_count,
            terms = terms.len(),
            block_bytes = block.len(),
            "balanced index built"
        );

        BalancedIndex {
            terms,
            block,
            docs: corpus.docs,
            total_tokens: corpus.total_tokens,
            posting_count,
            scorer,
        }
    }
}

/// Immutable Balanced-profile index
#[derive(Debug)]
pub struct BalancedIndex {
    terms: FxHashMap<u64, TermData<BlockRef>>,
    block: Vec<u8>,
    docs: Vec<DocMeta>,
    total_tokens: u64,
    posting_count: u64,
    scorer: Bm25,
}

impl BalancedIndex {
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        crate::query::execute(self, query, limit)
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    fn list(&self, data: &TermData<BlockRef>) -> VBytePostings<'_> {
        let BlockRef { offset, len } = data.postings;
        VBytePostings::new(&self.block[offset..offset + len], data.doc_freq as usize)
    }

    pub fn stats(&self) -> IndexStats {
        let postings_bytes = self.block.len() as u64;
        let entry = 8 + std::mem::size_of::<TermData<BlockRef>>();
        let memory_bytes = postings_bytes
            + (self.terms.capacity() * entry) as u64
            + (self.docs.capacity() * std::mem::size_of::<DocMeta>()) as u64;

        IndexStats {
            profile: Profile::Balanced,
            doc_count: self.doc_count(),
            term_count: self.terms.len() as u32,
            posting_count: self.posting_count,
            total_tokens: self.total_tokens,
            memory_bytes,
            postings_bytes,
        }
    }

    pub fn to_segment_data(&self) -> SegmentData {
        let terms = self
            .terms
            .iter()
            .map(|(&hash, data)| SegmentTerm {
                hash,
                postings: self
                    .list(data)
                    .map(|(doc_id, freq)| Posting {
                        doc_id,
                        freq: freq.min(u16::MAX as u32) as u16,
                    })
                    .collect(),
            })
            .collect();

        SegmentData::new(Profile::Balanced, self.docs.clone(), self.total_tokens, terms)
    }
}

impl PostingSource for BalancedIndex {
    type Postings<'a> = VBytePostings<'a>;

    fn scorer(&self) -> &Bm25 {
        &self.scorer
    }

    #[inline]
    fn doc_length(&self, doc_id: DocId) -> u32 {
        self.docs.get(doc_id as usize).map_or(0, |d| d.length)
    }

    fn postings<'a>(&'a self, term: &str) -> Option<TermPostings<VBytePostings<'a>>> {
        let data = self.terms.get(&hash_term(term))?;
        Some(TermPostings {
            doc_freq: data.doc_freq,
            idf: data.idf,
            postings: self.list(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postings_layout() {
        let postings = [
            Posting { doc_id: 3, freq: 1 },
            Posting { doc_id: 130, freq: 2 },
            Posting { doc_id: 131, freq: 300 },
        ];
        let mut buf = Vec::new();
        let len = encode_postings(&postings, &mut buf);
        // ids: 3, 127, 1 -> 1 + 1 + 1 bytes; freqs: 1 + 1 + 2 bytes
        assert_eq!(len, 7);

        let decoded: Vec<_> = VBytePostings::new(&buf, 3).collect();
        assert_eq!(decoded, vec![(3, 1), (130, 2), (131, 300)]);
    }

    #[test]
    fn test_truncated_list_stops() {
        let postings = [Posting { doc_id: 1, freq: 1 }, Posting { doc_id: 2, freq: 1 }];
        let mut buf = Vec::new();
        encode_postings(&postings, &mut buf);
        buf.truncate(3);
        let decoded: Vec<_> = VBytePostings::new(&buf, 2).collect();
        assert_eq!(decoded, vec![(1, 1)]);
    }

    #[test]
    fn test_huge_count_is_bounded_by_input() {
        let postings = [Posting { doc_id: 5, freq: 2 }];
        let mut buf = Vec::new();
        encode_postings(&postings, &mut buf);
        let decoded: Vec<_> = VBytePostings::new(&buf, u32::MAX as usize).collect();
        assert!(decoded.len() <= 1);
    }

    #[test]
    fn test_search_matches_speed() {
        let docs = ["hello world", "hello there", "world peace", "peace and quiet"];
        let mut balanced = BalancedBuilder::new();
        let mut speed = crate::index::speed::SpeedBuilder::new();
        for doc in docs {
            balanced.add_document(doc).unwrap();
            speed.add_document(doc).unwrap();
        }
        let balanced = balanced.build();
        let speed = speed.build();

        for query in ["hello", "world peace", "quiet", "missing"] {
            let a = balanced.search(query, 10);
            let b = speed.search(query, 10);
            assert_eq!(a.len(), b.len(), "{query}");
            for (x, y) in a.iter().zip(&b) {
                assert!((x.score - y.score).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_smaller_than_speed() {
        let mut balanced = BalancedBuilder::new();
        let mut speed = crate::index::speed::SpeedBuilder::new();
        for i in 0..200 {
            let doc = format!("common word{} word{}", i % 7, i % 13);
            balanced.add_document(&doc).unwrap();
            speed.add_document(&doc).unwrap();
        }
        let b = balanced.build().stats();
        let s = speed.build().stats();
        assert_eq!(b.posting_count, s.posting_count);
        assert!(b.postings_bytes < s.postings_bytes);
    }
}
