//! Speed profile: uncompressed postings in a hash map keyed by term hash

use crate::error::Result;
use crate::index::accumulator::PostingsAccumulator;
use crate::index::segment::{SegmentData, SegmentTerm};
use crate::index::types::*;
use crate::query::{Bm25, Bm25Params, PostingSource, TermPostings};
use crate::utils::{hash_term, tokenize, TokenizedDoc};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Mutable Speed-profile builder
#[derive(Debug, Default)]
pub struct SpeedBuilder {
    acc: PostingsAccumulator,
    params: Bm25Params,
}

impl SpeedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self {
            acc: PostingsAccumulator::new(),
            params,
        }
    }

    /// Tokenize and add a document
    pub fn add_document(&mut self, text: &str) -> Result<DocId> {
        self.acc.add(tokenize(text))
    }

    /// Add a document tokenized elsewhere (e.g. on a worker thread)
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

    /// Finalize: compute IDF per term and freeze the map
    pub fn build(self) -> SpeedIndex {
        let corpus = self.acc.finish();
        let doc_count = corpus.doc_count();
        let scorer = Bm25::new(self.params, doc_count, corpus.total_tokens);

        let mut terms = FxHashMap::with_capacity_and_hasher(corpus.terms.len(), Default::default());
        for term in corpus.terms {
            let doc_freq = term.postings.len() as u32;
            terms.insert(
                term.hash,
                TermData {
                    doc_freq,
                    idf: scorer.idf(doc_freq),
                    postings: term.postings,
                },
            );
        }

        debug!(docs = doc_count, terms = terms.len(), "speed index built");

        SpeedIndex {
            terms,
            docs: corpus.docs,
            total_tokens: corpus.total_tokens,
            scorer,
        }
    }
}

/// Immutable Speed-profile index
#[derive(Debug)]
pub struct SpeedIndex {
    terms: FxHashMap<u64, TermData<Vec<Posting>>>,
    docs: Vec<DocMeta>,
    total_tokens: u64,
    scorer: Bm25,
}

impl SpeedIndex {
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        crate::query::execute(self, query, limit)
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn stats(&self) -> IndexStats {
        let posting_count: u64 = self.terms.values().map(|t| t.postings.len() as u64).sum();
        let postings_bytes: u64 = self
            .terms
            .values()
            .map(|t| (t.postings.capacity() * std::mem::size_of::<Posting>()) as u64)
            .sum();
        let entry = 8 + std::mem::size_of::<TermData<Vec<Posting>>>();
        let memory_bytes = postings_bytes
            + (self.terms.capacity() * entry) as u64
            + (self.docs.capacity() * std::mem::size_of::<DocMeta>()) as u64;

        IndexStats {
            profile: Profile::Speed,
            doc_count: self.doc_count(),
            term_count: self.terms.len() as u32,
            posting_count,
            total_tokens: self.total_tokens,
            memory_bytes,
            postings_bytes,
        }
    }

    /// Decoded form for persisting as a segment
    pub fn to_segment_data(&self) -> SegmentData {
        let terms = self
            .terms
            .iter()
            .map(|(&hash, data)| SegmentTerm {
                hash,
                postings: data.postings.clone(),
            })
            .collect();

        SegmentData::new(Profile::Speed, self.docs.clone(), self.total_tokens, terms)
    }
}

/// Raw posting walk
pub struct SpeedPostings<'a>(std::slice::Iter<'a, Posting>);

impl Iterator for SpeedPostings<'_> {
    type Item = (DocId, u32);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|p| (p.doc_id, p.freq as u32))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl PostingSource for SpeedIndex {
    type Postings<'a> = SpeedPostings<'a>;

    fn scorer(&self) -> &Bm25 {
        &self.scorer
    }

    #[inline]
    fn doc_length(&self, doc_id: DocId) -> u32 {
        self.docs.get(doc_id as usize).map_or(0, |d| d.length)
    }

    fn postings<'a>(&'a self, term: &str) -> Option<TermPostings<SpeedPostings<'a>>> {
        let data = self.terms.get(&hash_term(term))?;
        Some(TermPostings {
            doc_freq: data.doc_freq,
            idf: data.idf,
            postings: SpeedPostings(data.postings.iter()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(docs: &[&str]) -> SpeedIndex {
        let mut builder = SpeedBuilder::new();
        for doc in docs {
            builder.add_document(doc).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_single_term() {
        let idx = index(&["hello world", "hello there", "world peace"]);
        let mut ids: Vec<_> = idx.search("hello", 10).iter().map(|r| r.doc_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_multi_term_sums_scores() {
        let idx = index(&["hello world", "hello there", "world peace"]);
        let hits = idx.search("hello world", 10);
        assert_eq!(hits.len(), 3);
        // Only doc 0 matches both terms
        assert_eq!(hits[0].doc_id, 0);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_absent_term_and_case() {
        let idx = index(&["Rust systems", "rust"]);
        assert!(idx.search("python", 10).is_empty());
        assert_eq!(idx.search("RUST", 10).len(), 2);
        // Absent terms do not disturb known ones
        assert_eq!(idx.search("python rust", 10).len(), 2);
    }

    #[test]
    fn test_shorter_doc_ranks_higher() {
        let idx = index(&["cat dog bird fish cat", "cat"]);
        let hits = idx.search("cat", 10);
        assert_eq!(hits[0].doc_id, 1);
    }

    #[test]
    fn test_stats() {
        let idx = index(&["a b", "b c c"]);
        let stats = idx.stats();
        assert_eq!(stats.profile, Profile::Speed);
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.term_count, 3);
        assert_eq!(stats.posting_count, 4);
        assert_eq!(stats.total_tokens, 5);
        assert!(stats.memory_bytes >= stats.postings_bytes);
    }

    #[test]
    fn test_empty_index() {
        let idx = SpeedBuilder::new().build();
        assert_eq!(idx.doc_count(), 0);
        assert!(idx.search("anything", 10).is_empty());
    }
}
