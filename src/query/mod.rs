//! Query execution: BM25 scoring, top-K collection and scanning.
//!
//! Queries are whitespace-separated terms, normalized by the same tokenizer
//! used at index time. A single term walks its posting list straight into
//! the collector; several terms accumulate per-document score sums first.

pub mod collector;
pub mod scan;
pub mod scorer;

pub use collector::{TopK, COLLECTOR_CAPACITY};
pub use scan::ScanCorpus;
pub use scorer::{Bm25, Bm25Params};

use crate::index::types::{DocId, SearchResult};
use crate::utils::query_terms;
use ahash::AHashMap;

/// Posting list of one term as seen by the executor
pub struct TermPostings<I> {
    pub doc_freq: u32,
    pub idf: f32,
    /// `(doc_id, term_frequency)` in ascending doc-id order
    pub postings: I,
}

/// Anything that can hand out decoded posting lists with corpus statistics
pub trait PostingSource {
    type Postings<'a>: Iterator<Item = (DocId, u32)>
    where
        Self: 'a;

    /// Scorer bound to this source's corpus statistics
    fn scorer(&self) -> &Bm25;

    /// Token count of a document (0 if unknown)
    fn doc_length(&self, doc_id: DocId) -> u32;

    /// Postings of a normalized (lowercase) term, or None if absent
    fn postings<'a>(&'a self, term: &str) -> Option<TermPostings<Self::Postings<'a>>>;
}

/// Run a query against a posting source. Absent terms contribute nothing;
/// a query with no known terms yields an empty result set.
pub fn execute<S: PostingSource>(source: &S, query: &str, limit: usize) -> Vec<SearchResult> {
    let terms = query_terms(query);
    if terms.is_empty() || limit == 0 {
        return Vec::new();
    }

    let scorer = source.scorer();
    let mut top = TopK::new(limit);

    if let [term] = terms.as_slice() {
        if let Some(term) = source.postings(term) {
            for (doc_id, tf) in term.postings {
                let score = scorer.score(tf, source.doc_length(doc_id), term.idf);
                top.push(doc_id, score);
            }
        }
        return top.into_sorted_vec();
    }

    let mut scores: AHashMap<DocId, f32> = AHashMap::new();
    for term in &terms {
        let Some(term) = source.postings(term) else {
            continue;
        };
        scores.reserve(term.doc_freq as usize);
        for (doc_id, tf) in term.postings {
            let score = scorer.score(tf, source.doc_length(doc_id), term.idf);
            *scores.entry(doc_id).or_insert(0.0) += score;
        }
    }

    for (doc_id, score) in scores {
        top.push(doc_id, score);
    }
    top.into_sorted_vec()
}
