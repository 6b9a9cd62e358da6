//! Naive in-memory document scan.
//!
//! Used where no index exists: the IPC driver's buffered fallback and the
//! mmap driver's not-yet-persisted documents. Each query term is matched
//! case-insensitively on word boundaries; a document scores the total number
//! of matches.

use crate::index::types::{DocId, SearchResult};
use crate::query::collector::TopK;
use crate::utils::query_terms;
use regex::Regex;

/// Plain list of documents searched by scanning
#[derive(Debug, Default, Clone)]
pub struct ScanCorpus {
    docs: Vec<String>,
    bytes: usize,
}

impl ScanCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document, returning its position in the list
    pub fn push(&mut self, text: &str) -> DocId {
        let id = self.docs.len() as DocId;
        self.bytes += text.len();
        self.docs.push(text.to_string());
        id
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn docs(&self) -> &[String] {
        &self.docs
    }

    /// Remove and return all buffered documents
    pub fn drain(&mut self) -> Vec<String> {
        self.bytes = 0;
        std::mem::take(&mut self.docs)
    }

    /// Approximate heap footprint
    pub fn memory_bytes(&self) -> usize {
        self.bytes + self.docs.len() * std::mem::size_of::<String>()
    }

    /// Scan every document; result ids are positions in this corpus
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let patterns = compile_terms(query);
        let mut top = TopK::new(limit);
        if patterns.is_empty() || limit == 0 {
            return Vec::new();
        }

        for (i, doc) in self.docs.iter().enumerate() {
            let matches: usize = patterns.iter().map(|re| re.find_iter(doc).count()).sum();
            if matches > 0 {
                top.push(i as DocId, matches as f32);
            }
        }

        top.into_sorted_vec()
    }
}

fn compile_terms(query: &str) -> Vec<Regex> {
    query_terms(query)
        .iter()
        .filter_map(|term| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> ScanCorpus {
        let mut corpus = ScanCorpus::new();
        corpus.push("hello world");
        corpus.push("Hello there, hello again");
        corpus.push("othello is not a match");
        corpus
    }

    #[test]
    fn test_word_boundary_match() {
        let hits = corpus().search("hello", 10);
        let ids: Vec<_> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(hits[0].score, 2.0);
    }

    #[test]
    fn test_multi_term_sums() {
        let hits = corpus().search("world again", 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_empty_query_and_limit() {
        assert!(corpus().search("   ", 10).is_empty());
        assert!(corpus().search("hello", 0).is_empty());
        assert_eq!(corpus().search("hello", 1).len(), 1);
    }

    #[test]
    fn test_drain_resets() {
        let mut c = corpus();
        assert!(c.memory_bytes() > 0);
        assert_eq!(c.drain().len(), 3);
        assert!(c.is_empty());
    }
}
