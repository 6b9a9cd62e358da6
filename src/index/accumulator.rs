//! Mutable build state shared by every profile builder

use crate::error::{FtsError, Result};
use crate::index::types::{DocId, DocMeta, Posting};
use crate::utils::TokenizedDoc;
use rustc_hash::FxHashMap;

/// Postings of one term after accumulation, in ascending doc-id order
#[derive(Debug, Clone)]
pub struct AccumulatedTerm {
    pub hash: u64,
    pub term: String,
    pub postings: Vec<Posting>,
}

/// Corpus closed for writing; input to the profile-specific encoders
#[derive(Debug, Clone, Default)]
pub struct ClosedCorpus {
    pub terms: Vec<AccumulatedTerm>,
    pub docs: Vec<DocMeta>,
    pub total_tokens: u64,
}

impl ClosedCorpus {
    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn posting_count(&self) -> u64 {
        self.terms.iter().map(|t| t.postings.len() as u64).sum()
    }
}

/// Collects postings keyed by term hash while documents stream in.
///
/// Doc ids are handed out sequentially, so every posting list stays in
/// strictly increasing doc-id order without a sort at finalize time.
#[derive(Debug, Default)]
pub struct PostingsAccumulator {
    postings: FxHashMap<u64, Vec<Posting>>,
    vocabulary: FxHashMap<u64, String>,
    docs: Vec<DocMeta>,
    total_tokens: u64,
}

impl PostingsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Append one tokenized document and return its id
    pub fn add(&mut self, doc: TokenizedDoc) -> Result<DocId> {
        let doc_id = DocId::try_from(self.docs.len())
            .map_err(|_| FtsError::InvalidArgument("document id space exhausted".into()))?;

        for (token, term) in doc.tokens.iter().zip(doc.terms) {
            self.postings.entry(token.hash).or_default().push(Posting {
                doc_id,
                freq: token.frequency,
            });
            self.vocabulary.entry(token.hash).or_insert(term);
        }

        self.docs.push(DocMeta { length: doc.length });
        self.total_tokens += doc.length as u64;
        Ok(doc_id)
    }

    /// Approximate heap footprint of the pending state
    pub fn memory_bytes(&self) -> usize {
        let postings: usize = self
            .postings
            .values()
            .map(|p| p.capacity() * std::mem::size_of::<Posting>())
            .sum();
        let vocabulary: usize = self.vocabulary.values().map(|t| t.capacity()).sum();
        postings
            + vocabulary
            + self.postings.capacity() * (8 + std::mem::size_of::<Vec<Posting>>())
            + self.docs.capacity() * std::mem::size_of::<DocMeta>()
    }

    /// Close the corpus; terms come out in unspecified order
    pub fn finish(self) -> ClosedCorpus {
        let mut vocabulary = self.vocabulary;
        let terms = self
            .postings
            .into_iter()
            .map(|(hash, postings)| AccumulatedTerm {
                hash,
                term: vocabulary.remove(&hash).unwrap_or_default(),
                postings,
            })
            .collect();

        ClosedCorpus {
            terms,
            docs: self.docs,
            total_tokens: self.total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{hash_term, tokenize};

    #[test]
    fn test_sequential_ids_and_lengths() {
        let mut acc = PostingsAccumulator::new();
        assert_eq!(acc.add(tokenize("a b c")).unwrap(), 0);
        assert_eq!(acc.add(tokenize("b b")).unwrap(), 1);
        assert_eq!(acc.doc_count(), 2);
        assert_eq!(acc.total_tokens(), 5);
        assert_eq!(acc.term_count(), 3);

        let corpus = acc.finish();
        assert_eq!(corpus.docs, vec![DocMeta { length: 3 }, DocMeta { length: 2 }]);

        let b = corpus.terms.iter().find(|t| t.hash == hash_term("b")).unwrap();
        assert_eq!(b.term, "b");
        assert_eq!(
            b.postings,
            vec![Posting { doc_id: 0, freq: 1 }, Posting { doc_id: 1, freq: 2 }]
        );
        assert_eq!(corpus.posting_count(), 4);
    }

    #[test]
    fn test_empty_document_gets_an_id() {
        let mut acc = PostingsAccumulator::new();
        assert_eq!(acc.add(tokenize("")).unwrap(), 0);
        assert_eq!(acc.add(tokenize("x")).unwrap(), 1);
        let corpus = acc.finish();
        assert_eq!(corpus.docs[0].length, 0);
        assert_eq!(corpus.doc_count(), 2);
    }
}
