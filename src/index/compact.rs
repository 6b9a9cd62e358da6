//! Compact profile: FST term dictionary, Elias-Fano doc ids, byte frequencies.
//!
//! The FST maps term text to a term ordinal. Each ordinal owns an Elias-Fano
//! doc-id sequence and a parallel `u8` frequency array (saturating at 255);
//! the two are advanced in lockstep while iterating.

use crate::codec::{EliasFano, EliasFanoIter, Fst, FstBuilder};
use crate::error::Result;
use crate::index::accumulator::PostingsAccumulator;
use crate::index::segment::{SegmentData, SegmentTerm};
use crate::index::types::*;
use crate::query::{Bm25, Bm25Params, PostingSource, TermPostings};
use crate::utils::{tokenize, TokenizedDoc};
use tracing::debug;

#[inline]
fn freq_byte(freq: u16) -> u8 {
    freq.min(u8::MAX as u16) as u8
}

/// Append the Compact on-disk encoding of one posting list: a serialized
/// Elias-Fano block followed by one frequency byte per posting.
pub fn encode_postings(postings: &[Posting], buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    let doc_ids: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
    EliasFano::build(&doc_ids).write_to(buf);
    buf.extend(postings.iter().map(|p| freq_byte(p.freq)));
    buf.len() - start
}

/// Parse one list written by [`encode_postings`]. Returns the sequence and
/// its frequency bytes, or None if the bytes are truncated or inconsistent.
pub fn decode_postings(bytes: &[u8], count: usize) -> Option<(EliasFano, &[u8])> {
    let (ef, used) = EliasFano::read_from(bytes)?;
    if ef.len() != count {
        return None;
    }
    let freqs = bytes.get(used..used + count)?;
    Some((ef, freqs))
}

#[derive(Debug)]
struct CompactTerm {
    hash: u64,
    doc_freq: u32,
    idf: f32,
    doc_ids: EliasFano,
    freqs: Box<[u8]>,
}

/// Mutable Compact-profile builder
#[derive(Debug, Default)]
pub struct CompactBuilder {
    acc: PostingsAccumulator,
    params: Bm25Params,
}

impl CompactBuilder {
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

    /// Finalize: sort the vocabulary, build the dictionary and encode lists
    pub fn build(self) -> Result<CompactIndex> {
        let mut corpus = self.acc.finish();
        let doc_count = corpus.doc_count();
        let scorer = Bm25::new(self.params, doc_count, corpus.total_tokens);
        let posting_count = corpus.posting_count();

        corpus.terms.sort_unstable_by(|a, b| a.term.cmp(&b.term));

        let mut dictionary = FstBuilder::new();
        let mut terms = Vec::with_capacity(corpus.terms.len());
        for (ordinal, term) in corpus.terms.into_iter().enumerate() {
            dictionary.insert(term.term.as_bytes(), ordinal as u64)?;

            let doc_ids: Vec<u32> = term.postings.iter().map(|p| p.doc_id).collect();
            let doc_freq = doc_ids.len() as u32;
            terms.push(CompactTerm {
                hash: term.hash,
                doc_freq,
                idf: scorer.idf(doc_freq),
                doc_ids: EliasFano::build(&doc_ids),
                freqs: term.postings.iter().map(|p| freq_byte(p.freq)).collect(),
            });
        }
        let dictionary = dictionary.finish();

        debug!(
            docs = doc_count,
            terms = terms.len(),
            fst_nodes = dictionary.node_count(),
            "compact index built"
        );

        Ok(CompactIndex {
            dictionary,
            terms,
            docs: corpus.docs,
            total_tokens: corpus.total_tokens,
            posting_count,
            scorer,
        })
    }
}

/// Immutable Compact-profile index
#[derive(Debug)]
pub struct CompactIndex {
    dictionary: Fst,
    terms: Vec<CompactTerm>,
    docs: Vec<DocMeta>,
    total_tokens: u64,
    posting_count: u64,
    scorer: Bm25,
}

impl CompactIndex {
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        crate::query::execute(self, query, limit)
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn stats(&self) -> IndexStats {
        let postings_bytes: u64 = self
            .terms
            .iter()
            .map(|t| (t.doc_ids.size_bits() / 8 + t.freqs.len()) as u64)
            .sum();
        let per_term = std::mem::size_of::<CompactTerm>() as u64;
        let memory_bytes = postings_bytes
            + per_term * self.terms.len() as u64
            + self.dictionary.memory_bytes() as u64
            + (self.docs.capacity() * std::mem::size_of::<DocMeta>()) as u64;

        IndexStats {
            profile: Profile::Compact,
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
            .map(|t| SegmentTerm {
                hash: t.hash,
                postings: t
                    .doc_ids
                    .iter()
                    .zip(t.freqs.iter())
                    .map(|(doc_id, &freq)| Posting {
                        doc_id,
                        freq: freq as u16,
                    })
                    .collect(),
            })
            .collect();

        SegmentData::new(Profile::Compact, self.docs.clone(), self.total_tokens, terms)
    }
}

/// Elias-Fano ids zipped with their frequency bytes
pub struct CompactPostings<'a> {
    doc_ids: EliasFanoIter<'a>,
    freqs: std::slice::Iter<'a, u8>,
}

impl Iterator for CompactPostings<'_> {
    type Item = (DocId, u32);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let doc_id = self.doc_ids.next()?;
        let freq = *self.freqs.next()?;
        Some((doc_id, freq as u32))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.doc_ids.size_hint()
    }
}

impl PostingSource for CompactIndex {
    type Postings<'a> = CompactPostings<'a>;

    fn scorer(&self) -> &Bm25 {
        &self.scorer
    }

    #[inline]
    fn doc_length(&self, doc_id: DocId) -> u32 {
        self.docs.get(doc_id as usize).map_or(0, |d| d.length)
    }

    fn postings<'a>(&'a self, term: &str) -> Option<TermPostings<CompactPostings<'a>>> {
        let ordinal = self.dictionary.get(term.as_bytes())? as usize;
        let t = self.terms.get(ordinal)?;
        Some(TermPostings {
            doc_freq: t.doc_freq,
            idf: t.idf,
            postings: CompactPostings {
                doc_ids: t.doc_ids.iter(),
                freqs: t.freqs.iter(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(docs: &[&str]) -> CompactIndex {
        let mut builder = CompactBuilder::new();
        for doc in docs {
            builder.add_document(doc).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_search() {
        let idx = index(&["hello world", "hello there", "world peace"]);
        let mut ids: Vec<_> = idx.search("hello", 10).iter().map(|r| r.doc_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(idx.search("peace world", 10)[0].doc_id, 2);
        assert!(idx.search("nothing", 10).is_empty());
    }

    #[test]
    fn test_frequency_saturates_at_255() {
        let long = vec!["spam"; 400].join(" ");
        let idx = index(&[&long]);
        let postings: Vec<_> = idx.postings("spam").unwrap().postings.collect();
        assert_eq!(postings, vec![(0, 255)]);
    }

    #[test]
    fn test_postings_codec() {
        let postings = [
            Posting { doc_id: 2, freq: 1 },
            Posting { doc_id: 9, freq: 7 },
            Posting { doc_id: 40, freq: 999 },
        ];
        let mut buf = Vec::new();
        let len = encode_postings(&postings, &mut buf);
        assert_eq!(len, buf.len());

        let (ef, freqs) = decode_postings(&buf, 3).unwrap();
        assert_eq!(ef.iter().collect::<Vec<_>>(), vec![2, 9, 40]);
        assert_eq!(freqs, &[1, 7, 255]);

        assert!(decode_postings(&buf, 4).is_none());
        assert!(decode_postings(&buf[..buf.len() - 1], 3).is_none());
    }

    #[test]
    fn test_compresses_below_fixed_width() {
        let vocab = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
        let docs: Vec<String> = (0..300)
            .map(|i| {
                (0..6)
                    .map(|j| vocab[(i * 3 + j * 5) % vocab.len()])
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let stats = index(&refs).stats();
        assert!(stats.bits_per_posting() < 32.0, "{}", stats.bits_per_posting());
    }
}
