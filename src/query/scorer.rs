//! BM25 scoring
//!
//! `score = idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / avgdl))`
//! with `idf = ln((N - df + 0.5) / (df + 0.5) + 1)`, which stays positive
//! even for terms present in every document.

use serde::{Deserialize, Serialize};

/// Tunable BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength (0 = none, 1 = full)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Scorer bound to the statistics of one finalized corpus
#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
    params: Bm25Params,
    doc_count: u32,
    avg_doc_len: f32,
}

impl Bm25 {
    pub fn new(params: Bm25Params, doc_count: u32, total_tokens: u64) -> Self {
        let avg_doc_len = if doc_count == 0 {
            0.0
        } else {
            (total_tokens as f64 / doc_count as f64) as f32
        };
        Self {
            params,
            doc_count,
            avg_doc_len,
        }
    }

    /// Scorer with default parameters
    pub fn with_defaults(doc_count: u32, total_tokens: u64) -> Self {
        Self::new(Bm25Params::default(), doc_count, total_tokens)
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Inverse document frequency for a term occurring in `doc_freq` documents
    pub fn idf(&self, doc_freq: u32) -> f32 {
        idf(self.doc_count, doc_freq)
    }

    /// Contribution of one term to one document
    #[inline]
    pub fn score(&self, tf: u32, doc_len: u32, idf: f32) -> f32 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f32;
        let Bm25Params { k1, b } = self.params;
        let norm = if self.avg_doc_len > 0.0 {
            1.0 - b + b * (doc_len as f32 / self.avg_doc_len)
        } else {
            1.0
        };
        idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
    }
}

/// `ln((N - df + 0.5) / (df + 0.5) + 1)`
pub fn idf(doc_count: u32, doc_freq: u32) -> f32 {
    let n = doc_count as f32;
    let df = doc_freq.min(doc_count) as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}
