//! Profile dispatch and the Building -> Built -> Closed lifecycle

use crate::error::{FtsError, Result};
use crate::index::accumulator::PostingsAccumulator;
use crate::index::balanced::{BalancedBuilder, BalancedIndex};
use crate::index::compact::{CompactBuilder, CompactIndex};
use crate::index::segment::{write_segment, SegmentData};
use crate::index::speed::{SpeedBuilder, SpeedIndex};
use crate::index::types::*;
use crate::query::Bm25Params;
use crate::utils::{tokenize, TokenizedDoc};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Builder for any profile
#[derive(Debug)]
pub enum AnyBuilder {
    Speed(SpeedBuilder),
    Balanced(BalancedBuilder),
    Compact(CompactBuilder),
}

impl AnyBuilder {
    pub fn new(profile: Profile) -> Self {
        Self::with_params(profile, Bm25Params::default())
    }

    pub fn with_params(profile: Profile, params: Bm25Params) -> Self {
        match profile {
            Profile::Speed => AnyBuilder::Speed(SpeedBuilder::with_params(params)),
            Profile::Balanced => AnyBuilder::Balanced(BalancedBuilder::with_params(params)),
            Profile::Compact => AnyBuilder::Compact(CompactBuilder::with_params(params)),
        }
    }

    pub fn profile(&self) -> Profile {
        match self {
            AnyBuilder::Speed(_) => Profile::Speed,
            AnyBuilder::Balanced(_) => Profile::Balanced,
            AnyBuilder::Compact(_) => Profile::Compact,
        }
    }

    pub fn add_document(&mut self, text: &str) -> Result<DocId> {
        self.add_tokenized(tokenize(text))
    }

    pub fn add_tokenized(&mut self, doc: TokenizedDoc) -> Result<DocId> {
        match self {
            AnyBuilder::Speed(b) => b.add_tokenized(doc),
            AnyBuilder::Balanced(b) => b.add_tokenized(doc),
            AnyBuilder::Compact(b) => b.add_tokenized(doc),
        }
    }

    fn pending(&self) -> &PostingsAccumulator {
        match self {
            AnyBuilder::Speed(b) => b.pending(),
            AnyBuilder::Balanced(b) => b.pending(),
            AnyBuilder::Compact(b) => b.pending(),
        }
    }

    pub fn doc_count(&self) -> usize {
        self.pending().doc_count()
    }

    /// Statistics of the not-yet-finalized corpus
    pub fn stats(&self) -> IndexStats {
        let pending = self.pending();
        IndexStats {
            profile: self.profile(),
            doc_count: pending.doc_count() as u32,
            term_count: pending.term_count() as u32,
            posting_count: 0,
            total_tokens: pending.total_tokens(),
            memory_bytes: pending.memory_bytes() as u64,
            postings_bytes: 0,
        }
    }

    pub fn build(self) -> Result<AnyIndex> {
        Ok(match self {
            AnyBuilder::Speed(b) => AnyIndex::Speed(b.build()),
            AnyBuilder::Balanced(b) => AnyIndex::Balanced(b.build()),
            AnyBuilder::Compact(b) => AnyIndex::Compact(b.build()?),
        })
    }
}

/// Finalized index of any profile
#[derive(Debug)]
pub enum AnyIndex {
    Speed(SpeedIndex),
    Balanced(BalancedIndex),
    Compact(CompactIndex),
}

impl AnyIndex {
    pub fn profile(&self) -> Profile {
        match self {
            AnyIndex::Speed(_) => Profile::Speed,
            AnyIndex::Balanced(_) => Profile::Balanced,
            AnyIndex::Compact(_) => Profile::Compact,
        }
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        match self {
            AnyIndex::Speed(idx) => idx.search(query, limit),
            AnyIndex::Balanced(idx) => idx.search(query, limit),
            AnyIndex::Compact(idx) => idx.search(query, limit),
        }
    }

    pub fn stats(&self) -> IndexStats {
        match self {
            AnyIndex::Speed(idx) => idx.stats(),
            AnyIndex::Balanced(idx) => idx.stats(),
            AnyIndex::Compact(idx) => idx.stats(),
        }
    }

    pub fn doc_count(&self) -> u32 {
        match self {
            AnyIndex::Speed(idx) => idx.doc_count(),
            AnyIndex::Balanced(idx) => idx.doc_count(),
            AnyIndex::Compact(idx) => idx.doc_count(),
        }
    }

    pub fn to_segment_data(&self) -> SegmentData {
        match self {
            AnyIndex::Speed(idx) => idx.to_segment_data(),
            AnyIndex::Balanced(idx) => idx.to_segment_data(),
            AnyIndex::Compact(idx) => idx.to_segment_data(),
        }
    }
}

enum State {
    Building(AnyBuilder),
    Built(Arc<AnyIndex>),
    Closed,
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Building(_) => Phase::Building,
            State::Built(_) => Phase::Built,
            State::Closed => Phase::Closed,
        }
    }
}

/// Thread-safe index with an explicit lifecycle.
///
/// Writers take the state lock; searches clone the built index out of the
/// lock and run without holding it, so concurrent queries never contend.
pub struct FtsIndex {
    profile: Profile,
    state: Mutex<State>,
}

impl FtsIndex {
    pub fn new(profile: Profile) -> Self {
        Self::with_params(profile, Bm25Params::default())
    }

    pub fn with_params(profile: Profile, params: Bm25Params) -> Self {
        Self {
            profile,
            state: Mutex::new(State::Building(AnyBuilder::with_params(profile, params))),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase()
    }

    fn builder<T>(&self, f: impl FnOnce(&mut AnyBuilder) -> Result<T>) -> Result<T> {
        match &mut *self.state.lock() {
            State::Building(builder) => f(builder),
            State::Built(_) => Err(FtsError::AlreadyBuilt),
            State::Closed => Err(FtsError::Closed),
        }
    }

    pub fn add_document(&self, text: &str) -> Result<DocId> {
        self.builder(|b| b.add_document(text))
    }

    /// Add a batch. Tokenization runs in parallel; ids follow input order.
    pub fn add_documents<S: AsRef<str> + Sync>(&self, docs: &[S]) -> Result<Vec<DocId>> {
        // Fail fast before spending time on tokenization
        self.builder(|_| Ok(()))?;

        let tokenized: Vec<TokenizedDoc> = docs.par_iter().map(|d| tokenize(d.as_ref())).collect();
        self.builder(|b| {
            tokenized
                .into_iter()
                .map(|doc| b.add_tokenized(doc))
                .collect()
        })
    }

    /// Finalize the index. Fails with `AlreadyBuilt` on a second call.
    pub fn build(&self) -> Result<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Building(builder) => {
                let index = builder.build()?;
                let stats = index.stats();
                info!(
                    profile = %stats.profile,
                    docs = stats.doc_count,
                    terms = stats.term_count,
                    bits_per_posting = stats.bits_per_posting(),
                    "index built"
                );
                *state = State::Built(Arc::new(index));
                Ok(())
            }
            State::Built(index) => {
                *state = State::Built(index);
                Err(FtsError::AlreadyBuilt)
            }
            State::Closed => Err(FtsError::Closed),
        }
    }

    /// Shared handle to the built index
    pub fn index(&self) -> Result<Arc<AnyIndex>> {
        match &*self.state.lock() {
            State::Built(index) => Ok(Arc::clone(index)),
            State::Building(_) => Err(FtsError::NotBuilt),
            State::Closed => Err(FtsError::Closed),
        }
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        Ok(self.index()?.search(query, limit))
    }

    /// Statistics in any phase but Closed
    pub fn stats(&self) -> Result<IndexStats> {
        match &*self.state.lock() {
            State::Building(builder) => Ok(builder.stats()),
            State::Built(index) => Ok(index.stats()),
            State::Closed => Err(FtsError::Closed),
        }
    }

    /// Persist the built index as a segment file; returns its size
    pub fn save_segment(&self, path: &Path) -> Result<u64> {
        let index = self.index()?;
        write_segment(path, &index.to_segment_data())
    }

    /// Release the index. Idempotent.
    pub fn close(&self) {
        *self.state.lock() = State::Closed;
    }
}
