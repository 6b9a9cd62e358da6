//! Driver over a directory of memory-mapped segment files.
//!
//! Documents added after the last build live in a scan buffer. `build`
//! persists that buffer as the next `seg_NNNN.fts` and maps it. Document ids
//! are global: a segment's local ids are offset by the documents of every
//! segment before it in file-name order.

use crate::driver::Driver;
use crate::error::{FtsError, Result};
use crate::index::segment::EXTENSION;
use crate::index::{write_segment, AnyBuilder, DocId, DriverStats, Profile, SearchResult, Segment};
use crate::query::{ScanCorpus, TopK};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SEGMENT_PREFIX: &str = "seg_";

#[derive(Debug)]
struct MappedSegment {
    base: DocId,
    segment: Segment,
}

#[derive(Debug, Default)]
struct State {
    segments: Vec<MappedSegment>,
    buffer: ScanCorpus,
    closed: bool,
}

impl State {
    fn segment_docs(&self) -> u32 {
        self.segments
            .last()
            .map_or(0, |m| m.base + m.segment.doc_count())
    }
}

#[derive(Debug)]
pub struct MmapDriver {
    dir: PathBuf,
    profile: Profile,
    state: RwLock<State>,
}

impl MmapDriver {
    /// Map every `*.fts` file in `dir`, creating the directory if needed.
    /// Any unreadable or corrupt segment fails the whole open.
    pub fn open(dir: &Path, profile: Profile) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == EXTENSION))
            .collect();
        paths.sort();

        let mut segments = Vec::with_capacity(paths.len());
        let mut base: DocId = 0;
        for path in &paths {
            let segment = Segment::open(path)?;
            let docs = segment.doc_count();
            segments.push(MappedSegment { base, segment });
            base = base
                .checked_add(docs)
                .ok_or_else(|| FtsError::corrupt(path, "document ids overflow u32"))?;
        }

        info!(dir = %dir.display(), segments = segments.len(), docs = base, "segments mapped");

        Ok(Self {
            dir: dir.to_path_buf(),
            profile,
            state: RwLock::new(State {
                segments,
                ..State::default()
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Paths of the mapped segments, in id order
    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.state
            .read()
            .segments
            .iter()
            .map(|m| m.segment.path().to_path_buf())
            .collect()
    }

    /// First unused `seg_NNNN.fts` name in the directory
    fn next_segment_path(&self, state: &State) -> PathBuf {
        let next = state
            .segments
            .iter()
            .filter_map(|m| segment_number(m.segment.path()))
            .max()
            .map_or(0, |n| n + 1);

        let mut n = next;
        loop {
            let path = self
                .dir
                .join(format!("{}{:04}.{}", SEGMENT_PREFIX, n, EXTENSION));
            if !path.exists() {
                return path;
            }
            n += 1;
        }
    }
}

fn segment_number(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(SEGMENT_PREFIX)?
        .parse()
        .ok()
}

impl Driver for MmapDriver {
    fn name(&self) -> &str {
        "mmap"
    }

    fn add_document(&self, text: &str) -> Result<DocId> {
        let mut state = self.state.write();
        if state.closed {
            return Err(FtsError::Closed);
        }
        let base = state.segment_docs();
        Ok(base + state.buffer.push(text))
    }

    fn build(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(FtsError::Closed);
        }
        if state.buffer.is_empty() {
            debug!("nothing buffered; no segment written");
            return Ok(());
        }

        let mut builder = AnyBuilder::new(self.profile);
        for doc in state.buffer.docs() {
            builder.add_document(doc)?;
        }
        let index = builder.build()?;

        let path = self.next_segment_path(&state);
        let size = write_segment(&path, &index.to_segment_data())?;
        let segment = Segment::open(&path)?;
        info!(path = %path.display(), size, docs = segment.doc_count(), "segment persisted");

        let base = state.segment_docs();
        state.segments.push(MappedSegment { base, segment });
        state.buffer.drain();
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read();
        if state.closed {
            return Err(FtsError::Closed);
        }

        let mut top = TopK::new(limit);
        for mapped in &state.segments {
            for hit in mapped.segment.search(query, limit) {
                top.push(mapped.base + hit.doc_id, hit.score);
            }
        }

        let base = state.segment_docs();
        for hit in state.buffer.search(query, limit) {
            top.push(base + hit.doc_id, hit.score);
        }

        Ok(top.into_sorted_vec())
    }

    fn stats(&self) -> Result<DriverStats> {
        let state = self.state.read();
        if state.closed {
            return Err(FtsError::Closed);
        }

        let mut stats = DriverStats {
            doc_count: state.segment_docs() + state.buffer.len() as u32,
            term_count: 0,
            memory_bytes: state.buffer.memory_bytes() as u64,
        };
        for mapped in &state.segments {
            stats.term_count += mapped.segment.term_count();
            stats.memory_bytes += mapped.segment.memory_bytes();
        }
        Ok(stats)
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        // Unmaps every segment
        state.segments.clear();
        state.buffer.drain();
        state.closed = true;
        Ok(())
    }
}
