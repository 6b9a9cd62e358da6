//! # fts - Succinct Full-Text Search
//!
//! An in-memory and on-disk full-text search engine with three storage
//! profiles that trade memory for query latency, BM25 ranking, and several
//! ways of hosting an index behind one driver interface.
//!
//! ## Architecture
//!
//! - [`codec`] - VByte, Elias-Fano and FST encodings
//! - [`index`] - Speed / Balanced / Compact profiles, segment files, [`FtsIndex`]
//! - [`query`] - BM25 scoring, top-K collection, naive scanning
//! - [`driver`] - native, C ABI, IPC and mmap drivers plus the [`DriverRegistry`]
//! - [`ffi`] - the exported `extern "C"` surface
//! - [`server`] - Unix-socket index server and its wire protocol
//! - [`bench`] - benchmark harness and reports
//! - [`output`] - colored terminal printing
//! - [`utils`] - tokenizer, config, little-endian helpers
//!
//! ## Quick Start
//!
//! ```no_run
//! use fts::{FtsIndex, Profile};
//!
//! let index = FtsIndex::new(Profile::Compact);
//! index.add_document("hello world")?;
//! index.add_document("hello there")?;
//! index.build()?;
//!
//! for hit in index.search("hello", 10)? {
//!     println!("{} {:.3}", hit.doc_id, hit.score);
//! }
//! # Ok::<(), fts::FtsError>(())
//! ```
//!
//! ## Profiles
//!
//! 1. **Speed** - raw `(doc_id, freq)` postings in a hash map
//! 2. **Balanced** - VByte delta-coded postings in one contiguous block
//! 3. **Compact** - FST term dictionary with Elias-Fano doc ids
//!
//! A built index is immutable and may be searched from many threads at once.

pub mod bench;
pub mod codec;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod index;
pub mod output;
pub mod query;
pub mod server;
pub mod utils;

pub use driver::{Driver, DriverOptions, DriverRegistry};
pub use error::{FtsError, Result};
pub use index::{DocId, DriverStats, FtsIndex, IndexStats, Profile, SearchResult, Segment};
