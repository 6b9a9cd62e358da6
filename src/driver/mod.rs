//! Uniform add/build/search capability over every way of hosting an index.
//!
//! - [`native`] - an in-process [`FtsIndex`](crate::index::FtsIndex) per profile
//! - [`ffi`] - the same index driven through the C ABI with an owned handle
//! - [`ipc`] - the index server over a Unix socket, or a local scan buffer
//! - [`mmap`] - memory-mapped segment files, one new segment per build
//!
//! Drivers are shared across threads; each guards its own state.

pub mod ffi;
pub mod ipc;
pub mod mmap;
pub mod native;
pub mod registry;

pub use ffi::FfiDriver;
pub use ipc::IpcDriver;
pub use mmap::MmapDriver;
pub use native::NativeDriver;
pub use registry::{DriverOptions, DriverRegistry};

use crate::error::Result;
use crate::index::types::{DocId, DriverStats, SearchResult};

pub trait Driver: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    fn add_document(&self, text: &str) -> Result<DocId>;

    /// Add a batch; ids follow input order
    fn add_documents(&self, docs: &[String]) -> Result<Vec<DocId>> {
        docs.iter().map(|doc| self.add_document(doc)).collect()
    }

    fn build(&self) -> Result<()>;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;

    fn stats(&self) -> Result<DriverStats>;

    /// Release resources; later calls fail with `Closed`
    fn close(&self) -> Result<()>;
}
