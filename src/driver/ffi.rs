//! Driver over the C ABI.
//!
//! Exercises exactly the surface a foreign host links against: an opaque
//! handle, caller-supplied result buffers and integer status codes.

use crate::driver::Driver;
use crate::error::{code, FtsError, Result};
use crate::ffi::{self, FtsHandle};
use crate::index::{DocId, DriverStats, Profile, SearchResult};
use crate::query::COLLECTOR_CAPACITY;
use parking_lot::RwLock;
use std::ffi::CStr;
use std::path::Path;
use std::ptr;

/// Owns one native handle; dropping it destroys the index
pub struct IndexHandle {
    raw: *mut FtsHandle,
}

// The native index synchronizes internally
unsafe impl Send for IndexHandle {}
unsafe impl Sync for IndexHandle {}

impl IndexHandle {
    pub fn create(profile: Profile) -> Result<Self> {
        let raw = ffi::fts_create(profile.id());
        if raw.is_null() {
            return Err(last_error(code::INVALID_ARGUMENT));
        }
        Ok(Self { raw })
    }

    fn check(rc: i32) -> Result<()> {
        if rc == code::OK { Ok(()) } else { Err(last_error(rc)) }
    }

    pub fn add_document(&self, text: &str) -> Result<DocId> {
        let mut doc_id = 0u32;
        Self::check(unsafe {
            ffi::fts_add_document(self.raw, text.as_ptr(), text.len(), &mut doc_id)
        })?;
        Ok(doc_id)
    }

    pub fn add_batch(&self, docs: &[String]) -> Result<Vec<DocId>> {
        let mut batch = Vec::with_capacity(docs.iter().map(|d| d.len() + 4).sum());
        for doc in docs {
            let len = u32::try_from(doc.len())
                .map_err(|_| FtsError::InvalidArgument("document larger than 4 GiB".into()))?;
            batch.extend_from_slice(&len.to_le_bytes());
            batch.extend_from_slice(doc.as_bytes());
        }

        let (mut count, mut first) = (0u32, 0u32);
        Self::check(unsafe {
            ffi::fts_add_batch(self.raw, batch.as_ptr(), batch.len(), &mut count, &mut first)
        })?;
        Ok((first..first + count).collect())
    }

    pub fn build(&self) -> Result<()> {
        Self::check(unsafe { ffi::fts_build(self.raw) })
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let capacity = limit.min(COLLECTOR_CAPACITY);
        let mut hits = vec![SearchResult::default(); capacity];
        let mut count = 0u32;
        Self::check(unsafe {
            ffi::fts_search(
                self.raw,
                query.as_ptr(),
                query.len(),
                limit.min(u32::MAX as usize) as u32,
                hits.as_mut_ptr(),
                capacity,
                &mut count,
            )
        })?;
        hits.truncate(count as usize);
        Ok(hits)
    }

    pub fn stats(&self) -> Result<DriverStats> {
        let mut stats = DriverStats::default();
        Self::check(unsafe { ffi::fts_stats(self.raw, &mut stats) })?;
        Ok(stats)
    }

    pub fn save_segment(&self, path: &Path) -> Result<()> {
        let path = std::ffi::CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| FtsError::InvalidArgument("path contains NUL".into()))?;
        Self::check(unsafe { ffi::fts_save_segment(self.raw, path.as_ptr()) })
    }

    pub fn profile(&self) -> Result<Profile> {
        let id = unsafe { ffi::fts_profile(self.raw) };
        u8::try_from(id)
            .ok()
            .and_then(Profile::from_id)
            .ok_or_else(|| last_error(id))
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        unsafe { ffi::fts_destroy(self.raw) };
        self.raw = ptr::null_mut();
    }
}

/// Rebuild a typed error from a status code and the thread's last message
fn last_error(rc: i32) -> FtsError {
    let message = {
        let ptr = ffi::fts_last_error();
        if ptr.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        }
    };

    match rc {
        code::INVALID_HANDLE => FtsError::InvalidHandle,
        code::ALLOCATION_FAILED => FtsError::AllocationFailed,
        _ if message == FtsError::AlreadyBuilt.to_string() => FtsError::AlreadyBuilt,
        _ if message == FtsError::NotBuilt.to_string() => FtsError::NotBuilt,
        _ if message == FtsError::Closed.to_string() => FtsError::Closed,
        code::NOT_FOUND => FtsError::NotFound(message),
        code::INVALID_ARGUMENT => FtsError::InvalidArgument(message),
        _ => FtsError::Remote(message),
    }
}

/// Driver holding an [`IndexHandle`] until `close`
pub struct FfiDriver {
    handle: RwLock<Option<IndexHandle>>,
}

impl FfiDriver {
    pub fn new(profile: Profile) -> Result<Self> {
        Ok(Self {
            handle: RwLock::new(Some(IndexHandle::create(profile)?)),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&IndexHandle) -> Result<T>) -> Result<T> {
        match self.handle.read().as_ref() {
            Some(handle) => f(handle),
            None => Err(FtsError::Closed),
        }
    }

    pub fn save_segment(&self, path: &Path) -> Result<()> {
        self.with(|h| h.save_segment(path))
    }
}

impl Driver for FfiDriver {
    fn name(&self) -> &str {
        "ffi"
    }

    fn add_document(&self, text: &str) -> Result<DocId> {
        self.with(|h| h.add_document(text))
    }

    fn add_documents(&self, docs: &[String]) -> Result<Vec<DocId>> {
        self.with(|h| h.add_batch(docs))
    }

    fn build(&self) -> Result<()> {
        self.with(IndexHandle::build)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.with(|h| h.search(query, limit))
    }

    fn stats(&self) -> Result<DriverStats> {
        self.with(IndexHandle::stats)
    }

    fn close(&self) -> Result<()> {
        // Dropping the handle destroys the native index
        self.handle.write().take();
        Ok(())
    }
}
