//! C ABI over [`FtsIndex`].
//!
//! Handles are opaque pointers owned by the caller from `fts_create` until
//! `fts_destroy`. Functions return the codes in [`crate::error::code`];
//! `fts_last_error` describes the most recent failure on the calling thread.
//!
//! Batch format for `fts_add_batch`: repeated `u32` little-endian length
//! followed by that many UTF-8 bytes.

use crate::error::{code, FtsError, Result};
use crate::index::{DocId, DriverStats, FtsIndex, Profile, SearchResult};
use crate::utils::u32_at;
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr;
use std::slice;

/// Native index behind an opaque handle
pub struct FtsHandle {
    index: FtsIndex,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn record(err: &FtsError) -> i32 {
    let message = CString::new(err.to_string().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
    err.code()
}

fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => code::OK,
        Err(err) => record(&err),
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `fts_create`.
unsafe fn handle_ref<'a>(handle: *const FtsHandle) -> Result<&'a FtsHandle> {
    unsafe { handle.as_ref() }.ok_or(FtsError::InvalidHandle)
}

/// # Safety
/// `data` must be null only when `len == 0`, else valid for `len` bytes.
unsafe fn utf8<'a>(data: *const u8, len: usize) -> Result<&'a str> {
    if len == 0 {
        return Ok("");
    }
    if data.is_null() {
        return Err(FtsError::InvalidArgument("null buffer".into()));
    }
    let bytes = unsafe { slice::from_raw_parts(data, len) };
    std::str::from_utf8(bytes).map_err(|e| FtsError::InvalidArgument(format!("invalid UTF-8: {}", e)))
}

/// Split a length-prefixed batch into documents
pub fn parse_batch(bytes: &[u8]) -> Result<Vec<&str>> {
    let mut docs = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = u32_at(bytes, pos)
            .ok_or_else(|| FtsError::InvalidArgument("truncated batch length".into()))?
            as usize;
        pos += 4;
        let doc = bytes
            .get(pos..pos + len)
            .ok_or_else(|| FtsError::InvalidArgument("truncated batch document".into()))?;
        let doc = std::str::from_utf8(doc)
            .map_err(|e| FtsError::InvalidArgument(format!("invalid UTF-8: {}", e)))?;
        docs.try_reserve(1).map_err(|_| FtsError::AllocationFailed)?;
        docs.push(doc);
        pos += len;
    }
    Ok(docs)
}

/// Create an index for profile id 0 (speed), 1 (balanced) or 2 (compact).
/// Returns null for an unknown profile.
#[unsafe(no_mangle)]
pub extern "C" fn fts_create(profile: u8) -> *mut FtsHandle {
    match Profile::from_id(profile) {
        Some(profile) => Box::into_raw(Box::new(FtsHandle {
            index: FtsIndex::new(profile),
        })),
        None => {
            record(&FtsError::InvalidArgument(format!("unknown profile id {}", profile)));
            ptr::null_mut()
        }
    }
}

/// Release a handle. Null is ignored.
///
/// # Safety
/// `handle` must come from `fts_create` and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_destroy(handle: *mut FtsHandle) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// # Safety
/// `handle` from `fts_create`; `text` valid for `len` bytes; `out_doc_id`
/// null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_add_document(
    handle: *mut FtsHandle,
    text: *const u8,
    len: usize,
    out_doc_id: *mut u32,
) -> i32 {
    status((|| {
        let handle = unsafe { handle_ref(handle) }?;
        let text = unsafe { utf8(text, len) }?;
        let doc_id = handle.index.add_document(text)?;
        if let Some(out) = unsafe { out_doc_id.as_mut() } {
            *out = doc_id;
        }
        Ok(())
    })())
}

/// Add a length-prefixed batch. Writes the number of documents added and
/// the id of the first one.
///
/// # Safety
/// `handle` from `fts_create`; `data` valid for `len` bytes; out pointers
/// null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_add_batch(
    handle: *mut FtsHandle,
    data: *const u8,
    len: usize,
    out_count: *mut u32,
    out_first_id: *mut u32,
) -> i32 {
    status((|| {
        let handle = unsafe { handle_ref(handle) }?;
        if len > 0 && data.is_null() {
            return Err(FtsError::InvalidArgument("null batch".into()));
        }
        let bytes: &[u8] = if len == 0 {
            &[]
        } else {
            unsafe { slice::from_raw_parts(data, len) }
        };
        let docs = parse_batch(bytes)?;
        let ids: Vec<DocId> = handle.index.add_documents(&docs)?;
        if let Some(out) = unsafe { out_count.as_mut() } {
            *out = ids.len() as u32;
        }
        if let (Some(out), Some(&first)) = (unsafe { out_first_id.as_mut() }, ids.first()) {
            *out = first;
        }
        Ok(())
    })())
}

/// # Safety
/// `handle` from `fts_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_build(handle: *mut FtsHandle) -> i32 {
    status(unsafe { handle_ref(handle) }.and_then(|h| h.index.build()))
}

/// Write up to `capacity` hits into `out`, best first.
///
/// # Safety
/// `handle` from `fts_create`; `query` valid for `query_len` bytes; `out`
/// valid for `capacity` records; `out_count` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_search(
    handle: *mut FtsHandle,
    query: *const u8,
    query_len: usize,
    limit: u32,
    out: *mut SearchResult,
    capacity: usize,
    out_count: *mut u32,
) -> i32 {
    status((|| {
        let handle = unsafe { handle_ref(handle) }?;
        let query = unsafe { utf8(query, query_len) }?;
        if out_count.is_null() || (capacity > 0 && out.is_null()) {
            return Err(FtsError::InvalidArgument("null output buffer".into()));
        }

        let hits = handle.index.search(query, limit as usize)?;
        let n = hits.len().min(capacity);
        if n > 0 {
            unsafe { ptr::copy_nonoverlapping(hits.as_ptr(), out, n) };
        }
        unsafe { *out_count = n as u32 };
        Ok(())
    })())
}

/// # Safety
/// `handle` from `fts_create`; `out` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_stats(handle: *mut FtsHandle, out: *mut DriverStats) -> i32 {
    status((|| {
        let handle = unsafe { handle_ref(handle) }?;
        let out = unsafe { out.as_mut() }
            .ok_or_else(|| FtsError::InvalidArgument("null stats buffer".into()))?;
        *out = handle.index.stats()?.into();
        Ok(())
    })())
}

/// Persist a built index as a segment file at `path`.
///
/// # Safety
/// `handle` from `fts_create`; `path` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_save_segment(handle: *mut FtsHandle, path: *const c_char) -> i32 {
    status((|| {
        let handle = unsafe { handle_ref(handle) }?;
        if path.is_null() {
            return Err(FtsError::InvalidArgument("null path".into()));
        }
        let path = unsafe { CStr::from_ptr(path) }
            .to_str()
            .map_err(|e| FtsError::InvalidArgument(format!("invalid UTF-8 path: {}", e)))?;
        handle.index.save_segment(Path::new(path))?;
        Ok(())
    })())
}

/// Profile id of the handle, or `INVALID_HANDLE`.
///
/// # Safety
/// `handle` from `fts_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fts_profile(handle: *mut FtsHandle) -> i32 {
    match unsafe { handle_ref(handle) } {
        Ok(h) => h.index.profile().id() as i32,
        Err(err) => record(&err),
    }
}

/// Message of the last failure on this thread, or null. The pointer stays
/// valid until the next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn fts_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |message| message.as_ptr())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(docs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for doc in docs {
            buf.extend_from_slice(&(doc.len() as u32).to_le_bytes());
            buf.extend_from_slice(doc.as_bytes());
        }
        buf
    }

    fn last_error() -> String {
        let ptr = fts_last_error();
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_batch() {
        let bytes = batch(&["one", "", "three"]);
        assert_eq!(parse_batch(&bytes).unwrap(), vec!["one", "", "three"]);
        assert!(parse_batch(&bytes[..bytes.len() - 1]).is_err());
        assert!(parse_batch(&[1, 0]).is_err());
    }

    #[test]
    fn test_full_lifecycle() {
        let handle = fts_create(Profile::Compact.id());
        assert!(!handle.is_null());
        unsafe {
            assert_eq!(fts_profile(handle), 2);

            let mut doc_id = u32::MAX;
            let text = "hello world";
            assert_eq!(fts_add_document(handle, text.as_ptr(), text.len(), &mut doc_id), code::OK);
            assert_eq!(doc_id, 0);

            let data = batch(&["hello there", "world peace"]);
            let (mut count, mut first) = (0u32, 0u32);
            assert_eq!(
                fts_add_batch(handle, data.as_ptr(), data.len(), &mut count, &mut first),
                code::OK
            );
            assert_eq!((count, first), (2, 1));

            let mut hits = [SearchResult::default(); 8];
            let mut n = 0u32;
            let query = "hello";
            let rc = fts_search(handle, query.as_ptr(), query.len(), 10, hits.as_mut_ptr(), 8, &mut n);
            assert_eq!(rc, code::INVALID_ARGUMENT);
            assert!(last_error().contains("not built"));

            assert_eq!(fts_build(handle), code::OK);
            let rc = fts_search(handle, query.as_ptr(), query.len(), 10, hits.as_mut_ptr(), 8, &mut n);
            assert_eq!(rc, code::OK);
            assert_eq!(n, 2);
            let mut ids = vec![hits[0].doc_id, hits[1].doc_id];
            ids.sort();
            assert_eq!(ids, vec![0, 1]);

            let mut stats = DriverStats::default();
            assert_eq!(fts_stats(handle, &mut stats), code::OK);
            assert_eq!(stats.doc_count, 3);
            assert_eq!(stats.term_count, 4);

            assert_eq!(
                fts_add_document(handle, text.as_ptr(), text.len(), ptr::null_mut()),
                code::INVALID_ARGUMENT
            );
            assert!(last_error().contains("already built"));

            fts_destroy(handle);
        }
    }

    #[test]
    fn test_search_truncates_to_capacity() {
        let handle = fts_create(Profile::Speed.id());
        unsafe {
            let data = batch(&["x", "x x", "x x x"]);
            fts_add_batch(handle, data.as_ptr(), data.len(), ptr::null_mut(), ptr::null_mut());
            fts_build(handle);

            let mut hits = [SearchResult::default(); 2];
            let mut n = 0u32;
            let rc = fts_search(handle, b"x".as_ptr(), 1, 10, hits.as_mut_ptr(), 2, &mut n);
            assert_eq!(rc, code::OK);
            assert_eq!(n, 2);
            fts_destroy(handle);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(fts_create(9).is_null());
        assert!(last_error().contains("unknown profile"));
        unsafe {
            assert_eq!(fts_build(ptr::null_mut()), code::INVALID_HANDLE);
            assert_eq!(fts_profile(ptr::null_mut()), code::INVALID_HANDLE);

            let handle = fts_create(1);
            let bad = [0xffu8, 0xfe];
            assert_eq!(
                fts_add_document(handle, bad.as_ptr(), bad.len(), ptr::null_mut()),
                code::INVALID_ARGUMENT
            );
            fts_destroy(handle);
        }
    }
}
