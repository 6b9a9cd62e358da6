//! Driver talking to the index server, with an in-process fallback.
//!
//! On construction the driver probes the socket once. With a listener every
//! call is one framed exchange; without one, documents are kept in a local
//! [`ScanCorpus`] and searched by scanning.

use crate::driver::Driver;
use crate::error::{FtsError, Result};
use crate::index::{DocId, DriverStats, SearchResult};
use crate::query::ScanCorpus;
use crate::server::IndexClient;
use crate::utils::terms;
use crate::utils::tokenizer::hash_term;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

enum Mode {
    Remote(IndexClient),
    Buffered {
        corpus: ScanCorpus,
        terms: FxHashSet<u64>,
    },
    Closed,
}

impl Mode {
    fn buffered() -> Self {
        Mode::Buffered {
            corpus: ScanCorpus::new(),
            terms: FxHashSet::default(),
        }
    }
}

pub struct IpcDriver {
    mode: Mutex<Mode>,
}

impl IpcDriver {
    /// Connect to a server at `socket_path`, falling back to local buffering
    pub fn connect(socket_path: &Path, timeout: Duration) -> Self {
        let mode = match IndexClient::connect(socket_path, timeout) {
            Some(client) => {
                debug!(socket = %socket_path.display(), "connected to index server");
                Mode::Remote(client)
            }
            None => {
                warn!(
                    socket = %socket_path.display(),
                    "no index server listening; using in-process buffered mode"
                );
                Mode::buffered()
            }
        };
        Self {
            mode: Mutex::new(mode),
        }
    }

    /// Driver in buffered mode without probing any socket
    pub fn local() -> Self {
        Self {
            mode: Mutex::new(Mode::buffered()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(*self.mode.lock(), Mode::Remote(_))
    }
}

impl Driver for IpcDriver {
    fn name(&self) -> &str {
        "ipc"
    }

    fn add_document(&self, text: &str) -> Result<DocId> {
        match &mut *self.mode.lock() {
            Mode::Remote(client) => client.add_document(text),
            Mode::Buffered { corpus, terms: seen } => {
                seen.extend(terms(text).map(|t| hash_term(&t)));
                Ok(corpus.push(text))
            }
            Mode::Closed => Err(FtsError::Closed),
        }
    }

    fn build(&self) -> Result<()> {
        match &mut *self.mode.lock() {
            Mode::Remote(client) => client.build(),
            // Scanning needs no finalize step
            Mode::Buffered { .. } => Ok(()),
            Mode::Closed => Err(FtsError::Closed),
        }
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        match &mut *self.mode.lock() {
            Mode::Remote(client) => client.search(query, limit.min(u32::MAX as usize) as u32),
            Mode::Buffered { corpus, .. } => Ok(corpus.search(query, limit)),
            Mode::Closed => Err(FtsError::Closed),
        }
    }

    fn stats(&self) -> Result<DriverStats> {
        match &mut *self.mode.lock() {
            Mode::Remote(client) => client.stats(),
            Mode::Buffered { corpus, terms } => Ok(DriverStats {
                doc_count: corpus.len() as u32,
                term_count: terms.len() as u32,
                memory_bytes: (corpus.memory_bytes() + terms.len() * 8) as u64,
            }),
            Mode::Closed => Err(FtsError::Closed),
        }
    }

    fn close(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.mode.lock(), Mode::Closed);
        match previous {
            Mode::Remote(client) => client.close(),
            Mode::Buffered { .. } | Mode::Closed => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Profile;
    use crate::server::IndexServer;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_fallback_without_server() {
        let dir = TempDir::new().unwrap();
        let driver = IpcDriver::connect(&dir.path().join("missing.sock"), Duration::from_secs(1));
        assert!(!driver.is_remote());

        assert_eq!(driver.add_document("hello world").unwrap(), 0);
        assert_eq!(driver.add_document("Hello there hello").unwrap(), 1);
        driver.build().unwrap();
        driver.build().unwrap();

        let hits = driver.search("hello", 10).unwrap();
        assert_eq!(hits[0].doc_id, 1);
        assert_eq!(hits.len(), 2);

        let stats = driver.stats().unwrap();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.term_count, 3);

        driver.close().unwrap();
        assert!(matches!(driver.add_document("x"), Err(FtsError::Closed)));
    }

    #[test]
    fn test_remote_mode() {
        let dir = TempDir::new().unwrap();
        let server = IndexServer::new(
            Profile::Speed,
            dir.path().join("fts.sock"),
            Duration::from_secs(5),
        );
        let listener = server.bind().unwrap();
        let handle = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.serve(listener).unwrap())
        };

        let driver = IpcDriver::connect(server.socket_path(), Duration::from_secs(5));
        assert!(driver.is_remote());
        let ids = driver
            .add_documents(&["hello world".to_string(), "world peace".to_string()])
            .unwrap();
        assert_eq!(ids, vec![0, 1]);
        assert!(matches!(driver.search("world", 10), Err(FtsError::NotBuilt)));
        driver.build().unwrap();
        assert_eq!(driver.search("world", 10).unwrap().len(), 2);
        assert_eq!(driver.stats().unwrap().doc_count, 2);
        driver.close().unwrap();

        server.stop();
        handle.join().unwrap();
    }
}
