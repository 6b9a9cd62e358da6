//! Unix index server
//!
//! Serves one [`FtsIndex`] to any number of IPC clients over a Unix socket,
//! one thread per connection. Built indexes are immutable, so search results
//! are cached in an LRU keyed by `(query, limit)` and never invalidated.

use crate::error::FtsError;
use crate::index::{FtsIndex, Profile, SearchResult};
use crate::server::get_pid_path;
use crate::server::protocol::{
    encode_doc_id, encode_error, encode_results, encode_stats, read_frame, write_frame,
    MessageType, Request,
};
use anyhow::{Context, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::num::NonZeroUsize;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// LRU cache size for search results
const CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(256).unwrap();

/// Counters reported when the server stops
struct ServerStats {
    start_time: Instant,
    queries_served: AtomicU64,
    cache_hits: AtomicU64,
}

impl ServerStats {
    fn new() -> Self {
        Self {
            start_time: Instant::now(),
            queries_served: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    fn cache_hit_rate(&self) -> f32 {
        let served = self.queries_served.load(Ordering::Relaxed);
        if served == 0 {
            0.0
        } else {
            self.cache_hits.load(Ordering::Relaxed) as f32 / served as f32
        }
    }
}

/// The index server
pub struct IndexServer {
    index: FtsIndex,
    socket_path: PathBuf,
    io_timeout: Duration,
    query_cache: Mutex<LruCache<(String, u32), Vec<SearchResult>>>,
    stats: ServerStats,
    shutdown: AtomicBool,
}

impl IndexServer {
    /// Create a server wrapped in Arc
    pub fn new(profile: Profile, socket_path: PathBuf, io_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            index: FtsIndex::new(profile),
            socket_path,
            io_timeout,
            query_cache: Mutex::new(LruCache::new(CACHE_SIZE)),
            stats: ServerStats::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn index(&self) -> &FtsIndex {
        &self.index
    }

    /// Bind the socket, replacing a stale one, readable by this user only
    pub fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.socket_path.exists() {
            fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind to {}", self.socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.socket_path, fs::Permissions::from_mode(0o600))?;
        }

        info!(socket = %self.socket_path.display(), profile = %self.index.profile(), "listening");
        Ok(listener)
    }

    /// Bind and serve until [`stop`](Self::stop) is called (blocking)
    pub fn run(self: &Arc<Self>) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener)
    }

    /// Accept loop over an already bound listener
    pub fn serve(self: &Arc<Self>, listener: UnixListener) -> Result<()> {
        for stream in listener.incoming() {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match stream {
                Ok(stream) => {
                    let _ = stream.set_read_timeout(Some(self.io_timeout));
                    let _ = stream.set_write_timeout(Some(self.io_timeout));

                    let server = Arc::clone(self);
                    thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream) {
                            debug!(error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept error"),
            }
        }

        let _ = fs::remove_file(&self.socket_path);
        info!(
            uptime_secs = self.stats.start_time.elapsed().as_secs(),
            queries = self.stats.queries_served.load(Ordering::Relaxed),
            cache_hit_rate = self.stats.cache_hit_rate(),
            "server stopped"
        );
        Ok(())
    }

    /// Request shutdown and wake the accept loop
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = UnixStream::connect(&self.socket_path);
    }

    /// Handle a single client connection until Close or EOF
    fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        loop {
            let frame = match read_frame(&mut reader) {
                Ok(frame) => frame,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    // Framing is lost; report and drop the connection
                    let err = FtsError::Protocol(e.to_string());
                    write_frame(&mut writer, MessageType::Error, &encode_error(&err))?;
                    break;
                }
            };

            let request = match Request::decode(frame) {
                Ok(request) => request,
                Err(err) => {
                    write_frame(&mut writer, MessageType::Error, &encode_error(&err))?;
                    continue;
                }
            };

            let close = request == Request::Close;
            match self.handle_request(request) {
                Ok(payload) => write_frame(&mut writer, MessageType::Response, &payload)?,
                Err(err) => write_frame(&mut writer, MessageType::Error, &encode_error(&err))?,
            }
            if close {
                break;
            }
        }

        Ok(())
    }

    fn handle_request(&self, request: Request) -> crate::error::Result<Vec<u8>> {
        match request {
            Request::AddDoc(text) => Ok(encode_doc_id(self.index.add_document(&text)?)),
            Request::Build => {
                self.index.build()?;
                Ok(Vec::new())
            }
            Request::Search { limit, query } => self.handle_search(query, limit),
            Request::Stats => Ok(encode_stats(&self.index.stats()?.into())),
            Request::Close => Ok(Vec::new()),
        }
    }

    fn handle_search(&self, query: String, limit: u32) -> crate::error::Result<Vec<u8>> {
        self.stats.queries_served.fetch_add(1, Ordering::Relaxed);
        let key = (query, limit);

        if let Some(hits) = self.query_cache.lock().get(&key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(encode_results(hits));
        }

        let hits = self.index.search(&key.0, limit as usize)?;
        let payload = encode_results(&hits);
        self.query_cache.lock().put(key, hits);
        Ok(payload)
    }
}

/// Run a server in the foreground, writing a PID file for `stop_daemon`
pub fn run_foreground(profile: Profile, socket_path: PathBuf, io_timeout: Duration) -> Result<()> {
    let pid_path = get_pid_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, format!("{}", std::process::id()))?;

    let server = IndexServer::new(profile, socket_path, io_timeout);
    let result = server.run();
    let _ = fs::remove_file(&pid_path);
    result
}

/// Stop a running server. Returns false if none was recorded.
pub fn stop_daemon(socket_path: &Path) -> Result<bool> {
    let pid_path = get_pid_path();

    if !pid_path.exists() {
        return Ok(false);
    }

    let pid_str = fs::read_to_string(&pid_path)?;
    let pid: i32 = pid_str.trim().parse()?;

    unsafe {
        if libc::kill(pid, libc::SIGTERM) == 0 {
            thread::sleep(Duration::from_millis(500));

            if libc::kill(pid, 0) == 0 {
                thread::sleep(Duration::from_secs(1));
                if libc::kill(pid, 0) == 0 {
                    libc::kill(pid, libc::SIGKILL);
                }
            }
        }
    }

    let _ = fs::remove_file(socket_path);
    let _ = fs::remove_file(&pid_path);

    Ok(true)
}
