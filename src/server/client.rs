//! Client for the index server

use crate::error::{FtsError, Result};
use crate::index::types::{DocId, DriverStats, SearchResult};
use crate::server::protocol::{
    decode_doc_id, decode_error, decode_results, decode_stats, read_frame, write_frame,
    MessageType, Request,
};
use std::io::{BufReader, BufWriter};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// Connected client
pub struct IndexClient {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
}

impl IndexClient {
    /// Try to connect to a running server.
    /// Returns None if nothing is listening (allowing fallback to local mode)
    pub fn connect(socket_path: &Path, timeout: Duration) -> Option<Self> {
        // Quick check if socket exists
        if !socket_path.exists() {
            return None;
        }

        let stream = UnixStream::connect(socket_path).ok()?;
        let _ = stream.set_read_timeout(Some(timeout));
        let _ = stream.set_write_timeout(Some(timeout));

        let reader = BufReader::new(stream.try_clone().ok()?);
        let writer = BufWriter::new(stream);

        Some(Self { reader, writer })
    }

    /// One request/response exchange; Error frames become `Err`
    fn call(&mut self, request: Request) -> Result<Vec<u8>> {
        let (kind, payload) = request.encode();
        write_frame(&mut self.writer, kind, &payload)?;

        let frame = read_frame(&mut self.reader)?;
        match frame.kind {
            MessageType::Response => Ok(frame.payload),
            MessageType::Error => Err(decode_error(&frame.payload)),
            other => Err(FtsError::Protocol(format!("unexpected {:?} frame from server", other))),
        }
    }

    pub fn add_document(&mut self, text: &str) -> Result<DocId> {
        let payload = self.call(Request::AddDoc(text.to_string()))?;
        decode_doc_id(&payload)
    }

    pub fn build(&mut self) -> Result<()> {
        self.call(Request::Build).map(|_| ())
    }

    pub fn search(&mut self, query: &str, limit: u32) -> Result<Vec<SearchResult>> {
        let payload = self.call(Request::Search {
            limit,
            query: query.to_string(),
        })?;
        decode_results(&payload)
    }

    pub fn stats(&mut self) -> Result<DriverStats> {
        let payload = self.call(Request::Stats)?;
        decode_stats(&payload)
    }

    /// End the session; the server closes the connection
    pub fn close(mut self) -> Result<()> {
        self.call(Request::Close).map(|_| ())
    }
}
