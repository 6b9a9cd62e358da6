//! Binary wire protocol between the IPC driver and the index server
//!
//! Every message is a 5-byte header followed by the payload:
//! - 1 byte: message type
//! - 4 bytes (little-endian u32): payload length
//!
//! Payloads:
//! - `AddDoc`: UTF-8 text; response `u32 doc_id`
//! - `Build`, `Close`: empty; response empty
//! - `Search`: `u32 limit` + UTF-8 query; response `u32 count` + `count x (u32 doc_id, u32 score_bits)`
//! - `Stats`: empty; response `u32 doc_count, u32 term_count, u64 memory_bytes`
//! - `Error`: `u8 kind` + UTF-8 message

use crate::error::{FtsError, Result};
use crate::index::types::{DriverStats, SearchResult};
use crate::utils::{u32_at, u64_at};
use std::io::{self, Read, Write};

pub const HEADER_LEN: usize = 5;

/// Largest accepted payload
pub const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    AddDoc = 1,
    Build = 2,
    Search = 3,
    Stats = 4,
    Close = 5,
    Response = 128,
    Error = 129,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => MessageType::AddDoc,
            2 => MessageType::Build,
            3 => MessageType::Search,
            4 => MessageType::Stats,
            5 => MessageType::Close,
            128 => MessageType::Response,
            129 => MessageType::Error,
            _ => return None,
        })
    }
}

/// One framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageType,
    pub payload: Vec<u8>,
}

/// Write a frame and flush
pub fn write_frame<W: Write>(writer: &mut W, kind: MessageType, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Message too large"));
    }
    let mut header = [0u8; HEADER_LEN];
    header[0] = kind as u8;
    header[1..].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    writer.write_all(&header)?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one frame
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Frame> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;

    let kind = MessageType::from_byte(header[0]).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown message type {}", header[0]),
        )
    })?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;

    // Sanity check before allocating
    if len > MAX_PAYLOAD {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "Message too large"));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Frame { kind, payload })
}

/// Request from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    AddDoc(String),
    Build,
    Search { limit: u32, query: String },
    Stats,
    Close,
}

impl Request {
    pub fn encode(&self) -> (MessageType, Vec<u8>) {
        match self {
            Request::AddDoc(text) => (MessageType::AddDoc, text.as_bytes().to_vec()),
            Request::Build => (MessageType::Build, Vec::new()),
            Request::Search { limit, query } => {
                let mut payload = Vec::with_capacity(4 + query.len());
                payload.extend_from_slice(&limit.to_le_bytes());
                payload.extend_from_slice(query.as_bytes());
                (MessageType::Search, payload)
            }
            Request::Stats => (MessageType::Stats, Vec::new()),
            Request::Close => (MessageType::Close, Vec::new()),
        }
    }

    pub fn decode(frame: Frame) -> Result<Self> {
        Ok(match frame.kind {
            MessageType::AddDoc => Request::AddDoc(utf8(frame.payload)?),
            MessageType::Build => Request::Build,
            MessageType::Search => {
                let limit = u32_at(&frame.payload, 0)
                    .ok_or_else(|| FtsError::Protocol("search payload too short".into()))?;
                let query = utf8(frame.payload[4..].to_vec())?;
                Request::Search { limit, query }
            }
            MessageType::Stats => Request::Stats,
            MessageType::Close => Request::Close,
            MessageType::Response | MessageType::Error => {
                return Err(FtsError::Protocol(format!(
                    "unexpected {:?} frame from client",
                    frame.kind
                )));
            }
        })
    }
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| FtsError::Protocol(format!("invalid UTF-8: {}", e)))
}

pub fn encode_doc_id(doc_id: u32) -> Vec<u8> {
    doc_id.to_le_bytes().to_vec()
}

pub fn decode_doc_id(payload: &[u8]) -> Result<u32> {
    u32_at(payload, 0).ok_or_else(|| FtsError::Protocol("missing doc id".into()))
}

pub fn encode_results(results: &[SearchResult]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + results.len() * 8);
    payload.extend_from_slice(&(results.len() as u32).to_le_bytes());
    for r in results {
        payload.extend_from_slice(&r.doc_id.to_le_bytes());
        payload.extend_from_slice(&r.score.to_bits().to_le_bytes());
    }
    payload
}

pub fn decode_results(payload: &[u8]) -> Result<Vec<SearchResult>> {
    let count = u32_at(payload, 0)
        .ok_or_else(|| FtsError::Protocol("missing result count".into()))? as usize;
    if payload.len() != 4 + count * 8 {
        return Err(FtsError::Protocol(format!(
            "result payload of {} bytes does not hold {} hits",
            payload.len(),
            count
        )));
    }
    Ok(payload[4..]
        .chunks_exact(8)
        .map(|chunk| SearchResult {
            doc_id: u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            score: f32::from_bits(u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]])),
        })
        .collect())
}

pub fn encode_stats(stats: &DriverStats) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&stats.doc_count.to_le_bytes());
    payload.extend_from_slice(&stats.term_count.to_le_bytes());
    payload.extend_from_slice(&stats.memory_bytes.to_le_bytes());
    payload
}

pub fn decode_stats(payload: &[u8]) -> Result<DriverStats> {
    match (u32_at(payload, 0), u32_at(payload, 4), u64_at(payload, 8)) {
        (Some(doc_count), Some(term_count), Some(memory_bytes)) => Ok(DriverStats {
            doc_count,
            term_count,
            memory_bytes,
        }),
        _ => Err(FtsError::Protocol("stats payload too short".into())),
    }
}

const ERR_OTHER: u8 = 0;
const ERR_ALREADY_BUILT: u8 = 1;
const ERR_NOT_BUILT: u8 = 2;
const ERR_CLOSED: u8 = 3;

/// Error payload; lifecycle errors keep their identity across the wire
pub fn encode_error(err: &FtsError) -> Vec<u8> {
    let kind = match err {
        FtsError::AlreadyBuilt => ERR_ALREADY_BUILT,
        FtsError::NotBuilt => ERR_NOT_BUILT,
        FtsError::Closed => ERR_CLOSED,
        _ => ERR_OTHER,
    };
    let message = err.to_string();
    let mut payload = Vec::with_capacity(1 + message.len());
    payload.push(kind);
    payload.extend_from_slice(message.as_bytes());
    payload
}

pub fn decode_error(payload: &[u8]) -> FtsError {
    match payload.first() {
        Some(&ERR_ALREADY_BUILT) => FtsError::AlreadyBuilt,
        Some(&ERR_NOT_BUILT) => FtsError::NotBuilt,
        Some(&ERR_CLOSED) => FtsError::Closed,
        _ => FtsError::Remote(String::from_utf8_lossy(payload.get(1..).unwrap_or_default()).into_owned()),
    }
}
