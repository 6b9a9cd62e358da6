use crate::error::{FtsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sequential document identifier, assigned in insertion order from 0
pub type DocId = u32;

/// Storage/performance profile, fixed for the lifetime of a builder/index pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Profile {
    /// Raw `(doc_id, freq)` records in a hash map keyed by term hash
    Speed = 0,
    /// VByte delta-coded posting lists in one contiguous block
    #[default]
    Balanced = 1,
    /// Elias-Fano doc ids, byte frequencies, FST term dictionary
    Compact = 2,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Speed, Profile::Balanced, Profile::Compact];

    /// Profile id as stored in segment headers and passed across the native boundary
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Profile::Speed),
            1 => Some(Profile::Balanced),
            2 => Some(Profile::Compact),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Profile::Speed => "speed",
            Profile::Balanced => "balanced",
            Profile::Compact => "compact",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = FtsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "speed" => Ok(Profile::Speed),
            "balanced" => Ok(Profile::Balanced),
            "compact" => Ok(Profile::Compact),
            other => Err(FtsError::InvalidArgument(format!("unknown profile: {}", other))),
        }
    }
}

/// One (term, document) occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u16,
}

/// Per-term dictionary entry; `P` is the profile-specific posting encoding.
///
/// `idf` is computed once when the builder is finalized, from the final
/// document count and this term's document frequency.
#[derive(Debug, Clone)]
pub struct TermData<P> {
    pub doc_freq: u32,
    pub idf: f32,
    pub postings: P,
}

/// Per-document metadata used for BM25 length normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocMeta {
    /// Token count
    pub length: u32,
}

/// Search hit. `#[repr(C)]` because the foreign-call surface writes these
/// records directly into caller-supplied buffers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: f32,
}

/// Driver-level statistics, shared by the native ABI and the wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct DriverStats {
    pub doc_count: u32,
    pub term_count: u32,
    pub memory_bytes: u64,
}

/// Detailed statistics of one index
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub profile: Profile,
    pub doc_count: u32,
    pub term_count: u32,
    pub posting_count: u64,
    pub total_tokens: u64,
    /// Approximate in-memory footprint of the whole index
    pub memory_bytes: u64,
    /// Bytes spent on posting lists alone (doc ids + frequencies)
    pub postings_bytes: u64,
}

impl IndexStats {
    /// Average encoded size of one posting, in bits
    pub fn bits_per_posting(&self) -> f64 {
        if self.posting_count == 0 {
            0.0
        } else {
            (self.postings_bytes * 8) as f64 / self.posting_count as f64
        }
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_count == 0 {
            0.0
        } else {
            self.total_tokens as f64 / self.doc_count as f64
        }
    }
}

impl From<IndexStats> for DriverStats {
    fn from(stats: IndexStats) -> Self {
        DriverStats {
            doc_count: stats.doc_count,
            term_count: stats.term_count,
            memory_bytes: stats.memory_bytes,
        }
    }
}

/// Lifecycle phase of an index or driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Building,
    Built,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_ids() {
        for profile in Profile::ALL {
            assert_eq!(Profile::from_id(profile.id()), Some(profile));
            assert_eq!(profile.name().parse::<Profile>().unwrap(), profile);
        }
        assert_eq!(Profile::from_id(9), None);
        assert!("fastest".parse::<Profile>().is_err());
        assert_eq!("COMPACT".parse::<Profile>().unwrap(), Profile::Compact);
    }

    #[test]
    fn test_profile_serde() {
        let json = serde_json::to_string(&Profile::Speed).unwrap();
        assert_eq!(json, "\"speed\"");
    }

    #[test]
    fn test_search_result_layout() {
        assert_eq!(std::mem::size_of::<SearchResult>(), 8);
        assert_eq!(std::mem::size_of::<DriverStats>(), 16);
    }

    #[test]
    fn test_bits_per_posting() {
        let stats = IndexStats {
            posting_count: 4,
            postings_bytes: 6,
            ..Default::default()
        };
        assert_eq!(stats.bits_per_posting(), 12.0);
        assert_eq!(IndexStats::default().bits_per_posting(), 0.0);
    }
}
