//! Integer and dictionary codecs used by the storage profiles.
//!
//! - [`vbyte`] - variable-byte integers with delta coding for posting lists
//! - [`elias_fano`] - quasi-succinct monotone sequences with random access
//! - [`fst`] - sorted term dictionary (compacted trie with partial outputs)

pub mod elias_fano;
pub mod fst;
pub mod vbyte;

pub use elias_fano::{EliasFano, EliasFanoIter};
pub use fst::{Fst, FstBuilder};
