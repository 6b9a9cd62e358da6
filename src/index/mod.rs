//! Index building and storage profiles.
//!
//! - [`speed`] - raw postings in a hash map
//! - [`balanced`] - VByte delta-coded postings in one block
//! - [`compact`] - FST dictionary with Elias-Fano postings
//! - [`segment`] - immutable memory-mapped segment files
//! - [`engine`] - [`FtsIndex`], the lifecycle-checked front end

pub mod accumulator;
pub mod balanced;
pub mod compact;
pub mod engine;
pub mod segment;
pub mod speed;
pub mod types;

pub use engine::{AnyBuilder, AnyIndex, FtsIndex};
pub use segment::{write_segment, Segment, SegmentData};
pub use types::*;
