//! Utility functions and data structures.
//!
//! This module provides shared utilities used throughout fts:
//!
//! ## Modules
//!
//! - [`app_data`] - Configuration file and data directory management
//! - [`encoding`] - Little-endian integer helpers for segment and wire formats
//! - [`progress`] - Progress bars (no-op without the `progress` feature)
//! - [`tokenizer`] - Term extraction, hashing and per-document term frequency
//!
//! ## Key Functions
//!
//! ```no_run
//! use fts::utils::{tokenize, query_terms};
//!
//! let doc = tokenize("Hello hello world");
//! // doc.length == 3, two distinct tokens
//!
//! let terms = query_terms("Hello World");
//! // Returns: ["hello", "world"]
//! ```

pub mod app_data;
pub mod encoding;
pub mod progress;
pub mod tokenizer;

pub use app_data::*;
pub use encoding::*;
pub use tokenizer::*;
