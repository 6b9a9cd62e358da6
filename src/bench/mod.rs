//! Driver benchmark harness.
//!
//! Each selected driver is opened from a [`DriverRegistry`](crate::driver::DriverRegistry),
//! fed the corpus, then measured for cold start, indexing throughput, index
//! size, query latency percentiles and QPS at several concurrency levels.
//! Results land in a [`Report`] written as Markdown, JSON or CSV.

pub mod corpus;
pub mod report;
pub mod runner;

pub use corpus::{load_queries, Corpus};
pub use report::{DriverResult, LatencyStats, Report, ReportFormat, Throughput};
pub use runner::{BenchConfig, BenchRunner};
