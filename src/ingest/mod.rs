//! The feed-ingestion core: scheduling, fetching, parsing, persistence.
//!
//! One ingestion cycle drives a single feed through fetch → stamp → parse →
//! per-item persist. The scheduler rotates cycles across all registered feeds,
//! always claiming the least-recently-fetched one:
//!
//! - [`client`] - HTTP retrieval with an identifying header and bounded body read
//! - [`parser`] - RSS 2.0 decoding and HTML-entity normalization
//! - [`pipeline`] - the cycle itself, with per-item failure isolation
//! - [`scheduler`] - the timer loop and its shutdown handling

mod client;
mod parser;
mod pipeline;
mod scheduler;

pub use client::{FetchClient, FetchError, USER_AGENT};
pub use parser::{parse, ParseError, RawFeed, RawItem};
pub use pipeline::{IngestError, IngestReport, Ingestor, ItemFailure};
pub use scheduler::{Scheduler, SchedulerError};
