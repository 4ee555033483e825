//! graze, a feed aggregation daemon.
//!
//! Rotates through subscribed RSS feeds on a fixed cadence, fetches and
//! parses each one, and persists new posts exactly once into a shared
//! SQLite store. See [`ingest`] for the core loop and [`storage`] for the
//! persisted model.

pub mod config;
pub mod ingest;
pub mod storage;
