//! # Civitas Core
//!
//! Shared, I/O-free logic for Civitas: record models, legal citation
//! parsing, opinion authorship extraction, FTS5 query building, ranking,
//! retry policy, extractive summaries, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Everything here is exercised directly by unit tests and by the
//! `civitas` application crate.

pub mod authors;
pub mod citation;
pub mod fts;
pub mod models;
pub mod retry;
pub mod search;
pub mod store;
pub mod summary;
