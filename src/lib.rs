//! # Civitas
//!
//! Aggregates U.S. legislative, judicial, and executive records (Congress
//! and state bills, Supreme Court opinions, executive orders) into SQLite,
//! links the legal citations inside them, and serves ranked full-text search
//! over all of it through a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │ Connectors       │──▶│ Ingest           │──▶│ SQLite        │
//! │ Congress/FR/     │   │ dedup, citations │   │ tables + FTS5 │
//! │ OpenStates/CA/   │   │ checkpoints      │   │ citations     │
//! │ SCOTUS           │   └──────────────────┘   └──────┬────────┘
//! └──────────────────┘                                 │
//!                            ┌─────────────────────────┤
//!                            ▼                         ▼
//!                       ┌──────────┐             ┌──────────┐
//!                       │   CLI    │             │   HTTP   │
//!                       │  (civ)   │             │  (axum)  │
//!                       └──────────┘             └──────────┘
//! ```
//!
//! Parsing, ranking, and the store contract live in `civitas-core`; this
//! crate supplies I/O.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`activity`] | Retried activities |
//! | [`http`] | JSON over HTTP with classified failures |
//! | [`traits`] | `Connector` trait and registry |
//! | [`connector_congress`] | Congress.gov bills |
//! | [`connector_federal_register`] | Executive orders |
//! | [`connector_openstates`] | State legislature bills |
//! | [`connector_california`] | California leginfo bulk export |
//! | [`connector_scotus`] | Supreme Court slip opinions on disk |
//! | [`ingest`] | Sync pipeline |
//! | [`citations`] | Citation indexing and graph queries |
//! | [`summarize`] | Plain-language summaries |
//! | [`search`] | Search frontend |
//! | [`get`] | Record retrieval and listing |
//! | [`stats`] | Database statistics |
//! | [`sources`] | Connector health |
//! | [`server`] | HTTP API |

pub mod activity;
pub mod citations;
pub mod config;
pub mod connector_california;
pub mod connector_congress;
pub mod connector_federal_register;
pub mod connector_openstates;
pub mod connector_scotus;
pub mod db;
pub mod get;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
pub mod summarize;
pub mod traits;
