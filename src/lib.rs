//! Extracts answer-engine and geo-search signals from a crawled site and
//! aggregates them into one audit record.

pub mod aggregate;
pub mod audit;
pub mod competitors;
pub mod config;
pub mod crawler;
pub mod db;
pub mod engine;
pub mod error;
pub mod parser;
pub mod types;

pub use audit::{run_audit, AuditReport, AuditTarget};
pub use config::{EngineConfig, HeuristicConfig, Heuristics, Settings};
pub use crawler::{Crawler, JsonFileCrawler, PageFile, StaticCrawler};
pub use db::{AuditStore, MemoryStore, SqliteStore};
pub use engine::Engine;
pub use error::{ConfigError, ExtractError};
pub use types::{AuditRecord, PageSignals, RawPage, SignalBundle};
