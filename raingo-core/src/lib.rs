//! Bulk password hashing and digest reverse lookup.
//!
//! Two jobs share one pair of record stores:
//!
//! - **Hashing.** A list of plaintexts is fanned out over a fixed pool of
//!   workers. Each plaintext is hashed with MD5, SHA1, SHA256 and
//!   RIPEMD-160, and the resulting records are written to the local store in
//!   deduplicated batches.
//! - **Resolution.** A digest is looked up in the local store, then the
//!   authoritative store, then (for 32 and 40 character digests) an external
//!   lookup service. Plaintexts found externally are cached in the local
//!   store.
//!
//! # Stores
//!
//! The local store is a private cache: the only one the library writes to,
//! and the only one checked for duplicates. The authoritative store is the
//! shared system of record and is read-only here. Both sit behind the
//! [`Store`] trait; [`MemoryStore`] and [`JsonlStore`] are provided.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use raingo_core::{Config, NoopObserver, Service, StoreTier};
//!
//! # async fn run() -> raingo_core::Result<()> {
//! let service = Service::open(Config::from_env()?, Arc::new(NoopObserver)).await?;
//!
//! let summary = service.start_hashing(vec!["hunter2".into()]).wait().await?;
//! println!("{} new records", summary.drain.inserted);
//!
//! println!("{}", service.resolve_legacy("2ab96390c7dbe3439de74d0c9b0b1767").await);
//! println!("{} records cached", service.total_entries(StoreTier::Local).await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod service;
pub mod stats;
pub mod store;

pub use config::{Config, LookupConfig};
pub use digest::{AlgorithmKind, digest, to_hex};
pub use error::{Error, Result};
pub use lookup::{HttpResolver, LookupKind, Resolver};
pub use pipeline::{
    DrainReport, NoopObserver, PipelineHandle, PipelineObserver, PipelineSettings, RunSummary,
};
pub use record::{Record, digest_all};
pub use resolve::{FailureReason, Resolution, Tier};
pub use service::{Context, Service};
pub use stats::{HashStats, ResolutionStats};
pub use store::{Count, InsertReport, JsonlStore, MemoryStore, Store, StoreTier, Stores};
