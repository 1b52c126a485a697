//! The entry points a front end calls.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::lookup::{HttpResolver, Resolver};
use crate::pipeline::{self, NoopObserver, PipelineHandle, PipelineObserver, PipelineSettings};
use crate::record::Record;
use crate::resolve::{self, Resolution};
use crate::stats::{HashStats, ResolutionStats};
use crate::store::{InsertReport, JsonlStore, MemoryStore, Store, StoreTier, Stores};

/// Everything a pipeline run or a resolution needs.
pub struct Context {
    pub stores: Stores,
    pub resolver: Arc<dyn Resolver>,
    pub observer: Arc<dyn PipelineObserver>,
    pub stats: ResolutionStats,
    pub config: Config,
}

/// Hashing, resolution and browsing over one local and one authoritative store.
///
/// Cheap to clone; clones share stores, resolver and statistics.
#[derive(Clone)]
pub struct Service {
    ctx: Arc<Context>,
}

impl Service {
    pub fn new(stores: Stores, resolver: Arc<dyn Resolver>, config: Config) -> Self {
        Self::with_observer(stores, resolver, Arc::new(NoopObserver), config)
    }

    pub fn with_observer(
        stores: Stores,
        resolver: Arc<dyn Resolver>,
        observer: Arc<dyn PipelineObserver>,
        config: Config,
    ) -> Self {
        Self::assemble(stores, resolver, observer, ResolutionStats::new(), config)
    }

    fn assemble(
        stores: Stores,
        resolver: Arc<dyn Resolver>,
        observer: Arc<dyn PipelineObserver>,
        stats: ResolutionStats,
        config: Config,
    ) -> Self {
        let ctx = Context { stores, resolver, observer, stats, config };
        Self { ctx: Arc::new(ctx) }
    }

    /// Opens the stores named in `config` (in-memory when unset), the HTTP
    /// resolver, and the statistics saved by an earlier run.
    pub async fn open(config: Config, observer: Arc<dyn PipelineObserver>) -> Result<Self> {
        config.validate()?;

        let local: Arc<dyn Store> = match &config.local_store {
            Some(path) => Arc::new(JsonlStore::open("local", path).await?),
            None => Arc::new(MemoryStore::new("local")),
        };
        let authoritative: Arc<dyn Store> = match &config.authoritative_store {
            Some(path) => {
                Arc::new(JsonlStore::open("authoritative", path).await?.with_approximate_count())
            }
            None => Arc::new(MemoryStore::new("authoritative")),
        };
        let resolver = Arc::new(HttpResolver::new(&config.lookup)?);

        let stats = match config.stats_path() {
            Some(path) => match HashStats::load(&path).await {
                Ok(Some(snapshot)) => ResolutionStats::from_snapshot(snapshot),
                Ok(None) => ResolutionStats::new(),
                Err(e) => {
                    warn!("ignoring unreadable stats file {}: {}", path.display(), e);
                    ResolutionStats::new()
                }
            },
            None => ResolutionStats::new(),
        };

        info!(local = local.name(), authoritative = authoritative.name(), "stores ready");
        let stores = Stores::new(local, authoritative);
        Ok(Self::assemble(stores, resolver, observer, stats, config))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn stores(&self) -> &Stores {
        &self.ctx.stores
    }

    /// Hash `plaintexts` in the background and persist the results to the local store.
    pub fn start_hashing(&self, plaintexts: Vec<String>) -> PipelineHandle {
        pipeline::spawn(
            self.ctx.stores.clone(),
            PipelineSettings::from(&self.ctx.config),
            Arc::clone(&self.ctx.observer),
            plaintexts,
        )
    }

    pub async fn resolve(&self, digest: &str) -> Resolution {
        let ctx = &self.ctx;
        resolve::resolve(&ctx.stores, ctx.resolver.as_ref(), &ctx.stats, digest).await
    }

    /// Plaintext for `digest`, or `"Failed"`.
    pub async fn resolve_legacy(&self, digest: &str) -> String {
        self.resolve(digest).await.into_legacy()
    }

    /// Deduplicated insert of caller supplied records into the local store.
    pub async fn add_entries(&self, records: &[Record]) -> Result<InsertReport> {
        self.ctx.stores.insert_deduped(records, self.ctx.config.bulk_batch_size).await
    }

    pub async fn list_entries(&self, page: usize, tier: StoreTier) -> Result<Vec<Record>> {
        self.ctx.stores.list_page(tier, page, self.ctx.config.page_size).await
    }

    /// Number of records in `tier`; may be an estimate for the authoritative store.
    pub async fn total_entries(&self, tier: StoreTier) -> Result<u64> {
        Ok(self.ctx.stores.count(tier).await?.value())
    }

    pub fn stats(&self) -> HashStats {
        self.ctx.stats.snapshot()
    }

    /// Writes the current statistics to the configured stats file, if any.
    pub async fn save_stats(&self) -> Result<()> {
        match self.ctx.config.stats_path() {
            Some(path) => self.stats().save(path).await,
            None => Ok(()),
        }
    }
}
