//! Runtime configuration.
//!
//! Defaults match the values the hashing and lookup paths have always used;
//! every field can be overridden from a `RAINGO_*` environment variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const WORKERS_ENV: &str = "RAINGO_WORKERS";
pub const PIPELINE_BATCH_ENV: &str = "RAINGO_PIPELINE_BATCH";
pub const BULK_BATCH_ENV: &str = "RAINGO_BULK_BATCH";
pub const PAGE_SIZE_ENV: &str = "RAINGO_PAGE_SIZE";
pub const MD5_LOOKUP_URL_ENV: &str = "RAINGO_MD5_LOOKUP_URL";
pub const SHA1_LOOKUP_URL_ENV: &str = "RAINGO_SHA1_LOOKUP_URL";
pub const LOOKUP_SELECTOR_ENV: &str = "RAINGO_LOOKUP_SELECTOR";
pub const LOOKUP_TIMEOUT_ENV: &str = "RAINGO_LOOKUP_TIMEOUT_SECS";
pub const LOCAL_STORE_ENV: &str = "RAINGO_LOCAL_STORE";
pub const AUTHORITATIVE_STORE_ENV: &str = "RAINGO_AUTHORITATIVE_STORE";
pub const STATS_FILE_ENV: &str = "RAINGO_STATS_FILE";

/// Default number of hashing workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on hashing workers.
pub const MAX_WORKERS: usize = 64;

/// Records buffered by the pipeline drainer before a flush.
pub const DEFAULT_PIPELINE_BATCH: usize = 10_000;

/// Records per bulk insert inside a deduplicated insert.
pub const DEFAULT_BULK_BATCH: usize = 1_000;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Results queue capacity; raised to at least `4 * workers` at run time.
pub const DEFAULT_RESULTS_CAPACITY: usize = 4_096;

/// Settings for the external reverse lookup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    pub md5_url: String,
    pub sha1_url: String,
    /// CSS selector of the element holding the plaintext.
    pub selector: String,
    pub timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            md5_url: "https://md5.gromweb.com/".to_string(),
            sha1_url: "https://sha1.gromweb.com/".to_string(),
            selector: ".String".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workers: usize,
    pub pipeline_batch_size: usize,
    pub bulk_batch_size: usize,
    pub page_size: usize,
    pub results_capacity: usize,
    pub lookup: LookupConfig,
    pub local_store: Option<PathBuf>,
    pub authoritative_store: Option<PathBuf>,
    /// Where resolution statistics are kept between runs; see [`Config::stats_path`].
    pub stats_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            pipeline_batch_size: DEFAULT_PIPELINE_BATCH,
            bulk_batch_size: DEFAULT_BULK_BATCH,
            page_size: DEFAULT_PAGE_SIZE,
            results_capacity: DEFAULT_RESULTS_CAPACITY,
            lookup: LookupConfig::default(),
            local_store: None,
            authoritative_store: None,
            stats_file: None,
        }
    }
}

impl Config {
    /// Defaults overridden by any `RAINGO_*` variables present in the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`] but reads variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = parse_var(&var, WORKERS_ENV)? {
            config.workers = v;
        }
        if let Some(v) = parse_var(&var, PIPELINE_BATCH_ENV)? {
            config.pipeline_batch_size = v;
        }
        if let Some(v) = parse_var(&var, BULK_BATCH_ENV)? {
            config.bulk_batch_size = v;
        }
        if let Some(v) = parse_var(&var, PAGE_SIZE_ENV)? {
            config.page_size = v;
        }
        if let Some(v) = var(MD5_LOOKUP_URL_ENV) {
            config.lookup.md5_url = v;
        }
        if let Some(v) = var(SHA1_LOOKUP_URL_ENV) {
            config.lookup.sha1_url = v;
        }
        if let Some(v) = var(LOOKUP_SELECTOR_ENV) {
            config.lookup.selector = v;
        }
        if let Some(secs) = parse_var::<u64>(&var, LOOKUP_TIMEOUT_ENV)? {
            config.lookup.timeout = Duration::from_secs(secs);
        }
        config.local_store = var(LOCAL_STORE_ENV).map(PathBuf::from);
        config.authoritative_store = var(AUTHORITATIVE_STORE_ENV).map(PathBuf::from);
        config.stats_file = var(STATS_FILE_ENV).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(Error::Config { key: WORKERS_ENV, value: self.workers.to_string() });
        }
        if self.pipeline_batch_size == 0 {
            return Err(Error::Config {
                key: PIPELINE_BATCH_ENV,
                value: self.pipeline_batch_size.to_string(),
            });
        }
        if self.bulk_batch_size == 0 {
            return Err(Error::Config { key: BULK_BATCH_ENV, value: self.bulk_batch_size.to_string() });
        }
        if self.page_size == 0 {
            return Err(Error::Config { key: PAGE_SIZE_ENV, value: self.page_size.to_string() });
        }
        Ok(())
    }

    /// The stats file, defaulting to `<local store>.stats.json` next to a
    /// file-backed local store. `None` keeps statistics in memory only.
    pub fn stats_path(&self) -> Option<PathBuf> {
        self.stats_file
            .clone()
            .or_else(|| self.local_store.as_ref().map(|p| p.with_extension("stats.json")))
    }

    /// Results queue capacity for a run; every worker can always hand off a full job.
    pub fn effective_results_capacity(&self) -> usize {
        self.results_capacity.max(4 * self.workers)
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    match var(key) {
        None => Ok(None),
        Some(raw) => {
            raw.trim().parse().map(Some).map_err(|_| Error::Config { key, value: raw })
        }
    }
}
