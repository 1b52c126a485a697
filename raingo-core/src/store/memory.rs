use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Count, Store};
use crate::error::Result;
use crate::record::Record;

/// Insertion-ordered records with a digest index.
#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    records: Vec<Record>,
    by_digest: HashMap<String, usize>,
}

impl RecordIndex {
    pub(crate) fn get(&self, digest: &str) -> Option<&Record> {
        self.by_digest.get(digest).map(|&i| &self.records[i])
    }

    /// The records from `candidates` whose digest is neither stored nor
    /// repeated earlier in `candidates`.
    pub(crate) fn absent<'a>(&self, candidates: &'a [Record]) -> Vec<&'a Record> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|r| !self.by_digest.contains_key(&r.digest) && seen.insert(r.digest.as_str()))
            .collect()
    }

    /// Appends without a duplicate check; lookups keep returning the first occurrence.
    pub(crate) fn push(&mut self, record: Record) {
        self.by_digest.entry(record.digest.clone()).or_insert(self.records.len());
        self.records.push(record);
    }

    pub(crate) fn page(&self, offset: usize, limit: usize) -> Vec<Record> {
        self.records.iter().skip(offset).take(limit).cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Process-local store.
///
/// Useful as a local cache, as a stand-in authoritative store, and in tests.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    index: RwLock<RecordIndex>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), index: RwLock::new(RecordIndex::default()) }
    }

    /// A store preloaded with `records`, kept as given (duplicates included).
    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let mut index = RecordIndex::default();
        for record in records {
            index.push(record);
        }
        Self { name: name.into(), index: RwLock::new(index) }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<Record>> {
        Ok(self.index.read().await.get(digest).cloned())
    }

    async fn insert_if_absent(&self, records: &[Record]) -> Result<usize> {
        let mut index = self.index.write().await;
        let fresh: Vec<Record> = index.absent(records).into_iter().cloned().collect();
        let inserted = fresh.len();
        for record in fresh {
            index.push(record);
        }
        Ok(inserted)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
        Ok(self.index.read().await.page(offset, limit))
    }

    async fn count(&self) -> Result<Count> {
        Ok(Count::Exact(self.index.read().await.len() as u64))
    }
}
