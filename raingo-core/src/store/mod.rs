//! Record stores and the two-tier adapter the pipeline and resolver share.
//!
//! The local store is a private cache that the core writes to; the
//! authoritative store is the shared system of record and is only read.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::Record;

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Number of records in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exact(u64),
    /// Estimate from store statistics; may lag recent inserts.
    Approximate(u64),
}

impl Count {
    pub fn value(self) -> u64 {
        match self {
            Count::Exact(n) | Count::Approximate(n) => n,
        }
    }

    pub fn is_exact(self) -> bool {
        matches!(self, Count::Exact(_))
    }
}

/// A keyed collection of records.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn find_by_digest(&self, digest: &str) -> Result<Option<Record>>;

    /// Inserts every record whose digest is not yet present, as one bulk write.
    ///
    /// The existence check and the insert happen atomically with respect to
    /// other callers, and a digest repeated within `records` is only inserted
    /// once. Returns the number of records inserted.
    async fn insert_if_absent(&self, records: &[Record]) -> Result<usize>;

    /// Records in store-native order starting at `offset`.
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Record>>;

    async fn count(&self) -> Result<Count>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTier {
    Local,
    Authoritative,
}

impl fmt::Display for StoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTier::Local => f.write_str("local"),
            StoreTier::Authoritative => f.write_str("authoritative"),
        }
    }
}

/// Outcome of a deduplicated insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Records handed to the store.
    pub attempted: usize,
    /// Records actually written (not already present).
    pub inserted: usize,
    /// Bulk writes issued.
    pub batches: usize,
}

impl InsertReport {
    pub fn skipped(&self) -> usize {
        self.attempted - self.inserted
    }

    pub fn merge(&mut self, other: InsertReport) {
        self.attempted += other.attempted;
        self.inserted += other.inserted;
        self.batches += other.batches;
    }
}

/// The local and authoritative stores behind one interface.
#[derive(Clone)]
pub struct Stores {
    local: Arc<dyn Store>,
    authoritative: Arc<dyn Store>,
}

impl Stores {
    pub fn new(local: Arc<dyn Store>, authoritative: Arc<dyn Store>) -> Self {
        Self { local, authoritative }
    }

    pub fn get(&self, tier: StoreTier) -> &Arc<dyn Store> {
        match tier {
            StoreTier::Local => &self.local,
            StoreTier::Authoritative => &self.authoritative,
        }
    }

    pub fn local(&self) -> &Arc<dyn Store> {
        &self.local
    }

    pub fn authoritative(&self) -> &Arc<dyn Store> {
        &self.authoritative
    }

    pub async fn find_by_digest(&self, tier: StoreTier, digest: &str) -> Result<Option<Record>> {
        self.get(tier).find_by_digest(digest).await
    }

    /// Writes `records` into the local store, skipping digests it already holds.
    ///
    /// Records are committed in bulk writes of at most `batch_threshold`;
    /// the remainder is written at the end. Only the local store is checked
    /// for duplicates. Stops at the first failing write.
    pub async fn insert_deduped(
        &self,
        records: &[Record],
        batch_threshold: usize,
    ) -> Result<InsertReport> {
        let (report, failure) = self.insert_deduped_partial(records, batch_threshold).await;
        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Like [`Stores::insert_deduped`], but a failing write still returns the
    /// report of the bulk writes committed before it.
    pub async fn insert_deduped_partial(
        &self,
        records: &[Record],
        batch_threshold: usize,
    ) -> (InsertReport, Option<Error>) {
        let threshold = batch_threshold.max(1);
        let chunks = records.len().div_ceil(threshold);
        let mut report = InsertReport::default();

        for (i, chunk) in records.chunks(threshold).enumerate() {
            let inserted = match self.local.insert_if_absent(chunk).await {
                Ok(inserted) => inserted,
                Err(e) => return (report, Some(e)),
            };
            report.attempted += chunk.len();
            report.inserted += inserted;
            report.batches += 1;
            info!("Inserted {} of {} entries", batch_label(i, chunks), inserted);
        }

        debug!(
            attempted = report.attempted,
            inserted = report.inserted,
            skipped = report.skipped(),
            "deduplicated insert finished"
        );
        (report, None)
    }

    /// One page of records; page 1 starts at offset zero. Page 0 is treated as page 1,
    /// and a page past any addressable offset is empty.
    pub async fn list_page(
        &self,
        tier: StoreTier,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Record>> {
        match page.saturating_sub(1).checked_mul(page_size) {
            Some(offset) => self.get(tier).list(offset, page_size).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn count(&self, tier: StoreTier) -> Result<Count> {
        self.get(tier).count().await
    }
}

fn batch_label(index: usize, chunks: usize) -> &'static str {
    if index + 1 == chunks { "final batch" } else { "batch" }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::digest::AlgorithmKind;
    use crate::record::digest_all;

    /// Local store that rejects its second bulk write.
    struct SecondWriteFails {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl Store for SecondWriteFails {
        fn name(&self) -> &str {
            "local"
        }
        async fn find_by_digest(&self, digest: &str) -> Result<Option<Record>> {
            self.inner.find_by_digest(digest).await
        }
        async fn insert_if_absent(&self, records: &[Record]) -> Result<usize> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(Error::store("local", "disk full"));
            }
            self.inner.insert_if_absent(records).await
        }
        async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
            self.inner.list(offset, limit).await
        }
        async fn count(&self) -> Result<Count> {
            self.inner.count().await
        }
    }

    fn stores() -> Stores {
        Stores::new(Arc::new(MemoryStore::new("local")), Arc::new(MemoryStore::new("authoritative")))
    }

    #[test]
    fn test_count_value() {
        assert_eq!(Count::Exact(3).value(), 3);
        assert_eq!(Count::Approximate(7).value(), 7);
        assert!(!Count::Approximate(7).is_exact());
    }

    #[tokio::test]
    async fn test_insert_deduped_twice() {
        let stores = stores();
        let records: Vec<Record> = ["a", "b", "c"].iter().flat_map(|p| digest_all(p)).collect();

        let first = stores.insert_deduped(&records, 1000).await.unwrap();
        assert_eq!(first.attempted, 12);
        assert_eq!(first.inserted, 12);

        let second = stores.insert_deduped(&records, 1000).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped(), 12);

        assert_eq!(stores.count(StoreTier::Local).await.unwrap(), Count::Exact(12));
        assert_eq!(stores.count(StoreTier::Authoritative).await.unwrap(), Count::Exact(0));
    }

    #[tokio::test]
    async fn test_insert_deduped_batches() {
        let stores = stores();
        let records: Vec<Record> =
            (0..25).map(|i| Record::compute(&format!("pw{i}"), AlgorithmKind::Md5)).collect();

        let report = stores.insert_deduped(&records, 10).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.inserted, 25);
    }

    #[tokio::test]
    async fn test_insert_deduped_within_one_call() {
        let stores = stores();
        let mut records = digest_all("abc").to_vec();
        records.extend(digest_all("abc"));

        let report = stores.insert_deduped(&records, 1000).await.unwrap();
        assert_eq!(report.attempted, 8);
        assert_eq!(report.inserted, 4);
    }

    #[tokio::test]
    async fn test_list_page_offsets() {
        let stores = stores();
        let records: Vec<Record> =
            (0..25).map(|i| Record::compute(&format!("pw{i:02}"), AlgorithmKind::Sha1)).collect();
        stores.insert_deduped(&records, 1000).await.unwrap();

        let page1 = stores.list_page(StoreTier::Local, 1, 10).await.unwrap();
        assert_eq!(page1.len(), 10);
        assert_eq!(page1[0].plaintext, "pw00");

        let page3 = stores.list_page(StoreTier::Local, 3, 10).await.unwrap();
        assert_eq!(page3.len(), 5);
        assert_eq!(page3[0].plaintext, "pw20");

        let page0 = stores.list_page(StoreTier::Local, 0, 10).await.unwrap();
        assert_eq!(page0, page1);

        assert!(stores.list_page(StoreTier::Local, 4, 10).await.unwrap().is_empty());
        assert!(stores.list_page(StoreTier::Authoritative, 1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_page_far_past_the_end() {
        let stores = stores();
        stores.insert_deduped(&digest_all("abc"), 1000).await.unwrap();

        assert!(stores.list_page(StoreTier::Local, usize::MAX, 10).await.unwrap().is_empty());
        assert!(stores.list_page(StoreTier::Local, usize::MAX / 2, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_insert_reports_committed_chunks() {
        let local = Arc::new(SecondWriteFails { inner: MemoryStore::new("local"), writes: AtomicUsize::new(0) });
        let stores = Stores::new(local.clone(), Arc::new(MemoryStore::new("authoritative")));
        let records: Vec<Record> = ["a", "b", "c"].iter().flat_map(|p| digest_all(p)).collect();

        let (report, failure) = stores.insert_deduped_partial(&records, 4).await;
        assert!(failure.is_some_and(|e| e.is_store()));
        assert_eq!(report, InsertReport { attempted: 4, inserted: 4, batches: 1 });
        assert_eq!(local.count().await.unwrap(), Count::Exact(4));

        assert!(stores.insert_deduped(&records, 4).await.is_ok());
    }

    #[test]
    fn test_batch_label() {
        // 3000 records at 1000: the third chunk is full but still the last
        assert_eq!(batch_label(0, 3), "batch");
        assert_eq!(batch_label(1, 3), "batch");
        assert_eq!(batch_label(2, 3), "final batch");
        assert_eq!(batch_label(0, 1), "final batch");
    }
}
