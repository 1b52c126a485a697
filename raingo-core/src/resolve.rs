//! Digest to plaintext resolution across the local store, the authoritative
//! store and the external lookup service, cheapest tier first.

use std::fmt;

use tracing::{debug, error, warn};

use crate::lookup::{LookupKind, Resolver};
use crate::record::Record;
use crate::stats::ResolutionStats;
use crate::store::{StoreTier, Stores};

/// Placeholder the lookup service returns for junk queries; never a real answer.
pub const EXCLUDED_PLACEHOLDER: &str = "password";

/// String returned by [`Resolution::into_legacy`] for any failure.
pub const LEGACY_FAILURE: &str = "Failed";

/// Where a plaintext was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Authoritative,
    External,
}

impl From<StoreTier> for Tier {
    fn from(tier: StoreTier) -> Self {
        match tier {
            StoreTier::Local => Tier::Local,
            StoreTier::Authoritative => Tier::Authoritative,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The digest length matches no lookup path.
    UnknownAlgorithm,
    /// The lookup ran but produced nothing usable.
    LookupMiss,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnknownAlgorithm => f.write_str("unknown algorithm"),
            FailureReason::LookupMiss => f.write_str("lookup miss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { plaintext: String, tier: Tier },
    Failed { reason: FailureReason },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    pub fn plaintext(&self) -> Option<&str> {
        match self {
            Resolution::Found { plaintext, .. } => Some(plaintext),
            Resolution::Failed { .. } => None,
        }
    }

    /// The plaintext, or the literal `"Failed"` for callers that still expect
    /// the old string contract.
    pub fn into_legacy(self) -> String {
        match self {
            Resolution::Found { plaintext, .. } => plaintext,
            Resolution::Failed { .. } => LEGACY_FAILURE.to_string(),
        }
    }
}

/// Resolves `digest`, recording the outcome in `stats`.
///
/// Tiers are tried strictly in order and the first hit wins. Only a plaintext
/// found by `resolver` is written back to the local store.
pub async fn resolve(
    stores: &Stores,
    resolver: &dyn Resolver,
    stats: &ResolutionStats,
    digest: &str,
) -> Resolution {
    let resolution = resolve_inner(stores, resolver, digest).await;
    stats.record(resolution.is_found());
    resolution
}

async fn resolve_inner(stores: &Stores, resolver: &dyn Resolver, digest: &str) -> Resolution {
    for tier in [StoreTier::Local, StoreTier::Authoritative] {
        match stores.find_by_digest(tier, digest).await {
            Ok(Some(record)) => {
                debug!(%digest, %tier, "resolved from store");
                return Resolution::Found { plaintext: record.plaintext, tier: tier.into() };
            }
            Ok(None) => debug!(%digest, %tier, "not in store"),
            Err(e) => warn!(%digest, %tier, "store lookup failed: {}", e),
        }
    }

    let kind = match LookupKind::classify(digest) {
        Ok(kind) => kind,
        Err(e) => {
            error!("{}", e);
            return Resolution::Failed { reason: FailureReason::UnknownAlgorithm };
        }
    };

    let plaintext = match resolver.resolve(digest, kind).await {
        Ok(Some(plaintext)) if plaintext != EXCLUDED_PLACEHOLDER => plaintext,
        Ok(Some(_)) => {
            error!(%digest, "lookup returned the placeholder result");
            return Resolution::Failed { reason: FailureReason::LookupMiss };
        }
        Ok(None) => {
            error!(%digest, "lookup found no plaintext");
            return Resolution::Failed { reason: FailureReason::LookupMiss };
        }
        Err(e) => {
            error!(%digest, "error looking up digest: {}", e);
            return Resolution::Failed { reason: FailureReason::LookupMiss };
        }
    };

    let record = Record::known(
        plaintext.clone(),
        digest,
        kind.algorithm(),
        Some(resolver.name().to_string()),
    );
    if let Err(e) = stores.local().insert_if_absent(std::slice::from_ref(&record)).await {
        warn!(%digest, "could not cache resolved plaintext: {}", e);
    }

    Resolution::Found { plaintext, tier: Tier::External }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::digest::AlgorithmKind;
    use crate::error::{Error, Result};
    use crate::store::{Count, MemoryStore, Store};

    /// Resolver returning a fixed answer and counting calls.
    struct StubResolver {
        answer: Option<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubResolver {
        fn answering(answer: Option<&'static str>) -> Self {
            Self { answer, fail: false, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { answer: None, fail: true, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolver for StubResolver {
        fn name(&self) -> &str {
            "stub"
        }

        async fn resolve(&self, digest: &str, _kind: LookupKind) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::HttpStatus { digest: digest.to_string(), status: 502 });
            }
            Ok(self.answer.map(str::to_string))
        }
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn find_by_digest(&self, _digest: &str) -> Result<Option<Record>> {
            Err(Error::store("broken", "connection reset"))
        }
        async fn insert_if_absent(&self, _records: &[Record]) -> Result<usize> {
            Err(Error::store("broken", "read-only"))
        }
        async fn list(&self, _offset: usize, _limit: usize) -> Result<Vec<Record>> {
            Err(Error::store("broken", "connection reset"))
        }
        async fn count(&self) -> Result<Count> {
            Err(Error::store("broken", "connection reset"))
        }
    }

    const PASSWORD_MD5: &str = "5f4dcc3b5aa765d61d8327deb882cf99";

    fn empty_stores() -> Stores {
        Stores::new(Arc::new(MemoryStore::new("local")), Arc::new(MemoryStore::new("authoritative")))
    }

    #[tokio::test]
    async fn test_local_hit_short_circuits() {
        let stores = empty_stores();
        stores.local().insert_if_absent(&[Record::compute("password", AlgorithmKind::Md5)]).await.unwrap();
        let resolver = StubResolver::answering(Some("other"));
        let stats = ResolutionStats::new();

        let resolution = resolve(&stores, &resolver, &stats, PASSWORD_MD5).await;
        assert_eq!(
            resolution,
            Resolution::Found { plaintext: "password".into(), tier: Tier::Local }
        );
        assert_eq!(resolver.calls(), 0);
        assert_eq!(stats.snapshot().success, 1);
    }

    #[tokio::test]
    async fn test_authoritative_hit_is_not_written_back() {
        let record = Record::compute("letmein", AlgorithmKind::Sha1);
        let stores = Stores::new(
            Arc::new(MemoryStore::new("local")),
            Arc::new(MemoryStore::with_records("authoritative", [record.clone()])),
        );
        let resolver = StubResolver::answering(None);
        let stats = ResolutionStats::new();

        let resolution = resolve(&stores, &resolver, &stats, &record.digest).await;
        assert_eq!(
            resolution,
            Resolution::Found { plaintext: "letmein".into(), tier: Tier::Authoritative }
        );
        assert_eq!(resolver.calls(), 0);
        assert_eq!(stores.local().count().await.unwrap(), Count::Exact(0));
    }

    #[tokio::test]
    async fn test_unknown_length_never_calls_resolver() {
        let stores = empty_stores();
        let resolver = StubResolver::answering(Some("x"));
        let stats = ResolutionStats::new();

        let resolution = resolve(&stores, &resolver, &stats, "0123456789").await;
        assert_eq!(resolution, Resolution::Failed { reason: FailureReason::UnknownAlgorithm });
        assert_eq!(resolver.calls(), 0);
        assert_eq!(stats.snapshot().failure, 1);
    }

    #[tokio::test]
    async fn test_placeholder_answer_is_a_miss() {
        let stores = empty_stores();
        let resolver = StubResolver::answering(Some("password"));
        let stats = ResolutionStats::new();

        let resolution = resolve(&stores, &resolver, &stats, PASSWORD_MD5).await;
        assert_eq!(resolution, Resolution::Failed { reason: FailureReason::LookupMiss });
        assert_eq!(resolver.calls(), 1);
        assert_eq!(stores.local().count().await.unwrap(), Count::Exact(0));
        assert_eq!(resolution.into_legacy(), "Failed");
    }

    #[tokio::test]
    async fn test_absent_and_error_are_misses() {
        let stores = empty_stores();
        let stats = ResolutionStats::new();
        let digest = "a".repeat(40);

        let absent = StubResolver::answering(None);
        assert_eq!(
            resolve(&stores, &absent, &stats, &digest).await,
            Resolution::Failed { reason: FailureReason::LookupMiss }
        );

        let failing = StubResolver::failing();
        assert_eq!(
            resolve(&stores, &failing, &stats, &digest).await,
            Resolution::Failed { reason: FailureReason::LookupMiss }
        );
        assert_eq!(stats.snapshot().failure, 2);
    }

    #[tokio::test]
    async fn test_external_hit_is_cached() {
        let stores = empty_stores();
        let resolver = StubResolver::answering(Some("hunter2"));
        let stats = ResolutionStats::new();
        let digest = "2ab96390c7dbe3439de74d0c9b0b1767";

        let first = resolve(&stores, &resolver, &stats, digest).await;
        assert_eq!(first, Resolution::Found { plaintext: "hunter2".into(), tier: Tier::External });

        let cached = stores.local().find_by_digest(digest).await.unwrap().unwrap();
        assert_eq!(cached.kind, AlgorithmKind::Md5);
        assert_eq!(cached.source.as_deref(), Some("stub"));

        let second = resolve(&stores, &resolver, &stats, digest).await;
        assert_eq!(second, Resolution::Found { plaintext: "hunter2".into(), tier: Tier::Local });
        assert_eq!(resolver.calls(), 1);
        assert_eq!(stats.snapshot().success, 2);
    }

    #[tokio::test]
    async fn test_store_errors_fall_through() {
        let stores = Stores::new(Arc::new(BrokenStore), Arc::new(BrokenStore));
        let resolver = StubResolver::answering(Some("hunter2"));
        let stats = ResolutionStats::new();

        // cache fill fails too, but the answer still comes back
        let resolution = resolve(&stores, &resolver, &stats, &"f".repeat(32)).await;
        assert_eq!(
            resolution,
            Resolution::Found { plaintext: "hunter2".into(), tier: Tier::External }
        );

        let none = StubResolver::answering(None);
        let resolution = resolve(&stores, &none, &stats, &"f".repeat(32)).await;
        assert_eq!(resolution.into_legacy(), LEGACY_FAILURE);
    }
}
