//! Whole-request result memoization.
//!
//! A completed orchestration is stored under a deterministic fingerprint
//! of its full input set and served back, without any backend work, to
//! identical requests inside the TTL window. Degraded results are stored
//! too, under a (configurable) shorter TTL, so a transient outage shields
//! the failing backend without masking its recovery for a full hour.

use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

use sentira_types::{AnalysisRecord, BackendId, FeatureKind};

use std::collections::BTreeSet;

struct CacheEntry {
    created_at: Instant,
    ttl: Duration,
    payload: Vec<AnalysisRecord>,
}

/// Fingerprint-keyed store of completed orchestration results.
#[derive(Default)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic fingerprint of an orchestration's full input set.
    ///
    /// Every segment is length-delimited before hashing, so `["ab", "c"]`
    /// and `["a", "bc"]` cannot collide, and each section is tagged so an
    /// image ref can never masquerade as a label.
    pub fn fingerprint(
        texts: &[String],
        backends: &BTreeSet<BackendId>,
        features: &BTreeSet<FeatureKind>,
        image_ref: Option<&str>,
        labels: Option<&[String]>,
    ) -> String {
        let mut hasher = Sha256::new();

        let mut section = |tag: u8, items: &mut dyn Iterator<Item = &str>| {
            hasher.update([tag]);
            for item in items {
                hasher.update((item.len() as u64).to_le_bytes());
                hasher.update(item.as_bytes());
            }
        };

        section(b'T', &mut texts.iter().map(String::as_str));
        section(b'B', &mut backends.iter().map(BackendId::as_str));
        section(b'F', &mut features.iter().map(FeatureKind::as_str));
        section(b'I', &mut image_ref.iter().copied());
        section(b'L', &mut labels.unwrap_or_default().iter().map(String::as_str));

        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// The cached payload for `key`, if present and not expired.
    /// Expired entries are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<Vec<AnalysisRecord>> {
        let fresh = {
            let entry = self.entries.get(key)?;
            if entry.created_at.elapsed() < entry.ttl {
                Some(entry.payload.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            debug!(key, "evicting expired cache entry");
            self.entries.remove(key);
        }
        fresh
    }

    /// Store a payload under `key` with the given lifetime.
    pub fn set(&self, key: String, payload: Vec<AnalysisRecord>, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry { created_at: Instant::now(), ttl, payload },
        );
    }

    /// Number of live (possibly expired but unevicted) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| entry.created_at.elapsed() < entry.ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> AnalysisRecord {
        AnalysisRecord::empty(text, None)
    }

    fn backends(ids: &[BackendId]) -> BTreeSet<BackendId> {
        ids.iter().copied().collect()
    }

    fn features(kinds: &[FeatureKind]) -> BTreeSet<FeatureKind> {
        kinds.iter().copied().collect()
    }

    fn key(texts: &[&str]) -> String {
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Lexicon]),
            &features(&[]),
            None,
            None,
        )
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(key(&["a", "b"]), key(&["a", "b"]));
    }

    #[test]
    fn fingerprint_separates_adjacent_texts() {
        assert_ne!(key(&["ab", "c"]), key(&["a", "bc"]));
        assert_ne!(key(&["ab"]), key(&["a", "b"]));
    }

    #[test]
    fn fingerprint_depends_on_every_section() {
        let texts = vec!["t".to_string()];
        let base = ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Lexicon]),
            &features(&[]),
            None,
            None,
        );
        let other_backend = ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Gpt4]),
            &features(&[]),
            None,
            None,
        );
        let with_feature = ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Lexicon]),
            &features(&[FeatureKind::Iq]),
            None,
            None,
        );
        let with_image = ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Lexicon]),
            &features(&[]),
            Some("img.png"),
            None,
        );
        let labels = vec!["reddit".to_string()];
        let with_labels = ResultCache::fingerprint(
            &texts,
            &backends(&[BackendId::Lexicon]),
            &features(&[]),
            None,
            Some(&labels),
        );
        let all = [&base, &other_backend, &with_feature, &with_image, &with_labels];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "sections {i} and {j} collided");
                }
            }
        }
    }

    #[test]
    fn fingerprint_keeps_image_and_label_apart() {
        let texts = vec!["t".to_string()];
        let labels = vec!["x".to_string()];
        let as_image = ResultCache::fingerprint(
            &texts,
            &backends(&[]),
            &features(&[]),
            Some("x"),
            None,
        );
        let as_label = ResultCache::fingerprint(
            &texts,
            &backends(&[]),
            &features(&[]),
            None,
            Some(&labels),
        );
        assert_ne!(as_image, as_label);
    }

    #[tokio::test]
    async fn get_returns_stored_payload() {
        let cache = ResultCache::new();
        let k = key(&["hello"]);
        cache.set(k.clone(), vec![record("hello")], Duration::from_secs(60));
        let payload = cache.get(&k).unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].text, "hello");
    }

    #[tokio::test]
    async fn get_misses_unknown_key() {
        let cache = ResultCache::new();
        assert!(cache.get("nope").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResultCache::new();
        let k = key(&["hello"]);
        cache.set(k.clone(), vec![record("hello")], Duration::from_secs(10));
        assert!(cache.get(&k).is_some());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.get(&k).is_none());
        // The expired entry was evicted, not just hidden.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = ResultCache::new();
        cache.set(key(&["a"]), vec![record("a")], Duration::from_secs(5));
        cache.set(key(&["b"]), vec![record("b")], Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(10)).await;
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(&["b"])).is_some());
    }

    #[tokio::test]
    async fn set_overwrites_previous_entry() {
        let cache = ResultCache::new();
        let k = key(&["x"]);
        cache.set(k.clone(), vec![record("old")], Duration::from_secs(60));
        cache.set(k.clone(), vec![record("new")], Duration::from_secs(60));
        assert_eq!(cache.get(&k).unwrap()[0].text, "new");
        assert_eq!(cache.len(), 1);
    }
}
