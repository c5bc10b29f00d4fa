//! GUID index
//!
//! Maps asset GUIDs to project paths and display names. The core only
//! sees the `GuidIndex` trait, so a full in-memory map and a lazy cache in
//! front of an external store are interchangeable.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use unity_prefab_core::{PrefabError, Result};

/// Batch lookup of asset GUIDs
///
/// GUIDs are compared case-insensitively; result maps are keyed by the
/// lowercase form. Unknown GUIDs are simply absent from results.
pub trait GuidIndex: Send + Sync {
    /// Display names for every resolvable GUID in `guids`
    fn resolve_many(&self, guids: &BTreeSet<String>) -> HashMap<String, String>;

    /// Path of the asset with `guid`
    fn resolve_path(&self, guid: &str) -> Option<PathBuf>;

    /// Display name of a single GUID
    fn resolve_one(&self, guid: &str) -> Option<String> {
        let guid = normalize_guid(guid);
        let mut guids = BTreeSet::new();
        guids.insert(guid.clone());
        self.resolve_many(&guids).remove(&guid)
    }
}

/// Lowercase form used for every GUID comparison
pub fn normalize_guid(guid: &str) -> String {
    guid.trim().to_ascii_lowercase()
}

/// Display name of an asset path
///
/// Scripts show as their class name (`Door.cs` -> `Door`); other assets
/// keep their extension (`Door.prefab`). Paths without an extension show
/// their last component.
pub fn display_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) if !ext.eq_ignore_ascii_case("cs") => file_name,
        _ => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(file_name),
    }
}

/// Fully loaded GUID index
#[derive(Debug, Clone, Default)]
pub struct MemoryGuidIndex {
    entries: HashMap<String, PathBuf>,
}

impl MemoryGuidIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(guid, path)` pairs
    pub fn from_entries<I, G, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (G, P)>,
        G: AsRef<str>,
        P: Into<PathBuf>,
    {
        let mut index = Self::new();
        for (guid, path) in entries {
            index.insert(guid.as_ref(), path);
        }
        index
    }

    /// Add or replace an entry
    pub fn insert<P: Into<PathBuf>>(&mut self, guid: &str, path: P) {
        self.entries.insert(normalize_guid(guid), path.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GuidIndex for MemoryGuidIndex {
    fn resolve_many(&self, guids: &BTreeSet<String>) -> HashMap<String, String> {
        guids
            .iter()
            .filter_map(|guid| {
                let guid = normalize_guid(guid);
                let name = display_name(self.entries.get(&guid)?);
                Some((guid, name))
            })
            .collect()
    }

    fn resolve_path(&self, guid: &str) -> Option<PathBuf> {
        self.entries.get(&normalize_guid(guid)).cloned()
    }
}

/// External GUID storage queried by `LazyGuidIndex`
pub trait GuidStore: Send + Sync {
    /// Paths for the given GUIDs; unknown GUIDs are absent
    ///
    /// Implementations must give up after `timeout` with
    /// `PrefabError::LookupTimeout`.
    fn lookup_many(&self, guids: &[String], timeout: Duration) -> Result<HashMap<String, PathBuf>>;
}

impl GuidStore for MemoryGuidIndex {
    fn lookup_many(&self, guids: &[String], _timeout: Duration) -> Result<HashMap<String, PathBuf>> {
        Ok(guids
            .iter()
            .filter_map(|guid| Some((guid.clone(), self.entries.get(guid)?.clone())))
            .collect())
    }
}

/// Lazy index configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyIndexConfig {
    /// Upper bound for one store query
    pub query_timeout: Duration,
    /// Maximum cached GUIDs, hits and misses together
    pub cache_capacity: usize,
}

impl Default for LazyIndexConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(2),
            cache_capacity: 1000,
        }
    }
}

impl LazyIndexConfig {
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

/// Bounded cache evicting the oldest tenth of its entries when full
#[derive(Debug)]
struct LookupCache {
    entries: HashMap<String, Option<PathBuf>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl LookupCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, guid: &str) -> Option<&Option<PathBuf>> {
        self.entries.get(guid)
    }

    fn insert(&mut self, guid: String, path: Option<PathBuf>) {
        if self.entries.contains_key(&guid) {
            self.entries.insert(guid, path);
            return;
        }
        if self.entries.len() >= self.capacity {
            let evict = (self.capacity / 10).max(1);
            for old in self.order.drain(..evict.min(self.order.len())) {
                self.entries.remove(&old);
            }
        }
        self.order.push_back(guid.clone());
        self.entries.insert(guid, path);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// GUID index that queries an external store on demand and caches results
///
/// Misses are cached as well, so a GUID unknown to the store is asked for
/// once. A timed-out query returns what the cache already had and caches
/// nothing for the GUIDs it did not answer.
#[derive(Debug)]
pub struct LazyGuidIndex<S: GuidStore> {
    store: S,
    config: LazyIndexConfig,
    cache: Mutex<LookupCache>,
}

impl<S: GuidStore> LazyGuidIndex<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LazyIndexConfig::default())
    }

    pub fn with_config(store: S, config: LazyIndexConfig) -> Self {
        Self {
            store,
            cache: Mutex::new(LookupCache::new(config.cache_capacity)),
            config,
        }
    }

    pub fn config(&self) -> &LazyIndexConfig {
        &self.config
    }

    /// Number of cached GUIDs
    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Paths for `guids`, asking the store once for every cache miss
    #[instrument(skip_all)]
    fn lookup_paths<'g, I>(&self, guids: I) -> HashMap<String, PathBuf>
    where
        I: IntoIterator<Item = &'g String>,
    {
        let mut found = HashMap::new();
        let mut misses = Vec::new();
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            for guid in guids {
                let guid = normalize_guid(guid);
                match cache.get(&guid) {
                    Some(Some(path)) => {
                        found.insert(guid, path.clone());
                    }
                    Some(None) => {}
                    None => misses.push(guid),
                }
            }
        }
        misses.sort();
        misses.dedup();
        if misses.is_empty() {
            return found;
        }

        debug!(misses = misses.len(), "querying GUID store");
        match self.store.lookup_many(&misses, self.config.query_timeout) {
            Ok(mut answered) => {
                let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                for guid in misses {
                    let path = answered.remove(&guid);
                    if let Some(path) = &path {
                        found.insert(guid.clone(), path.clone());
                    }
                    cache.insert(guid, path);
                }
            }
            Err(PrefabError::LookupTimeout { timeout_ms }) => {
                warn!(timeout_ms, misses = misses.len(), "GUID lookup timed out; returning partial result");
            }
            Err(err) => {
                warn!(error = %err, "GUID lookup failed; returning partial result");
            }
        }
        found
    }
}

impl<S: GuidStore> GuidIndex for LazyGuidIndex<S> {
    fn resolve_many(&self, guids: &BTreeSet<String>) -> HashMap<String, String> {
        self.lookup_paths(guids)
            .into_iter()
            .map(|(guid, path)| (guid, display_name(&path)))
            .collect()
    }

    fn resolve_path(&self, guid: &str) -> Option<PathBuf> {
        let guid = normalize_guid(guid);
        self.lookup_paths(std::iter::once(&guid)).remove(&guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DOOR: &str = "5f2b1c9e8d7a4b3c9e0f1a2b3c4d5e6f";
    const PREFAB: &str = "1d2c3b4a596877665544332211009988";
    const UNKNOWN: &str = "ffffffffffffffffffffffffffffffff";

    fn sample() -> MemoryGuidIndex {
        MemoryGuidIndex::from_entries([
            (DOOR, "Assets/Scripts/Door.cs"),
            (PREFAB, "Assets/Prefabs/Handle.prefab"),
        ])
    }

    /// Store wrapper counting round trips
    struct CountingStore {
        inner: MemoryGuidIndex,
        calls: AtomicUsize,
        fail_with_timeout: bool,
    }

    impl GuidStore for CountingStore {
        fn lookup_many(&self, guids: &[String], timeout: Duration) -> Result<HashMap<String, PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_with_timeout {
                return Err(PrefabError::LookupTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            self.inner.lookup_many(guids, timeout)
        }
    }

    fn counting(fail_with_timeout: bool) -> CountingStore {
        CountingStore {
            inner: sample(),
            calls: AtomicUsize::new(0),
            fail_with_timeout,
        }
    }

    fn set(guids: &[&str]) -> BTreeSet<String> {
        guids.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("Assets/Scripts/Door.cs")), "Door");
        assert_eq!(display_name(Path::new("Assets/Prefabs/Handle.prefab")), "Handle.prefab");
        assert_eq!(display_name(Path::new("Assets/Textures")), "Textures");
    }

    #[test]
    fn test_memory_index() {
        let index = sample();
        let names = index.resolve_many(&set(&[DOOR, PREFAB, UNKNOWN]));
        assert_eq!(names.len(), 2);
        assert_eq!(names[DOOR], "Door");
        assert_eq!(index.resolve_one(&DOOR.to_uppercase()).as_deref(), Some("Door"));
        assert_eq!(
            index.resolve_path(PREFAB),
            Some(PathBuf::from("Assets/Prefabs/Handle.prefab"))
        );
        assert_eq!(index.resolve_one(UNKNOWN), None);
    }

    #[test]
    fn test_lazy_index_batches_and_caches_misses() {
        let index = LazyGuidIndex::new(counting(false));

        let names = index.resolve_many(&set(&[DOOR, PREFAB, UNKNOWN]));
        assert_eq!(names.len(), 2);
        assert_eq!(index.store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.cached(), 3);

        // Everything is cached now, including the miss
        assert_eq!(index.resolve_one(UNKNOWN), None);
        assert_eq!(index.resolve_one(DOOR).as_deref(), Some("Door"));
        assert_eq!(index.store.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_index_timeout_is_partial_and_uncached() {
        let index = LazyGuidIndex::with_config(
            counting(true),
            LazyIndexConfig::default().with_query_timeout(Duration::from_millis(50)),
        );
        assert!(index.resolve_many(&set(&[DOOR])).is_empty());
        assert_eq!(index.cached(), 0);
        assert!(index.resolve_path(DOOR).is_none());
        assert_eq!(index.store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_eviction() {
        let mut cache = LookupCache::new(20);
        for i in 0..20 {
            cache.insert(format!("{:032x}", i), None);
        }
        assert_eq!(cache.len(), 20);
        cache.insert("new".to_string(), None);
        assert_eq!(cache.len(), 19);
        assert!(cache.get(&format!("{:032x}", 0)).is_none());
        assert!(cache.get(&format!("{:032x}", 2)).is_some());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_batch_matches_single_lookups() {
        let memory = sample();
        let lazy = LazyGuidIndex::new(sample());
        let guids = set(&[DOOR, PREFAB, UNKNOWN]);
        for index in [&memory as &dyn GuidIndex, &lazy as &dyn GuidIndex] {
            let batch = index.resolve_many(&guids);
            let single: HashMap<String, String> = guids
                .iter()
                .filter_map(|g| Some((g.clone(), index.resolve_one(g)?)))
                .collect();
            assert_eq!(batch, single);
        }
    }
}
