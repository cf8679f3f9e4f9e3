//! Process-wide indices over instances.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::instance::{Entry, Instance, InstanceKey};
use crate::sync::{read, write, RwLock};

/// Process-wide store of instance versions.
///
/// Three indices: originals (machine-ingested, vid 0), rewrites
/// (human/rule-produced), and a qid to version-list index used to
/// enumerate versions and assign the next vid. `(qid, vid)` is unique
/// across the union of the two instance indices; a version number is
/// never reused for the same qid.
///
/// The store is an arena of immutable snapshots: lookups hand out owned
/// clones, never references into the indices, so analyses can hold
/// different versions simultaneously without aliasing concerns.
///
/// Writes take an exclusive lock; the version-assign-and-register
/// sequence in [`InstanceStore::register_rewrite`] runs under a single
/// write lock, so concurrent rewrites on one qid always receive
/// distinct, monotonically increasing vids. Reads proceed concurrently.
#[derive(Debug, Default)]
pub struct InstanceStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    originals: HashMap<InstanceKey, Instance>,
    rewrites: HashMap<InstanceKey, Instance>,
    /// qid to ascending vid list.
    versions: HashMap<String, Vec<u32>>,
}

impl StoreInner {
    fn contains(&self, key: &InstanceKey) -> bool {
        self.originals.contains_key(key) || self.rewrites.contains_key(key)
    }

    fn next_version(&self, qid: &str) -> u32 {
        self.versions
            .get(qid)
            .and_then(|vids| vids.last())
            .map_or(0, |max| max + 1)
    }

    fn insert(&mut self, instance: Instance, rewritten: bool) -> Result<()> {
        let key = instance.key();
        if self.contains(&key) {
            return Err(Error::DuplicateVersion {
                qid: key.qid,
                vid: key.vid,
            });
        }
        let vids = self.versions.entry(key.qid.clone()).or_default();
        match vids.binary_search(&key.vid) {
            Ok(_) => {
                return Err(Error::DuplicateVersion {
                    qid: key.qid,
                    vid: key.vid,
                })
            }
            Err(pos) => vids.insert(pos, key.vid),
        }
        if rewritten {
            self.rewrites.insert(key, instance);
        } else {
            self.originals.insert(key, instance);
        }
        Ok(())
    }
}

impl InstanceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance into the original or rewritten index.
    ///
    /// Fails with [`Error::DuplicateVersion`] if `(qid, vid)` is already
    /// present in either index.
    pub fn register(&self, instance: Instance, rewritten: bool) -> Result<()> {
        let mut inner = write(&self.inner);
        inner.insert(instance, rewritten)
    }

    /// Next free version id for `qid`: `max + 1`, or 0 if unseen.
    #[must_use]
    pub fn next_version(&self, qid: &str) -> u32 {
        read(&self.inner).next_version(qid)
    }

    /// Fetch the instance stored under `(qid, vid)`, from whichever
    /// index holds it.
    ///
    /// Returns an owned snapshot; fails with [`Error::InstanceNotFound`]
    /// if absent from both indices.
    pub fn lookup(&self, qid: &str, vid: u32) -> Result<Instance> {
        let inner = read(&self.inner);
        let key = InstanceKey::new(qid, vid);
        inner
            .originals
            .get(&key)
            .or_else(|| inner.rewrites.get(&key))
            .cloned()
            .ok_or_else(|| Error::InstanceNotFound {
                qid: qid.to_string(),
                vid,
            })
    }

    /// True if `(qid, vid)` is registered in either index.
    #[must_use]
    pub fn contains(&self, qid: &str, vid: u32) -> bool {
        read(&self.inner).contains(&InstanceKey::new(qid, vid))
    }

    /// Lazy iterator over every known version of `qid`, ascending by
    /// vid.
    ///
    /// The vid list is snapshotted up front; each instance is fetched on
    /// demand. Call again to restart.
    #[must_use]
    pub fn all_versions(&self, qid: &str) -> AllVersions<'_> {
        let vids = read(&self.inner)
            .versions
            .get(qid)
            .cloned()
            .unwrap_or_default();
        AllVersions {
            store: self,
            qid: qid.to_string(),
            vids,
            pos: 0,
        }
    }

    /// Create and register a rewrite of `base` with one role replaced.
    ///
    /// Atomically assigns `vid = next_version(qid)`, re-stamps the
    /// replacement entry at that vid, builds the new instance, and
    /// inserts it into the rewritten index. The whole sequence holds the
    /// write lock, so concurrent rewrites on one qid never collide.
    ///
    /// No implicit deduplication: a replacement identical to the current
    /// state still produces a new version.
    ///
    /// Fails with [`Error::InstanceNotFound`] if `base` is not
    /// registered.
    pub fn register_rewrite(
        &self,
        base: &Instance,
        role: impl Into<String>,
        entry: Entry,
    ) -> Result<Instance> {
        let role = role.into();
        let mut inner = write(&self.inner);
        if !inner.contains(&base.key()) {
            return Err(Error::InstanceNotFound {
                qid: base.qid().to_string(),
                vid: base.vid(),
            });
        }
        let vid = inner.next_version(base.qid());
        let entry = entry.at_version(vid);
        let instance = base.set_entries(BTreeMap::from([(role, entry)]))?;
        debug!("rewrite of '{}' registered as {}", base.qid(), instance.key());
        inner.insert(instance.clone(), true)?;
        Ok(instance)
    }

    /// Number of original instances.
    #[must_use]
    pub fn original_count(&self) -> usize {
        read(&self.inner).originals.len()
    }

    /// Number of rewritten instances.
    #[must_use]
    pub fn rewrite_count(&self) -> usize {
        read(&self.inner).rewrites.len()
    }

    /// Total registered instances across both indices.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = read(&self.inner);
        inner.originals.len() + inner.rewrites.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known qids, sorted.
    #[must_use]
    pub fn qids(&self) -> Vec<String> {
        let inner = read(&self.inner);
        let mut qids: Vec<String> = inner.versions.keys().cloned().collect();
        qids.sort();
        qids
    }

    /// Drop every index. Explicit process reset, e.g. before loading a
    /// new dataset cache.
    pub fn clear(&self) {
        let mut inner = write(&self.inner);
        let dropped = inner.originals.len() + inner.rewrites.len();
        inner.originals.clear();
        inner.rewrites.clear();
        inner.versions.clear();
        info!("instance store cleared ({dropped} instances dropped)");
    }

    /// Order-independent SHA-256 digest over `(qid, vid, rewritten)`
    /// triples, hex encoded.
    ///
    /// Persistence layers use it as a cache key: two stores holding the
    /// same instance versions fingerprint identically regardless of
    /// registration order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let inner = read(&self.inner);
        let mut triples: Vec<(&str, u32, bool)> = inner
            .originals
            .keys()
            .map(|k| (k.qid.as_str(), k.vid, false))
            .chain(inner.rewrites.keys().map(|k| (k.qid.as_str(), k.vid, true)))
            .collect();
        triples.sort_unstable();

        let mut hasher = Sha256::new();
        for (qid, vid, rewritten) in triples {
            hasher.update(qid.as_bytes());
            hasher.update([0u8]);
            hasher.update(vid.to_le_bytes());
            hasher.update([u8::from(rewritten)]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Lazy sequence of one qid's instance versions, ascending by vid.
///
/// Returned by [`InstanceStore::all_versions`].
#[derive(Debug, Clone)]
pub struct AllVersions<'a> {
    store: &'a InstanceStore,
    qid: String,
    vids: Vec<u32>,
    pos: usize,
}

impl Iterator for AllVersions<'_> {
    type Item = Instance;

    fn next(&mut self) -> Option<Instance> {
        while self.pos < self.vids.len() {
            let vid = self.vids[self.pos];
            self.pos += 1;
            // Tolerate versions dropped between snapshot and fetch.
            if let Ok(instance) = self.store.lookup(&self.qid, vid) {
                return Some(instance);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.vids.len().saturating_sub(self.pos);
        (0, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use crate::MockAnnotator;
    use std::collections::HashMap as StdHashMap;

    fn instance(qid: &str, vid: u32, text: &str) -> Instance {
        let annotator = MockAnnotator::new();
        let target =
            Target::annotate(&annotator, qid, vid, "premise", text, StdHashMap::new()).unwrap();
        Instance::create(
            qid,
            BTreeMap::from([("premise".to_string(), Entry::Target(target))]),
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let store = InstanceStore::new();
        store.register(instance("q1", 0, "a b c"), false).unwrap();

        let found = store.lookup("q1", 0).unwrap();
        assert_eq!(found.qid(), "q1");
        assert!(store.contains("q1", 0));
        assert!(!store.contains("q1", 1));
        assert!(matches!(
            store.lookup("q1", 1).unwrap_err(),
            Error::InstanceNotFound { .. }
        ));
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let store = InstanceStore::new();
        store.register(instance("q1", 0, "a b"), false).unwrap();

        // Same key in the other index is still a duplicate.
        let err = store.register(instance("q1", 0, "a b"), true).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateVersion { vid: 0, .. }
        ));
    }

    #[test]
    fn test_next_version_monotonic() {
        let store = InstanceStore::new();
        assert_eq!(store.next_version("q1"), 0);

        for vid in 0..3 {
            store.register(instance("q1", vid, "a b"), vid > 0).unwrap();
            assert_eq!(store.next_version("q1"), vid + 1);
        }
        assert_eq!(store.next_version("other"), 0);
    }

    #[test]
    fn test_all_versions_ascending() {
        let store = InstanceStore::new();
        // Out-of-order registration still enumerates ascending.
        store.register(instance("q1", 2, "a b"), true).unwrap();
        store.register(instance("q1", 0, "a b"), false).unwrap();
        store.register(instance("q1", 1, "a b"), true).unwrap();

        let vids: Vec<u32> = store.all_versions("q1").map(|i| i.vid()).collect();
        assert_eq!(vids, vec![0, 1, 2]);

        // Restartable.
        assert_eq!(store.all_versions("q1").count(), 3);
        assert_eq!(store.all_versions("unseen").count(), 0);
    }

    #[test]
    fn test_register_rewrite_assigns_next_vid() {
        let store = InstanceStore::new();
        let original = instance("q1", 0, "Two women are embracing");
        store.register(original.clone(), false).unwrap();

        let annotator = MockAnnotator::new();
        let replacement = Target::annotate(
            &annotator,
            "q1",
            0,
            "premise",
            "Two men are embracing",
            StdHashMap::new(),
        )
        .unwrap();
        let rewrite = store
            .register_rewrite(&original, "premise", Entry::Target(replacement))
            .unwrap();

        assert_eq!(rewrite.vid(), 1);
        assert!(rewrite.is_rewrite());
        assert_eq!(rewrite.target("premise").unwrap().vid(), 1);
        assert_eq!(store.lookup("q1", 1).unwrap(), rewrite);
        assert_eq!(store.original_count(), 1);
        assert_eq!(store.rewrite_count(), 1);
    }

    #[test]
    fn test_rewrite_requires_registered_base() {
        let store = InstanceStore::new();
        let base = instance("q1", 0, "a b");
        let err = store
            .register_rewrite(&base, "premise", Entry::Target(
                base.target("premise").unwrap().clone(),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::InstanceNotFound { .. }));
    }

    #[test]
    fn test_rewrite_never_dedups() {
        let store = InstanceStore::new();
        let original = instance("q1", 0, "a b");
        store.register(original.clone(), false).unwrap();

        let same_entry = original.get_entry("premise").unwrap().clone();
        let first = store
            .register_rewrite(&original, "premise", same_entry.clone())
            .unwrap();
        let second = store
            .register_rewrite(&original, "premise", same_entry)
            .unwrap();

        assert_eq!(first.vid(), 1);
        assert_eq!(second.vid(), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = InstanceStore::new();
        store.register(instance("q1", 0, "a b"), false).unwrap();
        store.register(instance("q2", 0, "c d"), false).unwrap();
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.next_version("q1"), 0);
        assert!(store.qids().is_empty());
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let a = InstanceStore::new();
        a.register(instance("q1", 0, "a b"), false).unwrap();
        a.register(instance("q2", 0, "c d"), false).unwrap();

        let b = InstanceStore::new();
        b.register(instance("q2", 0, "c d"), false).unwrap();
        b.register(instance("q1", 0, "a b"), false).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());

        // Index membership is part of the digest.
        let c = InstanceStore::new();
        c.register(instance("q1", 0, "a b"), true).unwrap();
        c.register(instance("q2", 0, "c d"), false).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_qids_sorted() {
        let store = InstanceStore::new();
        store.register(instance("zeta", 0, "a"), false).unwrap();
        store.register(instance("alpha", 0, "b"), false).unwrap();
        assert_eq!(store.qids(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
