//! Run-scoped dedup table.
//!
//! One `DownloadList` lives for exactly one install run. Every branch of the
//! dependency walk consults it before doing network or disk work, so an
//! insert must be visible to all later checks: inserts go through the write
//! lock and report whether the key was new.

use super::info::DownloadEntry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Packages already resolved or skipped during the current run, by pkgKey.
#[derive(Debug, Default)]
pub struct DownloadList {
    entries: RwLock<HashMap<String, DownloadEntry>>,
}

impl DownloadList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has been recorded.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Record `entry` under `key` unless the key is already present.
    ///
    /// Returns `true` if this call inserted the entry.
    pub async fn insert_if_absent(&self, key: String, entry: DownloadEntry) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, entry);
        true
    }

    /// Number of recorded packages.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Sorted copy of the table.
    pub async fn snapshot(&self) -> BTreeMap<String, DownloadEntry> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::spec::PackageSpec;

    fn requested(id: &str) -> DownloadEntry {
        DownloadEntry::Requested(PackageSpec::parse(id).unwrap())
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let list = DownloadList::new();
        assert!(list.is_empty().await);

        assert!(list.insert_if_absent("foo@1.0.0".into(), requested("foo@1.0.0")).await);
        assert!(!list.insert_if_absent("foo@1.0.0".into(), requested("foo@1.0.0")).await);

        assert!(list.contains("foo@1.0.0").await);
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn test_first_entry_wins() {
        let list = DownloadList::new();
        list.insert_if_absent("foo@1.0.0".into(), requested("foo@1.0.0"))
            .await;
        list.insert_if_absent("foo@1.0.0".into(), requested("foo@2.0.0"))
            .await;

        let snapshot = list.snapshot().await;
        assert_eq!(snapshot["foo@1.0.0"].version(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_snapshot_sorted() {
        let list = DownloadList::new();
        list.insert_if_absent("zeta@stable".into(), requested("zeta"))
            .await;
        list.insert_if_absent("alpha@1.0.0".into(), requested("alpha@1.0.0"))
            .await;

        let keys: Vec<_> = list.snapshot().await.into_keys().collect();
        assert_eq!(keys, vec!["alpha@1.0.0", "zeta@stable"]);
    }
}
