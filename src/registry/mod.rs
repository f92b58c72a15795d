//! Append-only registry of finished artifacts.
//!
//! Three insertion-ordered maps keyed by filename, all behind one `RwLock`. Appends and
//! listing copies are the only critical sections, both short.

use crate::models::{ArtifactRecord, CollectionRecord, ComparisonRecord, CopyReportRecord};
use indexmap::IndexMap;
use std::sync::{PoisonError, RwLock};

/// The three listings, copied under one read guard so they are mutually consistent.
///
/// Each list is newest-first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Listings {
    pub collections: Vec<CollectionRecord>,
    pub comparisons: Vec<ComparisonRecord>,
    pub copy_reports: Vec<CopyReportRecord>,
}

#[derive(Debug, Default)]
struct Records {
    collections: IndexMap<String, CollectionRecord>,
    comparisons: IndexMap<String, ComparisonRecord>,
    copy_reports: IndexMap<String, CopyReportRecord>,
}

#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    records: RwLock<Records>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from records discovered on disk, oldest first.
    pub fn from_records(records: impl IntoIterator<Item = ArtifactRecord>) -> Self {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by_key(ArtifactRecord::timestamp);

        let registry = Self::new();
        for record in records {
            registry.register(record);
        }
        registry
    }

    /// Append a record. Returns `false` and keeps the existing entry if the filename is
    /// already registered.
    pub fn register(&self, record: ArtifactRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let inserted = match record {
            ArtifactRecord::Collection(r) => insert_new(&mut records.collections, r.filename.clone(), r),
            ArtifactRecord::Comparison(r) => insert_new(&mut records.comparisons, r.filename.clone(), r),
            ArtifactRecord::CopyReport(r) => insert_new(&mut records.copy_reports, r.filename.clone(), r),
        };
        if !inserted {
            tracing::warn!("Artifact already registered, keeping the first record");
        }
        inserted
    }

    pub fn collection(&self, filename: &str) -> Option<CollectionRecord> {
        self.read(|records| records.collections.get(filename).cloned())
    }

    pub fn comparison(&self, filename: &str) -> Option<ComparisonRecord> {
        self.read(|records| records.comparisons.get(filename).cloned())
    }

    pub fn copy_report(&self, filename: &str) -> Option<CopyReportRecord> {
        self.read(|records| records.copy_reports.get(filename).cloned())
    }

    pub fn list_collections(&self) -> Vec<CollectionRecord> {
        self.read(|records| newest_first(&records.collections, |r| r.timestamp))
    }

    pub fn list_comparisons(&self) -> Vec<ComparisonRecord> {
        self.read(|records| newest_first(&records.comparisons, |r| r.timestamp))
    }

    pub fn list_copy_reports(&self) -> Vec<CopyReportRecord> {
        self.read(|records| newest_first(&records.copy_reports, |r| r.timestamp))
    }

    pub fn listings(&self) -> Listings {
        self.read(|records| Listings {
            collections: newest_first(&records.collections, |r| r.timestamp),
            comparisons: newest_first(&records.comparisons, |r| r.timestamp),
            copy_reports: newest_first(&records.copy_reports, |r| r.timestamp),
        })
    }

    pub fn len(&self) -> usize {
        self.read(|records| {
            records.collections.len() + records.comparisons.len() + records.copy_reports.len()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Records) -> R,
    {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        f(&records)
    }
}

fn insert_new<T>(map: &mut IndexMap<String, T>, key: String, value: T) -> bool {
    if map.contains_key(&key) {
        return false;
    }
    map.insert(key, value);
    true
}

fn newest_first<T, K, F>(map: &IndexMap<String, T>, key: F) -> Vec<T>
where
    T: Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut list: Vec<T> = map.values().cloned().collect();
    // stable: equal timestamps keep newest insertion first
    list.reverse();
    list.sort_by(|a, b| key(b).cmp(&key(a)));
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionType;
    use time::{Duration, OffsetDateTime};

    fn collection(name: &str, minutes: i64) -> ArtifactRecord {
        ArtifactRecord::Collection(CollectionRecord {
            filename: name.to_string(),
            collection_type: CollectionType::Origem,
            directory_path: "/data".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes),
            inaccessible_count: 0,
        })
    }

    fn comparison(name: &str) -> ArtifactRecord {
        ArtifactRecord::Comparison(ComparisonRecord {
            filename: name.to_string(),
            dir_origem: "/a".to_string(),
            dir_destino: "/b".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            not_copied_count: 3,
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ArtifactRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register(collection("c1.json", 1)));
        assert!(registry.register(comparison("r1.json")));

        assert_eq!(registry.len(), 2);
        assert!(registry.collection("c1.json").is_some());
        assert!(registry.comparison("r1.json").is_some());
        assert!(registry.comparison("c1.json").is_none());
        assert!(registry.copy_report("r1.json").is_none());
    }

    #[test]
    fn test_duplicate_filename_is_rejected() {
        let registry = ArtifactRegistry::new();
        assert!(registry.register(collection("c1.json", 1)));
        assert!(!registry.register(collection("c1.json", 5)));

        let record = registry.collection("c1.json").unwrap();
        assert_eq!(record.timestamp, OffsetDateTime::UNIX_EPOCH + Duration::minutes(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_listing_is_newest_first() {
        let registry = ArtifactRegistry::new();
        registry.register(collection("old.json", 1));
        registry.register(collection("new.json", 10));
        registry.register(collection("mid.json", 5));

        let names: Vec<_> = registry
            .list_collections()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, vec!["new.json", "mid.json", "old.json"]);
    }

    #[test]
    fn test_from_records_orders_by_time() {
        let registry =
            ArtifactRegistry::from_records(vec![collection("b.json", 9), collection("a.json", 2)]);

        let listings = registry.listings();
        assert_eq!(listings.collections[0].filename, "b.json");
        assert_eq!(listings.collections[1].filename, "a.json");
        assert!(listings.comparisons.is_empty());
    }
}
