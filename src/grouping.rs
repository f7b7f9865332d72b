//! Partitioning records by identifier root.
//!
//! Any two records sharing a root belong to the same bucket regardless of
//! how their names read. Records without a root share the `NoRoot` bucket.

use std::collections::BTreeMap;

use crate::identifier::IdentifierRoot;
use crate::record::EntityRecord;

/// Key of a root bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    /// Records whose identifier yields this root.
    Root(IdentifierRoot),
    /// Records whose identifier is absent or too short.
    NoRoot,
}

impl BucketKey {
    /// The root, unless this is the `NoRoot` bucket.
    #[must_use]
    pub const fn root(&self) -> Option<&IdentifierRoot> {
        match self {
            Self::Root(root) => Some(root),
            Self::NoRoot => None,
        }
    }
}

/// A partition of records keyed by identifier root.
///
/// Within a bucket records keep their input order.
#[derive(Debug, Clone, Default)]
pub struct RootBuckets {
    buckets: BTreeMap<BucketKey, Vec<EntityRecord>>,
}

impl RootBuckets {
    /// Records sharing `root`.
    #[must_use]
    pub fn get(&self, root: &IdentifierRoot) -> Option<&[EntityRecord]> {
        self.buckets
            .get(&BucketKey::Root(root.clone()))
            .map(Vec::as_slice)
    }

    /// Records without a root.
    #[must_use]
    pub fn no_root(&self) -> &[EntityRecord] {
        self.buckets
            .get(&BucketKey::NoRoot)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Iterates buckets in key order (roots ascending, `NoRoot` last).
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[EntityRecord])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Iterates only the root buckets.
    pub fn root_buckets(&self) -> impl Iterator<Item = (&IdentifierRoot, &[EntityRecord])> {
        self.buckets
            .iter()
            .filter_map(|(k, v)| k.root().map(|root| (root, v.as_slice())))
    }

    /// Number of buckets, `NoRoot` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// True when there are no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total records across all buckets.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Consumes the partition.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<BucketKey, Vec<EntityRecord>> {
        self.buckets
    }
}

/// Partitions `records` by identifier root.
///
/// # Examples
///
/// ```
/// use groupscope::{group_by_root, EntityRecord};
///
/// let buckets = group_by_root(vec![
///     EntityRecord::new("1", Some("12.345.678/0001-90"), Some("Acme")),
///     EntityRecord::new("2", Some("12.345.678/0002-71"), Some("Acme North")),
///     EntityRecord::new("3", None, Some("Loose")),
/// ]);
/// assert_eq!(buckets.len(), 2);
/// assert_eq!(buckets.no_root().len(), 1);
/// ```
pub fn group_by_root<I>(records: I) -> RootBuckets
where
    I: IntoIterator<Item = EntityRecord>,
{
    let mut buckets: BTreeMap<BucketKey, Vec<EntityRecord>> = BTreeMap::new();
    for record in records {
        let key = record
            .identifier_root()
            .cloned()
            .map_or(BucketKey::NoRoot, BucketKey::Root);
        buckets.entry(key).or_default().push(record);
    }
    RootBuckets { buckets }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifier::canonical_root;

    fn ids(records: &[EntityRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn groups_branches_under_one_root() {
        let buckets = group_by_root(vec![
            EntityRecord::new("rec1", Some("12.345.678/0001-90"), Some("Acme")),
            EntityRecord::new("rec2", Some("12.345.678/0002-71"), Some("Totally Different")),
            EntityRecord::new("rec3", Some("99.999.999/0001-00"), Some("Zeta")),
        ]);

        assert_eq!(buckets.len(), 2);
        let acme = buckets.get(&canonical_root("12345678").unwrap()).unwrap();
        assert_eq!(ids(acme), vec!["rec1", "rec2"]);
        let zeta = buckets.get(&canonical_root("99999999").unwrap()).unwrap();
        assert_eq!(ids(zeta), vec!["rec3"]);
        assert!(buckets.no_root().is_empty());
    }

    #[test]
    fn rootless_records_share_sentinel_bucket() {
        let buckets = group_by_root(vec![
            EntityRecord::new("a", None, Some("A")),
            EntityRecord::new("b", Some("123"), Some("B")),
        ]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(ids(buckets.no_root()), vec!["a", "b"]);
        assert_eq!(buckets.root_buckets().count(), 0);
    }

    #[test]
    fn every_record_lands_in_exactly_one_bucket() {
        let records: Vec<EntityRecord> = (0..20)
            .map(|i| {
                let ident = if i % 5 == 0 { None } else { Some(format!("{:08}0001", i % 3)) };
                EntityRecord::new(format!("r{i}"), ident.as_deref(), Some("x"))
            })
            .collect();
        let buckets = group_by_root(records);
        assert_eq!(buckets.record_count(), 20);
        let mut seen: Vec<&str> = buckets.iter().flat_map(|(_, rs)| ids(rs)).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn no_root_bucket_sorts_last() {
        let buckets = group_by_root(vec![
            EntityRecord::new("a", None, Some("A")),
            EntityRecord::new("b", Some("11111111"), Some("B")),
        ]);
        let keys: Vec<&BucketKey> = buckets.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.last(), Some(&&BucketKey::NoRoot));
    }

    #[test]
    fn empty_input() {
        let buckets = group_by_root(Vec::new());
        assert!(buckets.is_empty());
        assert!(buckets.no_root().is_empty());
    }
}
