//! Deduplicating, insertion-ordered collection of decoded records
//!
//! Membership is a linear scan under structural equality, so `insert` is
//! O(n). That is fine for a few thousand sidecars per tree and is the known
//! scaling limit of this container.
//!
//! Capacity starts at the caller's value and doubles whenever an insertion
//! would make the length reach it. It never shrinks.
//! The container has no internal locking; callers merging sets from several
//! tasks must serialize their writes.

use crate::{MetadataRecord, ModdError, Result};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    data: Vec<MetadataRecord>,
    capacity: usize,
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::with_capacity(10)
    }
}

impl RecordSet {
    /// Create an empty set. A capacity of zero is bumped to one so doubling
    /// always makes progress.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a structurally equal record is already present
    pub fn contains(&self, record: &MetadataRecord) -> bool {
        self.data.iter().any(|existing| existing == record)
    }

    /// Add a record unless an equal one is present. Returns true if it was added.
    pub fn insert(&mut self, record: MetadataRecord) -> bool {
        if self.contains(&record) {
            return false;
        }
        self.grow_for(self.data.len() + 1);
        self.data.push(record);
        true
    }

    pub fn get(&self, index: usize) -> Result<&MetadataRecord> {
        self.data.get(index).ok_or(ModdError::OutOfBounds {
            index,
            len: self.data.len(),
        })
    }

    /// Append every element of `other` without checking membership.
    ///
    /// Can reintroduce duplicates when both sets share records; the legacy
    /// directory import combined per-directory results this way. Use
    /// [`RecordSet::merge`] to keep the set duplicate-free.
    pub fn concat(&mut self, other: RecordSet) {
        self.grow_for(self.data.len() + other.data.len());
        self.data.extend(other.data);
    }

    /// Insert every element of `other`, keeping the no-duplicates invariant.
    /// Returns how many records were actually added.
    pub fn merge(&mut self, other: RecordSet) -> usize {
        other
            .data
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|added| *added)
            .count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataRecord> {
        self.data.iter()
    }

    /// Double capacity until a length of `new_len` stays below it
    fn grow_for(&mut self, new_len: usize) {
        while new_len >= self.capacity {
            self.capacity *= 2;
        }
        self.data.reserve(self.capacity.saturating_sub(self.data.len()));
    }
}

impl Extend<MetadataRecord> for RecordSet {
    fn extend<I: IntoIterator<Item = MetadataRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl FromIterator<MetadataRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = MetadataRecord>>(iter: I) -> Self {
        let mut set = RecordSet::default();
        set.extend(iter);
        set
    }
}

impl IntoIterator for RecordSet {
    type Item = MetadataRecord;
    type IntoIter = std::vec::IntoIter<MetadataRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a MetadataRecord;
    type IntoIter = std::slice::Iter<'a, MetadataRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.data.len()))?;
        for record in &self.data {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, check_code: &str) -> MetadataRecord {
        let mut record = MetadataRecord::new(format!("/videos/{}.modd", name));
        record.check_code = check_code.to_string();
        record.duration_seconds = 10.0;
        record
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut set = RecordSet::with_capacity(4);
        assert!(set.insert(record("a", "1")));
        assert!(!set.insert(record("a", "1")));
        assert!(set.insert(record("b", "2")));
        // same path, different field => distinct
        assert!(set.insert(record("a", "3")));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_no_equal_pairs_after_many_inserts() {
        let mut set = RecordSet::with_capacity(2);
        for i in 0..50 {
            set.insert(record(&format!("clip{}", i % 7), &format!("{}", i % 5)));
        }
        // 35 distinct (name, code) combinations
        assert_eq!(set.len(), 35);
        for i in 0..set.len() {
            for j in (i + 1)..set.len() {
                assert_ne!(set.get(i).unwrap(), set.get(j).unwrap());
            }
        }
    }

    #[test]
    fn test_capacity_doubles() {
        let mut set = RecordSet::with_capacity(2);
        let mut seen = vec![set.capacity()];
        for i in 0..20 {
            set.insert(record(&format!("c{}", i), "x"));
            assert!(set.capacity() > set.len());
            if *seen.last().unwrap() != set.capacity() {
                seen.push(set.capacity());
            }
        }
        assert_eq!(seen, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_zero_capacity_bumped() {
        let mut set = RecordSet::with_capacity(0);
        assert_eq!(set.capacity(), 1);
        set.insert(record("a", "1"));
        assert_eq!(set.capacity(), 2);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let mut set = RecordSet::default();
        set.insert(record("a", "1"));
        assert!(set.get(0).is_ok());
        assert!(matches!(
            set.get(1),
            Err(ModdError::OutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_concat_keeps_duplicates() {
        let mut left: RecordSet = vec![record("a", "1"), record("b", "2")].into_iter().collect();
        let right: RecordSet = vec![record("b", "2"), record("c", "3")].into_iter().collect();
        left.concat(right);
        assert_eq!(left.len(), 4);
        assert!(left.capacity() >= left.len());
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut left: RecordSet = vec![record("a", "1"), record("b", "2")].into_iter().collect();
        let right: RecordSet = vec![record("b", "2"), record("c", "3")].into_iter().collect();
        assert_eq!(left.merge(right), 1);
        assert_eq!(left.len(), 3);
        assert_eq!(left.get(2).unwrap().display_name, "c");
    }

    #[test]
    fn test_serializes_as_array() {
        let set: RecordSet = vec![record("a", "1")].into_iter().collect();
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["check_code"], "1");
    }
}
