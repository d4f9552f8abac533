//! In-memory collection of media records
//!
//! A [`MediaStore`] is immutable once published; refreshes build a
//! [`WorkingSet`] and swap the finished store in as a whole.

use std::collections::{HashMap, HashSet};

use common::MediaRecord;
use rand::Rng;

use crate::error::CacheError;

/// Published set of known media records, unique by id
#[derive(Debug, Clone, Default)]
pub struct MediaStore {
    records: Vec<MediaRecord>,
}

impl MediaStore {
    pub fn from_records(records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let mut working = WorkingSet::default();
        working.ingest(records);
        working.into_store()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.id.as_str())
    }

    /// Draw `count` uniform indices with replacement and drop repeated ids.
    ///
    /// The result may hold fewer than `count` records.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<MediaRecord>, CacheError> {
        if self.records.is_empty() {
            return Err(CacheError::NotReady);
        }

        let mut seen = HashSet::with_capacity(count);
        let mut sampled = Vec::with_capacity(count);

        for _ in 0..count {
            let record = &self.records[rng.gen_range(0..self.records.len())];
            if seen.insert(record.id.as_str()) {
                sampled.push(record.clone());
            }
        }

        Ok(sampled)
    }
}

/// Store under construction during a refresh cycle
#[derive(Debug, Default)]
pub struct WorkingSet {
    records: Vec<MediaRecord>,
    index: HashMap<String, usize>,
}

impl WorkingSet {
    /// Start from the records of a published store
    pub fn seeded(store: &MediaStore) -> Self {
        let mut working = Self::default();
        working.ingest(store.records().iter().cloned());
        working
    }

    /// Add records, overwriting the fields of ids already present.
    ///
    /// Returns how many ids were new.
    pub fn ingest(&mut self, records: impl IntoIterator<Item = MediaRecord>) -> usize {
        let mut added = 0;

        for record in records {
            match self.index.get(&record.id) {
                Some(&position) => self.records[position] = record,
                None => {
                    self.index.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                    added += 1;
                }
            }
        }

        added
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn into_store(self) -> MediaStore {
        MediaStore {
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn store_of(ids: &[&str]) -> MediaStore {
        MediaStore::from_records(ids.iter().map(|id| MediaRecord::from_id(*id)))
    }

    #[test]
    fn test_sample_empty_store_is_not_ready() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            MediaStore::default().sample(10, &mut rng),
            Err(CacheError::NotReady)
        );
    }

    #[test]
    fn test_sample_returns_distinct_known_records() {
        let store = store_of(&["a", "b", "c", "d", "e"]);
        let known: HashSet<&str> = store.ids().collect();
        let mut rng = StdRng::seed_from_u64(42);

        for count in 1..=20 {
            let sample = store.sample(count, &mut rng).expect("store is ready");
            let ids: HashSet<&str> = sample.iter().map(|r| r.id.as_str()).collect();

            assert!(!sample.is_empty());
            assert!(sample.len() <= count);
            assert!(sample.len() <= store.len());
            assert_eq!(ids.len(), sample.len());
            assert!(ids.is_subset(&known));
        }
    }

    #[test]
    fn test_single_record_store_samples_once() {
        let store = store_of(&["only"]);
        let mut rng = StdRng::seed_from_u64(1);

        let sample = store.sample(50, &mut rng).expect("store is ready");
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].id, "only");
    }

    #[test]
    fn test_duplicate_ids_across_pages_are_stored_once() {
        let mut working = WorkingSet::default();

        assert_eq!(
            working.ingest(vec![MediaRecord::from_id("1"), MediaRecord::from_id("2")]),
            2
        );
        assert_eq!(
            working.ingest(vec![MediaRecord::from_id("2"), MediaRecord::from_id("3")]),
            1
        );

        let store = working.into_store();
        let ids: Vec<&str> = store.ids().collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_reingested_record_is_refreshed_wholesale() {
        let mut working = WorkingSet::seeded(&store_of(&["1"]));
        let refreshed = MediaRecord {
            base_url: "https://lh3.example/1".to_string(),
            mime_type: "image/jpeg".to_string(),
            ..MediaRecord::from_id("1")
        };

        assert_eq!(working.ingest(vec![refreshed.clone()]), 0);
        assert_eq!(working.into_store().records(), &[refreshed]);
    }
}
