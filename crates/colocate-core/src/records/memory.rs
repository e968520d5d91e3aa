use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use super::RoomRecord;
use crate::{error::RecordError, services::RoomRecordStore};

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, RoomRecord>>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomRecordStore for MemoryRecordStore {
    fn save(&self, record: &RoomRecord) -> Result<(), RecordError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.name.clone(), record.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<RoomRecord>, RecordError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<bool, RecordError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<RoomRecord>, RecordError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn save_replaces_by_name() {
        let store = MemoryRecordStore::new();
        store.save(&RoomRecord::new("a", vec![Uuid::from_u128(1)], 1)).unwrap();
        store.save(&RoomRecord::new("a", vec![Uuid::from_u128(2)], 2)).unwrap();

        let record = store.get("a").unwrap().unwrap();
        assert_eq!(record.room_ids, vec![Uuid::from_u128(2)]);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let store = MemoryRecordStore::new();
        store.save(&RoomRecord::new("a", Vec::new(), 0)).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }
}
