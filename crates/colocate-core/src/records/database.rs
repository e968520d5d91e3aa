use std::{fmt, path::Path};

use redb::{Database, ReadableTable, TableDefinition, TableError};

use super::{RoomRecord, decode, encode};
use crate::{error::RecordError, services::RoomRecordStore};

/// name -> CBOR-encoded [`RoomRecord`].
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("room_records");

/// redb-backed record store.
///
/// Each call runs in its own transaction.
pub struct DatabaseRecordStore {
    db: Database,
}

impl DatabaseRecordStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let db = Database::create(path.as_ref()).map_err(storage)?;
        Ok(Self { db })
    }
}

impl fmt::Debug for DatabaseRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseRecordStore").finish_non_exhaustive()
    }
}

fn storage(error: impl fmt::Display) -> RecordError {
    RecordError::Storage(error.to_string())
}

impl RoomRecordStore for DatabaseRecordStore {
    fn save(&self, record: &RoomRecord) -> Result<(), RecordError> {
        let bytes = encode(record)?;
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            table.insert(record.name.as_str(), bytes.as_slice()).map_err(storage)?;
        }
        txn.commit().map_err(storage)
    }

    fn get(&self, name: &str) -> Result<Option<RoomRecord>, RecordError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = match txn.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage(e)),
        };

        let record = match table.get(name).map_err(storage)? {
            Some(guard) => Some(decode(guard.value())?),
            None => None,
        };
        Ok(record)
    }

    fn remove(&self, name: &str) -> Result<bool, RecordError> {
        let txn = self.db.begin_write().map_err(storage)?;
        let existed = {
            let mut table = txn.open_table(RECORDS).map_err(storage)?;
            let removed = table.remove(name).map_err(storage)?;
            removed.is_some()
        };
        txn.commit().map_err(storage)?;
        Ok(existed)
    }

    fn list(&self) -> Result<Vec<RoomRecord>, RecordError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = match txn.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage(e)),
        };

        let mut records = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn empty_database_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatabaseRecordStore::open(dir.path().join("records.redb")).unwrap();
        assert!(store.get("missing").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.redb");
        let record = RoomRecord::new("studio", vec![Uuid::from_u128(9)], 1234);

        {
            let store = DatabaseRecordStore::open(&path).unwrap();
            store.save(&record).unwrap();
        }

        let store = DatabaseRecordStore::open(&path).unwrap();
        assert_eq!(store.get("studio").unwrap(), Some(record));
    }

    #[test]
    fn list_is_sorted_and_remove_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatabaseRecordStore::open(dir.path().join("records.redb")).unwrap();
        store.save(&RoomRecord::new("b", Vec::new(), 2)).unwrap();
        store.save(&RoomRecord::new("a", Vec::new(), 1)).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["a", "b"]);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
