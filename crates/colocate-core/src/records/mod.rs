//! Advisory room-record persistence.
//!
//! A record maps a name to the room identifiers that were resident when the
//! host last obtained its room. It is only ever used to warn that a saved
//! room set has gone missing; nothing branches on it.

mod database;
mod memory;

pub use database::DatabaseRecordStore;
pub use memory::MemoryRecordStore;
use serde::{Deserialize, Serialize};

use crate::{error::RecordError, room::RoomId};

/// Persisted room set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    /// Record name.
    pub name: String,
    /// Room identifiers resident at save time.
    pub room_ids: Vec<RoomId>,
    /// Save time, milliseconds since the Unix epoch.
    pub saved_at_ms: u64,
}

impl RoomRecord {
    /// Record from parts.
    pub fn new(name: impl Into<String>, room_ids: Vec<RoomId>, saved_at_ms: u64) -> Self {
        Self { name: name.into(), room_ids, saved_at_ms }
    }

    /// Saved identifiers absent from `resident`.
    pub fn missing_from(&self, resident: &[RoomId]) -> Vec<RoomId> {
        self.room_ids.iter().filter(|id| !resident.contains(id)).copied().collect()
    }
}

pub(crate) fn encode(record: &RoomRecord) -> Result<Vec<u8>, RecordError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(record, &mut bytes)
        .map_err(|e| RecordError::Encoding(e.to_string()))?;
    Ok(bytes)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<RoomRecord, RecordError> {
    ciborium::de::from_reader(bytes).map_err(|e| RecordError::Encoding(e.to_string()))
}
