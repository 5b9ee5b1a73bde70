use chrono::{DateTime, Local};
use dashmap::DashMap;
use serde::Serialize;

/// Per-device bookkeeping held by the plugin while the host considers the
/// device active. Nothing beyond the last successful refresh time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub last_update: Option<DateTime<Local>>,
}

/// Mapping from device id to its record. This is the one piece of state
/// shared between the host's callback path and the background runner, so
/// every access goes through the map's own shard locks.
#[derive(Debug, Default)]
pub struct DeviceTable {
    records: DashMap<String, DeviceRecord>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-overwrite a fresh record. Starting an already started
    /// device resets its bookkeeping.
    pub fn insert(&self, id: impl Into<String>) {
        self.records.insert(id.into(), DeviceRecord::default());
    }

    /// Removing an absent id is not an error.
    pub fn remove(&self, id: &str) -> Option<DeviceRecord> {
        self.records.remove(id).map(|(_, record)| record)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<DeviceRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Stamps the record's last update, returning false if the device is no
    /// longer tracked.
    pub fn touch(&self, id: &str, at: DateTime<Local>) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) => {
                record.last_update = Some(at);
                true
            }
            None => false,
        }
    }

    /// Ids are collected up front: the poll sweep must not hold a shard lock
    /// across an await point.
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
