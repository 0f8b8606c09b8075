use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical table in a venue. Layout edits happen outside the reservation
/// engine; here tables are read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub table_number: String,
    pub capacity: i32,
    /// Floor-plan placement, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Table {
    pub fn new(venue_id: Uuid, table_number: impl Into<String>, capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            venue_id,
            table_number: table_number.into(),
            capacity,
            geometry: None,
            created_at: Utc::now(),
        }
    }
}

/// An event scheduled at a venue. Only the venue mapping matters here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledEvent {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
}

impl ScheduledEvent {
    pub fn new(venue_id: Uuid, name: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            venue_id,
            name: name.into(),
            starts_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Held,
    Booked,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Held => "held",
            TableStatus::Booked => "booked",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table together with its resolved status for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableState {
    pub table: Table,
    pub status: TableStatus,
}
