use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::booking::ParseStatusError;

/// Opaque credential proving possession of a hold. Redacted in `Debug` so it
/// never ends up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "LockToken({}…)", prefix)
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Active,
    Completed,
    Expired,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Completed => "completed",
            HoldStatus::Expired => "expired",
        }
    }
}

impl FromStr for HoldStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(HoldStatus::Active),
            "completed" => Ok(HoldStatus::Completed),
            "expired" => Ok(HoldStatus::Expired),
            other => Err(ParseStatusError {
                kind: "hold",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed, exclusive claim on a table for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatHold {
    pub id: Uuid,
    pub event_id: Uuid,
    pub table_id: Uuid,
    pub session_id: String,
    pub lock_token: LockToken,
    pub hold_expiry: DateTime<Utc>,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatHold {
    pub fn new(
        event_id: Uuid,
        table_id: Uuid,
        session_id: String,
        lock_token: LockToken,
        now: DateTime<Utc>,
        hold_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            table_id,
            session_id,
            lock_token,
            hold_expiry,
            status: HoldStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// A hold counts only while it is active *and* its deadline is ahead of
    /// `now`; the persisted status alone is never trusted.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && self.hold_expiry > now
    }
}
