//! Facility records and their building blocks
//!
//! A record starts life as an [`ItemStub`] produced by the listing, grows into a
//! [`PartialRecord`] as detail and availability arrive, and becomes a
//! [`Record`] only once every enrichment field is present. The persistence
//! sink accepts nothing but [`Record`], so an incomplete record cannot be
//! written.

mod canonical;

pub use canonical::canonicalize_address;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Platform-assigned facility identifier
///
/// The platform issues numeric ids, but the value is treated as opaque and
/// string ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{}", id),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// One listed facility, as produced by the listing paginator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemStub {
    pub id: ItemId,
}

impl ItemStub {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self { id: id.into() }
    }
}

/// Facility metadata resolved from the detail endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityDetail {
    pub title: String,
    pub facility_type: String,
    pub address: String,
}

/// A record that has not collected all of its enrichment fields yet
#[derive(Debug, Clone)]
pub struct PartialRecord {
    id: ItemId,
    detail: Option<FacilityDetail>,
    available_dates: Option<String>,
}

/// Returned when completing a record that is still missing fields
#[derive(Debug, Error)]
#[error("record {id} is missing {missing}")]
pub struct IncompleteRecord {
    pub id: ItemId,
    pub missing: &'static str,
}

impl PartialRecord {
    pub fn new(stub: ItemStub) -> Self {
        Self {
            id: stub.id,
            detail: None,
            available_dates: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn set_detail(&mut self, detail: FacilityDetail) {
        self.detail = Some(detail);
    }

    pub fn set_available_dates(&mut self, available_dates: String) {
        self.available_dates = Some(available_dates);
    }

    pub fn is_complete(&self) -> bool {
        self.detail.is_some() && self.available_dates.is_some()
    }

    /// Finalizes the record, deriving the canonical address and stamping
    /// `last_updated` with `now`
    pub fn complete<Tz>(self, now: DateTime<Tz>) -> Result<Record, IncompleteRecord>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let Some(detail) = self.detail else {
            return Err(IncompleteRecord {
                id: self.id,
                missing: "facility detail",
            });
        };
        let Some(available_dates) = self.available_dates else {
            return Err(IncompleteRecord {
                id: self.id,
                missing: "availability",
            });
        };

        Ok(Record {
            id: self.id,
            canonical_addr: canonicalize_address(&detail.address),
            title: detail.title,
            facility_type: detail.facility_type,
            address: detail.address,
            available_dates,
            last_updated: now.to_rfc3339(),
        })
    }
}

/// A complete facility record, shaped like the persisted table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Conflict key for upserts
    pub id: ItemId,
    pub title: String,
    pub facility_type: String,
    pub address: String,
    pub canonical_addr: String,
    /// Available slots, one `"{date}  {start}-{end}"` entry per line
    pub available_dates: String,
    /// RFC 3339 timestamp in the configured civil time zone
    pub last_updated: String,
}
