//! Per-item enrichment
//!
//! Every listed item gets two more requests: its detail (name, type,
//! address) and its availability for the target date. Only when both have
//! arrived does the item become a [`Record`].

use crate::crawler::fetcher::RequestError;
use crate::record::{FacilityDetail, ItemId, ItemStub, PartialRecord, Record};
use crate::retry::RetryError;
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

/// Which part of enrichment an item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichStage {
    Detail,
    Availability,
    Merge,
}

impl fmt::Display for EnrichStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Detail => "detail",
            Self::Availability => "availability",
            Self::Merge => "merge",
        };
        f.write_str(stage)
    }
}

/// One bookable time block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: String,
    pub start: String,
    pub end: String,
    pub available: bool,
}

/// Anything that can serve facility detail and availability
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn detail(&self, id: &ItemId) -> Result<FacilityDetail, RetryError<RequestError>>;

    /// Time slots of `id` on `date`, in server order
    async fn availability(
        &self,
        id: &ItemId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RetryError<RequestError>>;
}

/// Renders the available slots as `"{date}  {start}-{end}"` lines
///
/// Unavailable slots are dropped; the remaining ones keep their order.
pub fn render_available_dates(slots: &[TimeSlot]) -> String {
    slots
        .iter()
        .filter(|slot| slot.available)
        .map(|slot| format!("{}  {}-{}", slot.date, slot.start, slot.end))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The calendar day after `now`, as seen in `timezone`
pub fn target_date_in(timezone: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&timezone).date_naive() + Days::new(1)
}

/// Turns item stubs into complete records
pub struct Enricher<S> {
    source: S,
    target_date: NaiveDate,
    timezone: Tz,
}

impl<S: ItemSource> Enricher<S> {
    pub fn new(source: S, target_date: NaiveDate, timezone: Tz) -> Self {
        Self {
            source,
            target_date,
            timezone,
        }
    }

    pub fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    /// Fetches detail, then availability, and assembles the record
    pub async fn enrich(&self, stub: ItemStub) -> Result<Record, FetchError> {
        let mut partial = PartialRecord::new(stub);
        let id = partial.id().clone();

        let detail = self
            .source
            .detail(&id)
            .await
            .map_err(|e| unreachable(&id, EnrichStage::Detail, e))?;
        partial.set_detail(detail);

        let slots = self
            .source
            .availability(&id, self.target_date)
            .await
            .map_err(|e| unreachable(&id, EnrichStage::Availability, e))?;
        let available_dates = render_available_dates(&slots);
        tracing::debug!(
            "Item {}: {} slot(s), {} available on {}",
            id,
            slots.len(),
            available_dates.lines().count(),
            self.target_date
        );
        partial.set_available_dates(available_dates);

        partial
            .complete(Utc::now().with_timezone(&self.timezone))
            .map_err(|e| FetchError::ItemUnreachable {
                id,
                stage: EnrichStage::Merge,
                attempts: 1,
                reason: e.to_string(),
            })
    }
}

fn unreachable(id: &ItemId, stage: EnrichStage, error: RetryError<RequestError>) -> FetchError {
    FetchError::ItemUnreachable {
        id: id.clone(),
        stage,
        attempts: error.attempts,
        reason: error.last.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;
    use std::collections::HashMap;

    fn slot(start: &str, end: &str, available: bool) -> TimeSlot {
        TimeSlot {
            date: "2024-03-15".to_string(),
            start: start.to_string(),
            end: end.to_string(),
            available,
        }
    }

    struct SyntheticItems {
        details: HashMap<ItemId, FacilityDetail>,
        slots: Vec<TimeSlot>,
        failing_availability: Option<ItemId>,
    }

    #[async_trait]
    impl ItemSource for SyntheticItems {
        async fn detail(&self, id: &ItemId) -> Result<FacilityDetail, RetryError<RequestError>> {
            self.details.get(id).cloned().ok_or(RetryError {
                attempts: 1,
                last: RequestError::Status {
                    status: 404,
                    body: String::new(),
                },
            })
        }

        async fn availability(
            &self,
            id: &ItemId,
            _date: NaiveDate,
        ) -> Result<Vec<TimeSlot>, RetryError<RequestError>> {
            if self.failing_availability.as_ref() == Some(id) {
                return Err(RetryError {
                    attempts: 3,
                    last: RequestError::Status {
                        status: 500,
                        body: String::new(),
                    },
                });
            }
            Ok(self.slots.clone())
        }
    }

    fn source() -> SyntheticItems {
        let mut details = HashMap::new();
        for id in [1, 2] {
            details.insert(
                ItemId::from(id),
                FacilityDetail {
                    title: format!("Court {}", id),
                    facility_type: "Tennis Court".to_string(),
                    address: "Volunteer Park 1247 15th Ave E Seattle, WA, 98112".to_string(),
                },
            );
        }

        SyntheticItems {
            details,
            slots: vec![
                slot("07:00", "08:00", true),
                slot("08:00", "09:00", false),
                slot("09:00", "10:00", true),
            ],
            failing_availability: Some(ItemId::from(2)),
        }
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_render_only_available_in_order() {
        let slots = vec![
            slot("09:00", "10:00", true),
            slot("07:00", "08:00", false),
            slot("06:00", "07:00", true),
        ];

        assert_eq!(
            render_available_dates(&slots),
            "2024-03-15  09:00-10:00\n2024-03-15  06:00-07:00"
        );
    }

    #[test]
    fn test_render_nothing_available() {
        assert_eq!(render_available_dates(&[slot("07:00", "08:00", false)]), "");
        assert_eq!(render_available_dates(&[]), "");
    }

    #[test]
    fn test_target_date_uses_civil_zone() {
        // 06:30 UTC on March 15 is still March 14 in Los Angeles
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 6, 30, 0).unwrap();
        assert_eq!(
            target_date_in(Los_Angeles, now),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2024, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(
            target_date_in(Los_Angeles, now),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_enrich_builds_record() {
        let enricher = Enricher::new(source(), target(), Los_Angeles);

        let record = enricher.enrich(ItemStub::new(1)).await.unwrap();

        assert_eq!(record.id, ItemId::from(1));
        assert_eq!(record.title, "Court 1");
        assert_eq!(record.facility_type, "Tennis Court");
        assert_eq!(
            record.canonical_addr,
            "volunteerpark124715thaveeseattlewa98112"
        );
        assert_eq!(
            record.available_dates,
            "2024-03-15  07:00-08:00\n2024-03-15  09:00-10:00"
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&record.last_updated).is_ok());
    }

    #[tokio::test]
    async fn test_availability_failure_names_stage() {
        let enricher = Enricher::new(source(), target(), Los_Angeles);

        let err = enricher.enrich(ItemStub::new(2)).await.unwrap_err();

        match err {
            FetchError::ItemUnreachable {
                ref id,
                stage,
                attempts,
                ..
            } => {
                assert_eq!(*id, ItemId::from(2));
                assert_eq!(stage, EnrichStage::Availability);
                assert_eq!(attempts, 3);
            }
            ref other => panic!("unexpected error {:?}", other),
        }
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_detail_failure_names_stage() {
        let enricher = Enricher::new(source(), target(), Los_Angeles);

        let err = enricher.enrich(ItemStub::new(99)).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::ItemUnreachable {
                stage: EnrichStage::Detail,
                ..
            }
        ));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(EnrichStage::Detail.to_string(), "detail");
        assert_eq!(EnrichStage::Availability.to_string(), "availability");
    }
}
