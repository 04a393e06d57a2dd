//! Request and response shapes of the platform's REST API
//!
//! Responses are deserialized leniently: every field has a default, numbers
//! are accepted where strings are expected and vice versa, so schema drift on
//! the platform side degrades to empty values instead of decode failures.

use crate::config::ListingConfig;
use crate::crawler::enricher::TimeSlot;
use crate::record::{FacilityDetail, ItemId};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Every REST response wraps its payload in `{"body": ...}`
#[derive(Debug, Default, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Envelope<T: Default> {
    #[serde(deserialize_with = "null_as_default")]
    pub body: T,
}

/// Sign-in request body
#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub login_name: &'a str,
    pub password: &'a str,
    pub recaptcha_response: &'a str,
    pub signin_source_app: &'a str,
    pub custom_amount: &'a str,
    pub from_original_cui: &'a str,
    #[serde(rename = "onlineSiteId")]
    pub online_site_id: &'a str,
    pub override_partial_error: &'a str,
    pub params: &'a str,
    pub ak_properties: Option<Value>,
}

impl<'a> SignInRequest<'a> {
    pub fn new(login_name: &'a str, password: &'a str, params: &'a str) -> Self {
        Self {
            login_name,
            password,
            recaptcha_response: "",
            signin_source_app: "0",
            custom_amount: "False",
            from_original_cui: "true",
            online_site_id: "0",
            override_partial_error: "False",
            params,
            ak_properties: None,
        }
    }
}

/// Listing search request body
///
/// Only the filter, ordering and cursor fields vary; the rest are the empty
/// values the platform's own search form sends.
#[derive(Debug, Serialize)]
pub struct ListingRequest<'a> {
    pub name: &'a str,
    pub attendee: u32,
    pub date_times: Vec<Value>,
    pub event_type_ids: Vec<u32>,
    pub facility_type_ids: &'a [u32],
    pub reservation_group_ids: Vec<u32>,
    pub amenity_ids: Vec<u32>,
    pub facility_id: u32,
    pub equipment_id: u32,
    pub center_id: u32,
    pub resource_type: u32,
    pub client_coordinate: &'a str,
    pub order_by_field: &'a str,
    pub order_direction: &'a str,
    pub page_size: u32,
    pub start_index: u64,
    pub search_client_id: &'a str,
    pub date_time_length: Option<u32>,
    pub full_day_booking: bool,
    pub center_ids: Vec<u32>,
}

impl<'a> ListingRequest<'a> {
    pub fn new(config: &'a ListingConfig, start_index: u64) -> Self {
        Self {
            name: "",
            attendee: 0,
            date_times: Vec::new(),
            event_type_ids: Vec::new(),
            facility_type_ids: &config.facility_type_ids,
            reservation_group_ids: Vec::new(),
            amenity_ids: Vec::new(),
            facility_id: 0,
            equipment_id: 0,
            center_id: 0,
            resource_type: 0,
            client_coordinate: "",
            order_by_field: &config.order_by_field,
            order_direction: &config.order_direction,
            page_size: config.page_size,
            start_index,
            search_client_id: "",
            date_time_length: None,
            full_day_booking: false,
            center_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListingBody {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<ListingItem>,
    #[serde(deserialize_with = "lenient_u64")]
    pub next_start_index: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListingItem {
    pub id: Option<ItemId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetailBody {
    #[serde(deserialize_with = "null_as_default")]
    pub resource_detail: ResourceDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResourceDetail {
    #[serde(deserialize_with = "null_as_default")]
    pub general_information: GeneralInformation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneralInformation {
    #[serde(deserialize_with = "lenient_string")]
    pub facility_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub facility_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub center_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address1: String,
    #[serde(deserialize_with = "lenient_string")]
    pub city: String,
    #[serde(deserialize_with = "lenient_string")]
    pub state: String,
    #[serde(deserialize_with = "lenient_string")]
    pub zip_code: String,
}

impl GeneralInformation {
    pub fn into_detail(self) -> FacilityDetail {
        let address = format!(
            "{} {} {}, {}, {}",
            self.center_name, self.address1, self.city, self.state, self.zip_code
        )
        .trim()
        .to_string();

        FacilityDetail {
            title: self.facility_name,
            facility_type: self.facility_type,
            address,
        }
    }
}

/// Daily availability, in either of the two shapes the platform has served
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AvailabilityBody {
    pub details: Option<AvailabilityDetails>,
    pub availability_blocks: Option<Vec<AvailabilityBlock>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AvailabilityDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub daily_details: Vec<DailyDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DailyDetail {
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub times: Vec<TimeEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TimeEntry {
    #[serde(deserialize_with = "lenient_bool")]
    pub available: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub start_time: String,
    #[serde(deserialize_with = "lenient_string")]
    pub end_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AvailabilityBlock {
    #[serde(deserialize_with = "lenient_bool")]
    pub available: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub start_time_strf: String,
    #[serde(deserialize_with = "lenient_string")]
    pub end_time_strf: String,
}

impl AvailabilityBody {
    /// Flattens the payload into slots in server order
    ///
    /// Blocks of the older shape carry no date and are dated `date`; blocks
    /// missing a start or end time are dropped.
    pub fn into_slots(self, date: NaiveDate) -> Vec<TimeSlot> {
        if let Some(details) = self.details {
            if !details.daily_details.is_empty() || self.availability_blocks.is_none() {
                return details
                    .daily_details
                    .into_iter()
                    .flat_map(|day| {
                        let date = day.date;
                        day.times.into_iter().map(move |time| TimeSlot {
                            date: date.clone(),
                            start: time.start_time,
                            end: time.end_time,
                            available: time.available,
                        })
                    })
                    .collect();
            }
        }

        let date = date.format("%Y-%m-%d").to_string();
        self.availability_blocks
            .unwrap_or_default()
            .into_iter()
            .filter(|block| !block.start_time_strf.is_empty() && !block.end_time_strf.is_empty())
            .map(|block| TimeSlot {
                date: date.clone(),
                start: block.start_time_strf,
                end: block.end_time_strf,
                available: block.available,
            })
            .collect()
    }
}

/// An explicit `null` reads as the type's default, like a missing key does
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_listing_body() {
        let envelope: Envelope<ListingBody> = serde_json::from_value(json!({
            "headers": {"response_code": "0000"},
            "body": {
                "items": [{"id": 1146, "name": "Court 1"}, {"id": "abc"}, {"name": "no id"}],
                "next_start_index": 20,
                "total": "45"
            }
        }))
        .unwrap();

        let body = envelope.body;
        assert_eq!(body.items.len(), 3);
        assert_eq!(body.items[0].id, Some(ItemId::Numeric(1146)));
        assert_eq!(body.items[1].id, Some(ItemId::Text("abc".to_string())));
        assert_eq!(body.items[2].id, None);
        assert_eq!(body.next_start_index, Some(20));
        assert_eq!(body.total, Some(45));
    }

    #[test]
    fn test_listing_body_missing_cursor() {
        let envelope: Envelope<ListingBody> =
            serde_json::from_value(json!({"body": {"items": [], "next_start_index": null}}))
                .unwrap();
        assert_eq!(envelope.body.next_start_index, None);
        assert_eq!(envelope.body.total, None);

        let envelope: Envelope<ListingBody> = serde_json::from_value(json!({})).unwrap();
        assert!(envelope.body.items.is_empty());
    }

    #[test]
    fn test_listing_request_shape() {
        let config = ListingConfig::default();
        let value = serde_json::to_value(ListingRequest::new(&config, 40)).unwrap();

        assert_eq!(value["facility_type_ids"], json!([39, 115]));
        assert_eq!(value["order_by_field"], "name");
        assert_eq!(value["order_direction"], "asc");
        assert_eq!(value["page_size"], 20);
        assert_eq!(value["start_index"], 40);
        assert_eq!(value["date_time_length"], Value::Null);
        assert_eq!(value["full_day_booking"], false);
    }

    #[test]
    fn test_sign_in_request_shape() {
        let value = serde_json::to_value(SignInRequest::new("me@example.com", "pw", "blob")).unwrap();

        assert_eq!(value["login_name"], "me@example.com");
        assert_eq!(value["password"], "pw");
        assert_eq!(value["onlineSiteId"], "0");
        assert_eq!(value["params"], "blob");
        assert_eq!(value["ak_properties"], Value::Null);
    }

    #[test]
    fn test_detail_into_facility_detail() {
        let envelope: Envelope<DetailBody> = serde_json::from_value(json!({
            "body": {"resource_detail": {"general_information": {
                "facility_name": "Amy Yee Tennis Center Court 01",
                "facility_type": "Tennis Court",
                "center_name": "Amy Yee Tennis Center",
                "address1": "2000 Martin Luther King Jr Way S",
                "city": "Seattle",
                "state": "WA",
                "zip_code": 98144
            }}}
        }))
        .unwrap();

        let detail = envelope.body.resource_detail.general_information.into_detail();
        assert_eq!(detail.title, "Amy Yee Tennis Center Court 01");
        assert_eq!(detail.facility_type, "Tennis Court");
        assert_eq!(
            detail.address,
            "Amy Yee Tennis Center 2000 Martin Luther King Jr Way S Seattle, WA, 98144"
        );
    }

    #[test]
    fn test_detail_missing_fields_become_empty() {
        let envelope: Envelope<DetailBody> = serde_json::from_value(json!({
            "body": {"resource_detail": {"general_information": {
                "facility_name": "Court",
                "center_name": null
            }}}
        }))
        .unwrap();

        let detail = envelope.body.resource_detail.general_information.into_detail();
        assert_eq!(detail.title, "Court");
        assert_eq!(detail.facility_type, "");
        assert_eq!(detail.address, ", ,");
    }

    #[test]
    fn test_daily_details_shape() {
        let envelope: Envelope<AvailabilityBody> = serde_json::from_value(json!({
            "body": {"details": {"daily_details": [{
                "date": "2024-03-15",
                "times": [
                    {"available": true, "start_time": "07:00:00", "end_time": "08:00:00"},
                    {"available": false, "start_time": "08:00:00", "end_time": "09:00:00"}
                ]
            }]}}
        }))
        .unwrap();

        let slots = envelope.body.into_slots(date());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].date, "2024-03-15");
        assert_eq!(slots[0].start, "07:00:00");
        assert!(slots[0].available);
        assert!(!slots[1].available);
    }

    #[test]
    fn test_availability_blocks_shape() {
        let envelope: Envelope<AvailabilityBody> = serde_json::from_value(json!({
            "body": {"availability_blocks": [
                {"available": true, "start_time_strf": "7:00 AM", "end_time_strf": "8:00 AM"},
                {"available": true, "start_time_strf": "", "end_time_strf": "9:00 AM"},
                {"available": false, "start_time_strf": "9:00 AM", "end_time_strf": "10:00 AM"}
            ]}
        }))
        .unwrap();

        let slots = envelope.body.into_slots(date());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].date, "2024-03-15");
        assert_eq!(slots[0].start, "7:00 AM");
        assert_eq!(slots[1].start, "9:00 AM");
    }

    #[test]
    fn test_null_containers_become_empty() {
        let envelope: Envelope<DetailBody> = serde_json::from_value(json!({
            "body": {"resource_detail": {"general_information": null}}
        }))
        .unwrap();
        assert_eq!(envelope.body.resource_detail.general_information.into_detail().title, "");

        let envelope: Envelope<DetailBody> =
            serde_json::from_value(json!({"body": {"resource_detail": null}})).unwrap();
        assert_eq!(envelope.body.resource_detail.general_information.facility_name, "");

        let envelope: Envelope<DetailBody> = serde_json::from_value(json!({"body": null})).unwrap();
        assert_eq!(envelope.body.resource_detail.general_information.city, "");

        let envelope: Envelope<ListingBody> = serde_json::from_value(json!({
            "body": {"items": null, "next_start_index": null, "total": 0}
        }))
        .unwrap();
        assert!(envelope.body.items.is_empty());
        assert_eq!(envelope.body.total, Some(0));
    }

    #[test]
    fn test_null_availability_lists_become_empty() {
        let envelope: Envelope<AvailabilityBody> = serde_json::from_value(json!({
            "body": {"details": {"daily_details": [
                {"date": "2024-03-15", "times": null},
                {"date": "2024-03-15", "times": [
                    {"available": true, "start_time": "07:00:00", "end_time": "08:00:00"}
                ]}
            ]}}
        }))
        .unwrap();
        let slots = envelope.body.into_slots(date());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, "07:00:00");

        let envelope: Envelope<AvailabilityBody> =
            serde_json::from_value(json!({"body": {"details": {"daily_details": null}}}))
                .unwrap();
        assert!(envelope.body.into_slots(date()).is_empty());
    }

    #[test]
    fn test_empty_availability() {
        let envelope: Envelope<AvailabilityBody> =
            serde_json::from_value(json!({"body": {}})).unwrap();
        assert!(envelope.body.into_slots(date()).is_empty());
    }
}
