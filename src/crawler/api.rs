//! The reservation platform as a listing and item source

use crate::config::ListingConfig;
use crate::crawler::endpoints::Endpoints;
use crate::crawler::enricher::{ItemSource, TimeSlot};
use crate::crawler::fetcher::RequestError;
use crate::crawler::paginator::{ListingCursor, ListingPage, ListingSource};
use crate::crawler::session::Session;
use crate::crawler::wire::{AvailabilityBody, DetailBody, Envelope, ListingBody, ListingRequest};
use crate::record::{FacilityDetail, ItemId, ItemStub};
use crate::retry::RetryError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// REST client for one signed-in site
#[derive(Debug, Clone)]
pub struct PlatformApi {
    session: Arc<Session>,
    endpoints: Arc<Endpoints>,
    listing: Arc<ListingConfig>,
}

impl PlatformApi {
    pub fn new(session: Arc<Session>, endpoints: Endpoints, listing: ListingConfig) -> Self {
        Self {
            session,
            endpoints: Arc::new(endpoints),
            listing: Arc::new(listing),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl ListingSource for PlatformApi {
    async fn fetch_page(
        &self,
        cursor: &ListingCursor,
    ) -> Result<ListingPage, RetryError<RequestError>> {
        let url = self.endpoints.listing();
        let request = ListingRequest::new(&self.listing, cursor.start_index);
        let body = serde_json::to_value(&request).map_err(|e| RetryError {
            attempts: 1,
            last: RequestError::Decode(e),
        })?;

        let label = format!("listing page at {}", cursor.start_index);
        let envelope: Envelope<ListingBody> = self
            .session
            .fetcher()
            .post_json(&label, &url, &body)
            .await?;

        let items = envelope
            .body
            .items
            .into_iter()
            .filter_map(|item| match item.id {
                Some(id) => Some(ItemStub { id }),
                None => {
                    tracing::warn!(
                        "Listing page at {} has an item without an id",
                        cursor.start_index
                    );
                    None
                }
            })
            .collect();

        Ok(ListingPage {
            items,
            next_start_index: envelope.body.next_start_index,
            total: envelope.body.total,
        })
    }
}

#[async_trait]
impl ItemSource for PlatformApi {
    async fn detail(&self, id: &ItemId) -> Result<FacilityDetail, RetryError<RequestError>> {
        let url = self.endpoints.detail(id);
        let label = format!("detail of {}", id);
        let envelope: Envelope<DetailBody> = self.session.fetcher().get_json(&label, &url).await?;

        Ok(envelope.body.resource_detail.general_information.into_detail())
    }

    async fn availability(
        &self,
        id: &ItemId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, RetryError<RequestError>> {
        let url = self.endpoints.daily_availability(id, date);
        let label = format!("availability of {}", id);
        let envelope: Envelope<AvailabilityBody> =
            self.session.fetcher().get_json(&label, &url).await?;

        Ok(envelope.body.into_slots(date))
    }
}
