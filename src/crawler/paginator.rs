//! Cursor-paginated listing walk
//!
//! The platform pages its resource listing with a `start_index` cursor. Each
//! response names the index of the next page and the total number of items;
//! the walk ends when no next index is given or it reaches the total.

use crate::crawler::fetcher::RequestError;
use crate::record::{ItemId, ItemStub};
use crate::retry::RetryError;
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Position of the listing walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingCursor {
    pub start_index: u64,
    pub page_size: u32,
    /// Latest total reported by the server, unknown until the first page
    pub total: Option<u64>,
}

impl ListingCursor {
    pub fn first(page_size: u32) -> Self {
        Self {
            start_index: 0,
            page_size,
            total: None,
        }
    }
}

/// One decoded listing response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<ItemStub>,
    pub next_start_index: Option<u64>,
    pub total: Option<u64>,
}

/// Anything that can serve listing pages
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches the page at `cursor`, retrying as the source sees fit
    async fn fetch_page(
        &self,
        cursor: &ListingCursor,
    ) -> Result<ListingPage, RetryError<RequestError>>;
}

/// Walks a [`ListingSource`] page by page, emitting each item id once
pub struct Paginator<S> {
    source: S,
    cursor: Option<ListingCursor>,
    seen: HashSet<ItemId>,
    pages_fetched: u32,
}

impl<S: ListingSource> Paginator<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            cursor: Some(ListingCursor::first(page_size)),
            seen: HashSet::new(),
            pages_fetched: 0,
        }
    }

    /// Position of the next page, `None` once the listing is exhausted
    pub fn cursor(&self) -> Option<&ListingCursor> {
        self.cursor.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Number of distinct items emitted so far
    pub fn items_emitted(&self) -> usize {
        self.seen.len()
    }

    /// Fetches the next page and returns its not-yet-seen items in response order
    ///
    /// # Returns
    ///
    /// * `Ok(Some(items))` - The next page (possibly empty after de-duplication)
    /// * `Ok(None)` - The listing is exhausted
    /// * `Err(FetchError)` - The page could not be fetched, or the cursor stopped advancing
    pub async fn next_page(&mut self) -> Result<Option<Vec<ItemStub>>, FetchError> {
        let Some(cursor) = self.cursor else {
            return Ok(None);
        };

        let page = match self.source.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(e) => {
                self.cursor = None;
                return Err(FetchError::ListingPageUnreachable {
                    start_index: cursor.start_index,
                    attempts: e.attempts,
                    reason: e.last.to_string(),
                });
            }
        };
        self.pages_fetched += 1;

        let total = page.total.or(cursor.total);
        let received = page.items.len();
        let items: Vec<ItemStub> = page
            .items
            .into_iter()
            .filter(|stub| {
                let fresh = self.seen.insert(stub.id.clone());
                if !fresh {
                    tracing::debug!("Dropping duplicate listing item {}", stub.id);
                }
                fresh
            })
            .collect();

        tracing::debug!(
            "Listing page at {}: {} item(s), {} new, next {:?}, total {:?}",
            cursor.start_index,
            received,
            items.len(),
            page.next_start_index,
            total
        );

        self.cursor = match page.next_start_index {
            None => None,
            Some(next) if total.is_some_and(|total| next >= total) => None,
            // A page with no items and no known total gives nothing to bound the walk
            Some(_) if received == 0 && total.is_none() => None,
            Some(next) if next <= cursor.start_index => {
                self.cursor = None;
                return Err(FetchError::ListingCursorStalled {
                    start_index: cursor.start_index,
                    next_start_index: next,
                });
            }
            Some(next) => Some(ListingCursor {
                start_index: next,
                page_size: cursor.page_size,
                total,
            }),
        };

        Ok(Some(items))
    }

    /// Walks the whole listing, feeding every item into `tx`
    ///
    /// A listing failure is sent down the channel as the last message. The
    /// walk stops early if the receiver is dropped.
    pub async fn forward(mut self, tx: mpsc::Sender<Result<ItemStub, FetchError>>) {
        loop {
            match self.next_page().await {
                Ok(Some(items)) => {
                    for item in items {
                        if tx.send(Ok(item)).await.is_err() {
                            tracing::debug!("Listing receiver dropped, stopping walk");
                            return;
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(
                        "Listing exhausted: {} item(s) over {} page(s)",
                        self.items_emitted(),
                        self.pages_fetched
                    );
                    return;
                }
                Err(e) => {
                    tracing::error!("Listing failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }

    /// Walks the whole listing and returns every item
    pub async fn collect_all(&mut self) -> Result<Vec<ItemStub>, FetchError> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }
}
