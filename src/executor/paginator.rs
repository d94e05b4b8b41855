//! Exhaustive pagination over a search store
//!
//! Pages are requested strictly in order at offsets `0, P, 2P, ...` until the
//! offset reaches the total declared by the store. The first page is always
//! fetched, since the total is only known from its response. Any failure
//! discards everything fetched so far.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PortalError, Result};
use crate::record::{FlatRecord, RecordNormalizer};
use crate::store::{SearchRequest, SearchStore};

use super::export::ProgressTracker;

/// Default number of documents per page
pub const DEFAULT_PAGE_SIZE: usize = 50_000;

/// Drives one exhaustive fetch
pub struct Paginator<'a> {
    store: &'a dyn SearchStore,
    template: SearchRequest,
    normalizer: RecordNormalizer,
    page_size: usize,
    offset: usize,
    seen: usize,
    declared_total: Option<u64>,
    requests: usize,
    tracker: ProgressTracker,
    cancel_token: Option<CancellationToken>,
}

impl<'a> Paginator<'a> {
    /// Create a paginator
    ///
    /// # Arguments
    /// * `store` - Store to query
    /// * `template` - Request whose `from`/`size` are replaced per page
    /// * `page_size` - Documents per page (at least 1)
    pub fn new(store: &'a dyn SearchStore, template: SearchRequest, page_size: usize) -> Self {
        Self {
            store,
            template,
            normalizer: RecordNormalizer::default(),
            page_size: page_size.max(1),
            offset: 0,
            seen: 0,
            declared_total: None,
            requests: 0,
            tracker: ProgressTracker::hidden(),
            cancel_token: None,
        }
    }

    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Number of page requests issued so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Total declared by the most recent page
    pub fn declared_total(&self) -> Option<u64> {
        self.declared_total
    }

    fn exhausted(&self) -> bool {
        matches!(self.declared_total, Some(total) if self.offset as u64 >= total)
    }

    /// Fetch the next page as flat records
    ///
    /// # Returns
    /// * `Result<Option<Vec<FlatRecord>>>` - Next page, or None once exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<FlatRecord>>> {
        if self.exhausted() {
            return Ok(None);
        }

        let request = self.template.page(self.offset, self.page_size);
        debug!(
            "Fetching page at offset {} from {}",
            self.offset,
            request.index_target()
        );

        let search = self.store.search(&request);
        let page = match &self.cancel_token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(PortalError::cancelled());
                }
                page = search => page?,
            },
            None => search.await?,
        };

        self.requests += 1;
        self.offset += self.page_size;
        if self.declared_total.is_none() {
            self.tracker.set_total(page.total);
        }
        self.declared_total = Some(page.total);

        let records: Vec<FlatRecord> = page
            .hits
            .into_iter()
            .map(|hit| self.normalizer.to_record(hit))
            .collect();
        self.seen += records.len();
        self.tracker.update(self.seen as u64);

        Ok(Some(records))
    }

    /// Fetch every page and merge them into one record set
    pub async fn fetch_all(mut self) -> Result<Vec<FlatRecord>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }
        self.tracker.finish();

        let total = self.declared_total.unwrap_or(0);
        if records.len() as u64 != total {
            warn!(
                "Fetched {} records but the store declared {}; the index changed during the fetch",
                records.len(),
                total
            );
        }
        info!(
            "Fetched {} records from {} in {} requests",
            records.len(),
            self.template.index_target(),
            self.requests
        );
        Ok(records)
    }
}
