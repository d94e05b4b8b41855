//! Organism resolution for pooled specimens
//!
//! A "pool of specimens" record lists the specimens it was derived from. Each
//! of those is looked up in the specimen index; when it is a "specimen from
//! organism", the organism it was derived from is collected. The distinct
//! organisms are attached to the pooled record.

use std::collections::{BTreeSet, HashMap};

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::metadata::Index;
use crate::record::{FlatRecord, Flattener, RECORD_SEPARATOR};
use crate::store::SearchStore;

pub const MATERIAL_FIELD: &str = "material.text";
pub const DERIVED_FROM_FIELD: &str = "derivedFrom";
pub const BIOSAMPLE_ID_FIELD: &str = "biosampleId";

/// Field receiving the resolved organism ids
pub const POOLED_ORGANISMS_FIELD: &str = "pooledOrganisms";

const POOL_OF_SPECIMENS: &str = "pool of specimens";
const SPECIMEN_FROM_ORGANISM: &str = "specimen from organism";

/// Default number of concurrent lookups
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

/// Resolves the organisms behind pooled specimen records
pub struct Enricher<'a> {
    store: &'a dyn SearchStore,
    concurrency: usize,
    flattener: Flattener,
    cancel_token: Option<CancellationToken>,
}

impl<'a> Enricher<'a> {
    pub fn new(store: &'a dyn SearchStore, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            flattener: Flattener::default(),
            cancel_token: None,
        }
    }

    /// Abort pending lookups when the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Whether a record describes a pool of specimens
    pub fn is_pool(record: &FlatRecord) -> bool {
        record.get(MATERIAL_FIELD) == Some(POOL_OF_SPECIMENS)
    }

    /// Distinct specimen ids a record was derived from, in listed order
    pub fn derived_ids(record: &FlatRecord) -> Vec<String> {
        let mut seen = BTreeSet::new();
        record
            .get(DERIVED_FROM_FIELD)
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Query matching a specimen by its exact biosample id
    pub fn lookup_query(specimen_id: &str) -> String {
        let escaped = specimen_id.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{BIOSAMPLE_ID_FIELD}:\"{escaped}\"")
    }

    /// Look up one specimen and return its organism, if it has one
    async fn resolve(&self, specimen_id: &str) -> Result<Option<String>> {
        let q = Self::lookup_query(specimen_id);
        let Some(hit) = self
            .store
            .lookup(&[Index::Specimen.as_str().to_string()], &q)
            .await?
        else {
            debug!("Derived-from specimen {} not found", specimen_id);
            return Ok(None);
        };

        let specimen = self.flattener.flatten(&hit.source);
        if specimen.get(MATERIAL_FIELD) != Some(SPECIMEN_FROM_ORGANISM) {
            return Ok(None);
        }
        Ok(specimen
            .get(DERIVED_FROM_FIELD)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string))
    }

    /// Attach resolved organisms to every pooled record
    ///
    /// Each distinct derived-from id is looked up once, with at most
    /// `concurrency` lookups in flight.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records enriched
    pub async fn enrich(&self, records: &mut [FlatRecord]) -> Result<usize> {
        if !records.iter().any(Self::is_pool) {
            return Ok(0);
        }

        let mut pending: BTreeSet<String> = BTreeSet::new();
        for record in records.iter().filter(|r| Self::is_pool(r)) {
            pending.extend(Self::derived_ids(record));
        }

        debug!("Resolving {} derived-from specimens", pending.len());
        let lookups = stream::iter(pending)
            .map(|id| async move {
                let organism = self.resolve(&id).await?;
                Ok::<_, PortalError>((id, organism))
            })
            .buffer_unordered(self.concurrency)
            .try_collect::<HashMap<String, Option<String>>>();
        let resolved = match &self.cancel_token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PortalError::cancelled()),
                resolved = lookups => resolved?,
            },
            None => lookups.await?,
        };

        let mut enriched = 0;
        for record in records.iter_mut().filter(|r| Self::is_pool(r)) {
            let organisms: BTreeSet<&str> = Self::derived_ids(record)
                .iter()
                .filter_map(|id| resolved.get(id).and_then(|o| o.as_deref()))
                .collect();
            let joined = organisms.into_iter().collect::<Vec<_>>().join(RECORD_SEPARATOR);
            record.insert(POOLED_ORGANISMS_FIELD, joined);
            enriched += 1;
        }

        debug!("Enriched {} pooled records", enriched);
        Ok(enriched)
    }
}
