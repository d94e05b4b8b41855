//! Request execution for the record pipeline
//!
//! This module provides the execution layer behind each operation:
//! - Single-page search passthrough with aggregations
//! - Exhaustive download: fetch, join, enrich, project and export
//! - Column catalog lookup
//!
//! A [`RecordExecutor`] holds the store client and configuration. It keeps no
//! state between requests.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PortalError, Result};
use crate::metadata::{ColumnCatalog, Index};
use crate::query::QueryBuilder;
use crate::record::normalize::{FILENAME_FIELD, INDEX_FIELD};
use crate::record::{ColumnProjector, FlatRecord, JoinEngine, JoinSpec, JoinTable};
use crate::store::{SearchPage, SearchRequest, SearchStore};

pub mod enrich;
pub mod export;
pub mod paginator;

pub use enrich::{Enricher, POOLED_ORGANISMS_FIELD};
pub use export::{DelimitedWriter, ExportCoordinator, ExportFormat, ExportResult, ProgressTracker};
pub use paginator::Paginator;

/// Parameters of a single-page search
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub indices: Vec<String>,
    pub source: Vec<String>,
    pub size: usize,
    pub from: usize,
    pub sort: Option<String>,
    pub q: Option<String>,
    pub filters: Vec<String>,
    pub aggregations: Vec<String>,
}

/// Parameters of an exhaustive download
#[derive(Debug, Clone, Default)]
pub struct DownloadParams {
    /// Indices queried as one combined target
    pub indices: Vec<String>,
    /// Output columns in order; empty selects the first index's defaults
    pub columns: Vec<String>,
    pub sort: Option<String>,
    pub filters: Vec<String>,
    pub q: Option<String>,
    /// Second index to join the result with
    pub join_with: Option<String>,
    /// Export format token, falling back to the configured one
    pub format: Option<String>,
    /// Explicit output path
    pub output: Option<PathBuf>,
}

/// Fields added by the pipeline rather than read from the store
const SYNTHESIZED_FIELDS: &[&str] = &[INDEX_FIELD, FILENAME_FIELD, POOLED_ORGANISMS_FIELD];

/// Executes search, download and column requests against a store
pub struct RecordExecutor {
    store: Arc<dyn SearchStore>,
    config: Config,
    joins: JoinTable,
    cancel_token: Option<CancellationToken>,
}

impl RecordExecutor {
    pub fn new(store: Arc<dyn SearchStore>, config: Config) -> Self {
        Self {
            store,
            config,
            joins: JoinTable::default(),
            cancel_token: None,
        }
    }

    /// Set cancellation token aborting in-flight fetches and exports
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one search and return the raw page
    ///
    /// # Returns
    /// * `Result<SearchPage>` - Hits, declared total and aggregations
    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage> {
        check_indices(&params.indices)?;

        let mut request = SearchRequest::new(params.indices.clone());
        request.body = QueryBuilder::from_strings(&params.filters, &params.aggregations)?;
        request.source = params.source.clone();
        request.size = params.size;
        request.from = params.from;
        request.sort = params.sort.clone();
        request.q = params.q.clone();

        debug!("Searching {} at offset {}", request.index_target(), request.from);
        let search = self.store.search(&request);
        match &self.cancel_token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(PortalError::cancelled()),
                page = search => page,
            },
            None => search.await,
        }
    }

    /// Columns a download writes, in order
    pub fn resolve_columns(&self, params: &DownloadParams) -> Result<Vec<String>> {
        if !params.columns.is_empty() {
            return Ok(params.columns.clone());
        }
        check_indices(&params.indices)?;
        let index: Index = params.indices[0].parse()?;
        Ok(index.default_columns().iter().map(|c| c.to_string()).collect())
    }

    /// Fetch every matching record, joined and enriched, without exporting
    ///
    /// A configured request timeout bounds the whole operation.
    pub async fn collect(&self, params: &DownloadParams) -> Result<Vec<FlatRecord>> {
        let columns = self.resolve_columns(params)?;
        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.run_pipeline(params, &columns)).await?,
            None => self.run_pipeline(params, &columns).await,
        }
    }

    async fn run_pipeline(&self, params: &DownloadParams, columns: &[String]) -> Result<Vec<FlatRecord>> {
        check_indices(&params.indices)?;
        let body = QueryBuilder::from_strings(&params.filters, &[] as &[&str])?;
        let left_target = params.indices.join(",");

        let (join, pair) = match &params.join_with {
            Some(right) => {
                let pair = JoinTable::pair_name(&left_target, right);
                (self.joins.get(&pair), Some((right.clone(), pair)))
            }
            None => (None, None),
        };

        let mut left = SearchRequest::new(params.indices.clone());
        left.body = body.clone();
        left.source = source_fields(columns, join.map(|j: JoinSpec| j.left_key));
        left.sort = params.sort.clone();
        left.q = params.q.clone();
        let mut records = self.fetch(left).await?;

        if let Some((right_index, pair)) = pair {
            let mut right = SearchRequest::new(vec![right_index]);
            right.body = body;
            right.source = source_fields(columns, join.map(|j| j.right_key));
            let right_records = self.fetch(right).await?;
            records = JoinEngine::new(self.joins).join(records, right_records, &pair);
        }

        if columns.iter().any(|c| c == POOLED_ORGANISMS_FIELD) {
            let mut enricher = Enricher::new(self.store.as_ref(), self.config.fetch.lookup_concurrency);
            if let Some(token) = &self.cancel_token {
                enricher = enricher.with_cancellation(token.clone());
            }
            enricher.enrich(&mut records).await?;
        }

        Ok(records)
    }

    async fn fetch(&self, template: SearchRequest) -> Result<Vec<FlatRecord>> {
        let tracker = ProgressTracker::new("records fetched", self.config.export.progress);
        let mut paginator = Paginator::new(self.store.as_ref(), template, self.config.fetch.page_size)
            .with_progress(tracker);
        if let Some(token) = &self.cancel_token {
            paginator = paginator.with_cancellation(token.clone());
        }
        paginator.fetch_all().await
    }

    /// Fetch every matching record and write it to an export file
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Output path, rows written, size and elapsed time
    pub async fn download(&self, params: &DownloadParams) -> Result<ExportResult> {
        let token = params.format.as_deref().unwrap_or(&self.config.export.format);
        let format = ExportFormat::lookup(Some(token));
        let path = params
            .output
            .clone()
            .unwrap_or_else(|| self.config.export.output_dir.join(format.default_filename()));

        let columns = self.resolve_columns(params)?;
        let records = self.collect(params).await?;

        let writer = DelimitedWriter::new(&path, format, ColumnProjector::new(&columns)).await?;
        let tracker = ProgressTracker::new("records written", self.config.export.progress);
        let mut coordinator = ExportCoordinator::new(Box::new(writer), tracker, path, format);
        if let Some(token) = &self.cancel_token {
            coordinator = coordinator.with_cancellation(token.clone());
        }

        let result = coordinator.execute(&records).await?;
        info!("Downloaded {} records to {}", result.rows_written, result.path.display());
        Ok(result)
    }

    /// Available and default columns of every index
    pub fn columns(&self) -> Result<ColumnCatalog> {
        ColumnCatalog::load(&self.config.export.mapping_dir)
    }
}

fn check_indices(indices: &[String]) -> Result<()> {
    if indices.is_empty() || indices.iter().any(|i| i.trim().is_empty()) {
        return Err(PortalError::InvalidQuerySpec("no index selected".to_string()));
    }
    Ok(())
}

/// Store fields to request for the given output columns
///
/// Synthesized fields are left out; a join key and the fields enrichment
/// reads are added when needed.
fn source_fields(columns: &[String], join_key: Option<&str>) -> Vec<String> {
    let mut fields: Vec<String> = columns
        .iter()
        .filter(|c| !SYNTHESIZED_FIELDS.contains(&c.as_str()))
        .cloned()
        .collect();

    let mut extra: Vec<&str> = join_key.into_iter().collect();
    if columns.iter().any(|c| c == POOLED_ORGANISMS_FIELD) {
        extra.extend([enrich::MATERIAL_FIELD, enrich::DERIVED_FROM_FIELD]);
    }
    for field in extra {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.fetch.page_size = 2;
        config.export.progress = false;
        config
    }

    fn executor(store: MemoryStore) -> RecordExecutor {
        RecordExecutor::new(Arc::new(store), test_config())
    }

    fn pooled_specimens() -> MemoryStore {
        MemoryStore::new().with_docs(
            "specimen",
            vec![
                (
                    "P1".to_string(),
                    json!({"biosampleId": "P1", "material": {"text": "pool of specimens"}, "derivedFrom": "S1,S2"}),
                ),
                (
                    "S1".to_string(),
                    json!({"biosampleId": "S1", "material": {"text": "specimen from organism"}, "derivedFrom": "O1"}),
                ),
            ],
        )
    }

    fn pooled_params() -> DownloadParams {
        DownloadParams {
            indices: vec!["specimen".to_string()],
            columns: vec!["biosampleId".to_string(), POOLED_ORGANISMS_FIELD.to_string()],
            ..Default::default()
        }
    }

    fn cancel_after(token: &CancellationToken, delay: Duration) {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }

    fn files_and_specimens() -> MemoryStore {
        MemoryStore::new()
            .with_docs(
                "file",
                vec![
                    ("ERR1.fastq.gz".to_string(), json!({"specimen": "A", "run": {"accession": "ERR1"}})),
                    ("ERR2.fastq.gz".to_string(), json!({"specimen": "B", "run": {"accession": "ERR2"}})),
                    ("ERR3.fastq.gz".to_string(), json!({"specimen": "Z", "run": {"accession": "ERR3"}})),
                ],
            )
            .with_docs(
                "specimen",
                vec![
                    ("A".to_string(), json!({"biosampleId": "A", "sex": {"text": "female"}})),
                    ("B".to_string(), json!({"biosampleId": "B", "sex": {"text": "male"}})),
                ],
            )
    }

    #[test]
    fn test_source_fields() {
        let columns: Vec<String> = ["filename", "run.accession", "index"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(source_fields(&columns, Some("specimen")), vec!["run.accession", "specimen"]);

        let columns = vec!["biosampleId".to_string(), POOLED_ORGANISMS_FIELD.to_string()];
        assert_eq!(
            source_fields(&columns, None),
            vec!["biosampleId", "material.text", "derivedFrom"]
        );
    }

    #[test]
    fn test_default_columns_from_first_index() {
        let executor = executor(MemoryStore::new());
        let params = DownloadParams {
            indices: vec!["article".to_string()],
            ..Default::default()
        };
        assert_eq!(
            executor.resolve_columns(&params).unwrap(),
            vec!["title", "year", "datasetSource", "journal"]
        );

        let params = DownloadParams::default();
        assert!(matches!(
            executor.resolve_columns(&params),
            Err(PortalError::InvalidQuerySpec(_))
        ));
    }

    #[tokio::test]
    async fn test_search_passes_query_through() {
        let store = Arc::new(MemoryStore::new().with_generated("organism", 5));
        let executor = RecordExecutor::new(store.clone(), Config::default());
        let params = SearchParams {
            indices: vec!["organism".to_string()],
            size: 2,
            from: 1,
            filters: vec!["sex.text=female".to_string()],
            aggregations: vec!["sex=sex.text".to_string()],
            ..Default::default()
        };

        let page = executor.search(&params).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.hits.len(), 2);

        let request = &store.requests()[0];
        assert_eq!(request.from, 1);
        assert_eq!(request.body["aggs"]["sex"]["terms"]["field"], "sex.text");
        assert_eq!(request.body["query"]["bool"]["must"][0]["terms"]["sex.text"][0], "female");
    }

    #[tokio::test]
    async fn test_search_rejects_malformed_filter() {
        let executor = executor(MemoryStore::new().with_generated("organism", 1));
        let params = SearchParams {
            indices: vec!["organism".to_string()],
            filters: vec!["sex.text".to_string()],
            ..Default::default()
        };
        let err = executor.search(&params).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidQuerySpec(_)));
    }

    #[tokio::test]
    async fn test_collect_joins_file_with_specimen() {
        let executor = executor(files_and_specimens());
        let params = DownloadParams {
            indices: vec!["file".to_string()],
            columns: vec!["filename".to_string(), "sex.text".to_string()],
            join_with: Some("specimen".to_string()),
            ..Default::default()
        };

        let records = executor.collect(&params).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("filename"), Some("ERR1.fastq.gz"));
        assert_eq!(records[0].get("sex.text"), Some("female"));
        assert_eq!(records[0].get("index"), Some("file"));
        assert_eq!(records[1].get("sex.text"), Some("male"));
    }

    #[tokio::test]
    async fn test_collect_unknown_pair_concatenates() {
        let executor = executor(files_and_specimens());
        let params = DownloadParams {
            indices: vec!["specimen".to_string()],
            columns: vec!["biosampleId".to_string()],
            join_with: Some("specimen".to_string()),
            ..Default::default()
        };
        let records = executor.collect(&params).await.unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_collect_combined_indices_rejected() {
        let executor = executor(files_and_specimens());
        let params = DownloadParams {
            indices: vec!["file".to_string(), "missing".to_string()],
            columns: vec!["filename".to_string()],
            ..Default::default()
        };
        let err = executor.collect(&params).await.unwrap_err();
        assert!(matches!(err, PortalError::IndicesIncompatible(ref t) if t == "file,missing"));
    }

    #[tokio::test]
    async fn test_collect_enriches_pooled_specimens() {
        let executor = executor(pooled_specimens());

        let records = executor.collect(&pooled_params()).await.unwrap();
        assert_eq!(records[0].get(POOLED_ORGANISMS_FIELD), Some("O1"));
        assert!(!records[1].contains_key(POOLED_ORGANISMS_FIELD));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_cancelled_during_enrichment() {
        // One page arrives at 200ms; the lookups would finish at 400ms
        let store = Arc::new(pooled_specimens().with_delay(Duration::from_millis(200)));
        let token = CancellationToken::new();
        let executor = RecordExecutor::new(store.clone(), test_config()).with_cancellation(token.clone());
        cancel_after(&token, Duration::from_millis(300));

        let err = executor.collect(&pooled_params()).await.unwrap_err();
        assert!(matches!(err, PortalError::RetrievalFailed(ref m) if m == "request cancelled"));
        assert!(store.requests().iter().any(|r| r.size == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_times_out() {
        let mut config = test_config();
        config.fetch.request_timeout = 1;
        let store = files_and_specimens().with_delay(Duration::from_secs(5));
        let executor = RecordExecutor::new(Arc::new(store), config);
        let params = DownloadParams {
            indices: vec!["file".to_string()],
            columns: vec!["filename".to_string()],
            ..Default::default()
        };

        let err = executor.collect(&params).await.unwrap_err();
        assert!(matches!(err, PortalError::RetrievalFailed(ref m) if m == "request timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_cancelled() {
        let store = MemoryStore::new()
            .with_generated("organism", 3)
            .with_delay(Duration::from_secs(1));
        let token = CancellationToken::new();
        let executor = executor(store).with_cancellation(token.clone());
        cancel_after(&token, Duration::from_millis(100));
        let params = SearchParams {
            indices: vec!["organism".to_string()],
            size: 10,
            ..Default::default()
        };

        let err = executor.search(&params).await.unwrap_err();
        assert!(matches!(err, PortalError::RetrievalFailed(ref m) if m == "request cancelled"));
    }

    #[tokio::test]
    async fn test_download_writes_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(files_and_specimens());
        let params = DownloadParams {
            indices: vec!["file".to_string()],
            columns: vec!["filename".to_string(), "run.accession".to_string()],
            format: Some("tsv".to_string()),
            output: Some(dir.path().join("files.tsv")),
            ..Default::default()
        };

        let result = executor.download(&params).await.unwrap();
        assert_eq!(result.rows_written, 3);
        assert_eq!(result.format, ExportFormat::Tsv);

        let content = std::fs::read_to_string(dir.path().join("files.tsv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "filename\taccession");
        assert_eq!(lines[1], "ERR1.fastq.gz\tERR1");
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn test_download_default_path_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(files_and_specimens());
        executor.config.export.output_dir = dir.path().to_path_buf();
        let params = DownloadParams {
            indices: vec!["file".to_string()],
            columns: vec!["filename".to_string()],
            format: Some("xlsx".to_string()),
            ..Default::default()
        };

        let result = executor.download(&params).await.unwrap();
        assert_eq!(result.path, dir.path().join("data.csv"));
        assert!(result.path.exists());
    }

    #[tokio::test]
    async fn test_cancelled_download_fails_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let executor = executor(files_and_specimens()).with_cancellation(token);
        let params = DownloadParams {
            indices: vec!["file".to_string()],
            columns: vec!["filename".to_string()],
            output: Some(dir.path().join("data.csv")),
            ..Default::default()
        };

        let err = executor.download(&params).await.unwrap_err();
        assert!(matches!(err, PortalError::RetrievalFailed(_)));
        assert!(!dir.path().join("data.csv").exists());
    }
}
