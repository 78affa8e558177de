//! End-to-end query handling
//!
//! One `handle` call per inbound query: validate, understand (with the
//! caller's conversation context), search, format, record the turn.
//! Everything below a total retrieval failure is recovered on the way; only
//! validation errors and total failure reach the caller.

use crate::config::Config;
use crate::error::{Result, SamparkError};
use crate::query::{EntitySet, ExtractedQuery, ExtractionMethod, Intent, QueryPipeline};
use crate::response::ResponseFormatter;
use crate::search::{HybridSearch, RankedResult, SearchError, SearchFilter};
use crate::session::{Clock, ContextStore, ConversationTurn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const MAX_QUERY_CHARS: usize = 500;

/// Inbound query request. The caller id arrives already authenticated by
/// the messaging layer and is treated as an opaque session key.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub caller_id: String,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

/// Outbound response payload
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub intent: Intent,
    pub entities: EntitySet,
    pub confidence: f32,
    pub method: ExtractionMethod,
    pub results: Vec<RankedResult>,
    pub display_text: String,
    pub pagination: Pagination,
}

/// The directory query service
pub struct DirectoryService {
    pipeline: QueryPipeline,
    search: HybridSearch,
    formatter: ResponseFormatter,
    context: Arc<ContextStore>,
    clock: Arc<dyn Clock>,
    cfg: Config,
}

impl DirectoryService {
    pub fn new(
        pipeline: QueryPipeline,
        search: HybridSearch,
        context: Arc<ContextStore>,
        clock: Arc<dyn Clock>,
        cfg: Config,
    ) -> Self {
        Self {
            pipeline,
            search,
            formatter: ResponseFormatter::new(),
            context,
            clock,
            cfg,
        }
    }

    /// Handle one query end to end
    pub async fn handle(&self, request: QueryRequest) -> Result<QueryResponse> {
        Self::validate(&request)?;

        let request_id = Uuid::new_v4();
        let query = request.query.trim();

        let page_size = request
            .options
            .max_results
            .unwrap_or(self.cfg.search.default_page_size)
            .clamp(1, self.cfg.search.max_page_size);
        let page = request.options.page.unwrap_or(1).max(1);

        let extracted = self.pipeline.understand(query, &request.caller_id).await;

        tracing::info!(
            %request_id,
            intent = ?extracted.intent,
            method = ?extracted.method,
            confidence = extracted.confidence,
            "Query understood"
        );

        if extracted.confidence < self.cfg.extraction.min_confidence {
            // Ask for clarification instead of returning low-quality matches
            let display_text = self.formatter.clarification(&extracted);
            self.record_turn(&request.caller_id, query, &extracted, 0);
            return Ok(Self::respond(extracted, Vec::new(), display_text, page, 0, 0));
        }

        let filter = SearchFilter::from_entities(&extracted.entities);
        let results_page = self
            .search
            .search(query, &filter, page, page_size)
            .await
            .map_err(|e| match e {
                SearchError::AllBranchesFailed => {
                    SamparkError::RetrievalFailed("both retrieval branches failed".to_string())
                }
                other => SamparkError::RetrievalFailed(other.to_string()),
            })?;

        let display_text = self.formatter.format(&results_page.results, &extracted);
        self.record_turn(
            &request.caller_id,
            query,
            &extracted,
            results_page.total_results,
        );

        tracing::info!(
            %request_id,
            total_results = results_page.total_results,
            page = results_page.page,
            "Query answered"
        );

        Ok(Self::respond(
            extracted,
            results_page.results,
            display_text,
            results_page.page,
            results_page.total_pages,
            results_page.total_results,
        ))
    }

    fn respond(
        extracted: ExtractedQuery,
        results: Vec<RankedResult>,
        display_text: String,
        page: usize,
        total_pages: usize,
        total_results: usize,
    ) -> QueryResponse {
        QueryResponse {
            intent: extracted.intent,
            entities: extracted.entities,
            confidence: extracted.confidence,
            method: extracted.method,
            results,
            display_text,
            pagination: Pagination {
                page,
                total_pages,
                total_results,
            },
        }
    }

    fn record_turn(
        &self,
        caller_id: &str,
        query: &str,
        extracted: &ExtractedQuery,
        result_count: usize,
    ) {
        self.context.record(
            caller_id,
            ConversationTurn {
                query_text: query.to_string(),
                timestamp_ms: self.clock.now_ms(),
                intent: extracted.intent,
                entities: extracted.entities.clone(),
                result_count,
            },
        );
    }

    fn validate(request: &QueryRequest) -> Result<()> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SamparkError::Validation("query must not be empty".into()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(SamparkError::Validation(format!(
                "query exceeds {} characters",
                MAX_QUERY_CHARS
            )));
        }
        if request.caller_id.trim().is_empty() {
            return Err(SamparkError::Validation(
                "caller id must not be empty".into(),
            ));
        }
        Ok(())
    }
}
