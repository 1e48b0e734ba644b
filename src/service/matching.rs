use sqlx::PgPool;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::models::CandidateMatch;
use crate::service::search_text::{NormalizerConfig, MAX_KEY_WORDS};

/// Optional narrowing of a candidate search.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilters {
    pub category_code: Option<String>,
    pub supplier_id: Option<i64>,
    /// Overrides the configured similarity floor when set.
    pub min_score: Option<f32>,
}

/// Trigram-backed candidate search over the live catalog.
pub struct MatchEngine {
    pool: PgPool,
    normalizer: NormalizerConfig,
    cfg: MatchingConfig,
}

impl MatchEngine {
    pub fn new(pool: PgPool, normalizer: NormalizerConfig, cfg: MatchingConfig) -> Self {
        Self {
            pool,
            normalizer,
            cfg,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.cfg
    }

    /// Search key for a free-text requirement. None when the requirement is
    /// too weak to match against (fewer surviving tokens than configured).
    pub fn search_key(&self, requirement: &str) -> Option<String> {
        self.normalizer
            .search_key(requirement, self.cfg.min_search_tokens, MAX_KEY_WORDS)
    }

    /// Ranked candidates for a requirement. A requirement that yields no
    /// search key matches nothing rather than everything.
    pub async fn find_candidates(
        &self,
        requirement: &str,
        filters: &CandidateFilters,
        limit: Option<i64>,
    ) -> Result<Vec<CandidateMatch>> {
        let Some(key) = self.search_key(requirement) else {
            debug!(requirement, "requirement too weak for matching");
            return Ok(Vec::new());
        };
        let min_score = filters.min_score.unwrap_or(self.cfg.similarity_floor);
        let limit = limit.unwrap_or(self.cfg.candidate_limit);

        let candidates = db::offers::find_candidates(
            &self.pool,
            &key,
            min_score,
            filters.category_code.as_deref(),
            filters.supplier_id,
            limit,
        )
        .await?;
        debug!(
            requirement,
            key = %key,
            candidates = candidates.len(),
            "candidate search"
        );
        Ok(candidates)
    }

    /// Candidates for a stored tender line. The line's own category narrows
    /// the search unless the caller supplies one explicitly.
    pub async fn candidates_for_line(
        &self,
        line_id: i64,
        filters: &CandidateFilters,
        limit: Option<i64>,
    ) -> Result<Vec<CandidateMatch>> {
        let line = db::tender::get_line(&self.pool, line_id)
            .await?
            .ok_or(Error::NotFound("tender line"))?;
        let mut filters = filters.clone();
        if filters.category_code.is_none() {
            filters.category_code = line.category_code.clone();
        }
        self.find_candidates(&line.name_input, &filters, limit).await
    }
}
