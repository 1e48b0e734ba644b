pub mod handlers;

use std::sync::Arc;

use sqlx::PgPool;

use crate::service::{IngestService, MatchEngine, OfferLifecycle};

pub use handlers::*;

/// Shared state: the three services plus a pool for plain reads.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub engine: Arc<MatchEngine>,
    pub offers: Arc<OfferLifecycle>,
    pub pool: PgPool,
}
