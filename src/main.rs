use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use smartproc_rust::{
    api, create_pool, AppConfig, IngestService, MatchEngine, NormalizerConfig, OfferLifecycle,
};
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // local-time log format
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    let pool = create_pool(&config.database.url).await?;
    info!("Database pool created");

    let normalizer = match &config.lexicon_path {
        Some(path) => {
            info!("Loading lexicon from {}", path);
            NormalizerConfig::from_json_file(path)?
        }
        None => NormalizerConfig::default(),
    };

    let state = api::AppState {
        ingest: Arc::new(IngestService::new(pool.clone(), normalizer.clone())),
        engine: Arc::new(MatchEngine::new(
            pool.clone(),
            normalizer.clone(),
            config.matching.clone(),
        )),
        offers: Arc::new(OfferLifecycle::new(
            pool.clone(),
            normalizer,
            config.matching.clone(),
        )),
        pool,
    };

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route(
            "/api/suppliers",
            get(api::list_suppliers).post(api::create_supplier),
        )
        .route(
            "/api/suppliers/:id/catalog",
            get(api::list_catalog).post(api::ingest_catalog),
        )
        .route("/api/suppliers/:id/imports", get(api::list_imports))
        .route(
            "/api/projects",
            get(api::list_projects).post(api::create_project),
        )
        .route("/api/projects/:id", get(api::get_project))
        .route("/api/projects/:id/lines", post(api::upload_tender_sheet))
        .route(
            "/api/projects/:id/suppliers",
            put(api::set_project_suppliers),
        )
        .route("/api/projects/:id/autopick", post(api::autopick))
        .route("/api/projects/:id/export", get(api::export_project))
        .route("/api/lines/:id/candidates", get(api::line_candidates))
        .route("/api/lines/:id/offers", get(api::line_offers))
        .route(
            "/api/lines/:id/offers/rebuild",
            post(api::rebuild_line_offers),
        )
        .route("/api/lines/:id/select", post(api::select_offer))
        .route("/api/lines/:id/clear", post(api::clear_offer))
        .route("/api/lines/:id/finalize", post(api::finalize_offer))
        .layer(ServiceBuilder::new())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
