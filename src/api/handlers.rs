use axum::extract::{Json, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::AppState;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{
    AutopickReport, CandidateMatch, CatalogItem, ImportBatch, IngestReport, LineDetail, Offer,
    PriceFile, ProjectDetail, Sheet, Supplier, TenderProject, TenderProjectSummary,
};
use crate::service::CandidateFilters;

/// Health check.
pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(req): Json<CreateSupplierRequest>,
) -> Result<Json<Supplier>> {
    let supplier = db::catalog::insert_supplier(&state.pool, &req.name).await?;
    Ok(Json(supplier))
}

pub async fn list_suppliers(State(state): State<AppState>) -> Result<Json<Vec<Supplier>>> {
    Ok(Json(db::catalog::list_suppliers(&state.pool).await?))
}

/// Replace a supplier's catalog with an uploaded price file. The file
/// arrives pre-parsed into sheets of typed cells.
pub async fn ingest_catalog(
    State(state): State<AppState>,
    Path(supplier_id): Path<i64>,
    Json(file): Json<PriceFile>,
) -> Result<Json<IngestReport>> {
    let report = state.ingest.ingest(supplier_id, &file).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_catalog(
    State(state): State<AppState>,
    Path(supplier_id): Path<i64>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<CatalogItem>>> {
    if !db::catalog::supplier_exists(&state.pool, supplier_id).await? {
        return Err(Error::NotFound("supplier"));
    }
    let items = db::catalog::list_catalog_items(
        &state.pool,
        supplier_id,
        query.limit.unwrap_or(100),
        query.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(items))
}

pub async fn list_imports(
    State(state): State<AppState>,
    Path(supplier_id): Path<i64>,
) -> Result<Json<Vec<ImportBatch>>> {
    if !db::catalog::supplier_exists(&state.pool, supplier_id).await? {
        return Err(Error::NotFound("supplier"));
    }
    Ok(Json(
        db::catalog::list_import_batches(&state.pool, supplier_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<TenderProject>> {
    let project = db::tender::insert_project(&state.pool, &req.title).await?;
    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<TenderProjectSummary>>> {
    Ok(Json(db::tender::list_projects(&state.pool).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<ProjectDetail>> {
    Ok(Json(state.offers.project_detail(project_id).await?))
}

#[derive(Debug, serde::Serialize)]
pub struct UploadLinesResponse {
    pub imported: usize,
}

/// Append requirement lines parsed from an uploaded sheet.
pub async fn upload_tender_sheet(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(sheet): Json<Sheet>,
) -> Result<Json<UploadLinesResponse>> {
    let imported = state.ingest.import_tender_sheet(project_id, &sheet).await?;
    Ok(Json(UploadLinesResponse { imported }))
}

#[derive(Debug, Deserialize)]
pub struct SetSuppliersRequest {
    pub supplier_ids: Vec<i64>,
}

/// Replace the supplier scope of a project.
pub async fn set_project_suppliers(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(req): Json<SetSuppliersRequest>,
) -> Result<Json<Vec<Supplier>>> {
    if db::tender::get_project(&state.pool, project_id)
        .await?
        .is_none()
    {
        return Err(Error::NotFound("tender project"));
    }
    db::tender::replace_project_suppliers(&state.pool, project_id, &req.supplier_ids).await?;
    Ok(Json(
        db::tender::project_suppliers(&state.pool, project_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub category: Option<String>,
    pub supplier_id: Option<i64>,
    pub min_score: Option<f32>,
    pub limit: Option<i64>,
}

/// Ranked catalog candidates for one tender line.
pub async fn line_candidates(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<CandidateMatch>>> {
    let filters = CandidateFilters {
        category_code: query.category,
        supplier_id: query.supplier_id,
        min_score: query.min_score,
    };
    let candidates = state
        .engine
        .candidates_for_line(line_id, &filters, query.limit)
        .await?;
    Ok(Json(candidates))
}

pub async fn line_offers(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
) -> Result<Json<LineDetail>> {
    Ok(Json(state.offers.line_offers(line_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SelectOfferRequest {
    pub catalog_item_id: i64,
}

pub async fn select_offer(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
    Json(req): Json<SelectOfferRequest>,
) -> Result<Json<Offer>> {
    let offer = state.offers.select(line_id, req.catalog_item_id).await?;
    Ok(Json(offer))
}

pub async fn clear_offer(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    state.offers.clear(line_id).await?;
    Ok(Json(serde_json::json!({ "cleared": true })))
}

#[derive(Debug, Deserialize)]
pub struct FinalizeOfferRequest {
    pub offer_id: i64,
}

pub async fn finalize_offer(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
    Json(req): Json<FinalizeOfferRequest>,
) -> Result<Json<Offer>> {
    let offer = state.offers.finalize(line_id, req.offer_id).await?;
    Ok(Json(offer))
}

#[derive(Debug, serde::Serialize)]
pub struct RebuildResponse {
    pub alternatives: usize,
}

pub async fn rebuild_line_offers(
    State(state): State<AppState>,
    Path(line_id): Path<i64>,
) -> Result<Json<RebuildResponse>> {
    let alternatives = state.offers.rebuild_alternatives(line_id).await?;
    Ok(Json(RebuildResponse { alternatives }))
}

pub async fn autopick(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<AutopickReport>> {
    Ok(Json(state.offers.autopick(project_id).await?))
}

/// Award table of a project as a CSV download.
pub async fn export_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Response> {
    if db::tender::get_project(&state.pool, project_id)
        .await?
        .is_none()
    {
        return Err(Error::NotFound("tender project"));
    }
    let rows = db::export::award_rows(&state.pool, project_id).await?;
    let mut buf = Vec::new();
    db::export::write_award_csv(&rows, &mut buf)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"tender_{}.csv\"", project_id),
        ),
    ];
    Ok((headers, buf).into_response())
}
