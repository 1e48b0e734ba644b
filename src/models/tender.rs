use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tender (or purchase order) being assembled by a buyer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TenderProject {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Project row for listings, with the line count precomputed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TenderProjectSummary {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub lines_count: i64,
}

/// One requirement line of a tender. `selected_offer_id` is the active-offer
/// pointer; when set it must reference an offer belonging to this line.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TenderLine {
    pub id: i64,
    pub project_id: i64,
    pub row_no: i32,
    pub name_input: String,
    pub qty: Option<BigDecimal>,
    pub unit_input: Option<String>,
    pub category_code: Option<String>,
    pub selected_offer_id: Option<i64>,
}

/// A tender line parsed from an uploaded requirement sheet, before insertion.
#[derive(Debug, Clone)]
pub struct NewTenderLine {
    pub name_input: String,
    pub qty: Option<BigDecimal>,
    pub unit_input: Option<String>,
    pub category_code: Option<String>,
}
