use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::catalog::CatalogItemRef;
use crate::models::tender::TenderLine;
use crate::models::TenderProject;

/// Lifecycle state of an offer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Selected,
    Alternative,
    Final,
}

impl OfferType {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferType::Selected => "selected",
            OfferType::Alternative => "alternative",
            OfferType::Final => "final",
        }
    }
}

/// A point-in-time snapshot of one catalog item matched against one tender
/// line. Deleting the catalog item later does not change the snapshot.
/// At most one offer row exists per (tender line, catalog item) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub tender_line_id: i64,
    pub offer_type: String,
    pub supplier_id: i64,
    pub catalog_item_id: i64,
    pub supplier_name: String,
    pub item_name: String,
    pub unit: Option<String>,
    pub price: BigDecimal,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
    pub score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// A ranked catalog candidate for a requirement, as returned by the storage
/// layer's similarity query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CandidateMatch {
    pub catalog_item_id: i64,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub name_raw: String,
    pub unit_raw: Option<String>,
    pub price: BigDecimal,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
    pub score: f32,
}

/// The catalog-item fields an offer row snapshots at match time.
#[derive(Debug, Clone)]
pub struct OfferSnapshot {
    pub supplier_id: i64,
    pub catalog_item_id: i64,
    pub supplier_name: String,
    pub item_name: String,
    pub unit: Option<String>,
    pub price: BigDecimal,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
    pub score: Option<f32>,
}

impl OfferSnapshot {
    pub fn from_item(item: &CatalogItemRef, score: Option<f32>) -> Self {
        Self {
            supplier_id: item.supplier_id,
            catalog_item_id: item.id,
            supplier_name: item.supplier_name.clone(),
            item_name: item.name_raw.clone(),
            unit: item.unit_raw.clone(),
            price: item.price.clone(),
            base_unit: item.base_unit.clone(),
            base_qty: item.base_qty.clone(),
            price_per_unit: item.price_per_unit.clone(),
            category_code: item.category_code.clone(),
            score,
        }
    }

    pub fn from_candidate(cand: &CandidateMatch) -> Self {
        Self {
            supplier_id: cand.supplier_id,
            catalog_item_id: cand.catalog_item_id,
            supplier_name: cand.supplier_name.clone(),
            item_name: cand.name_raw.clone(),
            unit: cand.unit_raw.clone(),
            price: cand.price.clone(),
            base_unit: cand.base_unit.clone(),
            base_qty: cand.base_qty.clone(),
            price_per_unit: cand.price_per_unit.clone(),
            category_code: cand.category_code.clone(),
            score: Some(cand.score),
        }
    }
}

/// Read-side money math for an offer against a requested quantity.
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfferTotals {
    pub total_price: Option<BigDecimal>,
    pub packs_needed: Option<u64>,
}

/// An offer enriched with totals for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: Offer,
    pub tender_qty: Option<BigDecimal>,
    pub total_price: Option<BigDecimal>,
    pub packs_needed: Option<u64>,
}

/// A tender line with its offers, ready for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct LineDetail {
    #[serde(flatten)]
    pub line: TenderLine,
    pub offers: Vec<OfferView>,
}

/// Full project view: lines, offers and the suppliers in scope.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: TenderProject,
    pub suppliers: Vec<crate::models::Supplier>,
    pub lines: Vec<LineDetail>,
}

/// Outcome of auto-picking best offers across a project.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AutopickReport {
    pub lines: usize,
    pub selected: usize,
}
