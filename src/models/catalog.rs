use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Supplier reference (id + display name)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
}

/// A persisted catalog line item. One supplier has exactly one live catalog
/// generation; re-import replaces all of its rows wholesale.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub supplier_id: i64,
    pub external_code: Option<String>,
    pub name_raw: String,
    pub unit_raw: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub is_active: bool,
    pub name_normalized: Option<String>,
    pub name_search: Option<String>,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
}

/// A catalog item joined with its supplier name plus the text the similarity
/// operator compares against. Used when snapshotting an offer.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogItemRef {
    pub id: i64,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub name_raw: String,
    pub unit_raw: Option<String>,
    pub price: BigDecimal,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
    pub match_text: String,
}

/// A fully normalized row ready for batch insertion.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub supplier_id: i64,
    pub import_batch_id: i64,
    pub external_code: Option<String>,
    pub name_raw: String,
    pub unit_raw: Option<String>,
    pub price: BigDecimal,
    pub currency: String,
    pub name_normalized: String,
    pub name_search: Option<String>,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub category_code: Option<String>,
}
