use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::service::columns::ColumnMap;

/// Lifecycle state of an import batch. A batch must never be left in
/// `Importing` by a completed run: it ends `Imported` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Importing,
    Imported,
    Error,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Importing => "importing",
            ImportStatus::Imported => "imported",
            ImportStatus::Error => "error",
        }
    }
}

/// One catalog import run for a supplier.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: i64,
    pub supplier_id: i64,
    pub file_name: String,
    pub status: String,
    pub rows_imported: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Why a sheet contributed the rows it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetReason {
    Ok,
    Empty,
    ColumnsNotDetected,
}

/// Per-sheet outcome of an ingestion run. Skipped rows are data noise
/// (missing name, unparsable price), not errors.
#[derive(Debug, Clone, Serialize)]
pub struct SheetStats {
    pub sheet: String,
    pub imported: usize,
    pub skipped: usize,
    pub reason: SheetReason,
    pub columns: Option<ColumnMap>,
}

/// Result of a whole ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub batch_id: i64,
    pub imported: usize,
    pub sheets: Vec<SheetStats>,
}
