use sqlx::PgPool;
use tracing::{info, warn};

use crate::db;
use crate::error::{Error, Result};
use crate::models::{
    ImportStatus, IngestReport, NewCatalogItem, NewTenderLine, PriceFile, RawCell, Sheet,
    SheetReason, SheetStats,
};
use crate::service::category::{classify, normalize_category_value};
use crate::service::columns::{infer_columns, normalize_header, ColumnInference, ResolvedColumns};
use crate::service::numeric::{compute_unit_metrics, parse_price};
use crate::service::search_text::{normalize_name, NormalizerConfig};

/// Insert catalog rows in chunks of this many.
const FLUSH_SIZE: usize = 1000;

/// Leading rows scanned for a requirement-sheet header.
const TENDER_HEADER_SCAN: usize = 20;

const TENDER_NAME_KEYS: &[&str] = &["наимен", "товар", "номенклат", "name", "product"];
const TENDER_QTY_KEYS: &[&str] = &["колво", "кол", "quantity", "qty"];
const TENDER_UNIT_KEYS: &[&str] = &["ед", "unit"];
const TENDER_CATEGORY_KEYS: &[&str] = &["категор", "category"];

/// Catalog and requirement-sheet ingestion. A whole price file is imported
/// in one transaction: the supplier's previous catalog generation is deleted
/// and the new rows inserted atomically, so concurrent matching never sees a
/// half-replaced catalog.
pub struct IngestService {
    pool: PgPool,
    normalizer: NormalizerConfig,
}

impl IngestService {
    pub fn new(pool: PgPool, normalizer: NormalizerConfig) -> Self {
        Self { pool, normalizer }
    }

    /// Replace a supplier's catalog with the rows of an uploaded price file.
    /// On failure everything is rolled back and an `error` batch row records
    /// what happened.
    pub async fn ingest(&self, supplier_id: i64, file: &PriceFile) -> Result<IngestReport> {
        if !db::catalog::supplier_exists(&self.pool, supplier_id).await? {
            return Err(Error::NotFound("supplier"));
        }

        match self.run_import(supplier_id, file).await {
            Ok(report) => {
                info!(
                    supplier_id,
                    batch_id = report.batch_id,
                    imported = report.imported,
                    sheets = report.sheets.len(),
                    "catalog import finished"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(supplier_id, error = %e, "catalog import failed, rolled back");
                db::catalog::record_failed_import(
                    &self.pool,
                    supplier_id,
                    &file.filename,
                    &e.to_string(),
                )
                .await?;
                Err(e)
            }
        }
    }

    async fn run_import(&self, supplier_id: i64, file: &PriceFile) -> Result<IngestReport> {
        let mut tx = self.pool.begin().await?;

        let removed = db::catalog::delete_supplier_catalog(&mut *tx, supplier_id).await?;
        let batch_id = db::catalog::insert_import_batch(
            &mut *tx,
            supplier_id,
            &file.filename,
            ImportStatus::Importing.as_str(),
        )
        .await?;
        info!(supplier_id, batch_id, removed, "replacing supplier catalog");

        let mut sheets = Vec::with_capacity(file.sheets.len());
        let mut imported = 0usize;
        for sheet in &file.sheets {
            let (items, stats) = plan_sheet(&self.normalizer, supplier_id, batch_id, sheet);
            for chunk in items.chunks(FLUSH_SIZE) {
                db::catalog::insert_catalog_items(&mut *tx, chunk).await?;
            }
            imported += stats.imported;
            sheets.push(stats);
        }

        db::catalog::finish_import_batch(
            &mut *tx,
            batch_id,
            ImportStatus::Imported.as_str(),
            imported as i64,
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(IngestReport {
            batch_id,
            imported,
            sheets,
        })
    }

    /// Append requirement lines parsed from an uploaded sheet to a project.
    pub async fn import_tender_sheet(&self, project_id: i64, sheet: &Sheet) -> Result<usize> {
        let lines = plan_tender_lines(sheet)?;

        let mut tx = self.pool.begin().await?;
        if db::tender::get_project(&mut *tx, project_id).await?.is_none() {
            return Err(Error::NotFound("tender project"));
        }
        let next_row = db::tender::max_row_no(&mut *tx, project_id).await? + 1;
        db::tender::insert_lines(&mut *tx, project_id, next_row, &lines).await?;
        tx.commit().await?;

        info!(project_id, lines = lines.len(), "tender sheet imported");
        Ok(lines.len())
    }
}

fn cell_text(row: &[RawCell], col: Option<usize>) -> Option<String> {
    col.and_then(|i| row.get(i)).and_then(|c| c.text())
}

/// Normalize one sheet into insert-ready catalog rows plus per-sheet stats.
/// Rows without a usable name or price are skipped, not fatal.
pub fn plan_sheet(
    normalizer: &NormalizerConfig,
    supplier_id: i64,
    batch_id: i64,
    sheet: &Sheet,
) -> (Vec<NewCatalogItem>, SheetStats) {
    let mut stats = SheetStats {
        sheet: sheet.name.clone(),
        imported: 0,
        skipped: 0,
        reason: SheetReason::Ok,
        columns: None,
    };

    if sheet.rows.iter().all(|r| r.iter().all(|c| c.is_empty())) {
        stats.reason = SheetReason::Empty;
        return (Vec::new(), stats);
    }

    let (columns, header_row) = match infer_columns(sheet) {
        ColumnInference::Resolved {
            columns,
            header_row,
        } => (columns, header_row),
        ColumnInference::NotDetected(map) => {
            stats.reason = SheetReason::ColumnsNotDetected;
            stats.columns = Some(map);
            return (Vec::new(), stats);
        }
    };
    stats.columns = Some(columns.into());

    let data_start = header_row.map(|i| i + 1).unwrap_or(0);
    let mut items = Vec::new();
    for row in sheet.rows.iter().skip(data_start) {
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        match build_item(normalizer, supplier_id, batch_id, row, &columns) {
            Some(item) => {
                items.push(item);
                stats.imported += 1;
            }
            None => stats.skipped += 1,
        }
    }
    (items, stats)
}

/// Normalize one data row. None means the row lacks a name or a parsable
/// price and is counted as skipped.
fn build_item(
    normalizer: &NormalizerConfig,
    supplier_id: i64,
    batch_id: i64,
    row: &[RawCell],
    columns: &ResolvedColumns,
) -> Option<NewCatalogItem> {
    let name_raw = cell_text(row, Some(columns.name))?;
    let price = parse_price(&cell_text(row, Some(columns.price))?)?;
    let unit_raw = cell_text(row, columns.unit);
    let external_code = cell_text(row, columns.code);

    let name_normalized = normalize_name(&name_raw);
    let name_search = normalizer
        .catalog_search_key(&name_raw, unit_raw.as_deref())
        .or_else(|| (!name_normalized.is_empty()).then(|| name_normalized.clone()));
    let metrics = compute_unit_metrics(&name_raw, unit_raw.as_deref(), Some(&price));
    let category_code = classify(&name_raw).map(|c| c.code().to_string());

    Some(NewCatalogItem {
        supplier_id,
        import_batch_id: batch_id,
        external_code,
        name_raw,
        unit_raw,
        price,
        currency: "RUB".to_string(),
        name_normalized,
        name_search,
        base_unit: metrics.base_unit.map(|u| u.code().to_string()),
        base_qty: metrics.base_qty,
        price_per_unit: metrics.price_per_unit,
        category_code,
    })
}

struct TenderColumns {
    name: usize,
    qty: Option<usize>,
    unit: Option<usize>,
    category: Option<usize>,
}

fn find_tender_header(sheet: &Sheet) -> Option<(usize, TenderColumns)> {
    for (idx, row) in sheet.rows.iter().take(TENDER_HEADER_SCAN).enumerate() {
        let headers: Vec<String> = row
            .iter()
            .map(|c| c.text().map(|t| normalize_header(&t)).unwrap_or_default())
            .collect();
        let claim = |keys: &[&str]| {
            headers
                .iter()
                .position(|h| !h.is_empty() && keys.iter().any(|k| h.contains(k)))
        };
        if let Some(name) = claim(TENDER_NAME_KEYS) {
            return Some((
                idx,
                TenderColumns {
                    name,
                    qty: claim(TENDER_QTY_KEYS),
                    unit: claim(TENDER_UNIT_KEYS),
                    category: claim(TENDER_CATEGORY_KEYS),
                },
            ));
        }
    }
    None
}

/// Parse an uploaded requirement sheet into tender lines. Unlike catalog
/// ingestion this is strict: a sheet without a recognizable header is
/// rejected, and a category label that does not map to the closed set is
/// carried as empty rather than guessed.
pub fn plan_tender_lines(sheet: &Sheet) -> Result<Vec<NewTenderLine>> {
    let (header_row, columns) = find_tender_header(sheet).ok_or_else(|| {
        Error::Import(format!(
            "sheet '{}' has no recognizable requirement header",
            sheet.name
        ))
    })?;

    let mut lines = Vec::new();
    for row in sheet.rows.iter().skip(header_row + 1) {
        let Some(name_input) = cell_text(row, Some(columns.name)) else {
            continue;
        };
        let qty = cell_text(row, columns.qty).and_then(|t| parse_price(&t));
        let unit_input = cell_text(row, columns.unit);
        let category_code = cell_text(row, columns.category)
            .and_then(|t| normalize_category_value(&t))
            .map(|c| c.code().to_string());
        lines.push(NewTenderLine {
            name_input,
            qty,
            unit_input,
            category_code,
        });
    }

    if lines.is_empty() {
        return Err(Error::Import(format!(
            "sheet '{}' contains no requirement rows",
            sheet.name
        )));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn text_row(cells: &[&str]) -> Vec<RawCell> {
        cells.iter().map(|c| RawCell::Text(c.to_string())).collect()
    }

    fn price_sheet() -> Sheet {
        Sheet {
            name: "Прайс".to_string(),
            rows: vec![
                text_row(&["Наименование", "Ед.", "Цена", "Код"]),
                text_row(&["Сыр Моцарелла 1кг", "шт", "500", "A-100"]),
                text_row(&["Сок яблочный 10x1л", "уп", "800,00", "A-101"]),
                text_row(&["Позиция без цены", "шт", "договорная", "A-102"]),
                vec![RawCell::Empty, RawCell::Empty, RawCell::Empty, RawCell::Empty],
            ],
        }
    }

    #[test]
    fn plan_sheet_normalizes_rows_and_counts_skips() {
        let normalizer = NormalizerConfig::default();
        let (items, stats) = plan_sheet(&normalizer, 7, 42, &price_sheet());

        assert_eq!(stats.reason, SheetReason::Ok);
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(items.len(), 2);

        let cheese = &items[0];
        assert_eq!(cheese.supplier_id, 7);
        assert_eq!(cheese.import_batch_id, 42);
        assert_eq!(cheese.external_code.as_deref(), Some("A-100"));
        assert_eq!(cheese.currency, "RUB");
        assert_eq!(cheese.base_unit.as_deref(), Some("kg"));
        assert_eq!(cheese.name_search.as_deref(), Some("сыр моцарелла"));
        assert_eq!(cheese.category_code.as_deref(), Some("fresh"));

        let juice = &items[1];
        assert_eq!(juice.base_unit.as_deref(), Some("l"));
        assert_eq!(juice.base_qty, Some(BigDecimal::from_str("10.000000").unwrap()));
        assert_eq!(
            juice.price_per_unit,
            Some(BigDecimal::from_str("80.0000").unwrap())
        );
    }

    #[test]
    fn empty_and_undetectable_sheets_are_reported_not_fatal() {
        let normalizer = NormalizerConfig::default();

        let empty = Sheet {
            name: "Лист2".to_string(),
            rows: vec![vec![RawCell::Empty, RawCell::Empty]],
        };
        let (items, stats) = plan_sheet(&normalizer, 1, 1, &empty);
        assert!(items.is_empty());
        assert_eq!(stats.reason, SheetReason::Empty);

        let noise = Sheet {
            name: "Лист3".to_string(),
            rows: vec![text_row(&["а", "б"]), text_row(&["в", "г"])],
        };
        let (items, stats) = plan_sheet(&normalizer, 1, 1, &noise);
        assert!(items.is_empty());
        assert_eq!(stats.reason, SheetReason::ColumnsNotDetected);
    }

    #[test]
    fn tender_sheet_parses_lines() {
        let sheet = Sheet {
            name: "Заявка".to_string(),
            rows: vec![
                text_row(&["№", "Наименование", "Кол-во", "Ед.", "Категория"]),
                text_row(&["1", "Сыр Моцарелла", "10", "кг", "свежие"]),
                text_row(&["2", "Огурцы маринованные", "5,5", "кг", "консервация"]),
                text_row(&["3", "Салфетки", "", "", "бакалея"]),
            ],
        };

        let lines = plan_tender_lines(&sheet).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].name_input, "Сыр Моцарелла");
        assert_eq!(lines[0].qty, Some(BigDecimal::from(10)));
        assert_eq!(lines[0].category_code.as_deref(), Some("fresh"));
        assert_eq!(lines[1].qty, Some(BigDecimal::from_str("5.5").unwrap()));
        assert_eq!(lines[1].category_code.as_deref(), Some("canned"));
        // unknown label is dropped, never guessed
        assert_eq!(lines[2].category_code, None);
    }

    #[test]
    fn tender_sheet_without_header_is_rejected() {
        let sheet = Sheet {
            name: "Лист1".to_string(),
            rows: vec![text_row(&["Сыр", "10"])],
        };
        assert!(matches!(plan_tender_lines(&sheet), Err(Error::Import(_))));
    }
}
