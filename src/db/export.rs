use std::io;

use bigdecimal::BigDecimal;
use sqlx::postgres::PgExecutor;
use sqlx::FromRow;

use crate::error::Result;

/// One tender line joined with its active offer (if any), flattened for the
/// award export.
#[derive(Debug, Clone, FromRow)]
pub struct AwardRow {
    pub row_no: i32,
    pub name_input: String,
    pub qty: Option<BigDecimal>,
    pub unit_input: Option<String>,
    pub category_code: Option<String>,
    pub offer_type: Option<String>,
    pub supplier_name: Option<String>,
    pub item_name: Option<String>,
    pub price: Option<BigDecimal>,
    pub price_per_unit: Option<BigDecimal>,
    pub base_unit: Option<String>,
    pub base_qty: Option<BigDecimal>,
    pub score: Option<f32>,
}

/// All lines of a project with their active offers, in sheet order. Lines
/// without an active offer export with empty award columns.
pub async fn award_rows(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<Vec<AwardRow>> {
    let rows = sqlx::query_as::<_, AwardRow>(
        r#"
        SELECT l.row_no, l.name_input, l.qty, l.unit_input, l.category_code,
               o.offer_type, o.supplier_name, o.item_name, o.price,
               o.price_per_unit, o.base_unit, o.base_qty, o.score
        FROM tender_lines l
        LEFT JOIN tender_offers o ON o.id = l.selected_offer_id
        WHERE l.project_id = $1
        ORDER BY l.row_no, l.id
        "#,
    )
    .bind(project_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

fn decimal_cell(val: &Option<BigDecimal>) -> String {
    val.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn text_cell(val: &Option<String>) -> String {
    val.clone().unwrap_or_default()
}

/// Write award rows as CSV, with the totals computed the same way the offer
/// views compute them.
pub fn write_award_csv<W: io::Write>(rows: &[AwardRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record([
        "row_no",
        "name",
        "qty",
        "unit",
        "category",
        "status",
        "supplier",
        "offer_item",
        "offer_price",
        "price_per_unit",
        "base_unit",
        "base_qty",
        "score",
        "packs_needed",
        "total_price",
    ])?;

    for row in rows {
        let totals = crate::service::offers::offer_totals(
            row.price.as_ref(),
            row.price_per_unit.as_ref(),
            row.base_qty.as_ref(),
            row.qty.as_ref(),
        );
        writer.write_record([
            row.row_no.to_string(),
            row.name_input.clone(),
            decimal_cell(&row.qty),
            text_cell(&row.unit_input),
            text_cell(&row.category_code),
            text_cell(&row.offer_type),
            text_cell(&row.supplier_name),
            text_cell(&row.item_name),
            decimal_cell(&row.price),
            decimal_cell(&row.price_per_unit),
            text_cell(&row.base_unit),
            decimal_cell(&row.base_qty),
            row.score.map(|s| format!("{:.4}", s)).unwrap_or_default(),
            totals
                .packs_needed
                .map(|p| p.to_string())
                .unwrap_or_default(),
            decimal_cell(&totals.total_price),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn awarded_and_bare_lines_both_export() {
        let rows = vec![
            AwardRow {
                row_no: 1,
                name_input: "Сыр Моцарелла".to_string(),
                qty: Some(dec("10")),
                unit_input: Some("кг".to_string()),
                category_code: Some("fresh".to_string()),
                offer_type: Some("final".to_string()),
                supplier_name: Some("ООО Ромашка".to_string()),
                item_name: Some("Сыр Моцарелла 1кг".to_string()),
                price: Some(dec("500")),
                price_per_unit: Some(dec("500.0000")),
                base_unit: Some("kg".to_string()),
                base_qty: Some(dec("1")),
                score: Some(0.8),
            },
            AwardRow {
                row_no: 2,
                name_input: "Салфетки".to_string(),
                qty: None,
                unit_input: None,
                category_code: None,
                offer_type: None,
                supplier_name: None,
                item_name: None,
                price: None,
                price_per_unit: None,
                base_unit: None,
                base_qty: None,
                score: None,
            },
        ];

        let mut buf = Vec::new();
        write_award_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert!(lines.next().unwrap().starts_with("row_no,name,qty"));
        let awarded = lines.next().unwrap();
        assert!(awarded.contains("ООО Ромашка"));
        assert!(awarded.contains("5000.0000")); // 500/kg x 10 kg
        let bare = lines.next().unwrap();
        assert!(bare.starts_with("2,Салфетки,,,"));
    }
}
