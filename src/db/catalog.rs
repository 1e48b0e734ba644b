use sqlx::postgres::PgExecutor;

use crate::models::{CatalogItemRef, ImportBatch, NewCatalogItem, Supplier};

pub async fn insert_supplier(
    executor: impl PgExecutor<'_>,
    name: &str,
) -> Result<Supplier, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(
        r#"
        INSERT INTO suppliers (name)
        VALUES ($1)
        RETURNING id, name
        "#,
    )
    .bind(name)
    .fetch_one(executor)
    .await
}

pub async fn list_suppliers(executor: impl PgExecutor<'_>) -> Result<Vec<Supplier>, sqlx::Error> {
    sqlx::query_as::<_, Supplier>(
        r#"
        SELECT id, name
        FROM suppliers
        ORDER BY name, id
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn supplier_exists(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
) -> Result<bool, sqlx::Error> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM suppliers WHERE id = $1")
        .bind(supplier_id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

/// Drop every catalog row of a supplier ahead of a re-import. Offers keep
/// their snapshots; only the live catalog generation is replaced.
pub async fn delete_supplier_catalog(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM catalog_items WHERE supplier_id = $1")
        .bind(supplier_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_import_batch(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
    file_name: &str,
    status: &str,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO import_batches (supplier_id, file_name, status)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(supplier_id)
    .bind(file_name)
    .bind(status)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

pub async fn finish_import_batch(
    executor: impl PgExecutor<'_>,
    batch_id: i64,
    status: &str,
    rows_imported: i64,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE import_batches
        SET status = $2, rows_imported = $3, error_message = $4
        WHERE id = $1
        "#,
    )
    .bind(batch_id)
    .bind(status)
    .bind(rows_imported)
    .bind(error_message)
    .execute(executor)
    .await?;
    Ok(())
}

/// Record a failed run outside the (rolled back) import transaction, so the
/// batch history explains what happened.
pub async fn record_failed_import(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
    file_name: &str,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO import_batches (supplier_id, file_name, status, error_message)
        VALUES ($1, $2, 'error', $3)
        "#,
    )
    .bind(supplier_id)
    .bind(file_name)
    .bind(error_message)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_import_batches(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
) -> Result<Vec<ImportBatch>, sqlx::Error> {
    sqlx::query_as::<_, ImportBatch>(
        r#"
        SELECT id, supplier_id, file_name, status, rows_imported, error_message, created_at
        FROM import_batches
        WHERE supplier_id = $1
        ORDER BY id DESC
        "#,
    )
    .bind(supplier_id)
    .fetch_all(executor)
    .await
}

/// Batch-insert normalized catalog rows.
pub async fn insert_catalog_items(
    executor: impl PgExecutor<'_>,
    items: &[NewCatalogItem],
) -> Result<u64, sqlx::Error> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO catalog_items (
            supplier_id, import_batch_id, external_code, name_raw, unit_raw,
            price, currency, name_normalized, name_search,
            base_unit, base_qty, price_per_unit, category_code
        ) ",
    );

    query_builder.push_values(items, |mut b, item| {
        b.push_bind(item.supplier_id)
            .push_bind(item.import_batch_id)
            .push_bind(&item.external_code)
            .push_bind(&item.name_raw)
            .push_bind(&item.unit_raw)
            .push_bind(item.price.clone())
            .push_bind(&item.currency)
            .push_bind(&item.name_normalized)
            .push_bind(&item.name_search)
            .push_bind(&item.base_unit)
            .push_bind(item.base_qty.clone())
            .push_bind(item.price_per_unit.clone())
            .push_bind(&item.category_code);
    });

    let result = query_builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

pub async fn list_catalog_items(
    executor: impl PgExecutor<'_>,
    supplier_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<crate::models::CatalogItem>, sqlx::Error> {
    sqlx::query_as::<_, crate::models::CatalogItem>(
        r#"
        SELECT id, supplier_id, external_code, name_raw, unit_raw, price, currency,
               is_active, name_normalized, name_search, base_unit, base_qty,
               price_per_unit, category_code
        FROM catalog_items
        WHERE supplier_id = $1
        ORDER BY id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(supplier_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// Load one catalog item with its supplier name and the text the similarity
/// operator compares against.
pub async fn get_item_with_supplier(
    executor: impl PgExecutor<'_>,
    item_id: i64,
) -> Result<Option<CatalogItemRef>, sqlx::Error> {
    sqlx::query_as::<_, CatalogItemRef>(
        r#"
        SELECT ci.id, ci.supplier_id, s.name AS supplier_name,
               ci.name_raw, ci.unit_raw, ci.price,
               ci.base_unit, ci.base_qty, ci.price_per_unit, ci.category_code,
               coalesce(ci.name_search, ci.name_normalized, ci.name_raw) AS match_text
        FROM catalog_items ci
        INNER JOIN suppliers s ON s.id = ci.supplier_id
        WHERE ci.id = $1 AND ci.is_active
        "#,
    )
    .bind(item_id)
    .fetch_optional(executor)
    .await
}
