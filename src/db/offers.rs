use sqlx::postgres::PgExecutor;

use crate::models::{CandidateMatch, Offer, OfferSnapshot};

const OFFER_COLUMNS: &str = "id, tender_line_id, offer_type, supplier_id, catalog_item_id, \
     supplier_name, item_name, unit, price, base_unit, base_qty, price_per_unit, \
     category_code, score, created_at";

/// Trigram search across the whole catalog. The `%` operator keeps the query
/// on the GIN index; the explicit floor re-filters at the configured
/// threshold, which is usually stricter than `pg_trgm.similarity_threshold`.
pub async fn find_candidates(
    executor: impl PgExecutor<'_>,
    search_key: &str,
    min_score: f32,
    category_code: Option<&str>,
    supplier_id: Option<i64>,
    limit: i64,
) -> Result<Vec<CandidateMatch>, sqlx::Error> {
    sqlx::query_as::<_, CandidateMatch>(
        r#"
        SELECT ci.id AS catalog_item_id,
               ci.supplier_id,
               s.name AS supplier_name,
               ci.name_raw,
               ci.unit_raw,
               ci.price,
               ci.base_unit,
               ci.base_qty,
               ci.price_per_unit,
               ci.category_code,
               similarity(coalesce(ci.name_search, ci.name_normalized, ci.name_raw), $1) AS score
        FROM catalog_items ci
        INNER JOIN suppliers s ON s.id = ci.supplier_id
        WHERE ci.is_active
          AND coalesce(ci.name_search, ci.name_normalized, ci.name_raw) % $1
          AND similarity(coalesce(ci.name_search, ci.name_normalized, ci.name_raw), $1) >= $2
          AND ($3::text IS NULL OR ci.category_code = $3)
          AND ($4::bigint IS NULL OR ci.supplier_id = $4)
        ORDER BY score DESC, ci.price_per_unit ASC NULLS LAST, ci.id DESC
        LIMIT $5
        "#,
    )
    .bind(search_key)
    .bind(min_score)
    .bind(category_code)
    .bind(supplier_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// Best catalog rows of one supplier for a requirement, used when rebuilding
/// a line's alternatives.
pub async fn top_supplier_candidates(
    executor: impl PgExecutor<'_>,
    search_key: &str,
    supplier_id: i64,
    min_score: f32,
    category_code: Option<&str>,
    limit: i64,
) -> Result<Vec<CandidateMatch>, sqlx::Error> {
    sqlx::query_as::<_, CandidateMatch>(
        r#"
        SELECT ci.id AS catalog_item_id,
               ci.supplier_id,
               s.name AS supplier_name,
               ci.name_raw,
               ci.unit_raw,
               ci.price,
               ci.base_unit,
               ci.base_qty,
               ci.price_per_unit,
               ci.category_code,
               similarity(coalesce(ci.name_search, ci.name_normalized, ci.name_raw), $1) AS score
        FROM catalog_items ci
        INNER JOIN suppliers s ON s.id = ci.supplier_id
        WHERE ci.is_active
          AND ci.supplier_id = $2
          AND similarity(coalesce(ci.name_search, ci.name_normalized, ci.name_raw), $1) >= $3
          AND ($4::text IS NULL OR ci.category_code = $4)
        ORDER BY score DESC, ci.price_per_unit ASC NULLS LAST, ci.id DESC
        LIMIT $5
        "#,
    )
    .bind(search_key)
    .bind(supplier_id)
    .bind(min_score)
    .bind(category_code)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// Trigram similarity of two already-normalized strings.
pub async fn similarity_score(
    executor: impl PgExecutor<'_>,
    left: &str,
    right: &str,
) -> Result<f32, sqlx::Error> {
    let (score,): (f32,) = sqlx::query_as("SELECT similarity($1, $2)")
        .bind(left)
        .bind(right)
        .fetch_one(executor)
        .await?;
    Ok(score)
}

/// Insert or refresh the snapshot for one (line, catalog item) pair.
pub async fn upsert_offer(
    executor: impl PgExecutor<'_>,
    line_id: i64,
    offer_type: &str,
    snapshot: &OfferSnapshot,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tender_offers (
            tender_line_id, offer_type, supplier_id, catalog_item_id,
            supplier_name, item_name, unit, price,
            base_unit, base_qty, price_per_unit, category_code, score
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (tender_line_id, catalog_item_id) DO UPDATE SET
            offer_type = EXCLUDED.offer_type,
            supplier_name = EXCLUDED.supplier_name,
            item_name = EXCLUDED.item_name,
            unit = EXCLUDED.unit,
            price = EXCLUDED.price,
            base_unit = EXCLUDED.base_unit,
            base_qty = EXCLUDED.base_qty,
            price_per_unit = EXCLUDED.price_per_unit,
            category_code = EXCLUDED.category_code,
            score = EXCLUDED.score
        RETURNING id
        "#,
    )
    .bind(line_id)
    .bind(offer_type)
    .bind(snapshot.supplier_id)
    .bind(snapshot.catalog_item_id)
    .bind(&snapshot.supplier_name)
    .bind(&snapshot.item_name)
    .bind(&snapshot.unit)
    .bind(snapshot.price.clone())
    .bind(&snapshot.base_unit)
    .bind(snapshot.base_qty.clone())
    .bind(snapshot.price_per_unit.clone())
    .bind(&snapshot.category_code)
    .bind(snapshot.score)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Demote any selected or final offer of a line back to an alternative.
pub async fn demote_active(
    executor: impl PgExecutor<'_>,
    line_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tender_offers
        SET offer_type = 'alternative'
        WHERE tender_line_id = $1 AND offer_type IN ('selected', 'final')
        "#,
    )
    .bind(line_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_offer(
    executor: impl PgExecutor<'_>,
    offer_id: i64,
) -> Result<Option<Offer>, sqlx::Error> {
    sqlx::query_as::<_, Offer>(&format!(
        "SELECT {OFFER_COLUMNS} FROM tender_offers WHERE id = $1"
    ))
    .bind(offer_id)
    .fetch_optional(executor)
    .await
}

pub async fn set_offer_type(
    executor: impl PgExecutor<'_>,
    offer_id: i64,
    offer_type: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tender_offers SET offer_type = $2 WHERE id = $1")
        .bind(offer_id)
        .bind(offer_type)
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete alternatives a rebuild did not reproduce. Selected and final rows
/// are never touched here.
pub async fn delete_stale_alternatives(
    executor: impl PgExecutor<'_>,
    line_id: i64,
    keep_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM tender_offers
        WHERE tender_line_id = $1
          AND offer_type = 'alternative'
          AND id <> ALL($2)
        "#,
    )
    .bind(line_id)
    .bind(keep_ids)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Offers of one line in presentation order: selected first, then final,
/// then alternatives by score and price.
pub async fn list_offers(
    executor: impl PgExecutor<'_>,
    line_id: i64,
) -> Result<Vec<Offer>, sqlx::Error> {
    sqlx::query_as::<_, Offer>(&format!(
        r#"
        SELECT {OFFER_COLUMNS}
        FROM tender_offers
        WHERE tender_line_id = $1
        ORDER BY CASE offer_type WHEN 'selected' THEN 0 WHEN 'final' THEN 1 ELSE 2 END,
                 score DESC NULLS LAST,
                 price_per_unit ASC NULLS LAST,
                 id DESC
        "#
    ))
    .bind(line_id)
    .fetch_all(executor)
    .await
}

/// Same ordering as `list_offers`, for all lines of a project at once.
pub async fn list_offers_for_lines(
    executor: impl PgExecutor<'_>,
    line_ids: &[i64],
) -> Result<Vec<Offer>, sqlx::Error> {
    sqlx::query_as::<_, Offer>(&format!(
        r#"
        SELECT {OFFER_COLUMNS}
        FROM tender_offers
        WHERE tender_line_id = ANY($1)
        ORDER BY tender_line_id,
                 CASE offer_type WHEN 'selected' THEN 0 WHEN 'final' THEN 1 ELSE 2 END,
                 score DESC NULLS LAST,
                 price_per_unit ASC NULLS LAST,
                 id DESC
        "#
    ))
    .bind(line_ids)
    .fetch_all(executor)
    .await
}
