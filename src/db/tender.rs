use sqlx::postgres::PgExecutor;

use crate::models::{NewTenderLine, TenderLine, TenderProject, TenderProjectSummary};

pub async fn insert_project(
    executor: impl PgExecutor<'_>,
    title: &str,
) -> Result<TenderProject, sqlx::Error> {
    sqlx::query_as::<_, TenderProject>(
        r#"
        INSERT INTO tender_projects (title)
        VALUES ($1)
        RETURNING id, title, created_at
        "#,
    )
    .bind(title)
    .fetch_one(executor)
    .await
}

pub async fn list_projects(
    executor: impl PgExecutor<'_>,
) -> Result<Vec<TenderProjectSummary>, sqlx::Error> {
    sqlx::query_as::<_, TenderProjectSummary>(
        r#"
        SELECT p.id, p.title, p.created_at,
               count(l.id) AS lines_count
        FROM tender_projects p
        LEFT JOIN tender_lines l ON l.project_id = p.id
        GROUP BY p.id, p.title, p.created_at
        ORDER BY p.id DESC
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn get_project(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<Option<TenderProject>, sqlx::Error> {
    sqlx::query_as::<_, TenderProject>(
        "SELECT id, title, created_at FROM tender_projects WHERE id = $1",
    )
    .bind(project_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_lines(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<Vec<TenderLine>, sqlx::Error> {
    sqlx::query_as::<_, TenderLine>(
        r#"
        SELECT id, project_id, row_no, name_input, qty, unit_input,
               category_code, selected_offer_id
        FROM tender_lines
        WHERE project_id = $1
        ORDER BY row_no, id
        "#,
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}

pub async fn get_line(
    executor: impl PgExecutor<'_>,
    line_id: i64,
) -> Result<Option<TenderLine>, sqlx::Error> {
    sqlx::query_as::<_, TenderLine>(
        r#"
        SELECT id, project_id, row_no, name_input, qty, unit_input,
               category_code, selected_offer_id
        FROM tender_lines
        WHERE id = $1
        "#,
    )
    .bind(line_id)
    .fetch_optional(executor)
    .await
}

pub async fn max_row_no(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<i32, sqlx::Error> {
    let (max,): (Option<i32>,) =
        sqlx::query_as("SELECT max(row_no) FROM tender_lines WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(executor)
            .await?;
    Ok(max.unwrap_or(0))
}

/// Batch-insert requirement lines, numbering them from `first_row_no`.
pub async fn insert_lines(
    executor: impl PgExecutor<'_>,
    project_id: i64,
    first_row_no: i32,
    lines: &[NewTenderLine],
) -> Result<u64, sqlx::Error> {
    if lines.is_empty() {
        return Ok(0);
    }

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO tender_lines (project_id, row_no, name_input, qty, unit_input, category_code) ",
    );

    let mut row_no = first_row_no;
    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(project_id)
            .push_bind(row_no)
            .push_bind(&line.name_input)
            .push_bind(line.qty.clone())
            .push_bind(&line.unit_input)
            .push_bind(&line.category_code);
        row_no += 1;
    });

    let result = query_builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Point a line at its active offer (or clear the pointer with None).
pub async fn set_selected_offer(
    executor: impl PgExecutor<'_>,
    line_id: i64,
    offer_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tender_lines SET selected_offer_id = $2 WHERE id = $1")
        .bind(line_id)
        .bind(offer_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Suppliers in scope for a project. An empty scope means "all suppliers";
/// the caller handles the fallback.
pub async fn project_supplier_ids(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT supplier_id
        FROM tender_project_suppliers
        WHERE project_id = $1
        ORDER BY supplier_id
        "#,
    )
    .bind(project_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn all_supplier_ids(executor: impl PgExecutor<'_>) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM suppliers ORDER BY id")
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Replace a project's supplier scope wholesale.
pub async fn replace_project_suppliers(
    executor: impl PgExecutor<'_>,
    project_id: i64,
    supplier_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        WITH cleared AS (
            DELETE FROM tender_project_suppliers
            WHERE project_id = $1 AND supplier_id <> ALL($2)
        )
        INSERT INTO tender_project_suppliers (project_id, supplier_id)
        SELECT $1, unnest($2::bigint[])
        ON CONFLICT (project_id, supplier_id) DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(supplier_ids)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn project_suppliers(
    executor: impl PgExecutor<'_>,
    project_id: i64,
) -> Result<Vec<crate::models::Supplier>, sqlx::Error> {
    sqlx::query_as::<_, crate::models::Supplier>(
        r#"
        SELECT s.id, s.name
        FROM tender_project_suppliers ps
        INNER JOIN suppliers s ON s.id = ps.supplier_id
        WHERE ps.project_id = $1
        ORDER BY s.name, s.id
        "#,
    )
    .bind(project_id)
    .fetch_all(executor)
    .await
}
