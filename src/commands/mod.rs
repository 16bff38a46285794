use anyhow::Result;
use sqlx::SqlitePool;

pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod exercise;
pub mod session;
pub mod split;
pub mod status;
pub mod template;

/// Resolves a catalog exercise given a 1-based list index or an exact
/// name. Returns `(id, name)`.
pub(crate) async fn resolve_exercise(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> = if let Ok(idx) = key.parse::<i64>() {
        sqlx::query_as(
            r#"
            SELECT id, name
            FROM (
              SELECT id, name, ROW_NUMBER() OVER (ORDER BY name) AS rn
              FROM exercises
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as("SELECT id, name FROM exercises WHERE name = ? COLLATE NOCASE")
            .bind(key)
            .fetch_optional(pool)
            .await?
    };

    Ok(row)
}

/// Resolves a template given a 1-based list index or an exact name.
/// Index order matches `template list` (creation order).
pub(crate) async fn resolve_template(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> = if let Ok(idx) = key.parse::<i64>() {
        sqlx::query_as(
            r#"
            SELECT id, name
            FROM (
              SELECT id, name, ROW_NUMBER() OVER (ORDER BY created_at, rowid) AS rn
              FROM workout_templates
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as("SELECT id, name FROM workout_templates WHERE name = ? COLLATE NOCASE")
            .bind(key)
            .fetch_optional(pool)
            .await?
    };

    Ok(row)
}

/// Resolves a split given a 1-based list index or an exact name.
pub(crate) async fn resolve_split(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> = if let Ok(idx) = key.parse::<i64>() {
        sqlx::query_as(
            r#"
            SELECT id, name
            FROM (
              SELECT id, name, ROW_NUMBER() OVER (ORDER BY created_at, rowid) AS rn
              FROM splits
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as("SELECT id, name FROM splits WHERE name = ? COLLATE NOCASE")
            .bind(key)
            .fetch_optional(pool)
            .await?
    };

    Ok(row)
}

/// Names in the catalog, for did-you-mean suggestions.
pub(crate) async fn exercise_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM exercises ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}
