use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the scope tables if they do not exist. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // One row per NACE class; activity lists are stored as JSON arrays.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scopes (
            class_code TEXT PRIMARY KEY,
            class_name TEXT NOT NULL,
            class_description TEXT NOT NULL DEFAULT '',
            section_code TEXT NOT NULL,
            section_name TEXT NOT NULL,
            section_description TEXT NOT NULL DEFAULT '',
            division_code TEXT NOT NULL,
            division_name TEXT NOT NULL,
            division_description TEXT NOT NULL DEFAULT '',
            group_code TEXT NOT NULL,
            group_name TEXT NOT NULL,
            group_description TEXT NOT NULL DEFAULT '',
            included_activities TEXT NOT NULL DEFAULT '[]',
            excluded_activities TEXT NOT NULL DEFAULT '[]',
            content_hash TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scope_embeddings (
            class_code TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            FOREIGN KEY (class_code) REFERENCES scopes(class_code) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scope_vectors (
            class_code TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (class_code) REFERENCES scopes(class_code) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS industries (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='scopes_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE scopes_fts USING fts5(
                class_code UNINDEXED,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scopes_section ON scopes(section_code)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scopes_division ON scopes(division_code)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_scopes_group ON scopes(group_code)")
        .execute(pool)
        .await?;

    Ok(())
}
