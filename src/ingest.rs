//! Ingestion pipeline orchestration.
//!
//! Coordinates `nace ingest`: read document → parse → validate → store
//! scopes and their FTS rows → load industries → embed (non-fatal).

use anyhow::{bail, Result};
use nace_core::{ClassificationRecord, ValidationReport};
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::embed_cmd;
use crate::industries;
use crate::migrate;
use crate::taxonomy;

/// Rows touched by [`store_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub upserted: u64,
    pub removed: u64,
}

pub async fn run_ingest(config: &Config, dry_run: bool, strict: bool) -> Result<()> {
    let text = taxonomy::read_document(&config.taxonomy.document)?;
    let records = taxonomy::parse_document(text).await?;
    tracing::info!(records = records.len(), "parsed taxonomy document");

    let report = ValidationReport::from_records(&records);
    print!("{}", report);
    println!();

    if !report.is_valid() {
        if strict {
            bail!(
                "taxonomy validation failed: {} classes extracted, expected {}",
                report.total,
                nace_core::validate::EXPECTED_CLASSES
            );
        }
        tracing::warn!(
            total = report.total,
            "taxonomy did not validate; storing what was parsed"
        );
    }

    let industry_list = match &config.taxonomy.industries {
        Some(path) => industries::load_industries_file(path)?,
        None => Vec::new(),
    };

    if dry_run {
        println!("ingest (dry-run)");
        println!("  records parsed: {}", records.len());
        println!("  industries found: {}", industry_list.len());
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let counts = store_records(&pool, &records).await?;
    let industries_written = industries::upsert_industries(&pool, &industry_list).await?;

    let (embeddings_written, embeddings_pending) =
        embed_cmd::embed_scopes_inline(config, &pool).await;

    println!("ingest {}", config.taxonomy.document.display());
    println!("  records parsed: {}", records.len());
    println!("  scopes upserted: {}", counts.upserted);
    println!("  scopes removed: {}", counts.removed);
    println!("  industries: {}", industries_written);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", embeddings_written);
        println!("  embeddings pending: {}", embeddings_pending);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Replace the stored taxonomy with `records` in one transaction.
///
/// Classes no longer present are deleted along with their search rows and
/// vectors. `updated_at` only moves when a class's content changed.
pub async fn store_records(
    pool: &SqlitePool,
    records: &[ClassificationRecord],
) -> Result<StoreCounts> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let existing: Vec<String> = sqlx::query_scalar("SELECT class_code FROM scopes")
        .fetch_all(&mut *tx)
        .await?;
    let incoming: HashSet<&str> = records.iter().map(|r| r.class_code.as_str()).collect();

    let mut counts = StoreCounts::default();

    for code in existing.iter().filter(|c| !incoming.contains(c.as_str())) {
        for table in ["scope_vectors", "scope_embeddings", "scopes_fts", "scopes"] {
            sqlx::query(&format!("DELETE FROM {} WHERE class_code = ?", table))
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }
        counts.removed += 1;
    }

    for record in records {
        let document = record.to_document();
        let included = serde_json::to_string(&record.included_activities)?;
        let excluded = serde_json::to_string(&record.excluded_activities)?;

        sqlx::query(
            r#"
            INSERT INTO scopes (
                class_code, class_name, class_description,
                section_code, section_name, section_description,
                division_code, division_name, division_description,
                group_code, group_name, group_description,
                included_activities, excluded_activities,
                content_hash, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(class_code) DO UPDATE SET
                class_name = excluded.class_name,
                class_description = excluded.class_description,
                section_code = excluded.section_code,
                section_name = excluded.section_name,
                section_description = excluded.section_description,
                division_code = excluded.division_code,
                division_name = excluded.division_name,
                division_description = excluded.division_description,
                group_code = excluded.group_code,
                group_name = excluded.group_name,
                group_description = excluded.group_description,
                included_activities = excluded.included_activities,
                excluded_activities = excluded.excluded_activities,
                updated_at = CASE
                    WHEN scopes.content_hash = excluded.content_hash THEN scopes.updated_at
                    ELSE excluded.updated_at
                END,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(&record.class_code)
        .bind(&record.class_name)
        .bind(&record.class_description)
        .bind(&record.section_code)
        .bind(&record.section_name)
        .bind(&record.section_description)
        .bind(&record.division_code)
        .bind(&record.division_name)
        .bind(&record.division_description)
        .bind(&record.group_code)
        .bind(&record.group_name)
        .bind(&record.group_description)
        .bind(&included)
        .bind(&excluded)
        .bind(record.content_hash())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM scopes_fts WHERE class_code = ?")
            .bind(&record.class_code)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO scopes_fts (class_code, text) VALUES (?, ?)")
            .bind(&record.class_code)
            .bind(&document)
            .execute(&mut *tx)
            .await?;

        counts.upserted += 1;
    }

    tx.commit().await?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::{get_scope, list_scopes};
    use nace_core::parse;

    const DOC: &str = "\
# Section A – Agriculture, forestry and fishing
This section includes the exploitation of vegetable and animal natural resources.
01 Crop and animal production, hunting and related service activities
This division includes two basic activities.
01.1 Growing of non-perennial crops
01.11 Growing of cereals (except rice), leguminous crops and oil seeds
This class includes:
- growing of cereals such as:
* wheat
* grain maize
This class excludes:
- growing of rice
01.12 Growing of rice
";

    #[tokio::test]
    async fn test_store_and_read_back() {
        let pool = db::memory_pool().await.unwrap();
        let records = parse(DOC);
        let counts = store_records(&pool, &records).await.unwrap();
        assert_eq!(counts, StoreCounts { upserted: 2, removed: 0 });

        let stored = get_scope(&pool, "01.11").await.unwrap();
        assert_eq!(stored, records[0]);
        assert_eq!(stored.included_activities[0].subactivities, vec!["wheat", "grain maize"]);

        let fts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scopes_fts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fts, 2);
    }

    #[tokio::test]
    async fn test_reingest_removes_dropped_classes() {
        let pool = db::memory_pool().await.unwrap();
        store_records(&pool, &parse(DOC)).await.unwrap();

        let shorter = DOC.replace("01.12 Growing of rice\n", "");
        let counts = store_records(&pool, &parse(&shorter)).await.unwrap();
        assert_eq!(counts, StoreCounts { upserted: 1, removed: 1 });
        assert!(get_scope(&pool, "01.12").await.is_err());

        let fts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scopes_fts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fts, 1);
    }

    #[tokio::test]
    async fn test_updated_at_kept_for_unchanged_content() {
        let pool = db::memory_pool().await.unwrap();
        store_records(&pool, &parse(DOC)).await.unwrap();
        sqlx::query("UPDATE scopes SET updated_at = 1")
            .execute(&pool)
            .await
            .unwrap();

        let changed = DOC.replace("- growing of rice", "- growing of rice paddies");
        store_records(&pool, &parse(&changed)).await.unwrap();

        let stamps: Vec<(String, i64)> =
            sqlx::query_as("SELECT class_code, updated_at FROM scopes ORDER BY class_code")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(stamps[0].1 > 1, "changed class gets a new timestamp");
        assert_eq!(stamps[1].1, 1, "unchanged class keeps its timestamp");
    }

    #[tokio::test]
    async fn test_list_scopes_filters() {
        let pool = db::memory_pool().await.unwrap();
        store_records(&pool, &parse(DOC)).await.unwrap();

        let all = list_scopes(&pool, None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let rice = list_scopes(&pool, Some("RICE"), None).await.unwrap();
        let codes: Vec<&str> = rice.iter().map(|r| r.class_code.as_str()).collect();
        assert_eq!(codes, vec!["01.11", "01.12"]);

        // Division description matches every class below it.
        let basic = list_scopes(&pool, Some("two basic"), Some("a")).await.unwrap();
        assert_eq!(basic.len(), 2);

        assert!(list_scopes(&pool, None, Some("B")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_scopes_matches_wildcards_literally() {
        let pool = db::memory_pool().await.unwrap();
        store_records(&pool, &parse(DOC)).await.unwrap();

        assert!(list_scopes(&pool, Some("%"), None).await.unwrap().is_empty());
        assert!(list_scopes(&pool, Some("_"), None).await.unwrap().is_empty());
        assert!(list_scopes(&pool, Some("rice%"), None).await.unwrap().is_empty());

        let paren = list_scopes(&pool, Some("(except"), None).await.unwrap();
        assert_eq!(paren.len(), 1);
        assert_eq!(paren[0].class_code, "01.11");
    }

    #[tokio::test]
    async fn test_description_change_moves_updated_at() {
        let pool = db::memory_pool().await.unwrap();
        store_records(&pool, &parse(DOC)).await.unwrap();
        sqlx::query("UPDATE scopes SET updated_at = 1")
            .execute(&pool)
            .await
            .unwrap();

        let changed = DOC.replace("two basic activities", "hydroponics cultivation");
        store_records(&pool, &parse(&changed)).await.unwrap();

        let stamps: Vec<i64> = sqlx::query_scalar("SELECT updated_at FROM scopes")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(stamps.len(), 2);
        assert!(stamps.iter().all(|&t| t > 1), "both classes sit under the division");

        let fts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM scopes_fts WHERE scopes_fts MATCH '\"hydroponics\"'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(fts, 2);
    }
}
