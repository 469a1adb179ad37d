//! Stored scope lookup.
//!
//! A scope is one NACE class row in the `scopes` table. These functions
//! back `nace get`, `nace scopes`, the classifier context, and the
//! `/public/scopes` endpoints.

use anyhow::{bail, Result};
use nace_core::{Activity, ClassificationRecord};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

const SCOPE_COLUMNS: &str = "class_code, class_name, class_description, \
     section_code, section_name, section_description, \
     division_code, division_name, division_description, \
     group_code, group_name, group_description, \
     included_activities, excluded_activities";

fn parse_activities(json: &str) -> Result<Vec<Activity>> {
    Ok(serde_json::from_str(json)?)
}

fn row_to_record(row: &SqliteRow) -> Result<ClassificationRecord> {
    let included: String = row.get("included_activities");
    let excluded: String = row.get("excluded_activities");

    Ok(ClassificationRecord {
        section_code: row.get("section_code"),
        section_name: row.get("section_name"),
        section_description: row.get("section_description"),
        division_code: row.get("division_code"),
        division_name: row.get("division_name"),
        division_description: row.get("division_description"),
        group_code: row.get("group_code"),
        group_name: row.get("group_name"),
        group_description: row.get("group_description"),
        class_code: row.get("class_code"),
        class_name: row.get("class_name"),
        class_description: row.get("class_description"),
        included_activities: parse_activities(&included)?,
        excluded_activities: parse_activities(&excluded)?,
    })
}

/// Fetch one scope by class code.
pub async fn get_scope(pool: &SqlitePool, class_code: &str) -> Result<ClassificationRecord> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM scopes WHERE class_code = ?",
        SCOPE_COLUMNS
    ))
    .bind(class_code)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row_to_record(&row),
        None => bail!("scope not found: {}", class_code),
    }
}

/// List stored scopes ordered by class code.
///
/// `query` is a literal substring matched case-insensitively against the
/// class name or class/group/division description. `section` matches the
/// section code exactly.
pub async fn list_scopes(
    pool: &SqlitePool,
    query: Option<&str>,
    section: Option<&str>,
) -> Result<Vec<ClassificationRecord>> {
    let pattern = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));
    let section = section
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase);

    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM scopes
        WHERE (?1 IS NULL
               OR lower(class_name) LIKE ?1 ESCAPE '\'
               OR lower(class_description) LIKE ?1 ESCAPE '\'
               OR lower(group_description) LIKE ?1 ESCAPE '\'
               OR lower(division_description) LIKE ?1 ESCAPE '\')
          AND (?2 IS NULL OR section_code = ?2)
        ORDER BY class_code ASC
        "#,
        SCOPE_COLUMNS
    ))
    .bind(pattern)
    .bind(section)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_record).collect()
}

/// Escape `LIKE` wildcards so they match literally under `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `nace get <class_code>`
pub async fn run_get(config: &Config, class_code: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let record = get_scope(&pool, class_code).await;
    pool.close().await;
    let record = record?;

    println!("--- Scope ---");
    println!("class:    {} {}", record.class_code, record.class_name);
    println!("section:  {} {}", record.section_code, record.section_name);
    println!("division: {} {}", record.division_code, record.division_name);
    println!("group:    {} {}", record.group_code, record.group_name);
    if !record.class_description.is_empty() {
        println!("description: {}", record.class_description);
    }
    println!();
    print_activities("Includes", &record.included_activities);
    print_activities("Excludes", &record.excluded_activities);

    Ok(())
}

fn print_activities(label: &str, activities: &[Activity]) {
    println!("--- {} ({}) ---", label, activities.len());
    for a in activities {
        println!("- {}", a.activity);
        for sub in &a.subactivities {
            println!("    * {}", sub);
        }
    }
    println!();
}

/// `nace scopes [--query Q] [--section S]`
pub async fn run_scopes(config: &Config, query: Option<&str>, section: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let records = list_scopes(&pool, query, section).await;
    pool.close().await;
    let records = records?;

    if records.is_empty() {
        println!("No scopes.");
        return Ok(());
    }

    for r in &records {
        println!("{}  [{}] {}", r.class_code, r.section_code, r.class_name);
    }
    println!();
    println!("{} scopes", records.len());

    Ok(())
}
