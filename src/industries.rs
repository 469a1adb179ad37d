//! Industry labels offered to the crawler prompt and the web client.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Industry {
    pub id: String,
    pub name: String,
}

impl Industry {
    pub fn new(name: &str) -> Self {
        Self {
            id: slugify(name),
            name: name.trim().to_string(),
        }
    }
}

/// Lowercase `text` and collapse every run of non-alphanumerics into `_`.
///
/// `"Food & Beverage"` becomes `food_beverage`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Read a JSON array of industry names. Blank names and duplicate slugs are
/// dropped, first occurrence wins.
pub fn load_industries_file(path: &Path) -> Result<Vec<Industry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read industries file: {}", path.display()))?;
    let names: Vec<String> = serde_json::from_str(&content)
        .with_context(|| format!("Industries file must be a JSON array of strings: {}", path.display()))?;
    Ok(from_names(&names))
}

fn from_names(names: &[String]) -> Vec<Industry> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|n| Industry::new(n))
        .filter(|i| !i.id.is_empty() && seen.insert(i.id.clone()))
        .collect()
}

pub async fn upsert_industries(pool: &SqlitePool, industries: &[Industry]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for industry in industries {
        sqlx::query(
            r#"
            INSERT INTO industries (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(&industry.id)
        .bind(&industry.name)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(industries.len() as u64)
}

pub async fn list_industries(pool: &SqlitePool) -> Result<Vec<Industry>> {
    let rows = sqlx::query("SELECT id, name FROM industries ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| Industry {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}
