//! Database statistics for `nace stats`: scope, embedding, and industry
//! counts plus a per-section breakdown.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct SectionStats {
    section_code: String,
    section_name: String,
    class_count: i64,
    embedded_count: i64,
    last_update_ts: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_scopes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scopes")
        .fetch_one(&pool)
        .await?;
    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scope_vectors")
        .fetch_one(&pool)
        .await?;
    let total_industries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM industries")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("NACE Classifier: Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Scopes:      {}", total_scopes);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_scopes,
        if total_scopes > 0 {
            (total_embedded * 100) / total_scopes
        } else {
            0
        }
    );
    println!("  Industries:  {}", total_industries);

    let rows = sqlx::query(
        r#"
        SELECT
            s.section_code,
            MAX(s.section_name) AS section_name,
            COUNT(*) AS class_count,
            COUNT(v.class_code) AS embedded_count,
            MAX(s.updated_at) AS last_update
        FROM scopes s
        LEFT JOIN scope_vectors v ON v.class_code = s.class_code
        GROUP BY s.section_code
        ORDER BY s.section_code
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let sections: Vec<SectionStats> = rows
        .iter()
        .map(|row| SectionStats {
            section_code: row.get("section_code"),
            section_name: row.get("section_name"),
            class_count: row.get("class_count"),
            embedded_count: row.get("embedded_count"),
            last_update_ts: row.get("last_update"),
        })
        .collect();

    if !sections.is_empty() {
        println!();
        println!("  By section:");
        println!(
            "  {:<8} {:<40} {:>7} {:>9}   {}",
            "SECTION", "NAME", "CLASSES", "EMBEDDED", "UPDATED"
        );
        println!("  {}", "-".repeat(84));

        for s in &sections {
            println!(
                "  {:<8} {:<40} {:>7} {:>9}   {}",
                s.section_code,
                truncate(&s.section_name, 40),
                s.class_count,
                s.embedded_count,
                format_ts_relative(s.last_update_ts)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
