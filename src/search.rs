//! Scope retrieval over the SQLite index.
//!
//! Fetches candidates from the keyword channel (FTS5 BM25 over
//! `scopes_fts`) and the semantic channel (cosine similarity against
//! `scope_vectors`), then hands both to [`nace_core::retrieval`] for
//! normalization and merging.

use anyhow::{bail, Result};
use nace_core::retrieval::{self, Candidate, ScoredScope, SearchMode};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};

/// A search hit joined with its scope's display fields.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub class_code: String,
    pub class_name: String,
    pub section_code: String,
    pub score: f64,
    pub snippet: String,
}

/// Rank stored scopes for `query`.
///
/// `provider` is only consulted for semantic and hybrid modes. An empty
/// query returns no results.
pub async fn search_scopes(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    query: &str,
    mode: SearchMode,
    hybrid_alpha: f64,
    candidate_k: usize,
    limit: usize,
) -> Result<Vec<SearchResultItem>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let keyword = if mode.uses_keyword() {
        fetch_keyword_candidates(pool, query, candidate_k).await?
    } else {
        Vec::new()
    };

    let semantic = if mode.uses_vectors() {
        fetch_vector_candidates(pool, provider, query, candidate_k).await?
    } else {
        Vec::new()
    };

    let merged = retrieval::merge_candidates(
        &keyword,
        &semantic,
        mode.effective_alpha(hybrid_alpha),
        limit,
    );

    attach_scope_fields(pool, merged).await
}

async fn attach_scope_fields(
    pool: &SqlitePool,
    merged: Vec<ScoredScope>,
) -> Result<Vec<SearchResultItem>> {
    let mut results = Vec::with_capacity(merged.len());
    for hit in merged {
        let row = sqlx::query("SELECT class_name, section_code FROM scopes WHERE class_code = ?")
            .bind(&hit.class_code)
            .fetch_optional(pool)
            .await?;
        if let Some(row) = row {
            results.push(SearchResultItem {
                class_name: row.get("class_name"),
                section_code: row.get("section_code"),
                class_code: hit.class_code,
                score: hit.score,
                snippet: hit.snippet,
            });
        }
    }
    Ok(results)
}

/// Search with the settings from `[retrieval]`, overridable per call.
pub async fn search_with_config(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    mode: Option<SearchMode>,
    limit: Option<usize>,
) -> Result<Vec<SearchResultItem>> {
    let mode = mode.unwrap_or_else(|| config.retrieval.search_mode());
    if mode.uses_vectors() && !config.embedding.is_enabled() {
        bail!(
            "Mode '{}' requires embeddings. Set [embedding] provider in config.",
            mode
        );
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let limit = limit.unwrap_or(config.retrieval.top_k);
    search_scopes(
        pool,
        provider.as_ref(),
        query,
        mode,
        config.retrieval.hybrid_alpha,
        config.retrieval.candidate_k.max(limit),
        limit,
    )
    .await
}

/// `nace search "<query>" [--mode] [--limit]`
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let mode = mode
        .map(|m| m.parse::<SearchMode>().map_err(anyhow::Error::msg))
        .transpose()?;

    let pool = db::connect(config).await?;
    let results = search_with_config(config, &pool, query, mode, limit).await;
    pool.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} {}",
            i + 1,
            result.score,
            result.class_code,
            result.class_name
        );
        println!("    section: {}", result.section_code);
        println!(
            "    excerpt: \"{}\"",
            result.snippet.replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

async fn fetch_keyword_candidates(
    pool: &SqlitePool,
    query: &str,
    candidate_k: usize,
) -> Result<Vec<Candidate>> {
    let Some(fts) = retrieval::fts_query(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT class_code, rank,
               snippet(scopes_fts, 1, '>>>', '<<<', '...', 32) AS snippet
        FROM scopes_fts
        WHERE scopes_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(fts)
    .bind(candidate_k as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            Candidate {
                class_code: row.get("class_code"),
                raw_score: -rank, // negate so higher = better
                snippet: row.get("snippet"),
            }
        })
        .collect())
}

async fn fetch_vector_candidates(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    query: &str,
    candidate_k: usize,
) -> Result<Vec<Candidate>> {
    let query_vec = embedding::embed_query(provider, query).await?;

    let rows = sqlx::query(
        r#"
        SELECT v.class_code, v.embedding,
               COALESCE(substr(f.text, 1, 240), '') AS snippet
        FROM scope_vectors v
        JOIN scopes_fts f ON f.class_code = v.class_code
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut candidates: Vec<Candidate> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            Candidate {
                class_code: row.get("class_code"),
                raw_score: retrieval::cosine_similarity(&query_vec, &vec) as f64,
                snippet: row.get("snippet"),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.class_code.cmp(&b.class_code))
    });
    candidates.truncate(candidate_k);

    Ok(candidates)
}
