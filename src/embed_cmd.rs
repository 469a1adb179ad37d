use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};

struct PendingScope {
    class_code: String,
    text: String,
    content_hash: String,
}

/// Embed scopes that are missing a vector or whose content changed.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let pending = find_pending_scopes(&pool, provider.model_name(), limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  scopes needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all scopes up to date");
        pool.close().await;
        return Ok(());
    }

    let total = pending.len();
    let (embedded, failed) = embed_batches(provider.as_ref(), &pool, &pending, batch_size).await?;

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Delete every stored vector and embed all scopes again.
pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    clear_embeddings(&pool).await?;
    println!("embed rebuild: cleared existing embeddings");

    let all = find_pending_scopes(&pool, provider.model_name(), None).await?;
    if all.is_empty() {
        println!("  no scopes to embed");
        pool.close().await;
        return Ok(());
    }

    let total = all.len();
    let (embedded, failed) = embed_batches(provider.as_ref(), &pool, &all, batch_size).await?;

    println!("embed rebuild");
    println!("  total scopes: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Embed stale scopes during ingest. Never fails; returns
/// `(embedded, still_pending)`.
pub async fn embed_scopes_inline(config: &Config, pool: &SqlitePool) -> (u64, u64) {
    if !config.embedding.is_enabled() {
        return (0, 0);
    }

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("could not create embedding provider: {}", e);
            let model = config.embedding.model.as_deref().unwrap_or_default();
            return (0, count_pending(pool, model).await);
        }
    };

    embed_stale(provider.as_ref(), pool, config.embedding.batch_size).await
}

pub(crate) async fn embed_stale(
    provider: &dyn EmbeddingProvider,
    pool: &SqlitePool,
    batch_size: usize,
) -> (u64, u64) {
    let pending = match find_pending_scopes(pool, provider.model_name(), None).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("could not list scopes to embed: {}", e);
            return (0, 0);
        }
    };

    match embed_batches(provider, pool, &pending, batch_size).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!("failed to store embeddings: {}", e);
            (0, pending.len() as u64)
        }
    }
}

async fn count_pending(pool: &SqlitePool, model: &str) -> u64 {
    find_pending_scopes(pool, model, None)
        .await
        .map(|p| p.len() as u64)
        .unwrap_or(0)
}

/// Returns `(embedded, failed)`. A failed provider call skips its batch;
/// a failed write aborts.
async fn embed_batches(
    provider: &dyn EmbeddingProvider,
    pool: &SqlitePool,
    pending: &[PendingScope],
    batch_size: usize,
) -> Result<(u64, u64)> {
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match provider.embed(&texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    upsert_embedding(
                        pool,
                        &item.class_code,
                        provider.model_name(),
                        provider.dims(),
                        &item.content_hash,
                        &embedding::vec_to_blob(vec),
                    )
                    .await?;
                    embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(batch = batch.len(), "embedding batch failed: {}", e);
                failed += batch.len() as u64;
            }
        }
    }

    Ok((embedded, failed))
}

async fn clear_embeddings(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM scope_vectors").execute(pool).await?;
    sqlx::query("DELETE FROM scope_embeddings").execute(pool).await?;
    Ok(())
}

async fn find_pending_scopes(
    pool: &SqlitePool,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<PendingScope>> {
    let limit_val = limit.map(|l| l as i64).unwrap_or(-1);

    let rows = sqlx::query(
        r#"
        SELECT s.class_code, s.content_hash, f.text
        FROM scopes s
        JOIN scopes_fts f ON f.class_code = s.class_code
        LEFT JOIN scope_embeddings e ON e.class_code = s.class_code AND e.model = ?
        WHERE e.class_code IS NULL OR e.content_hash != s.content_hash
        ORDER BY s.class_code
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingScope {
            class_code: row.get("class_code"),
            text: row.get("text"),
            content_hash: row.get("content_hash"),
        })
        .collect())
}

async fn upsert_embedding(
    pool: &SqlitePool,
    class_code: &str,
    model: &str,
    dims: usize,
    content_hash: &str,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO scope_embeddings (class_code, model, dims, created_at, content_hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(class_code) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            created_at = excluded.created_at,
            content_hash = excluded.content_hash
        "#,
    )
    .bind(class_code)
    .bind(model)
    .bind(dims as i64)
    .bind(now)
    .bind(content_hash)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO scope_vectors (class_code, embedding)
        VALUES (?, ?)
        ON CONFLICT(class_code) DO UPDATE SET embedding = excluded.embedding
        "#,
    )
    .bind(class_code)
    .bind(blob)
    .execute(pool)
    .await?;

    Ok(())
}
