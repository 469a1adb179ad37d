//! Retrieval-augmented NACE classification of a company profile.
//!
//! The profile is rendered into the classification question, the best
//! matching scopes are retrieved as context, and the model's answer is
//! reduced to a de-duplicated list of well-formed class codes.

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::company::CompanyProfile;
use crate::config::Config;
use crate::db;
use crate::llm::{self, LanguageModel};
use crate::prompts;
use crate::search;

static CLASS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}\.[0-9]{2}$").expect("class code pattern compiles"));

/// Source of context documents for a classification question.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` scope documents, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

/// Retrieves from the scope index with the configured search mode.
pub struct SqliteRetriever {
    pool: SqlitePool,
    config: Arc<Config>,
}

impl SqliteRetriever {
    pub fn new(pool: SqlitePool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let hits = search::search_with_config(&self.config, &self.pool, query, None, Some(k)).await?;

        let mut documents = Vec::with_capacity(hits.len());
        for hit in hits {
            let text: Option<String> =
                sqlx::query_scalar("SELECT text FROM scopes_fts WHERE class_code = ?")
                    .bind(&hit.class_code)
                    .fetch_optional(&self.pool)
                    .await?;
            documents.extend(text);
        }
        Ok(documents)
    }
}

pub struct Classifier<R: Retriever, M: LanguageModel> {
    retriever: R,
    model: M,
    top_k: usize,
}

impl<R: Retriever, M: LanguageModel> Classifier<R, M> {
    pub fn new(retriever: R, model: M, top_k: usize) -> Self {
        Self {
            retriever,
            model,
            top_k,
        }
    }

    /// Return `profile` with `scopes` set to the model's class codes.
    pub async fn classify(&self, profile: &CompanyProfile) -> Result<CompanyProfile> {
        let name = profile.name.as_deref().unwrap_or_default().trim();
        let description = profile.description.as_deref().unwrap_or_default().trim();
        if name.is_empty() && description.is_empty() {
            bail!("company name or description must not be empty");
        }

        let question = prompts::classify_prompt(name, description, profile.industry_list());
        let documents = self.retriever.retrieve(&question, self.top_k).await?;
        tracing::info!(
            company = name,
            context_docs = documents.len(),
            "classifying company"
        );

        let prompt = prompts::with_context(&documents.join("\n"), &question);
        let answer = self.model.complete(&prompt).await?;
        let codes = class_codes(&llm::extract_json(&answer)?)?;

        let mut classified = profile.clone();
        classified.scopes = Some(codes);
        Ok(classified)
    }
}

/// Well-formed `DD.DD` codes from a JSON array answer, first occurrence
/// kept. Items may be bare strings or objects with a `code` field.
fn class_codes(answer: &Value) -> Result<Vec<String>> {
    let Some(items) = answer.as_array() else {
        bail!("model answer is not a JSON array");
    };

    let mut seen = HashSet::new();
    let mut codes = Vec::new();
    for item in items {
        let code = match item {
            Value::String(s) => s.as_str(),
            Value::Object(map) => match map.get("code").and_then(Value::as_str) {
                Some(c) => c,
                None => continue,
            },
            _ => continue,
        }
        .trim();

        if !CLASS_CODE_RE.is_match(code) {
            tracing::debug!(code, "dropping malformed class code");
            continue;
        }
        if seen.insert(code.to_string()) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}

/// `nace classify --name --description [--industry ...]`
pub async fn run_classify(
    config: &Config,
    name: String,
    description: String,
    industries: Vec<String>,
) -> Result<()> {
    let model = llm::create_model(&config.llm)?;
    let pool = db::connect(config).await?;
    let retriever = SqliteRetriever::new(pool.clone(), Arc::new(config.clone()));
    let classifier = Classifier::new(retriever, model, config.retrieval.top_k);

    let profile = CompanyProfile {
        name: Some(name),
        description: Some(description),
        industries: if industries.is_empty() {
            None
        } else {
            Some(industries)
        },
        ..Default::default()
    };

    let result = classifier.classify(&profile).await;
    pool.close().await;
    let classified = result?;

    let scopes = classified.scopes.unwrap_or_default();
    if scopes.is_empty() {
        println!("No classifications.");
        return Ok(());
    }
    for code in &scopes {
        println!("{}", code);
    }
    Ok(())
}
