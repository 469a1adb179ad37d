//! Score normalization and hybrid merging for scope retrieval.
//!
//! Candidates arrive from two channels keyed by class code: keyword (FTS5
//! BM25, negated so higher is better) and semantic (cosine similarity).
//! This module holds the part of retrieval that needs no database:
//!
//! 1. Min-max normalize each channel to `[0, 1]` (all-equal → 1.0).
//! 2. Merge: `score = (1 - α) × keyword + α × semantic`, where a class
//!    missing from a channel scores 0 there.
//! 3. Sort by score desc, class code asc; truncate to the limit.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which channels a search draws candidates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn uses_keyword(self) -> bool {
        matches!(self, Self::Keyword | Self::Hybrid)
    }

    pub fn uses_vectors(self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    /// Weight of the semantic channel for this mode.
    pub fn effective_alpha(self, hybrid_alpha: f64) -> f64 {
        match self {
            Self::Keyword => 0.0,
            Self::Semantic => 1.0,
            Self::Hybrid => hybrid_alpha,
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
                other
            )),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// A class returned by one retrieval channel.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub class_code: String,
    /// BM25 rank negated, or cosine similarity.
    pub raw_score: f64,
    pub snippet: String,
}

/// A merged, ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredScope {
    pub class_code: String,
    pub score: f64,
    pub keyword_score: f64,
    pub semantic_score: f64,
    pub snippet: String,
}

/// Min-max normalize raw scores to `[0, 1]`.
pub fn normalize_scores(candidates: &[Candidate]) -> Vec<(&Candidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}

/// Merge both channels into a ranked list of at most `limit` scopes.
pub fn merge_candidates(
    keyword: &[Candidate],
    semantic: &[Candidate],
    alpha: f64,
    limit: usize,
) -> Vec<ScoredScope> {
    let kw: HashMap<&str, (f64, &str)> = normalize_scores(keyword)
        .into_iter()
        .map(|(c, s)| (c.class_code.as_str(), (s, c.snippet.as_str())))
        .collect();
    let sem: HashMap<&str, (f64, &str)> = normalize_scores(semantic)
        .into_iter()
        .map(|(c, s)| (c.class_code.as_str(), (s, c.snippet.as_str())))
        .collect();

    let mut codes: Vec<&str> = kw.keys().chain(sem.keys()).copied().collect();
    codes.sort_unstable();
    codes.dedup();

    let mut merged: Vec<ScoredScope> = codes
        .into_iter()
        .map(|code| {
            let (k, kw_snippet) = kw.get(code).copied().unwrap_or((0.0, ""));
            let (v, sem_snippet) = sem.get(code).copied().unwrap_or((0.0, ""));
            let snippet = if kw_snippet.is_empty() { sem_snippet } else { kw_snippet };
            ScoredScope {
                class_code: code.to_string(),
                score: (1.0 - alpha) * k + alpha * v,
                keyword_score: k,
                semantic_score: v,
                snippet: snippet.to_string(),
            }
        })
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.class_code.cmp(&b.class_code))
    });
    merged.truncate(limit);
    merged
}

/// Quote every whitespace-separated token so arbitrary user text is a
/// valid FTS5 query. Tokens are OR-ed, letting BM25 rank partial matches.
/// Tokens with no letters or digits are dropped.
///
/// Returns `None` for a query with no usable tokens.
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Cosine similarity of two vectors; 0.0 for empty or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
