//! Public HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/public/dependencies` | Industries and every stored scope |
//! | `GET`  | `/public/scopes` | Scopes filtered by `query` and `section` |
//! | `GET`  | `/public/scopes/{code}` | One scope by class code |
//! | `POST` | `/public/search` | Ranked scope search |
//! | `POST` | `/public/classify` | Company profile → profile with NACE scopes |
//! | `POST` | `/public/crawl` | Website → company profile |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `llm_disabled` (400),
//! `upstream` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use nace_core::retrieval::SearchMode;
use nace_core::ClassificationRecord;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::classify::{Classifier, SqliteRetriever};
use crate::company::CompanyProfile;
use crate::config::Config;
use crate::crawl;
use crate::db;
use crate::industries::{self, Industry};
use crate::llm::{self, LanguageModel};
use crate::scopes;
use crate::search::{self, SearchResultItem};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    /// `None` when `[llm]` is disabled or could not be initialized.
    model: Option<Arc<dyn LanguageModel>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pool: SqlitePool,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            config,
            pool,
            model,
        }
    }

    fn model(&self) -> Result<Arc<dyn LanguageModel>, AppError> {
        self.model.clone().ok_or_else(|| AppError {
            status: StatusCode::BAD_REQUEST,
            code: "llm_disabled".to_string(),
            message: "LLM provider is disabled. Set [llm] provider in config.".to_string(),
        })
    }
}

/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let model = if config.llm.is_enabled() {
        match llm::create_model(&config.llm) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!("language model unavailable, classify and crawl disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(Arc::new(config.clone()), pool, model);
    let app = router(state);

    tracing::info!("listening on http://{}", bind_addr);
    println!("nace server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/public/dependencies", get(handle_dependencies))
        .route("/public/scopes", get(handle_list_scopes))
        .route("/public/scopes/{code}", get(handle_get_scope))
        .route("/public/search", post(handle_search))
        .route("/public/classify", post(handle_classify))
        .route("/public/crawl", post(handle_crawl))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!("request failed: {:#}", err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

/// Map a classifier or crawler failure: input problems are the caller's,
/// everything else came from the model or its API.
fn classify_model_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);
    if msg.contains("must not be empty") || msg.contains("invalid website") {
        bad_request(msg)
    } else {
        tracing::warn!("model call failed: {}", msg);
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream".to_string(),
            message: msg,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /public/dependencies ============

#[derive(Serialize)]
struct DependencyResponse {
    industries: Vec<Industry>,
    scopes: Vec<ClassificationRecord>,
}

async fn handle_dependencies(
    State(state): State<AppState>,
) -> Result<Json<DependencyResponse>, AppError> {
    let industries = industries::list_industries(&state.pool)
        .await
        .map_err(internal)?;
    let scopes = scopes::list_scopes(&state.pool, None, None)
        .await
        .map_err(internal)?;
    Ok(Json(DependencyResponse { industries, scopes }))
}

// ============ GET /public/scopes ============

#[derive(Deserialize)]
struct ScopeQuery {
    query: Option<String>,
    section: Option<String>,
}

async fn handle_list_scopes(
    State(state): State<AppState>,
    Query(params): Query<ScopeQuery>,
) -> Result<Json<Vec<ClassificationRecord>>, AppError> {
    let records = scopes::list_scopes(
        &state.pool,
        params.query.as_deref(),
        params.section.as_deref(),
    )
    .await
    .map_err(internal)?;
    Ok(Json(records))
}

async fn handle_get_scope(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ClassificationRecord>, AppError> {
    match scopes::get_scope(&state.pool, &code).await {
        Ok(record) => Ok(Json(record)),
        Err(e) if e.to_string().contains("not found") => Err(not_found(e.to_string())),
        Err(e) => Err(internal(e)),
    }
}

// ============ POST /public/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    mode: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultItem>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let mode = req
        .mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()
        .map_err(bad_request)?;
    if let Some(limit) = req.limit {
        if limit == 0 {
            return Err(bad_request("limit must be >= 1"));
        }
    }

    let results =
        search::search_with_config(&state.config, &state.pool, &req.query, mode, req.limit)
            .await
            .map_err(|e| {
                if e.to_string().contains("requires embeddings") {
                    bad_request(e.to_string())
                } else {
                    internal(e)
                }
            })?;

    Ok(Json(SearchResponse { results }))
}

// ============ POST /public/classify ============

async fn handle_classify(
    State(state): State<AppState>,
    Json(profile): Json<CompanyProfile>,
) -> Result<(StatusCode, Json<CompanyProfile>), AppError> {
    let model = state.model()?;
    let retriever = SqliteRetriever::new(state.pool.clone(), state.config.clone());
    let classifier = Classifier::new(retriever, model, state.config.retrieval.top_k);

    let classified = classifier
        .classify(&profile)
        .await
        .map_err(classify_model_error)?;
    Ok((StatusCode::CREATED, Json(classified)))
}

// ============ POST /public/crawl ============

#[derive(Deserialize)]
struct CrawlRequest {
    website: String,
}

async fn handle_crawl(
    State(state): State<AppState>,
    Json(req): Json<CrawlRequest>,
) -> Result<(StatusCode, Json<CompanyProfile>), AppError> {
    let model = state.model()?;
    let ids: Vec<String> = industries::list_industries(&state.pool)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|i| i.id)
        .collect();

    let profile = crawl::crawl(model.as_ref(), &req.website, &ids)
        .await
        .map_err(classify_model_error)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::tests::CannedModel;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(model: Option<Arc<dyn LanguageModel>>) -> Router {
        let pool = db::memory_pool().await.unwrap();
        crate::ingest::store_records(&pool, &nace_core::parse(crate::embed_cmd::tests::DOC))
            .await
            .unwrap();
        industries::upsert_industries(&pool, &[Industry::new("Mining & Quarrying")])
            .await
            .unwrap();

        let config: Config = toml::from_str(
            "[db]\npath = \"unused.sqlite\"\n[taxonomy]\ndocument = \"unused.md\"\n",
        )
        .unwrap();
        router(AppState::new(Arc::new(config), pool, model))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(None).await, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_dependencies() {
        let (status, body) = send(app(None).await, get_req("/public/dependencies")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["industries"][0]["id"], "mining_quarrying");
        assert_eq!(body["scopes"].as_array().unwrap().len(), 2);
        assert_eq!(body["scopes"][0]["class_code"], "01.11");
    }

    #[tokio::test]
    async fn test_scope_lookup_and_not_found() {
        let (status, body) = send(app(None).await, get_req("/public/scopes/05.10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["class_name"], "Mining of hard coal");
        assert_eq!(body["included_activities"][0]["activity"], "underground coal mining");

        let (status, body) = send(app(None).await, get_req("/public/scopes/99.99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_scope_filters() {
        let (_, body) = send(app(None).await, get_req("/public/scopes?section=B")).await;
        let codes: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["class_code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["05.10"]);
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = send(
            app(None).await,
            post_req("/public/search", json!({ "query": "cereals" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["class_code"], "01.11");

        let (status, body) = send(
            app(None).await,
            post_req("/public/search", json!({ "query": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");

        let (status, _) = send(
            app(None).await,
            post_req("/public/search", json!({ "query": "coal", "mode": "semantic" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_classify_requires_llm() {
        let (status, body) = send(
            app(None).await,
            post_req("/public/classify", json!({ "name": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "llm_disabled");
    }

    #[tokio::test]
    async fn test_classify_with_model() {
        let model: Arc<dyn LanguageModel> = Arc::new(CannedModel::new("[\"05.10\", \"bogus\"]"));
        let (status, body) = send(
            app(Some(model)).await,
            post_req(
                "/public/classify",
                json!({ "name": "Deep Coal Ltd", "description": "coal mining" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["scopes"], json!(["05.10"]));
        assert_eq!(body["name"], "Deep Coal Ltd");
    }

    #[tokio::test]
    async fn test_model_garbage_is_upstream_error() {
        let model: Arc<dyn LanguageModel> = Arc::new(CannedModel::new("I cannot help"));
        let (status, body) = send(
            app(Some(model)).await,
            post_req("/public/crawl", json!({ "website": "acme.test" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "upstream");
    }

    #[tokio::test]
    async fn test_crawl_with_model() {
        let model: Arc<dyn LanguageModel> =
            Arc::new(CannedModel::new(r#"{"name": "Acme", "industries": ["mining_quarrying"]}"#));
        let (status, body) = send(
            app(Some(model)).await,
            post_req("/public/crawl", json!({ "website": "acme.test" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["website"], "https://acme.test");
        assert_eq!(body["industries"], json!(["mining_quarrying"]));
    }
}
